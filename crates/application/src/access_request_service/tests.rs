use std::sync::Arc;

use rolegate_core::AppError;
use rolegate_domain::{AccessRequestStatus, RequestField, TargetType};

use crate::access_selection::AccessSelection;
use crate::test_fakes::{FakeAccessRuleAuthority, FakeAccessRuleCache, cached_rule, rule_id, target};

use super::{AccessRequestInput, AccessRequestService};

async fn seeded_cache() -> Arc<FakeAccessRuleCache> {
    let cache = Arc::new(FakeAccessRuleCache::default());
    cache
        .seed(
            cached_rule("rul_approval", true, 28_800),
            vec![
                target("rul_approval", TargetType::AccountId, "prod", "123456789012"),
                target(
                    "rul_approval",
                    TargetType::PermissionSetArn,
                    "AdminAccess",
                    "arn:ps-admin-1",
                ),
            ],
        )
        .await;
    cache
        .seed(
            cached_rule("rul_instant", false, 3600),
            vec![
                target("rul_instant", TargetType::AccountId, "prod", "123456789012"),
                target("rul_instant", TargetType::AccountId, "dev", "210987654321"),
                target(
                    "rul_instant",
                    TargetType::PermissionSetArn,
                    "AdminAccess",
                    "arn:ps-admin-2",
                ),
                target(
                    "rul_instant",
                    TargetType::PermissionSetArn,
                    "ReadOnly",
                    "arn:ps-read",
                ),
            ],
        )
        .await;
    cache
}

fn admin_input(duration_seconds: Option<u32>) -> AccessRequestInput {
    AccessRequestInput {
        selection: AccessSelection {
            account: "123456789012".to_owned(),
            permission_set_label: "AdminAccess".to_owned(),
        },
        reason: Some("  incident 42 ".to_owned()),
        duration_seconds,
    }
}

#[tokio::test]
async fn request_access_submits_best_rule_with_required_fields() {
    let cache = seeded_cache().await;
    let authority = Arc::new(FakeAccessRuleAuthority::default());
    *authority.request_status.lock().await = Some(AccessRequestStatus::Approved);
    let service = AccessRequestService::new(cache, authority.clone());

    let outcome = service.request_access(admin_input(None)).await;

    assert!(outcome.is_ok());
    let outcome = outcome.unwrap_or_else(|_| unreachable!());
    assert!(outcome.is_active());
    assert_eq!(outcome.plan.rule.id(), &rule_id("rul_instant"));

    let submitted = authority.submitted.lock().await;
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].access_rule_id, rule_id("rul_instant"));
    assert_eq!(submitted[0].reason.as_deref(), Some("incident 42"));
    assert_eq!(submitted[0].duration_seconds, 3600);
    assert_eq!(
        submitted[0].with,
        Some(vec![
            RequestField {
                target_type: TargetType::AccountId,
                value: "123456789012".to_owned(),
            },
            RequestField {
                target_type: TargetType::PermissionSetArn,
                value: "arn:ps-admin-2".to_owned(),
            },
        ])
    );
}

#[tokio::test]
async fn pending_request_is_not_active() {
    let cache = seeded_cache().await;
    let authority = Arc::new(FakeAccessRuleAuthority::default());
    let service = AccessRequestService::new(cache, authority);

    let outcome = service.request_access(admin_input(Some(600))).await;

    assert!(outcome.is_ok());
    let outcome = outcome.unwrap_or_else(|_| unreachable!());
    assert!(!outcome.is_active());
    assert_eq!(outcome.plan.duration_seconds, 600);
}

#[tokio::test]
async fn duration_above_rule_maximum_is_rejected() {
    let cache = seeded_cache().await;
    let authority = Arc::new(FakeAccessRuleAuthority::default());
    let service = AccessRequestService::new(cache, authority.clone());

    let outcome = service.request_access(admin_input(Some(7200))).await;

    assert!(matches!(outcome, Err(AppError::Validation(_))));
    assert!(authority.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn unmatched_selection_is_reported_without_submitting() {
    let cache = seeded_cache().await;
    let authority = Arc::new(FakeAccessRuleAuthority::default());
    let service = AccessRequestService::new(cache, authority.clone());
    let mut input = admin_input(None);
    input.selection.permission_set_label = "Billing".to_owned();

    let outcome = service.request_access(input).await;

    assert!(matches!(outcome, Err(AppError::NoMatchingAccessRule(_))));
    assert!(authority.submitted.lock().await.is_empty());
}

#[tokio::test]
async fn access_options_lists_accounts_and_reachable_roles() {
    let cache = seeded_cache().await;
    let authority = Arc::new(FakeAccessRuleAuthority::default());
    let service = AccessRequestService::new(cache, authority);

    let all = service.access_options(None).await;
    assert!(all.is_ok());
    let all = all.unwrap_or_default();
    assert_eq!(all.accounts, vec!["123456789012", "210987654321"]);
    assert_eq!(all.permission_sets, vec!["AdminAccess", "ReadOnly"]);

    let dev = service.access_options(Some("210987654321")).await;
    assert_eq!(
        dev.unwrap_or_default().permission_sets,
        vec!["AdminAccess", "ReadOnly"]
    );
}
