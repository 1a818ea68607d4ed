use std::sync::Arc;

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{AccessRule, RequestField};
use tracing::info;

use crate::access_rule_ports::{
    AccessRuleAuthority, AccessRuleCacheRepository, CreateAccessRequestInput,
    CreatedAccessRequest,
};
use crate::access_selection::{AccessIndex, AccessSelection, select_access_rule};
use crate::request_fields::build_request_fields;

/// Values a user can choose from when requesting access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessOptions {
    /// Account values in ascending order.
    pub accounts: Vec<String>,
    /// Permission set labels in ascending order.
    pub permission_sets: Vec<String>,
}

/// Input for an access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequestInput {
    /// Chosen account and role.
    pub selection: AccessSelection,
    /// Optional justification.
    pub reason: Option<String>,
    /// Requested duration, defaulting to the rule maximum.
    pub duration_seconds: Option<u32>,
}

/// Rule and fields resolved for a request, before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequestPlan {
    /// Selected rule.
    pub rule: AccessRule,
    /// Fields attached to the request.
    pub with: Option<Vec<RequestField>>,
    /// Duration that will be requested.
    pub duration_seconds: u32,
}

/// Result of a submitted access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequestOutcome {
    /// Plan that was submitted.
    pub plan: AccessRequestPlan,
    /// Requests created by the remote authority.
    pub requests: Vec<CreatedAccessRequest>,
}

impl AccessRequestOutcome {
    /// Returns true when at least one request was approved immediately.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.requests
            .iter()
            .any(|request| request.status.is_approved())
    }
}

/// Application service resolving selections against the cache and submitting
/// access requests.
#[derive(Clone)]
pub struct AccessRequestService {
    cache: Arc<dyn AccessRuleCacheRepository>,
    authority: Arc<dyn AccessRuleAuthority>,
}

impl AccessRequestService {
    /// Creates an access request service.
    #[must_use]
    pub fn new(
        cache: Arc<dyn AccessRuleCacheRepository>,
        authority: Arc<dyn AccessRuleAuthority>,
    ) -> Self {
        Self { cache, authority }
    }

    /// Lists selectable accounts and permission sets, optionally narrowed to
    /// the permission sets reachable from one account.
    pub async fn access_options(&self, account: Option<&str>) -> AppResult<AccessOptions> {
        let snapshot = self.cache.load_snapshot().await?;
        let index = AccessIndex::build(&snapshot);

        Ok(AccessOptions {
            accounts: index.accounts().into_iter().map(str::to_owned).collect(),
            permission_sets: index
                .permission_set_labels(account)
                .into_iter()
                .map(str::to_owned)
                .collect(),
        })
    }

    /// Resolves the rule, duration and fields for a request without
    /// submitting it.
    pub async fn plan_access_request(
        &self,
        input: &AccessRequestInput,
    ) -> AppResult<AccessRequestPlan> {
        let snapshot = self.cache.load_snapshot().await?;
        let rule = select_access_rule(&snapshot, &input.selection)?;
        let with = build_request_fields(&snapshot, rule.id(), &input.selection)?;
        let duration_seconds = resolve_duration(rule, input.duration_seconds)?;

        Ok(AccessRequestPlan {
            rule: rule.clone(),
            with,
            duration_seconds,
        })
    }

    /// Selects a rule for the input and submits the access request.
    pub async fn request_access(&self, input: AccessRequestInput) -> AppResult<AccessRequestOutcome> {
        let plan = self.plan_access_request(&input).await?;

        info!(
            rule_id = %plan.rule.id(),
            rule_name = %plan.rule.name(),
            duration_seconds = plan.duration_seconds,
            field_count = plan.with.as_ref().map_or(0, Vec::len),
            "submitting access request"
        );

        let reason = input.reason.and_then(|reason| {
            let trimmed = reason.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        let requests = self
            .authority
            .create_access_request(CreateAccessRequestInput {
                access_rule_id: plan.rule.id().clone(),
                reason,
                duration_seconds: plan.duration_seconds,
                with: plan.with.clone(),
            })
            .await?;

        Ok(AccessRequestOutcome { plan, requests })
    }
}

fn resolve_duration(rule: &AccessRule, requested: Option<u32>) -> AppResult<u32> {
    match requested {
        None => Ok(rule.duration_seconds()),
        Some(0) => Err(AppError::Validation(
            "requested duration must be greater than zero".to_owned(),
        )),
        Some(seconds) if seconds > rule.duration_seconds() => Err(AppError::Validation(format!(
            "requested duration {seconds}s exceeds the {}s maximum of access rule '{}'",
            rule.duration_seconds(),
            rule.name()
        ))),
        Some(seconds) => Ok(seconds),
    }
}

#[cfg(test)]
mod tests;
