use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use rolegate_core::{AppError, AppResult, DeploymentId};
use rolegate_domain::{
    AccessRequestStatus, AccessRule, AccessRuleId, AccessRuleInput, AccessTarget, TargetType,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::access_rule_ports::{
    AccessRuleAuthority, AccessRuleCacheRepository, AccessRuleDetail, CreateAccessRequestInput,
    CreatedAccessRequest, RemoteAccessRule, RuleApprover, RuleArgument, RuleArgumentOption,
};

pub(crate) fn deployment_id() -> DeploymentId {
    DeploymentId::from_base_url("https://access.example.com").unwrap_or_else(|_| unreachable!())
}

pub(crate) fn rule_id(value: &str) -> AccessRuleId {
    AccessRuleId::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn remote_rule(id: &str, updated_at: i64) -> RemoteAccessRule {
    RemoteAccessRule {
        id: id.to_owned(),
        name: format!("rule {id}"),
        target_provider_id: "aws-sso-v2".to_owned(),
        target_provider_type: "aws-sso".to_owned(),
        created_at: 1,
        updated_at,
        duration_seconds: 3600,
    }
}

pub(crate) fn cached_rule(id: &str, requires_approval: bool, duration_seconds: u32) -> AccessRule {
    AccessRule::new(AccessRuleInput {
        id: id.to_owned(),
        deployment_id: deployment_id(),
        name: format!("rule {id}"),
        target_provider_id: "aws-sso-v2".to_owned(),
        target_provider_type: "aws-sso".to_owned(),
        created_at: 1,
        updated_at: 1,
        duration_seconds,
        requires_approval: Some(requires_approval),
    })
    .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn target(rule: &str, target_type: TargetType, label: &str, value: &str) -> AccessTarget {
    AccessTarget::new(rule_id(rule), target_type, label, None, value)
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn detail(accounts: &[&str], permission_sets: &[(&str, &str)]) -> AccessRuleDetail {
    let account_options = accounts
        .iter()
        .map(|account| RuleArgumentOption {
            label: format!("account {account}"),
            value: (*account).to_owned(),
            description: None,
        })
        .collect();
    let permission_set_options = permission_sets
        .iter()
        .map(|(label, value)| RuleArgumentOption {
            label: (*label).to_owned(),
            value: (*value).to_owned(),
            description: None,
        })
        .collect();

    AccessRuleDetail {
        arguments: BTreeMap::from([
            (
                "accountId".to_owned(),
                RuleArgument {
                    options: account_options,
                },
            ),
            (
                "permissionSetArn".to_owned(),
                RuleArgument {
                    options: permission_set_options,
                },
            ),
        ]),
    }
}

#[derive(Default)]
pub(crate) struct FakeAccessRuleCache {
    pub(crate) rules: Mutex<HashMap<AccessRuleId, AccessRule>>,
    pub(crate) targets: Mutex<Vec<AccessTarget>>,
    pub(crate) writes: Mutex<usize>,
    pub(crate) fail_replace_targets: Mutex<bool>,
}

impl FakeAccessRuleCache {
    pub(crate) async fn seed(&self, rule: AccessRule, targets: Vec<AccessTarget>) {
        self.rules.lock().await.insert(rule.id().clone(), rule);
        self.targets.lock().await.extend(targets);
    }

    pub(crate) async fn write_count(&self) -> usize {
        *self.writes.lock().await
    }

    pub(crate) async fn targets_of(&self, rule: &str) -> Vec<AccessTarget> {
        let rule_id = rule_id(rule);
        self.targets
            .lock()
            .await
            .iter()
            .filter(|target| target.access_rule_id() == &rule_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AccessRuleCacheRepository for FakeAccessRuleCache {
    async fn find_rule(&self, rule_id: &AccessRuleId) -> AppResult<Option<AccessRule>> {
        Ok(self.rules.lock().await.get(rule_id).cloned())
    }

    async fn list_rules(&self) -> AppResult<HashMap<AccessRuleId, AccessRule>> {
        Ok(self.rules.lock().await.clone())
    }

    async fn upsert_rule(&self, rule: AccessRule) -> AppResult<()> {
        *self.writes.lock().await += 1;
        self.rules.lock().await.insert(rule.id().clone(), rule);
        Ok(())
    }

    async fn set_requires_approval(
        &self,
        rule_id: &AccessRuleId,
        requires_approval: bool,
    ) -> AppResult<()> {
        *self.writes.lock().await += 1;
        let mut rules = self.rules.lock().await;
        let rule = rules
            .remove(rule_id)
            .ok_or_else(|| AppError::NotFound(format!("access rule '{rule_id}' is not cached")))?;
        rules.insert(rule_id.clone(), rule.with_requires_approval(requires_approval));
        Ok(())
    }

    async fn replace_targets(
        &self,
        rule_id: &AccessRuleId,
        targets: Vec<AccessTarget>,
    ) -> AppResult<()> {
        *self.writes.lock().await += 1;
        if *self.fail_replace_targets.lock().await {
            return Err(AppError::Storage(
                "simulated target replacement failure".to_owned(),
            ));
        }

        let mut stored = self.targets.lock().await;
        stored.retain(|target| target.access_rule_id() != rule_id);
        stored.extend(targets);
        Ok(())
    }

    async fn list_targets(&self) -> AppResult<Vec<AccessTarget>> {
        Ok(self.targets.lock().await.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeAccessRuleAuthority {
    pub(crate) rules: Mutex<Vec<RemoteAccessRule>>,
    pub(crate) approvers: Mutex<HashMap<String, Vec<RuleApprover>>>,
    pub(crate) details: Mutex<HashMap<String, AccessRuleDetail>>,
    pub(crate) failing_details: Mutex<HashSet<String>>,
    pub(crate) approver_calls: Mutex<Vec<String>>,
    pub(crate) detail_calls: Mutex<Vec<String>>,
    pub(crate) submitted: Mutex<Vec<CreateAccessRequestInput>>,
    pub(crate) request_status: Mutex<Option<AccessRequestStatus>>,
    pub(crate) cancel_on_detail: Mutex<Option<(String, CancellationToken)>>,
}

impl FakeAccessRuleAuthority {
    pub(crate) async fn publish(
        &self,
        rule: RemoteAccessRule,
        approvers: usize,
        detail: AccessRuleDetail,
    ) {
        let approvers = (0..approvers)
            .map(|index| RuleApprover {
                id: format!("usr_{index}"),
                email: None,
            })
            .collect();
        self.approvers
            .lock()
            .await
            .insert(rule.id.clone(), approvers);
        self.details.lock().await.insert(rule.id.clone(), detail);

        let mut rules = self.rules.lock().await;
        rules.retain(|existing| existing.id != rule.id);
        rules.push(rule);
    }

    pub(crate) async fn detail_call_count(&self, rule: &str) -> usize {
        self.detail_calls
            .lock()
            .await
            .iter()
            .filter(|called| called.as_str() == rule)
            .count()
    }
}

#[async_trait]
impl AccessRuleAuthority for FakeAccessRuleAuthority {
    async fn list_access_rules(&self) -> AppResult<Vec<RemoteAccessRule>> {
        Ok(self.rules.lock().await.clone())
    }

    async fn list_approvers(&self, rule_id: &AccessRuleId) -> AppResult<Vec<RuleApprover>> {
        self.approver_calls
            .lock()
            .await
            .push(rule_id.as_str().to_owned());
        Ok(self
            .approvers
            .lock()
            .await
            .get(rule_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_rule_detail(&self, rule_id: &AccessRuleId) -> AppResult<AccessRuleDetail> {
        self.detail_calls
            .lock()
            .await
            .push(rule_id.as_str().to_owned());
        let cancel_here = self
            .cancel_on_detail
            .lock()
            .await
            .as_ref()
            .filter(|(rule, _)| rule.as_str() == rule_id.as_str())
            .map(|(_, token)| token.clone());
        if let Some(token) = cancel_here {
            // Cancel mid-fetch and never answer, like a request cut off by Ctrl-C.
            token.cancel();
            std::future::pending::<()>().await;
        }

        if self.failing_details.lock().await.contains(rule_id.as_str()) {
            return Err(AppError::Remote(format!(
                "simulated detail failure for '{rule_id}'"
            )));
        }

        self.details
            .lock()
            .await
            .get(rule_id.as_str())
            .cloned()
            .ok_or_else(|| AppError::Remote(format!("access rule '{rule_id}' not found")))
    }

    async fn create_access_request(
        &self,
        input: CreateAccessRequestInput,
    ) -> AppResult<Vec<CreatedAccessRequest>> {
        let status = self
            .request_status
            .lock()
            .await
            .unwrap_or(AccessRequestStatus::Pending);
        self.submitted.lock().await.push(input);
        Ok(vec![CreatedAccessRequest {
            id: "req_1".to_owned(),
            status,
        }])
    }
}
