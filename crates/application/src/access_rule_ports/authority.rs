use std::collections::BTreeMap;

use async_trait::async_trait;
use rolegate_core::{AppResult, DeploymentId};
use rolegate_domain::{
    AccessRequestStatus, AccessRule, AccessRuleId, AccessRuleInput, AccessTarget, RequestField,
    TargetType,
};
use tracing::debug;

/// Access rule as listed by the remote authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccessRule {
    /// Remote rule identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Target provider identifier.
    pub target_provider_id: String,
    /// Target provider type, for example `aws-sso`.
    pub target_provider_type: String,
    /// Creation timestamp in Unix seconds.
    pub created_at: i64,
    /// Last update timestamp in Unix seconds.
    pub updated_at: i64,
    /// Maximum grant duration in seconds.
    pub duration_seconds: u32,
}

impl RemoteAccessRule {
    /// Builds the cache row for this rule with the approval flag unset.
    pub fn to_access_rule(&self, deployment_id: DeploymentId) -> AppResult<AccessRule> {
        AccessRule::new(AccessRuleInput {
            id: self.id.clone(),
            deployment_id,
            name: self.name.clone(),
            target_provider_id: self.target_provider_id.clone(),
            target_provider_type: self.target_provider_type.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            duration_seconds: self.duration_seconds,
            requires_approval: None,
        })
    }
}

/// User allowed to approve requests for a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleApprover {
    /// Remote user identifier.
    pub id: String,
    /// Email, when the authority exposes it.
    pub email: Option<String>,
}

/// One selectable option of a rule argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleArgumentOption {
    /// Human-readable label.
    pub label: String,
    /// Underlying value.
    pub value: String,
    /// Optional description.
    pub description: Option<String>,
}

/// Options exposed for one argument key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleArgument {
    /// Selectable options.
    pub options: Vec<RuleArgumentOption>,
}

/// Detailed rule payload exposing its argument schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRuleDetail {
    /// Arguments keyed by target type, for example `accountId`.
    pub arguments: BTreeMap<String, RuleArgument>,
}

impl AccessRuleDetail {
    /// Flattens every option under every argument key into access targets.
    ///
    /// Options without a value cannot be requested and are left out.
    pub fn to_access_targets(&self, rule_id: &AccessRuleId) -> AppResult<Vec<AccessTarget>> {
        let mut targets = Vec::new();
        for (key, argument) in &self.arguments {
            for option in &argument.options {
                if option.value.trim().is_empty() {
                    debug!(
                        rule_id = %rule_id,
                        argument = %key,
                        label = %option.label,
                        "skipping argument option without a value"
                    );
                    continue;
                }

                targets.push(AccessTarget::new(
                    rule_id.clone(),
                    TargetType::from(key.as_str()),
                    option.label.clone(),
                    option.description.clone(),
                    option.value.clone(),
                )?);
            }
        }

        Ok(targets)
    }
}

/// Input for submitting an access request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccessRequestInput {
    /// Rule the request activates.
    pub access_rule_id: AccessRuleId,
    /// Optional justification.
    pub reason: Option<String>,
    /// Requested grant duration in seconds.
    pub duration_seconds: u32,
    /// Disambiguation fields, absent when the server can infer every value.
    pub with: Option<Vec<RequestField>>,
}

/// Request created by the remote authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAccessRequest {
    /// Remote request identifier.
    pub id: String,
    /// Current status.
    pub status: AccessRequestStatus,
}

/// Port for the remote access-management authority.
#[async_trait]
pub trait AccessRuleAuthority: Send + Sync {
    /// Lists the access rules available to the current user.
    async fn list_access_rules(&self) -> AppResult<Vec<RemoteAccessRule>>;

    /// Lists the approvers of one rule.
    async fn list_approvers(&self, rule_id: &AccessRuleId) -> AppResult<Vec<RuleApprover>>;

    /// Returns the argument schema of one rule.
    async fn get_rule_detail(&self, rule_id: &AccessRuleId) -> AppResult<AccessRuleDetail>;

    /// Submits an access request.
    async fn create_access_request(
        &self,
        input: CreateAccessRequestInput,
    ) -> AppResult<Vec<CreatedAccessRequest>>;
}
