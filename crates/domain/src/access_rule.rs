use std::fmt::{Display, Formatter};

use rolegate_core::{AppError, AppResult, DeploymentId, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Opaque access rule identifier, unique within one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessRuleId(NonEmptyString);

impl AccessRuleId {
    /// Creates a validated rule identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("access rule id must not be empty".to_owned()))
    }

    /// Returns the identifier value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for AccessRuleId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0.as_str())
    }
}

/// Target provider kinds whose rules are cached and selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetProviderKind {
    /// AWS IAM Identity Center (SSO) accounts and permission sets.
    #[serde(rename = "aws-sso")]
    AwsSso,
}

impl TargetProviderKind {
    /// Returns the stable provider type value used by the remote authority.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwsSso => "aws-sso",
        }
    }

    /// Resolves a remote provider type, returning `None` for unsupported kinds.
    #[must_use]
    pub fn from_provider_type(value: &str) -> Option<Self> {
        match value {
            "aws-sso" => Some(Self::AwsSso),
            _ => None,
        }
    }
}

/// Input payload for building an access rule.
#[derive(Debug, Clone)]
pub struct AccessRuleInput {
    /// Remote rule identifier.
    pub id: String,
    /// Deployment the rule belongs to.
    pub deployment_id: DeploymentId,
    /// Human-readable rule name.
    pub name: String,
    /// Identifier of the target provider.
    pub target_provider_id: String,
    /// Target provider type, for example `aws-sso`.
    pub target_provider_type: String,
    /// Creation timestamp in Unix seconds.
    pub created_at: i64,
    /// Last update timestamp in Unix seconds.
    pub updated_at: i64,
    /// Maximum grant duration in seconds.
    pub duration_seconds: u32,
    /// Whether manual approval is required, when already known.
    pub requires_approval: Option<bool>,
}

/// Cached access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    id: AccessRuleId,
    deployment_id: DeploymentId,
    name: String,
    target_provider_id: String,
    target_provider_type: String,
    created_at: i64,
    updated_at: i64,
    duration_seconds: u32,
    requires_approval: Option<bool>,
}

impl AccessRule {
    /// Creates a validated access rule.
    pub fn new(input: AccessRuleInput) -> AppResult<Self> {
        let AccessRuleInput {
            id,
            deployment_id,
            name,
            target_provider_id,
            target_provider_type,
            created_at,
            updated_at,
            duration_seconds,
            requires_approval,
        } = input;

        let id = AccessRuleId::new(id)?;

        if target_provider_type.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "access rule '{id}' has an empty target provider type"
            )));
        }

        Ok(Self {
            id,
            deployment_id,
            name: name.trim().to_owned(),
            target_provider_id,
            target_provider_type,
            created_at,
            updated_at,
            duration_seconds,
            requires_approval,
        })
    }

    /// Returns the rule identifier.
    #[must_use]
    pub fn id(&self) -> &AccessRuleId {
        &self.id
    }

    /// Returns the deployment namespace.
    #[must_use]
    pub fn deployment_id(&self) -> &DeploymentId {
        &self.deployment_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the target provider identifier.
    #[must_use]
    pub fn target_provider_id(&self) -> &str {
        self.target_provider_id.as_str()
    }

    /// Returns the raw target provider type.
    #[must_use]
    pub fn target_provider_type(&self) -> &str {
        self.target_provider_type.as_str()
    }

    /// Returns the creation timestamp in Unix seconds.
    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Returns the last update timestamp in Unix seconds.
    #[must_use]
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Returns the maximum grant duration in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// Returns the approval flag, `None` until approvers were fetched.
    #[must_use]
    pub fn requires_approval(&self) -> Option<bool> {
        self.requires_approval
    }

    /// Returns the approval flag, treating unknown as required.
    #[must_use]
    pub fn effectively_requires_approval(&self) -> bool {
        self.requires_approval.unwrap_or(true)
    }

    /// Returns a copy carrying a resolved approval flag.
    #[must_use]
    pub fn with_requires_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = Some(requires_approval);
        self
    }

    /// Returns true when this rule's update timestamp is strictly newer than
    /// the cached copy.
    #[must_use]
    pub fn is_newer_than(&self, cached: &AccessRule) -> bool {
        self.updated_at > cached.updated_at
    }

    /// Returns true when this rule should replace `best` as the selected rule.
    ///
    /// Rules without manual approval beat rules requiring it; when approval
    /// requirements match, the strictly longer maximum duration wins.
    #[must_use]
    pub fn is_preferred_over(&self, best: &AccessRule) -> bool {
        let own_approval = self.effectively_requires_approval();
        let best_approval = best.effectively_requires_approval();

        if best_approval && !own_approval {
            return true;
        }

        own_approval == best_approval && self.duration_seconds > best.duration_seconds
    }
}

#[cfg(test)]
mod tests {
    use rolegate_core::DeploymentId;

    use super::{AccessRule, AccessRuleInput, TargetProviderKind};

    fn rule(id: &str, requires_approval: Option<bool>, duration_seconds: u32) -> AccessRule {
        let deployment_id = DeploymentId::from_base_url("https://access.example.com")
            .unwrap_or_else(|_| unreachable!());
        AccessRule::new(AccessRuleInput {
            id: id.to_owned(),
            deployment_id,
            name: format!("rule {id}"),
            target_provider_id: "aws-sso-v2".to_owned(),
            target_provider_type: "aws-sso".to_owned(),
            created_at: 100,
            updated_at: 200,
            duration_seconds,
            requires_approval,
        })
        .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn no_approval_beats_longer_duration() {
        let with_approval = rule("a", Some(true), 3600);
        let without_approval = rule("b", Some(false), 1800);

        assert!(without_approval.is_preferred_over(&with_approval));
        assert!(!with_approval.is_preferred_over(&without_approval));
    }

    #[test]
    fn longer_duration_wins_on_equal_approval() {
        let longer = rule("c", Some(false), 7200);
        let shorter = rule("d", Some(false), 3600);

        assert!(longer.is_preferred_over(&shorter));
        assert!(!shorter.is_preferred_over(&longer));
        assert!(!longer.is_preferred_over(&longer.clone()));
    }

    #[test]
    fn unknown_approval_is_treated_as_required() {
        let unknown = rule("e", None, 9000);
        let known = rule("f", Some(false), 60);

        assert!(known.is_preferred_over(&unknown));
    }

    #[test]
    fn empty_rule_id_is_rejected() {
        let deployment_id = DeploymentId::from_base_url("https://access.example.com")
            .unwrap_or_else(|_| unreachable!());
        let result = AccessRule::new(AccessRuleInput {
            id: " ".to_owned(),
            deployment_id,
            name: "broken".to_owned(),
            target_provider_id: "p".to_owned(),
            target_provider_type: "aws-sso".to_owned(),
            created_at: 0,
            updated_at: 0,
            duration_seconds: 60,
            requires_approval: None,
        });

        assert!(result.is_err());
    }

    #[test]
    fn update_timestamp_before_creation_is_accepted() {
        let deployment_id = DeploymentId::from_base_url("https://access.example.com")
            .unwrap_or_else(|_| unreachable!());
        let result = AccessRule::new(AccessRuleInput {
            id: "rul_skewed".to_owned(),
            deployment_id,
            name: "skewed clock".to_owned(),
            target_provider_id: "aws-sso-v2".to_owned(),
            target_provider_type: "aws-sso".to_owned(),
            created_at: 10,
            updated_at: 5,
            duration_seconds: 60,
            requires_approval: None,
        });

        assert!(result.is_ok());
        assert_eq!(result.map(|rule| rule.updated_at()).unwrap_or_default(), 5);
    }

    #[test]
    fn provider_kind_only_recognizes_aws_sso() {
        assert_eq!(
            TargetProviderKind::from_provider_type("aws-sso"),
            Some(TargetProviderKind::AwsSso)
        );
        assert_eq!(TargetProviderKind::from_provider_type("okta-groups"), None);
    }
}
