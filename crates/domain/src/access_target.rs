use rolegate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::AccessRuleId;

/// Kind of grantable value carried by an access target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TargetType {
    /// An AWS account identifier.
    AccountId,
    /// An AWS SSO permission set ARN.
    PermissionSetArn,
    /// Any other argument key exposed by a rule.
    Other(String),
}

impl TargetType {
    /// Returns the stable argument key for this target type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AccountId => "accountId",
            Self::PermissionSetArn => "permissionSetArn",
            Self::Other(value) => value.as_str(),
        }
    }

    /// Target types that may need to be attached to an access request.
    #[must_use]
    pub fn request_field_types() -> [Self; 2] {
        [Self::AccountId, Self::PermissionSetArn]
    }
}

impl From<&str> for TargetType {
    fn from(value: &str) -> Self {
        match value {
            "accountId" => Self::AccountId,
            "permissionSetArn" => Self::PermissionSetArn,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for TargetType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<TargetType> for String {
    fn from(value: TargetType) -> Self {
        value.as_str().to_owned()
    }
}

/// One grantable value attached to an access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTarget {
    access_rule_id: AccessRuleId,
    target_type: TargetType,
    label: String,
    description: Option<String>,
    value: String,
}

impl AccessTarget {
    /// Creates a validated access target.
    pub fn new(
        access_rule_id: AccessRuleId,
        target_type: TargetType,
        label: impl Into<String>,
        description: Option<String>,
        value: impl Into<String>,
    ) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "target '{}' of access rule '{access_rule_id}' has an empty value",
                target_type.as_str()
            )));
        }

        let label = label.into();
        let label = if label.trim().is_empty() {
            value.clone()
        } else {
            label
        };

        let description = description.and_then(|value| {
            let trimmed = value.trim().to_owned();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        Ok(Self {
            access_rule_id,
            target_type,
            label,
            description,
            value,
        })
    }

    /// Returns the owning rule identifier.
    #[must_use]
    pub fn access_rule_id(&self) -> &AccessRuleId {
        &self.access_rule_id
    }

    /// Returns the target type tag.
    #[must_use]
    pub fn target_type(&self) -> &TargetType {
        &self.target_type
    }

    /// Returns the human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the underlying value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_str()
    }
}
