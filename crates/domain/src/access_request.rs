use serde::{Deserialize, Serialize};

use crate::TargetType;

/// Status reported for a submitted access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessRequestStatus {
    /// Granted; access becomes active immediately.
    Approved,
    /// Waiting for a reviewer.
    Pending,
    /// Rejected by a reviewer.
    Declined,
    /// Withdrawn by the requester.
    Cancelled,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl AccessRequestStatus {
    /// Returns a stable display value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Pending => "PENDING",
            Self::Declined => "DECLINED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns true when the request grants access without further review.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Disambiguation field attached to an access request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestField {
    /// Target type the value applies to.
    pub target_type: TargetType,
    /// Chosen value for the target type.
    pub value: String,
}
