//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access_request;
mod access_rule;
mod access_target;

pub use access_request::{AccessRequestStatus, RequestField};
pub use access_rule::{AccessRule, AccessRuleId, AccessRuleInput, TargetProviderKind};
pub use access_target::{AccessTarget, TargetType};
