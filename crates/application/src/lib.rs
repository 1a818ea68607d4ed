//! Application services and ports.

#![forbid(unsafe_code)]

mod access_request_service;
mod access_rule_ports;
mod access_selection;
mod access_sync_service;
mod request_fields;

#[cfg(test)]
mod test_fakes;

pub use access_request_service::{
    AccessOptions, AccessRequestInput, AccessRequestOutcome, AccessRequestPlan,
    AccessRequestService,
};
pub use access_rule_ports::{
    AccessRuleAuthority, AccessRuleCacheRepository, AccessRuleDetail, AccessRuleSnapshot,
    CreateAccessRequestInput, CreatedAccessRequest, RemoteAccessRule, RuleApprover, RuleArgument,
    RuleArgumentOption,
};
pub use access_selection::{AccessIndex, AccessSelection, PermissionSetEntry, select_access_rule};
pub use access_sync_service::{AccessRuleSyncReport, AccessRuleSyncService};
pub use request_fields::build_request_fields;
