mod authority;
mod cache;

pub use authority::{
    AccessRuleAuthority, AccessRuleDetail, CreateAccessRequestInput, CreatedAccessRequest,
    RemoteAccessRule, RuleApprover, RuleArgument, RuleArgumentOption,
};
pub use cache::{AccessRuleCacheRepository, AccessRuleSnapshot};
