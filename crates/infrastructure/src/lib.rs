//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_access_rule_authority;
mod sqlite_access_rule_cache;

pub use http_access_rule_authority::HttpAccessRuleAuthority;
pub use sqlite_access_rule_cache::SqliteAccessRuleCache;
