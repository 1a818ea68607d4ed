use std::collections::HashMap;

use async_trait::async_trait;
use rolegate_core::AppResult;
use rolegate_domain::{AccessRule, AccessRuleId, AccessTarget};

/// Repository port for the local access rule cache.
///
/// The sync service is the only writer; selection only reads snapshots.
#[async_trait]
pub trait AccessRuleCacheRepository: Send + Sync {
    /// Returns one cached rule, `None` when it was never synced.
    async fn find_rule(&self, rule_id: &AccessRuleId) -> AppResult<Option<AccessRule>>;

    /// Returns every cached rule keyed by identifier.
    async fn list_rules(&self) -> AppResult<HashMap<AccessRuleId, AccessRule>>;

    /// Inserts the rule or overwrites the cached row with the same identifier.
    ///
    /// No timestamp comparison happens here; callers decide whether an
    /// update is needed.
    async fn upsert_rule(&self, rule: AccessRule) -> AppResult<()>;

    /// Updates the derived approval flag of one cached rule.
    async fn set_requires_approval(
        &self,
        rule_id: &AccessRuleId,
        requires_approval: bool,
    ) -> AppResult<()>;

    /// Replaces the full target set of one rule in a single transaction.
    ///
    /// On failure the previous target set stays intact.
    async fn replace_targets(
        &self,
        rule_id: &AccessRuleId,
        targets: Vec<AccessTarget>,
    ) -> AppResult<()>;

    /// Returns every cached target across all rules.
    async fn list_targets(&self) -> AppResult<Vec<AccessTarget>>;

    /// Reads an immutable snapshot of the whole cache.
    async fn load_snapshot(&self) -> AppResult<AccessRuleSnapshot> {
        let rules = self.list_rules().await?;
        let targets = self.list_targets().await?;
        Ok(AccessRuleSnapshot::new(rules, targets))
    }
}

/// Point-in-time copy of cached rules and targets.
#[derive(Debug, Clone, Default)]
pub struct AccessRuleSnapshot {
    rules: HashMap<AccessRuleId, AccessRule>,
    targets: Vec<AccessTarget>,
}

impl AccessRuleSnapshot {
    /// Creates a snapshot from already loaded rows.
    #[must_use]
    pub fn new(rules: HashMap<AccessRuleId, AccessRule>, targets: Vec<AccessTarget>) -> Self {
        Self { rules, targets }
    }

    /// Returns one rule by identifier.
    #[must_use]
    pub fn rule(&self, rule_id: &AccessRuleId) -> Option<&AccessRule> {
        self.rules.get(rule_id)
    }

    /// Returns all rules keyed by identifier.
    #[must_use]
    pub fn rules(&self) -> &HashMap<AccessRuleId, AccessRule> {
        &self.rules
    }

    /// Returns all targets.
    #[must_use]
    pub fn targets(&self) -> &[AccessTarget] {
        self.targets.as_slice()
    }

    /// Returns the targets owned by one rule.
    pub fn targets_for<'a>(
        &'a self,
        rule_id: &AccessRuleId,
    ) -> impl Iterator<Item = &'a AccessTarget> + use<'a> {
        let rule_id = rule_id.clone();
        self.targets
            .iter()
            .filter(move |target| target.access_rule_id() == &rule_id)
    }
}
