//! Resolves a chosen account and role to exactly one cached access rule.
//!
//! Indices are rebuilt from a snapshot on every call and never shared.

use std::collections::{BTreeMap, BTreeSet};

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{AccessRule, AccessRuleId, TargetType};

use crate::access_rule_ports::AccessRuleSnapshot;

/// Account and role chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSelection {
    /// Account target value, for example `123456789012`.
    pub account: String,
    /// Permission set label, for example `AdminAccess`.
    pub permission_set_label: String,
}

/// Permission set entry deduplicated by label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSetEntry {
    /// First value seen for the label.
    pub value: String,
    /// Rules granting a permission set with this label.
    pub rule_ids: BTreeSet<AccessRuleId>,
}

/// Account and permission set indices over one cache snapshot.
#[derive(Debug, Clone, Default)]
pub struct AccessIndex {
    accounts: BTreeMap<String, BTreeSet<AccessRuleId>>,
    permission_sets: BTreeMap<String, PermissionSetEntry>,
}

impl AccessIndex {
    /// Builds both indices from the snapshot targets.
    #[must_use]
    pub fn build(snapshot: &AccessRuleSnapshot) -> Self {
        let mut index = Self::default();

        for target in snapshot.targets() {
            if snapshot.rule(target.access_rule_id()).is_none() {
                continue;
            }

            match target.target_type() {
                TargetType::AccountId => {
                    index
                        .accounts
                        .entry(target.value().to_owned())
                        .or_default()
                        .insert(target.access_rule_id().clone());
                }
                TargetType::PermissionSetArn => {
                    index
                        .permission_sets
                        .entry(target.label().to_owned())
                        .or_insert_with(|| PermissionSetEntry {
                            value: target.value().to_owned(),
                            rule_ids: BTreeSet::new(),
                        })
                        .rule_ids
                        .insert(target.access_rule_id().clone());
                }
                TargetType::Other(_) => {}
            }
        }

        index
    }

    /// Returns every selectable account value in ascending order.
    #[must_use]
    pub fn accounts(&self) -> Vec<&str> {
        self.accounts.keys().map(String::as_str).collect()
    }

    /// Returns selectable permission set labels in ascending order.
    ///
    /// With an account, only labels granted by at least one rule that also
    /// grants that account are returned.
    #[must_use]
    pub fn permission_set_labels(&self, account: Option<&str>) -> Vec<&str> {
        let account_rules = account.map(|account| self.accounts.get(account));

        self.permission_sets
            .iter()
            .filter(|(_, entry)| match account_rules {
                None => true,
                Some(None) => false,
                Some(Some(rule_ids)) => !entry.rule_ids.is_disjoint(rule_ids),
            })
            .map(|(label, _)| label.as_str())
            .collect()
    }

    /// Returns the permission set entry for a label.
    #[must_use]
    pub fn permission_set(&self, label: &str) -> Option<&PermissionSetEntry> {
        self.permission_sets.get(label)
    }

    /// Returns rules granting both the account and the permission set label.
    #[must_use]
    pub fn candidates(&self, selection: &AccessSelection) -> BTreeSet<AccessRuleId> {
        let Some(account_rules) = self.accounts.get(selection.account.as_str()) else {
            return BTreeSet::new();
        };
        let Some(permission_set) = self
            .permission_sets
            .get(selection.permission_set_label.as_str())
        else {
            return BTreeSet::new();
        };

        account_rules
            .intersection(&permission_set.rule_ids)
            .cloned()
            .collect()
    }
}

/// Picks the single best rule for the selection.
///
/// Candidates are visited in rule id order. A candidate replaces the running
/// best only when [`AccessRule::is_preferred_over`] holds, so full ties keep
/// the earliest rule id.
pub fn select_access_rule<'a>(
    snapshot: &'a AccessRuleSnapshot,
    selection: &AccessSelection,
) -> AppResult<&'a AccessRule> {
    let index = AccessIndex::build(snapshot);
    let mut best: Option<&AccessRule> = None;

    for rule_id in index.candidates(selection) {
        let Some(candidate) = snapshot.rule(&rule_id) else {
            continue;
        };

        best = match best {
            None => Some(candidate),
            Some(current) if candidate.is_preferred_over(current) => Some(candidate),
            Some(current) => Some(current),
        };
    }

    best.ok_or_else(|| {
        AppError::NoMatchingAccessRule(format!(
            "no cached access rule grants account '{}' with role '{}'",
            selection.account, selection.permission_set_label
        ))
    })
}
