//! Decides which disambiguation fields accompany an access request.

use std::collections::BTreeSet;

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{AccessRuleId, RequestField, TargetType};

use crate::access_rule_ports::AccessRuleSnapshot;
use crate::access_selection::AccessSelection;

/// Builds the request fields for the selected rule.
///
/// A field is attached only when the rule offers more than one distinct
/// value of its target type. Returns `None` instead of an empty list when no
/// field is needed.
pub fn build_request_fields(
    snapshot: &AccessRuleSnapshot,
    rule_id: &AccessRuleId,
    selection: &AccessSelection,
) -> AppResult<Option<Vec<RequestField>>> {
    let mut fields = Vec::new();

    for target_type in TargetType::request_field_types() {
        let values: BTreeSet<&str> = snapshot
            .targets_for(rule_id)
            .filter(|target| target.target_type() == &target_type)
            .map(|target| target.value())
            .collect();

        if values.len() <= 1 {
            continue;
        }

        let value = chosen_value(snapshot, rule_id, &target_type, selection)?;
        fields.push(RequestField { target_type, value });
    }

    Ok((!fields.is_empty()).then_some(fields))
}

fn chosen_value(
    snapshot: &AccessRuleSnapshot,
    rule_id: &AccessRuleId,
    target_type: &TargetType,
    selection: &AccessSelection,
) -> AppResult<String> {
    snapshot
        .targets_for(rule_id)
        .filter(|target| target.target_type() == target_type)
        .find(|target| match target_type {
            TargetType::AccountId => target.value() == selection.account,
            TargetType::PermissionSetArn => target.label() == selection.permission_set_label,
            TargetType::Other(_) => false,
        })
        .map(|target| target.value().to_owned())
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "access rule '{rule_id}' has no '{}' target for the selection",
                target_type.as_str()
            ))
        })
}
