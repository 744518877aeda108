//! Drift detection
//!
//! Compares a fresh read against the cached observed state. Only fields
//! the user configured take part; computed fields are refreshed silently
//! and sensitive fields are kept from creation time.

use crate::types::{FieldChange, FieldMap, FieldRules};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of comparing a fresh read with the cached observed state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftResult {
    /// Whether the remote object still exists.
    pub found: bool,
    /// Whether any configured field changed remotely.
    pub changed: bool,
    /// Configured fields that were present before and are gone now.
    pub removed_fields: BTreeSet<String>,
    /// Configured fields whose remote value changed.
    pub changed_fields: BTreeSet<String>,
}

impl DriftResult {
    /// The remote object has disappeared.
    pub fn gone() -> Self {
        Self::default()
    }

    /// Found, with nothing drifted.
    pub fn unchanged() -> Self {
        Self {
            found: true,
            ..Self::default()
        }
    }
}

/// Compute drift between `previous` and `fresh` for the fields in `desired`.
///
/// `fresh == None` means the read came back not found.
pub fn detect(
    previous: &FieldMap,
    fresh: Option<&FieldMap>,
    desired: &FieldMap,
    rules: &FieldRules,
) -> DriftResult {
    let Some(fresh) = fresh else {
        return DriftResult::gone();
    };

    let mut result = DriftResult::unchanged();
    for field in desired.keys().filter(|f| rules.participates(f)) {
        match (previous.get(field), fresh.get(field)) {
            (Some(_), None) => {
                result.removed_fields.insert(field.clone());
            }
            (before, Some(after)) if before != Some(after) => {
                // A first read has nothing to compare against.
                if before.is_some() {
                    result.changed_fields.insert(field.clone());
                }
            }
            _ => {}
        }
    }
    result.changed = !result.removed_fields.is_empty() || !result.changed_fields.is_empty();
    result
}

/// Build the new observed snapshot from a fresh read.
///
/// Everything comes from `fresh` except sensitive fields, which keep the
/// value captured at creation whether or not the read returns them.
pub fn merge_observed(previous: &FieldMap, mut fresh: FieldMap, rules: &FieldRules) -> FieldMap {
    for field in rules.sensitive {
        match previous.get(*field) {
            Some(value) => {
                fresh.insert((*field).to_string(), value.clone());
            }
            None => {
                fresh.remove(*field);
            }
        }
    }
    fresh
}

/// Field-level diff of desired configuration against observed state.
///
/// Computed and sensitive fields never produce a change.
pub fn pending_changes(desired: &FieldMap, observed: &FieldMap, rules: &FieldRules) -> Vec<FieldChange> {
    desired
        .iter()
        .filter(|(field, _)| rules.participates(field))
        .filter(|(field, value)| observed.get(*field) != Some(*value))
        .map(|(field, value)| FieldChange {
            field: field.clone(),
            from: observed.get(field).cloned(),
            to: Some(value.clone()),
            requires_replace: rules.is_create_only(field),
        })
        .chain(
            // Optional fields unset locally but still set remotely.
            observed
                .iter()
                .filter(|(field, _)| {
                    !desired.contains_key(*field)
                        && rules.participates(field)
                        && rules.is_create_only(field)
                })
                .map(|(field, value)| FieldChange {
                    field: field.clone(),
                    from: Some(value.clone()),
                    to: None,
                    requires_replace: true,
                }),
        )
        .collect()
}
