//! Execution planner - refresh tracked state, then diff it against the manifest

use anyhow::{Context, Result};
use reconcile::{FieldChange, IdentityScheme, Reconciler, Registry};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::manifest::{Address, Manifest, Target};
use crate::state::StateStore;

/// What to do with one address
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create,
    Update(Vec<FieldChange>),
    /// A create-only field changed: delete, then create
    Replace(Vec<FieldChange>),
    Delete,
    NoChange,
}

impl Action {
    pub fn is_change(&self) -> bool {
        !matches!(self, Action::NoChange)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub address: Address,
    pub action: Action,
    /// Manifest configuration; `None` for deletes
    pub desired: Option<Value>,
}

/// Ordered changes: creates, updates and replaces first, deletes last
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub changes: Vec<PlannedChange>,
}

impl Plan {
    /// Changes that will touch the remote side
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action.is_change())
    }

    pub fn has_changes(&self) -> bool {
        self.pending().next().is_some()
    }

    pub fn count(&self, matches: impl Fn(&Action) -> bool) -> usize {
        self.changes.iter().filter(|c| matches(&c.action)).count()
    }
}

/// Outcome of refreshing tracked instances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub refreshed: usize,
    /// Objects deleted outside idsync; dropped from state
    pub vanished: Vec<Address>,
    /// Objects whose configured fields changed remotely
    pub drifted: Vec<(Address, BTreeSet<String>)>,
}

/// Read every tracked instance matching `target`, updating state.
///
/// State is saved once at the end. A read failure stops the refresh; the
/// instances refreshed so far are kept.
pub fn refresh(
    registry: &Registry,
    reconciler: &Reconciler<'_>,
    store: &mut StateStore,
    target: &Target,
) -> Result<RefreshReport> {
    let mut report = RefreshReport::default();

    let result = refresh_each(registry, reconciler, store, target, &mut report);
    if report.refreshed > 0 {
        store.save()?;
    }
    result?;
    Ok(report)
}

fn refresh_each(
    registry: &Registry,
    reconciler: &Reconciler<'_>,
    store: &mut StateStore,
    target: &Target,
    report: &mut RefreshReport,
) -> Result<()> {
    for address in store.addresses() {
        if !target.matches(&address) {
            continue;
        }
        let Some(instance) = store.get(&address).cloned() else {
            continue;
        };
        let kind = registry
            .get(&address.kind)
            .with_context(|| format!("State tracks {address}"))?;

        log::debug!("Refreshing {address} ({})", instance.identity);
        let refreshed = kind
            .read(reconciler, instance)
            .with_context(|| format!("Failed to refresh {address}"))?;
        report.refreshed += 1;

        if !refreshed.found() {
            log::info!("{address} no longer exists remotely; dropping it from state");
            store.remove(&address);
            report.vanished.push(address);
            continue;
        }

        if refreshed.drift.changed {
            let fields = refreshed
                .drift
                .changed_fields
                .iter()
                .chain(&refreshed.drift.removed_fields)
                .cloned()
                .collect();
            report.drifted.push((address.clone(), fields));
        }
        store.insert(address, refreshed.instance);
    }
    Ok(())
}

/// Diff the manifest against (refreshed) state.
pub fn plan(
    registry: &Registry,
    manifest: &Manifest,
    store: &StateStore,
    target: &Target,
) -> Result<Plan> {
    let mut changes = Vec::new();

    for (address, desired) in manifest.iter().filter(|(a, _)| target.matches(a)) {
        let kind = registry.get(&address.kind)?;
        let action = match store.get(address) {
            None => Action::Create,
            Some(instance) => {
                let fields = kind
                    .changes(instance, desired)
                    .with_context(|| format!("Failed to diff {address}"))?;
                if fields.is_empty() {
                    Action::NoChange
                } else if fields.iter().any(|c| c.requires_replace) {
                    Action::Replace(fields)
                } else {
                    Action::Update(fields)
                }
            }
        };
        changes.push(PlannedChange {
            address: address.clone(),
            action,
            desired: Some(desired.clone()),
        });
    }

    let orphans = store
        .addresses()
        .into_iter()
        .filter(|a| target.matches(a) && manifest.get(a).is_none())
        .collect();
    changes.extend(deletion_order(registry, orphans).into_iter().map(delete));

    Ok(Plan { changes })
}

/// Delete every tracked instance matching `target`.
pub fn destroy_plan(registry: &Registry, store: &StateStore, target: &Target) -> Plan {
    let tracked = store
        .addresses()
        .into_iter()
        .filter(|a| target.matches(a))
        .collect();
    Plan {
        changes: deletion_order(registry, tracked)
            .into_iter()
            .map(delete)
            .collect(),
    }
}

/// Composite-keyed kinds reference other objects, so they go first.
/// Within a rank, reverse address order.
fn deletion_order(registry: &Registry, mut addresses: Vec<Address>) -> Vec<Address> {
    let references_others = |address: &Address| {
        registry
            .get(&address.kind)
            .is_ok_and(|kind| matches!(kind.identity_scheme(), IdentityScheme::Composite(_)))
    };
    addresses.sort_by(|a, b| {
        references_others(b)
            .cmp(&references_others(a))
            .then_with(|| b.cmp(a))
    });
    addresses
}

fn delete(address: Address) -> PlannedChange {
    PlannedChange {
        address,
        action: Action::Delete,
        desired: None,
    }
}
