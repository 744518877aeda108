//! `idsync lookup` - find a remote object by ID or display name

use anyhow::{Result, bail};
use reconcile::{Found, Reconciler, Registry};

use super::{Remote, Session};
use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, kind: &str, id: Option<&str>, name: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let remote = Remote::connect(&session.config, ctx.quiet)?;

    let Some(found) = find(&session.registry, &remote.reconciler(), kind, id, name)? else {
        let by = match id {
            Some(id) => format!("id '{id}'"),
            None => format!("name '{}'", name.unwrap_or_default()),
        };
        ui::warn(&format!("No {kind} found with {by}"));
        return Ok(());
    };

    let rules = session.registry.get(kind)?.field_rules();
    ui::header(&format!("{kind} {}", found.identity));
    for (field, value) in &found.fields {
        ui::kv(field, &ui::field_value(value, rules.is_sensitive(field)));
    }
    Ok(())
}

/// Look up `kind` by ID (preferred) or name.
pub fn find(
    registry: &Registry,
    reconciler: &Reconciler<'_>,
    kind: &str,
    id: Option<&str>,
    name: Option<&str>,
) -> Result<Option<Found>> {
    let kind = registry.get(kind)?;
    if !kind.searchable() {
        let searchable: Vec<_> = registry
            .names()
            .filter(|n| registry.get(n).is_ok_and(|k| k.searchable()))
            .collect();
        bail!(
            "{} does not support lookup (supported: {})",
            kind.name(),
            searchable.join(", ")
        );
    }
    if id.is_none() && name.is_none() {
        bail!("Pass --id or --name");
    }
    Ok(kind.lookup(reconciler, id, name)?)
}
