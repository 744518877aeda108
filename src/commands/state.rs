//! `idsync state` - inspect and edit local state without touching the provider

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::ValueInstance;
use serde_json::Value;

use super::Session;
use crate::Context;
use crate::cli::StateCommand;
use crate::manifest::Address;
use crate::state::StateStore;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List { target } => list(ctx, target.as_deref()),
        StateCommand::Show { address } => show(ctx, &address.parse()?),
        StateCommand::Rm { address } => rm(ctx, &address.parse()?),
    }
}

fn list(ctx: &Context, target: Option<&str>) -> Result<()> {
    let session = Session::open(ctx)?;
    let target = session.target(target)?;

    let tracked: Vec<_> = session
        .store
        .iter()
        .filter(|(address, _)| target.matches(address))
        .collect();
    if tracked.is_empty() {
        ui::info("Nothing is tracked in state.");
        return Ok(());
    }

    ui::header("Tracked Resources");
    for (address, instance) in &tracked {
        println!(
            "  {:<40} {} {}",
            address.to_string(),
            instance.identity,
            format!("({})", instance.status).dimmed()
        );
    }
    println!();
    ui::dim(&format!(
        "{} tracked in {}, last updated {}",
        tracked.len(),
        session.store.path().display(),
        session.store.last_updated().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    Ok(())
}

fn show(ctx: &Context, address: &Address) -> Result<()> {
    let session = Session::open(ctx)?;
    let Some(instance) = session.store.get(address) else {
        bail!("{address} is not tracked in state");
    };
    let rules = session
        .registry
        .get(&address.kind)
        .map(|kind| kind.field_rules())
        .unwrap_or_default();

    ui::header(&address.to_string());
    ui::kv("identity", instance.identity.as_str());
    ui::kv("status", &instance.status.to_string());

    ui::section("Desired");
    match &instance.desired {
        Some(Value::Object(fields)) => {
            for (field, value) in fields {
                ui::kv(field, &ui::field_value(value, rules.is_sensitive(field)));
            }
        }
        Some(other) => ui::kv("config", &other.to_string()),
        None => ui::dim("(not configured; imported without a manifest entry)"),
    }

    ui::section("Observed");
    if instance.observed.is_empty() {
        ui::dim("(never read)");
    }
    for (field, value) in &instance.observed {
        ui::kv(field, &ui::field_value(value, rules.is_sensitive(field)));
    }
    Ok(())
}

fn rm(ctx: &Context, address: &Address) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let removed = forget(&mut session.store, address)?;
    ui::success(&format!(
        "Stopped tracking {address} ({}); the remote object was not touched",
        removed.identity
    ));
    Ok(())
}

/// Drop `address` from state and save.
pub fn forget(store: &mut StateStore, address: &Address) -> Result<ValueInstance> {
    let Some(removed) = store.remove(address) else {
        bail!("{address} is not tracked in state");
    };
    store.save()?;
    Ok(removed)
}
