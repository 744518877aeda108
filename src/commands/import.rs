//! `idsync import` - start tracking an existing remote object

use anyhow::{Context as AnyhowContext, Result, bail};
use reconcile::{Reconciler, Registry, ValueInstance};
use serde_json::Value;

use super::{Remote, Session};
use crate::Context;
use crate::manifest::{Address, Manifest};
use crate::state::StateStore;
use crate::ui;

pub fn run(ctx: &Context, address: &str, id: &str) -> Result<()> {
    let address: Address = address.parse()?;
    let mut session = Session::open(ctx)?;
    let remote = Remote::connect(&session.config, ctx.quiet)?;

    let instance = import(
        &session.registry,
        &remote.reconciler(),
        &mut session.store,
        &address,
        id,
    )?;
    ui::success(&format!("Imported {address} ({})", instance.identity));

    let manifest = Manifest::load_or_empty(&session.manifest_path, &session.registry)?;
    if manifest.get(&address).is_some() {
        return Ok(());
    }
    match &instance.desired {
        Some(desired) => {
            println!();
            ui::info(&format!(
                "Add this to {} to keep managing it:",
                session.manifest_path.display()
            ));
            println!();
            print!("{}", snippet(&address, desired)?);
        }
        None => ui::warn(&format!(
            "{address} is not in the manifest; the next apply will delete it"
        )),
    }
    Ok(())
}

/// Read `id` remotely and record it under `address`.
pub fn import(
    registry: &Registry,
    reconciler: &Reconciler<'_>,
    store: &mut StateStore,
    address: &Address,
    id: &str,
) -> Result<ValueInstance> {
    let kind = registry.get(&address.kind)?;
    if let Some(existing) = store.get(address) {
        bail!(
            "{address} is already tracked as '{}' (run 'idsync state rm {address}' first)",
            existing.identity
        );
    }

    let instance = kind
        .import(reconciler, id)
        .with_context(|| format!("Failed to import {address} from '{id}'"))?;
    store.record(address, instance.clone())?;
    Ok(instance)
}

/// Manifest entry for an imported configuration.
pub fn snippet(address: &Address, desired: &Value) -> Result<String> {
    let entry = toml::Value::try_from(without_nulls(desired.clone()))
        .with_context(|| format!("{address}: configuration has no TOML form"))?;
    let mut named = toml::Table::new();
    named.insert(address.name.clone(), entry);
    let mut root = toml::Table::new();
    root.insert(address.kind.clone(), toml::Value::Table(named));
    Ok(toml::to_string(&root)?)
}

/// TOML has no null.
fn without_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, without_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(without_nulls).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{self, testing::reconciler};
    use reconcile::{ManualClock, Method, MockGateway};
    use serde_json::json;
    use tempfile::TempDir;

    const ENG: &str = r#"{"id":"00g1","created":"2025-01-01T00:00:00Z","lastUpdated":"2025-01-02T00:00:00Z","profile":{"name":"Engineering","description":"All engineers"}}"#;

    #[test]
    fn test_import_records_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut store = StateStore::open(&path).unwrap();
        let registry = resource::registry();
        let mock = MockGateway::new();
        mock.respond(Method::Get, "/api/v1/groups/00g1", ENG);
        let clock = ManualClock::new();
        let address = Address::new("group", "engineering");

        let instance = import(
            &registry,
            &reconciler(&mock, &clock),
            &mut store,
            &address,
            "00g1",
        )
        .unwrap();
        assert_eq!(instance.identity.as_str(), "00g1");
        assert_eq!(
            instance.desired,
            Some(json!({"name": "Engineering", "description": "All engineers"}))
        );

        let reopened = StateStore::open(&path).unwrap();
        assert_eq!(reopened.get(&address), Some(&instance));
    }

    #[test]
    fn test_import_refuses_tracked_address() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(&dir.path().join("state.json")).unwrap();
        let registry = resource::registry();
        let mock = MockGateway::new();
        mock.respond(Method::Get, "/api/v1/groups/00g1", ENG);
        let clock = ManualClock::new();
        let address = Address::new("group", "engineering");
        let reconciler = reconciler(&mock, &clock);

        import(&registry, &reconciler, &mut store, &address, "00g1").unwrap();
        let err = import(&registry, &reconciler, &mut store, &address, "00g2").unwrap_err();
        assert!(err.to_string().contains("already tracked"));
    }

    #[test]
    fn test_import_missing_object() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(&dir.path().join("state.json")).unwrap();
        let registry = resource::registry();
        let mock = MockGateway::new();
        let clock = ManualClock::new();
        let address = Address::new("group", "engineering");

        let result = import(&registry, &reconciler(&mock, &clock), &mut store, &address, "00g9");
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_import_bad_composite_id_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(&dir.path().join("state.json")).unwrap();
        let registry = resource::registry();
        let mock = MockGateway::new();
        let clock = ManualClock::new();
        let address = Address::new("group_membership", "alice_eng");

        let result = import(&registry, &reconciler(&mock, &clock), &mut store, &address, "00g1");
        assert!(result.is_err());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_snippet_parses_back() {
        let address = Address::new("group", "engineering");
        let text = snippet(&address, &json!({"name": "Engineering", "description": null})).unwrap();
        assert!(text.contains("name = \"Engineering\""));
        assert!(!text.contains("description"));

        let manifest = Manifest::parse(&text, &resource::registry()).unwrap();
        assert_eq!(manifest.get(&address), Some(&json!({"name": "Engineering"})));
    }
}
