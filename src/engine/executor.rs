//! Execution engine - apply a plan one address at a time

use anyhow::Result;
use colored::Colorize;
use reconcile::{DynKind, Identity, Reconciler, Registry, ResourceInstance};
use serde_json::Value;

use crate::manifest::Address;
use crate::state::StateStore;

use super::differ::display_plan;
use super::planner::{Action, Plan, PlannedChange};

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Address and message of every failure, in order
    pub failures: Vec<(Address, String)>,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// How one planned change ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Created,
    Updated,
    Replaced,
    Deleted,
    Unchanged,
}

/// Everything the executor needs to touch remote and local state
pub struct Executor<'a, 'r> {
    pub registry: &'a Registry,
    pub reconciler: &'a Reconciler<'r>,
    pub store: &'a mut StateStore,
}

impl Executor<'_, '_> {
    /// Show the plan, confirm, then apply it.
    ///
    /// A failing address is reported and the run moves on to the next one.
    pub fn execute(&mut self, plan: &Plan, opts: &ExecuteOptions) -> Result<ExecuteSummary> {
        display_plan(plan);

        let pending = plan.pending().count();
        let mut summary = ExecuteSummary {
            unchanged: plan.changes.len() - pending,
            ..Default::default()
        };
        if pending == 0 {
            return Ok(summary);
        }

        if opts.dry_run {
            println!();
            println!("  {} Dry run - no changes made", "ℹ".blue());
            return Ok(summary);
        }

        if !opts.yes && !confirm_proceed()? {
            println!();
            println!("  {} Aborted", "✗".red());
            summary.skipped = pending;
            return Ok(summary);
        }

        println!();
        println!("  {} Applying {} changes...", "→".cyan(), pending);

        for change in plan.pending() {
            match self.apply(change) {
                Ok(applied) => {
                    println!("    {} {} {}", "✓".green(), change.address, verb(applied));
                    match applied {
                        Applied::Created => summary.created += 1,
                        Applied::Updated => summary.updated += 1,
                        Applied::Replaced => summary.replaced += 1,
                        Applied::Deleted => summary.deleted += 1,
                        Applied::Unchanged => summary.unchanged += 1,
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    println!("    {} {} {}", "✗".red(), change.address, message.red());
                    if let Some(advice) = advice(&e) {
                        println!("      {}", advice.dimmed());
                    }
                    summary.failed += 1;
                    summary.failures.push((change.address.clone(), message));
                }
            }
        }

        print_summary(&summary);
        Ok(summary)
    }

    /// Apply one change, saving state after every remote mutation.
    fn apply(&mut self, change: &PlannedChange) -> Result<Applied> {
        let registry = self.registry;
        let kind = registry.get(&change.address.kind)?;
        let address = &change.address;

        match &change.action {
            Action::NoChange => Ok(Applied::Unchanged),
            Action::Create => {
                self.create(kind, address, desired(change)?)?;
                Ok(Applied::Created)
            }
            Action::Update(_) => {
                let instance = self.tracked(address)?;
                let updated = kind.update(self.reconciler, instance, desired(change)?)?;
                self.store.record(address, updated)?;
                Ok(Applied::Updated)
            }
            Action::Replace(_) => {
                let instance = self.tracked(address)?;
                let cleared = kind.delete(self.reconciler, instance)?;
                self.store.record(address, cleared)?;
                self.create(kind, address, desired(change)?)?;
                Ok(Applied::Replaced)
            }
            Action::Delete => {
                let instance = self.tracked(address)?;
                let cleared = kind.delete(self.reconciler, instance)?;
                self.store.record(address, cleared)?;
                Ok(Applied::Deleted)
            }
        }
    }

    /// Create, keeping the identity in state even when a later step fails.
    fn create(&mut self, kind: &dyn DynKind, address: &Address, desired: Value) -> Result<()> {
        match kind.create(self.reconciler, desired.clone()) {
            Ok(instance) => self.store.record(address, instance),
            Err(e) => {
                if let Some(identity) = e.created_identity() {
                    log::warn!("{address} exists remotely as '{identity}' but did not finish");
                    let instance =
                        ResourceInstance::tracked(Identity::from(identity), Some(desired));
                    self.store.record(address, instance)?;
                }
                Err(e.into())
            }
        }
    }

    fn tracked(&self, address: &Address) -> Result<ResourceInstance<Value>> {
        self.store
            .get(address)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{address} is not tracked in state"))
    }
}

fn desired(change: &PlannedChange) -> Result<Value> {
    change
        .desired
        .clone()
        .ok_or_else(|| anyhow::anyhow!("{} has no configuration", change.address))
}

fn verb(applied: Applied) -> &'static str {
    match applied {
        Applied::Created => "created",
        Applied::Updated => "updated",
        Applied::Replaced => "replaced",
        Applied::Deleted => "deleted",
        Applied::Unchanged => "unchanged",
    }
}

/// Advice for reconciliation errors
fn advice(err: &anyhow::Error) -> Option<&'static str> {
    err.downcast_ref::<reconcile::Error>()
        .map(|e| e.category().advice())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.unchanged > 0 {
        println!(
            "    • {}",
            format!("{} resources unchanged", summary.unchanged).dimmed()
        );
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::planner::{destroy_plan, plan};
    use crate::manifest::{Manifest, Target};
    use crate::resource::{registry, testing::reconciler};
    use reconcile::{ManualClock, Method, MockGateway, Status};
    use serde_json::json;
    use tempfile::TempDir;

    const ENG: &str = r#"{"id":"00g1","profile":{"name":"Engineering"}}"#;

    fn yes() -> ExecuteOptions {
        ExecuteOptions {
            dry_run: false,
            yes: true,
        }
    }

    #[test]
    fn test_apply_creates_and_saves() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut store = StateStore::open(&path).unwrap();
        let registry = registry();
        let manifest = Manifest::parse("[group.eng]\nname = \"Engineering\"\n", &registry).unwrap();

        let mock = MockGateway::new();
        mock.respond(Method::Get, "/api/v1/groups?q=Engineering", "[]");
        mock.respond(Method::Post, "/api/v1/groups", r#"{"id":"00g1"}"#);
        mock.respond(Method::Get, "/api/v1/groups/00g1", ENG);
        let clock = ManualClock::new();
        let reconciler = reconciler(&mock, &clock);

        let plan = plan(&registry, &manifest, &store, &Target::default()).unwrap();
        let summary = Executor {
            registry: &registry,
            reconciler: &reconciler,
            store: &mut store,
        }
        .execute(&plan, &yes())
        .unwrap();

        assert_eq!(summary.created, 1);
        assert!(summary.is_success());
        let saved = StateStore::open(&path).unwrap();
        let instance = saved.get(&Address::new("group", "eng")).unwrap();
        assert_eq!(instance.identity.as_str(), "00g1");
        assert_eq!(instance.status, Status::Present);
    }

    #[test]
    fn test_dry_run_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(&dir.path().join("state.json")).unwrap();
        let registry = registry();
        let manifest = Manifest::parse("[group.eng]\nname = \"Engineering\"\n", &registry).unwrap();
        let mock = MockGateway::new();
        let clock = ManualClock::new();
        let reconciler = reconciler(&mock, &clock);

        let plan = plan(&registry, &manifest, &store, &Target::default()).unwrap();
        let summary = Executor {
            registry: &registry,
            reconciler: &reconciler,
            store: &mut store,
        }
        .execute(
            &plan,
            &ExecuteOptions {
                dry_run: true,
                yes: false,
            },
        )
        .unwrap();

        assert_eq!(summary.total_changes(), 0);
        assert!(mock.calls().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_failure_continues_with_next_address() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(&dir.path().join("state.json")).unwrap();
        let registry = registry();
        let manifest = Manifest::parse(
            r#"
[group.eng]
name = "Engineering"

[group_membership.alice]
group_id = "00g1"
user_id = "00u1"
"#,
            &registry,
        )
        .unwrap();

        let mock = MockGateway::new();
        // Name check finds an existing group
        mock.respond(Method::Get, "/api/v1/groups?q=Engineering", &format!("[{ENG}]"));
        mock.respond(Method::Put, "/api/v1/groups/00g1/users/00u1", "");
        mock.respond(Method::Get, "/api/v1/users/00u1/groups", r#"[{"id":"00g1"}]"#);
        let clock = ManualClock::new();
        let reconciler = reconciler(&mock, &clock);

        let plan = plan(&registry, &manifest, &store, &Target::default()).unwrap();
        let summary = Executor {
            registry: &registry,
            reconciler: &reconciler,
            store: &mut store,
        }
        .execute(&plan, &yes())
        .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failures[0].0, Address::new("group", "eng"));
        assert!(summary.failures[0].1.contains("already exists"));
        assert!(store.get(&Address::new("group_membership", "alice")).is_some());
        assert!(store.get(&Address::new("group", "eng")).is_none());
    }

    #[test]
    fn test_incomplete_create_is_tracked() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(&dir.path().join("state.json")).unwrap();
        let registry = registry();
        let manifest = Manifest::parse(
            "[device_action.lock_laptop]\ndevice_id = \"dev1\"\naction = \"lock\"\n",
            &registry,
        )
        .unwrap();

        let mock = MockGateway::new();
        mock.respond(
            Method::Post,
            "/api/v1/devices/dev1/lifecycle/lock",
            r#"{"taskId":"t1"}"#,
        );
        mock.respond(Method::Get, "/api/v1/tasks/t1", r#"{"status":"RUNNING"}"#);
        let clock = ManualClock::new();
        let reconciler = reconciler(&mock, &clock);

        let plan = plan(&registry, &manifest, &store, &Target::default()).unwrap();
        let summary = Executor {
            registry: &registry,
            reconciler: &reconciler,
            store: &mut store,
        }
        .execute(&plan, &yes())
        .unwrap();

        assert_eq!(summary.failed, 1);
        assert!(summary.failures[0].1.contains("may still complete"));
        let instance = store
            .get(&Address::new("device_action", "lock_laptop"))
            .unwrap();
        assert_eq!(instance.identity.as_str(), "dev1:lock");
        assert_eq!(
            instance.desired,
            Some(json!({"device_id": "dev1", "action": "lock"}))
        );
    }

    #[test]
    fn test_replace_deletes_then_creates() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(&dir.path().join("state.json")).unwrap();
        let address = Address::new("group_membership", "alice");
        let mut instance = ResourceInstance::tracked(Identity::from("00g1:00u1"), None);
        instance.observed.insert("group_id".to_string(), json!("00g1"));
        instance.observed.insert("user_id".to_string(), json!("00u1"));
        store.insert(address.clone(), instance);

        let registry = registry();
        let manifest = Manifest::parse(
            "[group_membership.alice]\ngroup_id = \"00g2\"\nuser_id = \"00u1\"\n",
            &registry,
        )
        .unwrap();

        let mock = MockGateway::new();
        mock.respond(Method::Delete, "/api/v1/groups/00g1/users/00u1", "");
        mock.respond(Method::Put, "/api/v1/groups/00g2/users/00u1", "");
        mock.respond(Method::Get, "/api/v1/users/00u1/groups", r#"[{"id":"00g2"}]"#);
        let clock = ManualClock::new();
        let reconciler = reconciler(&mock, &clock);

        let plan = plan(&registry, &manifest, &store, &Target::default()).unwrap();
        let summary = Executor {
            registry: &registry,
            reconciler: &reconciler,
            store: &mut store,
        }
        .execute(&plan, &yes())
        .unwrap();

        assert_eq!(summary.replaced, 1);
        assert_eq!(store.get(&address).unwrap().identity.as_str(), "00g2:00u1");
        let methods: Vec<Method> = mock.calls().iter().map(|c| c.method).collect();
        assert_eq!(methods, vec![Method::Delete, Method::Put, Method::Get]);
    }

    #[test]
    fn test_destroy_clears_state() {
        let dir = TempDir::new().unwrap();
        let mut store = StateStore::open(&dir.path().join("state.json")).unwrap();
        store.insert(
            Address::new("group", "eng"),
            ResourceInstance::tracked(Identity::from("00g1"), Some(json!({"name": "Engineering"}))),
        );
        let registry = registry();
        let mock = MockGateway::new();
        mock.respond(Method::Delete, "/api/v1/groups/00g1", "");
        let clock = ManualClock::new();
        let reconciler = reconciler(&mock, &clock);

        let plan = destroy_plan(&registry, &store, &Target::default());
        let summary = Executor {
            registry: &registry,
            reconciler: &reconciler,
            store: &mut store,
        }
        .execute(&plan, &yes())
        .unwrap();

        assert_eq!(summary.deleted, 1);
        assert!(store.is_empty());
    }
}
