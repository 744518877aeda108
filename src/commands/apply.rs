//! `idsync apply` and `idsync destroy`

use anyhow::{Result, bail};

use super::{Remote, Session};
use crate::Context;
use crate::engine::{self, ExecuteOptions, ExecuteSummary, Executor, Plan};
use crate::ui;

pub fn apply(ctx: &Context, target: Option<&str>, dry_run: bool, yes: bool) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let target = session.target(target)?;
    let manifest = session.manifest()?;
    let remote = Remote::connect(&session.config, ctx.quiet)?;

    ui::header("Applying Configuration");
    if dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    super::refresh_state(ctx, &session.registry, &remote, &mut session.store, &target)?;
    let plan = engine::plan(&session.registry, &manifest, &session.store, &target)?;
    let summary = execute(&mut session, &remote, &plan, dry_run, yes)?;
    finish(&summary)
}

pub fn destroy(ctx: &Context, target: Option<&str>, yes: bool) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let target = session.target(target)?;
    let remote = Remote::connect(&session.config, ctx.quiet)?;

    ui::header("Destroying Resources");
    if session.store.is_empty() {
        ui::info("Nothing is tracked in state.");
        return Ok(());
    }

    super::refresh_state(ctx, &session.registry, &remote, &mut session.store, &target)?;
    let plan = engine::destroy_plan(&session.registry, &session.store, &target);
    let summary = execute(&mut session, &remote, &plan, false, yes)?;
    finish(&summary)
}

fn execute(
    session: &mut Session,
    remote: &Remote,
    plan: &Plan,
    dry_run: bool,
    yes: bool,
) -> Result<ExecuteSummary> {
    let reconciler = remote.reconciler();
    let mut executor = Executor {
        registry: &session.registry,
        reconciler: &reconciler,
        store: &mut session.store,
    };
    let summary = executor.execute(plan, &ExecuteOptions { dry_run, yes });
    remote.finish();
    summary
}

fn finish(summary: &ExecuteSummary) -> Result<()> {
    if summary.skipped > 0 {
        log::info!("{} changes skipped", summary.skipped);
    }
    if !summary.is_success() {
        let failed: Vec<String> = summary.failures.iter().map(|(a, _)| a.to_string()).collect();
        bail!(
            "{} of {} changes failed ({})",
            summary.failed,
            summary.failed + summary.total_changes(),
            failed.join(", ")
        );
    }
    Ok(())
}
