//! `idsync refresh` - re-read tracked resources and report drift

use anyhow::Result;

use super::{Remote, Session};
use crate::Context;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let target = session.target(target)?;
    if session.store.is_empty() {
        ui::info("Nothing is tracked in state.");
        return Ok(());
    }
    let remote = Remote::connect(&session.config, ctx.quiet)?;

    ui::header("Refreshing State");
    log::debug!("{} resources tracked", session.store.len());
    let report = engine::refresh(
        &session.registry,
        &remote.reconciler(),
        &mut session.store,
        &target,
    );
    remote.finish();
    let report = report?;

    engine::display_refresh(&report);
    if report.vanished.is_empty() && report.drifted.is_empty() {
        ui::dim("Everything matches what was last applied.");
    }
    Ok(())
}
