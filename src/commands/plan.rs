//! `idsync plan` - refresh, then show what apply would change

use anyhow::Result;

use super::{Remote, Session};
use crate::Context;
use crate::engine;
use crate::ui;

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let target = session.target(target)?;
    let manifest = session.manifest()?;
    let remote = Remote::connect(&session.config, ctx.quiet)?;

    ui::header("Planning");
    super::refresh_state(ctx, &session.registry, &remote, &mut session.store, &target)?;
    let plan = engine::plan(&session.registry, &manifest, &session.store, &target)?;

    engine::display_plan(&plan);
    if plan.has_changes() {
        println!();
        ui::dim("Run 'idsync apply' to make these changes.");
    }
    Ok(())
}
