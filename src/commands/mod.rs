//! Command implementations
//!
//! Every command opens a [`Session`] (config, registry, state). Commands
//! that talk to the provider also build a [`Remote`], which is kept apart
//! from the session so the reconciler and the state store can be borrowed
//! at the same time.

pub mod apply;
pub mod import;
pub mod lookup;
pub mod plan;
pub mod refresh;
pub mod state;

use anyhow::{Context as AnyhowContext, Result};
use reconcile::{ActionPoller, PollConfig, Reconciler, Registry, SystemClock};
use restgate::HttpGateway;
use std::path::PathBuf;

use crate::Context;
use crate::config::Config;
use crate::engine;
use crate::manifest::{Manifest, Target};
use crate::paths;
use crate::progress::TaskSpinner;
use crate::resource;
use crate::state::StateStore;

/// Local inputs shared by every command
pub struct Session {
    pub config: Config,
    pub registry: Registry,
    pub manifest_path: PathBuf,
    pub store: StateStore,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = Config::load(&paths::config_file()?)?;
        let manifest_path = match &ctx.file {
            Some(path) => path.clone(),
            None => paths::manifest_file()?,
        };
        let state_path = match &ctx.state {
            Some(path) => path.clone(),
            None => paths::state_file()?,
        };
        log::debug!(
            "Manifest: {}, state: {}",
            manifest_path.display(),
            state_path.display()
        );

        Ok(Self {
            config,
            registry: resource::registry(),
            manifest_path,
            store: StateStore::open(&state_path)?,
        })
    }

    /// Load the manifest; it must exist.
    pub fn manifest(&self) -> Result<Manifest> {
        if !self.manifest_path.exists() {
            anyhow::bail!(
                "No manifest at {} (create it or pass --file)",
                self.manifest_path.display()
            );
        }
        let manifest = Manifest::load(&self.manifest_path, &self.registry)?;
        log::debug!(
            "Loaded {} resources from {}",
            manifest.len(),
            self.manifest_path.display()
        );
        if manifest.is_empty() && !self.store.is_empty() {
            log::warn!(
                "{} declares no resources; every tracked resource will be planned for deletion",
                self.manifest_path.display()
            );
        }
        Ok(manifest)
    }

    /// Parse and check a `kind` / `kind.name` target.
    pub fn target(&self, target: Option<&str>) -> Result<Target> {
        let target = Target::parse(target);
        target.check(&self.registry)?;
        Ok(target)
    }
}

/// Connection to the provider
pub struct Remote {
    gateway: HttpGateway,
    clock: SystemClock,
    spinner: TaskSpinner,
    poll: PollConfig,
    quiet: bool,
}

impl Remote {
    pub fn connect(config: &Config, quiet: bool) -> Result<Self> {
        let gateway_config = config
            .gateway()
            .context("Provider is not configured (see idsync.toml)")?;
        Ok(Self {
            gateway: HttpGateway::new(&gateway_config),
            clock: SystemClock,
            spinner: TaskSpinner::new(),
            poll: config.poll(),
            quiet,
        })
    }

    /// A reconciler over this connection, with a spinner unless quiet.
    pub fn reconciler(&self) -> Reconciler<'_> {
        let mut poller = ActionPoller::new(&self.clock, self.poll);
        if !self.quiet {
            poller = poller.with_callback(&self.spinner);
        }
        Reconciler::new(&self.gateway, poller)
    }

    /// Clear a spinner left behind by an aborted wait.
    pub fn finish(&self) {
        self.spinner.finish();
    }
}

/// Refresh tracked state before planning, reporting anything that changed
/// outside idsync (or everything, when verbose).
pub fn refresh_state(
    ctx: &Context,
    registry: &Registry,
    remote: &Remote,
    store: &mut StateStore,
    target: &Target,
) -> Result<()> {
    let report = engine::refresh(registry, &remote.reconciler(), store, target);
    remote.finish();
    let report = report?;
    if ctx.verbose > 0 || !report.vanished.is_empty() || !report.drifted.is_empty() {
        engine::display_refresh(&report);
    }
    Ok(())
}
