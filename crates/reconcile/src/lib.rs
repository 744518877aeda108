//! # Reconcile
//!
//! Declarative reconciliation of resources managed through a remote REST API.
//!
//! Callers describe the desired configuration of each resource; this crate
//! brings the remote side in line with it and tracks what it observed.
//!
//! ## Core Concepts
//!
//! - **ResourceKind**: Maps a typed configuration onto API requests
//! - **ResourceInstance**: Identity, desired config, observed fields and status
//! - **Identity**: Opaque remote ID or a `:`-joined composite key
//! - **Reconciler**: Create/read/update/delete/import for one instance
//! - **ActionPoller**: Bounded wait for asynchronous remote tasks
//! - **Registry**: Kinds erased behind [`DynKind`] for the orchestrator
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{ActionPoller, PollConfig, Reconciler, SystemClock};
//!
//! let clock = SystemClock;
//! let reconciler = Reconciler::new(&gateway, ActionPoller::new(&clock, PollConfig::default()));
//!
//! let group = reconciler.create(&GroupKind, GroupConfig::named("engineering"))?;
//! let refreshed = reconciler.read(&GroupKind, group)?;
//! if refreshed.drift.changed {
//!     println!("drifted: {:?}", refreshed.drift.changed_fields);
//! }
//! reconciler.delete(&GroupKind, refreshed.instance)?;
//! ```
//!
//! ## Seams
//!
//! - [`Gateway`]: The remote API transport ([`MockGateway`] for tests)
//! - [`Clock`]: Time source for polling ([`ManualClock`] for tests)
//! - [`PollCallback`]: Receives every status poll

pub mod drift;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod kind;
pub mod poller;
pub mod reconciler;
pub mod registry;
pub mod types;

#[cfg(test)]
mod fixtures;

// Re-export main types at crate root
pub use drift::DriftResult;
pub use error::{Error, ErrorCategory, Result};
pub use gateway::{Gateway, GatewayError, Method, MockGateway, Request};
pub use identity::{CompositeKey, DELIMITER, Identity, IdentityScheme, KeySpec};
pub use kind::{ActionTracker, ResourceKind, Searchable};
pub use poller::{
    ActionPoller, Clock, DEFAULT_POLL_DEADLINE, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, ManualClock,
    NoCallback, PollCallback, PollConfig, PollOutcome, SystemClock,
};
pub use reconciler::{Found, Reconciler, Refreshed};
pub use registry::{DynKind, Registry, RegistryBuilder, ValueInstance};
pub use types::{
    CreatePolicy, DeletePolicy, FieldChange, FieldMap, FieldRules, RemoteActionTask,
    ResourceInstance, Status, TaskStatus, to_fields,
};
