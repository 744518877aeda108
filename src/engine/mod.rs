//! Execution engine for idsync
//!
//! The engine orchestrates:
//! 1. Refreshing - Read every tracked instance, dropping vanished ones
//! 2. Planning - Diff the manifest against refreshed state
//! 3. Executing - Apply changes one address at a time, saving state as it goes

pub mod differ;
pub mod executor;
pub mod planner;

pub use differ::{display_plan, display_refresh};
pub use executor::{ExecuteOptions, ExecuteSummary, Executor};
pub use planner::{Plan, destroy_plan, plan, refresh};
