use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "idsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative sync for your identity directory", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Resource manifest (default: resources.toml in the config directory)
    #[arg(short, long, global = true, env = "IDSYNC_MANIFEST")]
    pub file: Option<PathBuf>,

    /// State file (default: state.json in the state directory)
    #[arg(long, global = true, env = "IDSYNC_STATE")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Refresh state and show what apply would change
    Plan(TargetArgs),

    /// Bring remote resources in line with the manifest
    Apply(ApplyArgs),

    /// Delete every tracked resource (or those matching a target)
    Destroy(DestroyArgs),

    /// Re-read tracked resources and report drift
    Refresh(TargetArgs),

    /// Start tracking an existing remote object
    Import {
        /// Address to track it under, e.g. group.engineering
        address: String,

        /// Remote ID, or composite key like {group_id}:{user_id}
        id: String,
    },

    /// Find a remote object by ID or name
    Lookup {
        /// Resource kind, e.g. group
        kind: String,

        /// Look up by ID (wins over --name)
        #[arg(long)]
        id: Option<String>,

        /// Look up by display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Inspect or edit local state
    #[command(subcommand)]
    State(StateCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply / Destroy
// ============================================================================

#[derive(Parser)]
pub struct TargetArgs {
    /// Limit to a kind or one address (e.g. "group" or "group.engineering")
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Limit to a kind or one address (e.g. "group" or "group.engineering")
    pub target: Option<String>,

    /// Show the plan without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Limit to a kind or one address (e.g. "group" or "group.engineering")
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// State Commands
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List tracked addresses
    List {
        /// Limit to a kind or one address
        target: Option<String>,
    },

    /// Show everything tracked for one address
    Show {
        /// Address, e.g. group.engineering
        address: String,
    },

    /// Stop tracking an address without touching the remote object
    Rm {
        /// Address, e.g. group.engineering
        address: String,
    },
}
