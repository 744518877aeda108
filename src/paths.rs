//! Centralized path resolution for idsync
//!
//! # Environment Variables
//!
//! - `IDSYNC_CONFIG_DIR` - Override config directory (holds `idsync.toml`
//!   and the default `resources.toml` manifest)
//! - `IDSYNC_STATE_DIR` - Override state directory (holds `state.json`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `IDSYNC_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/idsync` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\idsync`
//!    - macOS/Linux: `~/.config/idsync`
//!
//! For state_dir():
//! 1. `IDSYNC_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/idsync` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\idsync`
//!    - macOS/Linux: `~/.local/state/idsync`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "IDSYNC_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "IDSYNC_STATE_DIR";

const APP_DIR: &str = "idsync";

/// Get the idsync config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join(APP_DIR));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the idsync state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join(APP_DIR));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// `idsync.toml` in the config directory.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("idsync.toml"))
}

/// Default manifest: `resources.toml` in the config directory.
pub fn manifest_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("resources.toml"))
}

/// Default state file: `state.json` in the state directory.
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join("state.json"))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
