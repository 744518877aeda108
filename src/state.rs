use crate::manifest::Address;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reconcile::ValueInstance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Current state file format version.
pub const STATE_VERSION: u32 = 1;

// ============================================================================
// State Structures
// ============================================================================

/// Everything idsync tracks about remote objects
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StateFile {
    /// Format version; newer files are refused
    pub version: u32,

    /// Tracked instances by address
    #[serde(default)]
    pub resources: BTreeMap<Address, ValueInstance>,

    /// Last time the state was written
    pub last_updated: DateTime<Utc>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// StateStore
// ============================================================================

/// A state file bound to its path on disk
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: StateFile,
}

impl StateStore {
    /// Load state from `path`, or start empty if the file doesn't exist
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, using empty state", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                state: StateFile::default(),
            });
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            bail!(
                "State file {} has version {}, but this idsync understands up to {}",
                path.display(),
                state.version,
                STATE_VERSION
            );
        }

        log::debug!(
            "Loaded {} tracked resources from {}",
            state.resources.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, address: &Address) -> Option<&ValueInstance> {
        self.state.resources.get(address)
    }

    /// Track `instance` at `address`, replacing any previous entry
    pub fn insert(&mut self, address: Address, instance: ValueInstance) {
        self.state.resources.insert(address, instance);
    }

    pub fn remove(&mut self, address: &Address) -> Option<ValueInstance> {
        self.state.resources.remove(address)
    }

    /// Tracked addresses in sorted order
    pub fn addresses(&self) -> Vec<Address> {
        self.state.resources.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &ValueInstance)> {
        self.state.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.state.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.resources.is_empty()
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.state.last_updated
    }

    /// Record `instance` at `address`, dropping the entry once nothing is
    /// tracked remotely, and save
    pub fn record(&mut self, address: &Address, instance: ValueInstance) -> Result<()> {
        if instance.identity.is_empty() {
            self.remove(address);
        } else {
            self.insert(address.clone(), instance);
        }
        self.save()
    }

    /// Write state to disk, replacing the old file in one rename
    pub fn save(&mut self) -> Result<()> {
        self.state.last_updated = Utc::now();

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(&self.state).context("Failed to serialize state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}
