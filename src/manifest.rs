//! Resource manifest (`resources.toml`)
//!
//! Each resource is a `[<kind>.<name>]` table holding the kind's
//! configuration:
//!
//! ```toml
//! [group.engineering]
//! name = "Engineering"
//! description = "All engineers"
//!
//! [group_membership.alice_engineering]
//! group_id = "00g1abcd"
//! user_id = "00u1efgh"
//! ```
//!
//! Every entry is checked against the kind registry on load, so unknown
//! kinds and malformed configurations fail before any remote call.

use anyhow::{Context, Result, bail};
use reconcile::Registry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Resource address: `kind.name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    pub kind: String,
    pub name: String,
}

impl Address {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() && !name.contains('.') => {
                Ok(Self::new(kind, name))
            }
            _ => bail!("Invalid address '{s}' (expected <kind>.<name>)"),
        }
    }
}

impl TryFrom<String> for Address {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// Filter like "group" or "group.engineering"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub kind: Option<String>,
    pub name: Option<String>,
}

impl Target {
    /// Parse a target string; `None` matches everything.
    pub fn parse(target: Option<&str>) -> Self {
        let Some(target) = target else {
            return Self::default();
        };
        match target.split_once('.') {
            Some((kind, name)) => Self {
                kind: Some(kind.to_string()),
                name: Some(name.to_string()),
            },
            None => Self {
                kind: Some(target.to_string()),
                name: None,
            },
        }
    }

    pub fn matches(&self, address: &Address) -> bool {
        self.kind.as_deref().is_none_or(|k| k == address.kind)
            && self.name.as_deref().is_none_or(|n| n == address.name)
    }

    /// Fail when the target names a kind the registry doesn't know.
    pub fn check(&self, registry: &Registry) -> Result<()> {
        if let Some(kind) = &self.kind
            && !registry.contains(kind)
        {
            bail!(
                "Unknown resource kind '{}' (known: {})",
                kind,
                registry.names().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(())
    }
}

/// Desired configurations by address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    resources: BTreeMap<Address, Value>,
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: &Path, registry: &Registry) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        Self::parse(&content, registry)
            .with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    /// Load, or an empty manifest if the file doesn't exist.
    pub fn load_or_empty(path: &Path, registry: &Registry) -> Result<Self> {
        if !path.exists() {
            log::debug!("No manifest at {}, treating as empty", path.display());
            return Ok(Self::default());
        }
        Self::load(path, registry)
    }

    pub fn parse(content: &str, registry: &Registry) -> Result<Self> {
        let table: toml::Table = toml::from_str(content).context("Invalid TOML")?;
        let mut resources = BTreeMap::new();

        for (kind_name, entries) in table {
            let kind = registry.get(&kind_name).map_err(|_| {
                anyhow::anyhow!(
                    "Unknown resource kind '{}' (known: {})",
                    kind_name,
                    registry.names().collect::<Vec<_>>().join(", ")
                )
            })?;
            let toml::Value::Table(entries) = entries else {
                bail!("[{kind_name}] must contain [{kind_name}.<name>] tables");
            };

            for (name, config) in entries {
                let address = Address::new(kind_name.as_str(), name.as_str());
                if name.contains('.') {
                    bail!("Resource name '{name}' in [{kind_name}] must not contain '.'");
                }
                if !config.is_table() {
                    bail!("{address} must be a table");
                }
                let config = serde_json::to_value(&config)
                    .with_context(|| format!("{address}: could not convert configuration"))?;
                kind.validate(&config)
                    .with_context(|| format!("{address}: invalid configuration"))?;
                resources.insert(address, config);
            }
        }

        Ok(Self { resources })
    }

    pub fn get(&self, address: &Address) -> Option<&Value> {
        self.resources.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Value)> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
