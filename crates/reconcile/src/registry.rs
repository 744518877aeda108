//! Kind registry
//!
//! Each [`ResourceKind`] has its own configuration type. The orchestrator
//! works with many kinds at once, so the registry erases them behind
//! [`DynKind`], which speaks `serde_json::Value` configurations and converts
//! to the typed configuration at the boundary.

use crate::error::{Error, Result};
use crate::identity::IdentityScheme;
use crate::kind::{ResourceKind, Searchable};
use crate::reconciler::{self, Found, Reconciler, Refreshed};
use crate::types::{DeletePolicy, FieldChange, FieldRules, ResourceInstance};
use serde_json::Value;
use std::collections::BTreeMap;

/// Instance with an untyped configuration.
pub type ValueInstance = ResourceInstance<Value>;

/// A resource kind with its configuration type erased.
pub trait DynKind: Send + Sync {
    fn name(&self) -> &'static str;

    fn identity_scheme(&self) -> IdentityScheme;

    fn delete_policy(&self) -> DeletePolicy;

    fn field_rules(&self) -> FieldRules;

    /// Check that `config` decodes and, for composite kinds, forms a valid key.
    fn validate(&self, config: &Value) -> Result<()>;

    fn create(&self, reconciler: &Reconciler<'_>, config: Value) -> Result<ValueInstance>;

    fn read(&self, reconciler: &Reconciler<'_>, instance: ValueInstance) -> Result<Refreshed<Value>>;

    fn update(
        &self,
        reconciler: &Reconciler<'_>,
        instance: ValueInstance,
        desired: Value,
    ) -> Result<ValueInstance>;

    fn delete(&self, reconciler: &Reconciler<'_>, instance: ValueInstance) -> Result<ValueInstance>;

    fn import(&self, reconciler: &Reconciler<'_>, external_id: &str) -> Result<ValueInstance>;

    /// Field-level changes from `instance` to `desired`.
    fn changes(&self, instance: &ValueInstance, desired: &Value) -> Result<Vec<FieldChange>>;

    /// Whether [`DynKind::lookup`] is supported.
    fn searchable(&self) -> bool;

    fn lookup(
        &self,
        reconciler: &Reconciler<'_>,
        id: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<Found>>;
}

type LookupFn<K> =
    fn(&Reconciler<'_>, &K, Option<&str>, Option<&str>) -> Result<Option<Found>>;

fn lookup_with<K: Searchable>(
    reconciler: &Reconciler<'_>,
    kind: &K,
    id: Option<&str>,
    name: Option<&str>,
) -> Result<Option<Found>> {
    reconciler.lookup(kind, id, name)
}

struct Erased<K: ResourceKind> {
    kind: K,
    lookup: Option<LookupFn<K>>,
}

impl<K: ResourceKind> Erased<K> {
    fn typed(&self, config: Value) -> Result<K::Config> {
        Ok(serde_json::from_value(config)?)
    }

    fn typed_instance(&self, instance: ValueInstance) -> Result<ResourceInstance<K::Config>> {
        Ok(instance.map_desired(serde_json::from_value)?)
    }
}

fn untyped<C: serde::Serialize>(instance: ResourceInstance<C>) -> Result<ValueInstance> {
    Ok(instance.map_desired(|c| serde_json::to_value(c))?)
}

impl<K: ResourceKind> DynKind for Erased<K> {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn identity_scheme(&self) -> IdentityScheme {
        self.kind.identity_scheme()
    }

    fn delete_policy(&self) -> DeletePolicy {
        self.kind.delete_policy()
    }

    fn field_rules(&self) -> FieldRules {
        self.kind.field_rules()
    }

    fn validate(&self, config: &Value) -> Result<()> {
        let typed = self.typed(config.clone())?;
        if let IdentityScheme::Composite(spec) = self.kind.identity_scheme() {
            spec.encode(&self.kind.key_segments(&typed))?;
        }
        Ok(())
    }

    fn create(&self, reconciler: &Reconciler<'_>, config: Value) -> Result<ValueInstance> {
        let config = self.typed(config)?;
        untyped(reconciler.create(&self.kind, config)?)
    }

    fn read(&self, reconciler: &Reconciler<'_>, instance: ValueInstance) -> Result<Refreshed<Value>> {
        let refreshed = reconciler.read(&self.kind, self.typed_instance(instance)?)?;
        Ok(Refreshed {
            instance: untyped(refreshed.instance)?,
            drift: refreshed.drift,
        })
    }

    fn update(
        &self,
        reconciler: &Reconciler<'_>,
        instance: ValueInstance,
        desired: Value,
    ) -> Result<ValueInstance> {
        let instance = self.typed_instance(instance)?;
        let desired = self.typed(desired)?;
        untyped(reconciler.update(&self.kind, instance, desired)?)
    }

    fn delete(&self, reconciler: &Reconciler<'_>, instance: ValueInstance) -> Result<ValueInstance> {
        untyped(reconciler.delete(&self.kind, self.typed_instance(instance)?)?)
    }

    fn import(&self, reconciler: &Reconciler<'_>, external_id: &str) -> Result<ValueInstance> {
        untyped(reconciler.import(&self.kind, external_id)?)
    }

    fn changes(&self, instance: &ValueInstance, desired: &Value) -> Result<Vec<FieldChange>> {
        let instance = self.typed_instance(instance.clone())?;
        reconciler::changes_for(&self.kind, &instance, &self.typed(desired.clone())?)
    }

    fn searchable(&self) -> bool {
        self.lookup.is_some()
    }

    fn lookup(
        &self,
        reconciler: &Reconciler<'_>,
        id: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<Found>> {
        match self.lookup {
            Some(lookup) => lookup(reconciler, &self.kind, id, name),
            None => Err(Error::Unsupported {
                kind: self.kind.name().to_string(),
                operation: "lookup",
            }),
        }
    }
}

/// Collects kinds before freezing them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    kinds: BTreeMap<&'static str, Box<dyn DynKind>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind. A later kind with the same name replaces an earlier one.
    #[must_use]
    pub fn register<K: ResourceKind + 'static>(self, kind: K) -> Self {
        self.insert(Erased { kind, lookup: None })
    }

    /// Add a kind that also supports lookup by ID or name.
    #[must_use]
    pub fn register_searchable<K: Searchable + 'static>(self, kind: K) -> Self {
        self.insert(Erased {
            kind,
            lookup: Some(lookup_with::<K> as LookupFn<K>),
        })
    }

    fn insert(mut self, kind: impl DynKind + 'static) -> Self {
        let name = kind.name();
        if self.kinds.insert(name, Box::new(kind)).is_some() {
            log::warn!("Resource kind '{name}' registered twice; keeping the last one");
        }
        self
    }

    pub fn build(self) -> Registry {
        Registry { kinds: self.kinds }
    }
}

/// Immutable set of known resource kinds, by name.
pub struct Registry {
    kinds: BTreeMap<&'static str, Box<dyn DynKind>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up a kind by name.
    pub fn get(&self, name: &str) -> Result<&dyn DynKind> {
        match self.kinds.get(name) {
            Some(kind) => Ok(kind.as_ref() as &dyn DynKind),
            None => Err(Error::UnknownKind(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Kind names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
