//! Reconciler - drives the per-instance CRUD lifecycle
//!
//! `Absent -> Creating -> Present -> Updating -> Present -> Deleting -> Absent`,
//! plus `Present -> Absent` when a read finds the remote object gone.
//!
//! The reconciler is stateless: instances are passed in by value and
//! returned. On error the instance is not returned, so callers keep their
//! previous copy as the source of truth.

use crate::drift::{self, DriftResult};
use crate::error::{Error, Result};
use crate::gateway::{Gateway, GatewayError, Request};
use crate::identity::{Identity, IdentityScheme};
use crate::kind::{ActionTracker, ResourceKind, Searchable};
use crate::poller::ActionPoller;
use crate::types::{
    DeletePolicy, FieldChange, FieldMap, RemoteActionTask, ResourceInstance, Status, to_fields,
};
use serde_json::Value;

/// An instance after a read, with what changed remotely.
#[derive(Debug, Clone)]
pub struct Refreshed<C> {
    pub instance: ResourceInstance<C>,
    pub drift: DriftResult,
}

impl<C> Refreshed<C> {
    pub fn found(&self) -> bool {
        self.drift.found
    }
}

/// A remote object located by [`Reconciler::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub struct Found {
    pub identity: Identity,
    pub fields: FieldMap,
}

/// Drives create/read/update/delete/import for one instance at a time.
pub struct Reconciler<'a> {
    gateway: &'a dyn Gateway,
    poller: ActionPoller<'a>,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over `gateway`, waiting on remote actions with `poller`.
    pub fn new(gateway: &'a dyn Gateway, poller: ActionPoller<'a>) -> Self {
        Self { gateway, poller }
    }

    /// Create the remote object for `desired`.
    ///
    /// The returned instance is `Present` only after a trailing read has
    /// populated its observed state; create responses are never trusted
    /// for that.
    pub fn create<K: ResourceKind>(
        &self,
        kind: &K,
        desired: K::Config,
    ) -> Result<ResourceInstance<K::Config>> {
        let mut instance = ResourceInstance::absent(Some(desired.clone()));
        transition(kind, &mut instance, Status::Creating)?;

        if kind.create_policy().precheck {
            self.precheck(kind, &desired)?;
        }

        // Composite keys are validated before anything is sent.
        let composite = match kind.identity_scheme() {
            IdentityScheme::Composite(spec) => Some(spec.encode(&kind.key_segments(&desired))?),
            IdentityScheme::Opaque => None,
        };

        let request = kind.create_request(&desired)?;
        let context = composite.as_ref().map_or("", Identity::as_str);
        let body = self.send(kind, &request, context)?;

        let identity = match composite {
            Some(identity) => identity,
            None => kind.identity_from_response(&body)?,
        };
        log::debug!("{} '{}' created", kind.name(), identity);

        self.finish_create(kind, &identity, &body)
            .map(|observed| {
                instance.identity = identity.clone();
                instance.observed = observed;
                instance.status = Status::Present;
                instance
            })
            .map_err(|e| Error::Incomplete {
                kind: kind.name().to_string(),
                identity: identity.to_string(),
                source: Box::new(e),
            })
    }

    /// Steps after the create call: wait for any task, then read back.
    fn finish_create<K: ResourceKind>(
        &self,
        kind: &K,
        identity: &Identity,
        body: &[u8],
    ) -> Result<FieldMap> {
        let secrets = kind.secrets_from_response(body)?;

        if let Some(tracker) = kind.actions()
            && let Some(task) = tracker.task_from_response(identity, body)?
        {
            self.await_task(kind, tracker, task)?;
        }

        match self.fetch(kind, identity)? {
            Some(fresh) => Ok(drift::merge_observed(&secrets, fresh, &kind.field_rules())),
            None => Err(Error::MissingAfterCreate {
                kind: kind.name().to_string(),
                identity: identity.to_string(),
            }),
        }
    }

    fn precheck<K: ResourceKind>(&self, kind: &K, desired: &K::Config) -> Result<()> {
        let Some(request) = kind.precheck_request(desired)? else {
            return Ok(());
        };
        match request.send(self.gateway) {
            Ok(body) => {
                if let Some(existing) = kind.find_conflict(desired, &body)? {
                    return Err(Error::AlreadyExists {
                        kind: kind.name().to_string(),
                        existing,
                    });
                }
                Ok(())
            }
            Err(GatewayError::NotFound) => Ok(()),
            Err(e) => Err(Error::from_gateway(e, kind.name(), "")),
        }
    }

    /// Refresh an instance from the remote side.
    ///
    /// Not found is not an error: the instance comes back `Absent` with an
    /// empty identity. Other failures leave the caller's copy untouched.
    pub fn read<K: ResourceKind>(
        &self,
        kind: &K,
        mut instance: ResourceInstance<K::Config>,
    ) -> Result<Refreshed<K::Config>> {
        if instance.identity.is_empty() {
            instance.clear();
            return Ok(Refreshed {
                instance,
                drift: DriftResult::gone(),
            });
        }
        validate_identity(kind, &instance.identity)?;

        let rules = kind.field_rules();
        let fresh = self.fetch(kind, &instance.identity)?;
        let desired = match &instance.desired {
            Some(config) => to_fields(config)?,
            None => FieldMap::new(),
        };
        let drift = drift::detect(&instance.observed, fresh.as_ref(), &desired, &rules);

        match fresh {
            None => {
                log::info!(
                    "{} '{}' no longer exists remotely",
                    kind.name(),
                    instance.identity
                );
                instance.clear();
            }
            Some(fresh) => {
                if drift.changed {
                    log::info!(
                        "{} '{}' drifted: changed {:?}, removed {:?}",
                        kind.name(),
                        instance.identity,
                        drift.changed_fields,
                        drift.removed_fields
                    );
                }
                instance.observed = drift::merge_observed(&instance.observed, fresh, &rules);
                instance.status = Status::Present;
            }
        }

        Ok(Refreshed { instance, drift })
    }

    /// Bring a present instance in line with `desired`.
    ///
    /// Sends nothing when no mutable field differs from the last observed
    /// state; the instance is just re-read. Changing a create-only field
    /// fails with [`Error::ImmutableField`]: that needs a replacement.
    pub fn update<K: ResourceKind>(
        &self,
        kind: &K,
        mut instance: ResourceInstance<K::Config>,
        desired: K::Config,
    ) -> Result<ResourceInstance<K::Config>> {
        if !instance.is_present() {
            return Err(Error::InvalidTransition {
                kind: kind.name().to_string(),
                from: instance.status.to_string(),
                to: Status::Updating.to_string(),
            });
        }
        let changes = changes_for(kind, &instance, &desired)?;
        if let Some(change) = changes.iter().find(|c| c.requires_replace) {
            return Err(Error::ImmutableField {
                kind: kind.name().to_string(),
                field: change.field.clone(),
            });
        }
        instance.desired = Some(desired.clone());

        if changes.is_empty() {
            log::debug!(
                "{} '{}' unchanged, skipping update",
                kind.name(),
                instance.identity
            );
            return self.read_present(kind, instance);
        }

        transition(kind, &mut instance, Status::Updating)?;
        let request = kind
            .update_request(&instance.identity, &desired)?
            .ok_or_else(|| Error::Unsupported {
                kind: kind.name().to_string(),
                operation: "update",
            })?;
        self.send(kind, &request, instance.identity.as_str())?;
        log::debug!(
            "{} '{}' updated {} field(s)",
            kind.name(),
            instance.identity,
            changes.len()
        );

        instance.status = Status::Present;
        self.read_present(kind, instance)
    }

    /// Read an instance that must still exist.
    fn read_present<K: ResourceKind>(
        &self,
        kind: &K,
        instance: ResourceInstance<K::Config>,
    ) -> Result<ResourceInstance<K::Config>> {
        let identity = instance.identity.to_string();
        let refreshed = self.read(kind, instance)?;
        if !refreshed.found() {
            return Err(Error::NotFound {
                kind: kind.name().to_string(),
                identity,
            });
        }
        Ok(refreshed.instance)
    }

    /// Delete the remote object and clear the instance.
    ///
    /// Already-gone objects count as deleted. Kinds with
    /// [`DeletePolicy::ResetToDefault`] leave the remote object in place
    /// with default content; the instance is cleared all the same.
    pub fn delete<K: ResourceKind>(
        &self,
        kind: &K,
        mut instance: ResourceInstance<K::Config>,
    ) -> Result<ResourceInstance<K::Config>> {
        if instance.identity.is_empty() {
            instance.clear();
            return Ok(instance);
        }
        transition(kind, &mut instance, Status::Deleting)?;
        self.delete_identity(kind, &instance.identity)?;
        instance.clear();
        Ok(instance)
    }

    /// Delete by identity alone. Idempotent.
    pub fn delete_identity<K: ResourceKind>(&self, kind: &K, identity: &Identity) -> Result<()> {
        validate_identity(kind, identity)?;
        let policy = kind.delete_policy();
        let Some(request) = kind.delete_request(identity)? else {
            log::debug!(
                "{} '{}' has no remote delete, forgetting it",
                kind.name(),
                identity
            );
            return Ok(());
        };

        match self.send(kind, &request, identity.as_str()) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                log::debug!("{} '{}' already gone", kind.name(), identity);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        if policy == DeletePolicy::ResetToDefault {
            log::info!(
                "{} '{}' reset to defaults; the remote object still exists",
                kind.name(),
                identity
            );
        }
        Ok(())
    }

    /// Start tracking an existing remote object by its identity string.
    ///
    /// The identity is validated against the kind's scheme before any
    /// request. The desired configuration is adopted from the observed
    /// fields when they are complete enough to form one.
    pub fn import<K: ResourceKind>(
        &self,
        kind: &K,
        external_id: &str,
    ) -> Result<ResourceInstance<K::Config>> {
        let identity = kind.identity_scheme().parse(external_id)?;
        let refreshed = self.read(kind, ResourceInstance::tracked(identity.clone(), None))?;
        if !refreshed.found() {
            return Err(Error::NotFound {
                kind: kind.name().to_string(),
                identity: identity.to_string(),
            });
        }

        let mut instance = refreshed.instance;
        let observed = Value::Object(instance.observed.clone().into_iter().collect());
        match serde_json::from_value::<K::Config>(observed) {
            Ok(config) => instance.desired = Some(config),
            Err(e) => log::debug!(
                "{} '{}' imported without configuration: {}",
                kind.name(),
                identity,
                e
            ),
        }
        Ok(instance)
    }

    /// Find an object by ID or display name.
    ///
    /// An ID always wins over a name. A name matching several objects
    /// picks the first one the API returned, with a warning.
    pub fn lookup<K: Searchable>(
        &self,
        kind: &K,
        id: Option<&str>,
        name: Option<&str>,
    ) -> Result<Option<Found>> {
        if let Some(id) = id {
            let identity = kind.identity_scheme().parse(id)?;
            return Ok(self.fetch(kind, &identity)?.map(|fields| Found { identity, fields }));
        }

        let Some(name) = name else {
            return Err(Error::Unsupported {
                kind: kind.name().to_string(),
                operation: "lookup without an id or name",
            });
        };

        let request = kind.search_request(name)?;
        let body = match request.send(self.gateway) {
            Ok(body) => body,
            Err(GatewayError::NotFound) => return Ok(None),
            Err(e) => return Err(Error::from_gateway(e, kind.name(), name)),
        };

        let mut matches = kind.decode_matches(&body)?;
        matches.retain(|(_, fields)| kind.has_name(fields, name));
        if matches.len() > 1 {
            log::warn!(
                "{} name '{}' matched {} objects; using the first ({})",
                kind.name(),
                name,
                matches.len(),
                matches[0].0
            );
        }
        if matches.is_empty() {
            return Ok(None);
        }
        let (identity, fields) = matches.swap_remove(0);
        Ok(Some(Found { identity, fields }))
    }

    fn await_task<K: ResourceKind>(
        &self,
        kind: &K,
        tracker: &dyn ActionTracker,
        task: RemoteActionTask,
    ) -> Result<RemoteActionTask> {
        log::debug!(
            "Waiting for task {} on {} '{}'",
            task.task_id,
            kind.name(),
            task.target_resource_id
        );
        let outcome = self.poller.wait(task, |task_id| {
            let request = tracker.status_request(task_id);
            let body = self.send(kind, &request, task_id)?;
            tracker.decode_status(task_id, &body)
        })?;
        outcome.into_result()
    }

    /// Read and decode; `None` when the object is absent.
    fn fetch<K: ResourceKind>(&self, kind: &K, identity: &Identity) -> Result<Option<FieldMap>> {
        let request = kind.read_request(identity)?;
        match request.send(self.gateway) {
            Ok(body) => kind.decode_observed(identity, &body),
            Err(GatewayError::NotFound) => Ok(None),
            Err(e) => Err(Error::from_gateway(e, kind.name(), identity.as_str())),
        }
    }

    fn send<K: ResourceKind>(&self, kind: &K, request: &Request, context: &str) -> Result<Vec<u8>> {
        request
            .send(self.gateway)
            .map_err(|e| Error::from_gateway(e, kind.name(), context))
    }
}

/// Field-level changes needed to bring `instance` to `desired`.
pub fn changes_for<K: ResourceKind>(
    kind: &K,
    instance: &ResourceInstance<K::Config>,
    desired: &K::Config,
) -> Result<Vec<FieldChange>> {
    let desired = to_fields(desired)?;
    Ok(drift::pending_changes(
        &desired,
        &instance.observed,
        &kind.field_rules(),
    ))
}

fn validate_identity<K: ResourceKind>(kind: &K, identity: &Identity) -> Result<()> {
    if let IdentityScheme::Composite(spec) = kind.identity_scheme() {
        spec.decode(identity)?;
    }
    Ok(())
}

fn transition<K: ResourceKind>(
    kind: &K,
    instance: &mut ResourceInstance<K::Config>,
    next: Status,
) -> Result<()> {
    if !instance.status.can_transition_to(next) {
        return Err(Error::InvalidTransition {
            kind: kind.name().to_string(),
            from: instance.status.to_string(),
            to: next.to_string(),
        });
    }
    log::debug!(
        "{} '{}': {} -> {}",
        kind.name(),
        instance.identity,
        instance.status,
        next
    );
    instance.status = next;
    Ok(())
}
