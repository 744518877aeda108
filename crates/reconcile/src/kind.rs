//! Resource kind trait
//!
//! A resource kind maps one typed configuration struct onto the remote
//! API: which requests to send, how to read the responses back, and the
//! per-kind policies (identity scheme, pre-create check, delete meaning).

use crate::error::{Error, Result};
use crate::gateway::Request;
use crate::identity::{Identity, IdentityScheme};
use crate::types::{CreatePolicy, DeletePolicy, FieldMap, FieldRules, RemoteActionTask};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Core trait for every managed resource kind.
///
/// # Example
///
/// ```ignore
/// use reconcile::{FieldMap, Identity, IdentityScheme, Request, ResourceKind, Result, to_fields};
///
/// struct GroupKind;
///
/// impl ResourceKind for GroupKind {
///     type Config = GroupConfig;
///
///     fn name(&self) -> &'static str { "group" }
///     fn identity_scheme(&self) -> IdentityScheme { IdentityScheme::Opaque }
///
///     fn create_request(&self, config: &GroupConfig) -> Result<Request> {
///         Ok(Request::post("/api/v1/groups", serde_json::to_value(config)?))
///     }
///
///     fn read_request(&self, identity: &Identity) -> Result<Request> {
///         Ok(Request::get(format!("/api/v1/groups/{identity}")))
///     }
///
///     fn decode_observed(&self, _identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
///         let group: GroupConfig = serde_json::from_slice(body)?;
///         Ok(Some(to_fields(&group)?))
///     }
///
///     fn delete_request(&self, identity: &Identity) -> Result<Option<Request>> {
///         Ok(Some(Request::delete(format!("/api/v1/groups/{identity}"))))
///     }
/// }
/// ```
pub trait ResourceKind: Send + Sync {
    /// Typed configuration supplied by the user.
    type Config: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync;

    /// Kind name, e.g. `group`. Stable: it appears in state and addresses.
    fn name(&self) -> &'static str;

    /// Opaque or composite identity. Fixed for the kind.
    fn identity_scheme(&self) -> IdentityScheme;

    fn create_policy(&self) -> CreatePolicy {
        CreatePolicy::default()
    }

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::Remove
    }

    fn field_rules(&self) -> FieldRules {
        FieldRules::default()
    }

    /// Composite key segments for `config`, in key order.
    ///
    /// Only called for [`IdentityScheme::Composite`] kinds.
    fn key_segments(&self, _config: &Self::Config) -> Vec<String> {
        Vec::new()
    }

    /// Request that looks for an existing equivalent object before create.
    fn precheck_request(&self, _config: &Self::Config) -> Result<Option<Request>> {
        Ok(None)
    }

    /// Identify a conflicting object in a precheck response, if any.
    fn find_conflict(&self, _config: &Self::Config, _body: &[u8]) -> Result<Option<String>> {
        Ok(None)
    }

    fn create_request(&self, config: &Self::Config) -> Result<Request>;

    /// Extract the remote-assigned ID from a create response.
    ///
    /// Only called for [`IdentityScheme::Opaque`] kinds.
    fn identity_from_response(&self, _body: &[u8]) -> Result<Identity> {
        Err(Error::Unsupported {
            kind: self.name().to_string(),
            operation: "opaque identity",
        })
    }

    /// Sensitive values revealed once by the create response.
    fn secrets_from_response(&self, _body: &[u8]) -> Result<FieldMap> {
        Ok(FieldMap::new())
    }

    fn read_request(&self, identity: &Identity) -> Result<Request>;

    /// Decode a read response into observed fields.
    ///
    /// `Ok(None)` is the API's domain equivalent of not found, e.g. a
    /// membership list that does not contain the member.
    fn decode_observed(&self, identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>>;

    /// Request applying mutable fields of `config`. `None` when the kind
    /// has nothing mutable.
    fn update_request(&self, _identity: &Identity, _config: &Self::Config) -> Result<Option<Request>> {
        Ok(None)
    }

    /// Request performing the kind's delete (or reset). `None` for
    /// [`DeletePolicy::Forget`].
    fn delete_request(&self, identity: &Identity) -> Result<Option<Request>>;

    /// Asynchronous action tracking, for kinds whose create starts a task.
    fn actions(&self) -> Option<&dyn ActionTracker> {
        None
    }
}

/// Reads the state of asynchronous tasks started by a kind.
pub trait ActionTracker: Send + Sync {
    /// Task started by a mutating call, if its response names one.
    fn task_from_response(&self, identity: &Identity, body: &[u8]) -> Result<Option<RemoteActionTask>>;

    fn status_request(&self, task_id: &str) -> Request;

    fn decode_status(&self, task_id: &str, body: &[u8]) -> Result<RemoteActionTask>;
}

/// Kinds that can be found by display name.
pub trait Searchable: ResourceKind {
    fn search_request(&self, name: &str) -> Result<Request>;

    /// Search results in the order the API returned them. These may be
    /// partial matches; [`Searchable::has_name`] decides which count.
    fn decode_matches(&self, body: &[u8]) -> Result<Vec<(Identity, FieldMap)>>;

    /// Whether a search result carries exactly `name`.
    fn has_name(&self, fields: &FieldMap, name: &str) -> bool {
        fields.get("name").and_then(Value::as_str) == Some(name)
    }
}
