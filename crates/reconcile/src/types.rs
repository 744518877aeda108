//! Core types for resource reconciliation

use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Field name to value snapshot of a resource (desired or observed).
pub type FieldMap = BTreeMap<String, Value>;

/// Serialize a typed configuration into a [`FieldMap`].
///
/// Null values are dropped so an unset optional field and a field the
/// remote side omits compare equal.
pub fn to_fields<T: Serialize>(value: &T) -> serde_json::Result<FieldMap> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        Value::Null => Ok(FieldMap::new()),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Lifecycle status of a resource instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No remote object is tracked.
    #[default]
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl Status {
    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `Present -> Absent` is the drift edge (object vanished remotely).
    /// Every in-flight state may fall back to where it started when the
    /// remote call fails.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::{Absent, Creating, Deleting, Present, Updating};
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Present | Absent)
                | (Present, Updating | Deleting | Absent | Present)
                | (Updating, Present | Absent)
                | (Deleting, Absent | Present)
        )
    }

    pub fn is_present(self) -> bool {
        matches!(self, Status::Present)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Absent => "absent",
            Status::Creating => "creating",
            Status::Present => "present",
            Status::Updating => "updating",
            Status::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

/// The unit under management.
///
/// `C` is the kind's typed configuration. The reconciler takes instances by
/// value and hands them back; it never caches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance<C> {
    /// Empty exactly when `status` is [`Status::Absent`].
    #[serde(default)]
    pub identity: Identity,
    /// Configuration supplied by the user (`None` right after import).
    pub desired: Option<C>,
    /// Snapshot from the last successful read.
    #[serde(default)]
    pub observed: FieldMap,
    #[serde(default)]
    pub status: Status,
}

impl<C> ResourceInstance<C> {
    /// An instance with nothing tracked remotely.
    pub fn absent(desired: Option<C>) -> Self {
        Self {
            identity: Identity::empty(),
            desired,
            observed: FieldMap::new(),
            status: Status::Absent,
        }
    }

    /// An instance known by identity only, e.g. loaded from an old state file.
    pub fn tracked(identity: Identity, desired: Option<C>) -> Self {
        Self {
            identity,
            desired,
            observed: FieldMap::new(),
            status: Status::Present,
        }
    }

    /// Drop identity and observed state.
    pub fn clear(&mut self) {
        self.identity = Identity::empty();
        self.observed.clear();
        self.status = Status::Absent;
    }

    pub fn is_present(&self) -> bool {
        self.status.is_present() && !self.identity.is_empty()
    }

    /// Convert the configuration type, keeping identity and state.
    pub fn map_desired<D, E>(
        self,
        f: impl FnOnce(C) -> std::result::Result<D, E>,
    ) -> std::result::Result<ResourceInstance<D>, E> {
        Ok(ResourceInstance {
            identity: self.identity,
            desired: self.desired.map(f).transpose()?,
            observed: self.observed,
            status: self.status,
        })
    }
}

/// Per-kind field classification used by drift detection and updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldRules {
    /// Server-computed fields: always refreshed, never drift.
    pub computed: &'static [&'static str],
    /// Fields that can only be set on create (identity-bearing).
    pub create_only: &'static [&'static str],
    /// One-time secrets: captured on create, never refreshed or cleared.
    pub sensitive: &'static [&'static str],
}

impl FieldRules {
    pub fn is_computed(&self, field: &str) -> bool {
        self.computed.contains(&field)
    }

    pub fn is_create_only(&self, field: &str) -> bool {
        self.create_only.contains(&field)
    }

    pub fn is_sensitive(&self, field: &str) -> bool {
        self.sensitive.contains(&field)
    }

    /// Whether a desired field takes part in drift comparison.
    pub fn participates(&self, field: &str) -> bool {
        !self.is_computed(field) && !self.is_sensitive(field)
    }
}

/// Behavior before creating a remote object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatePolicy {
    /// Look for an equivalent remote object first and fail with
    /// `AlreadyExists` if one is found.
    pub precheck: bool,
}

/// What "delete" means for a resource kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Remove the remote object.
    #[default]
    Remove,
    /// Restore default values; the remote object persists.
    ResetToDefault,
    /// No remote call; only local state is cleared.
    Forget,
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeletePolicy::Remove => "remove",
            DeletePolicy::ResetToDefault => "reset to defaults",
            DeletePolicy::Forget => "forget",
        };
        f.write_str(s)
    }
}

/// A single field difference between desired and observed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: Option<Value>,
    pub to: Option<Value>,
    /// Changing this field requires replacing the remote object.
    pub requires_replace: bool,
}

/// Status of an asynchronous remote action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Parse a remote status string, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "pending" | "queued" => Some(Self::Pending),
            "running" | "in_progress" => Some(Self::Running),
            "completed" | "succeeded" | "success" => Some(Self::Completed),
            "failed" | "error" => Some(Self::Failed),
            _ => None,
        }
    }

    /// No further transition happens from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// An asynchronous operation started by a mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteActionTask {
    pub task_id: String,
    pub target_resource_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Last status message reported by the remote side.
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        description: Option<String>,
    }

    #[test]
    fn test_to_fields_drops_nulls() {
        let fields = to_fields(&Sample {
            name: "eng".to_string(),
            description: None,
        })
        .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["name"], json!("eng"));
    }

    #[test]
    fn test_to_fields_rejects_scalars() {
        assert!(to_fields(&42).is_err());
    }

    #[test]
    fn test_lifecycle_edges() {
        assert!(Status::Absent.can_transition_to(Status::Creating));
        assert!(Status::Creating.can_transition_to(Status::Present));
        assert!(Status::Present.can_transition_to(Status::Updating));
        assert!(Status::Updating.can_transition_to(Status::Present));
        assert!(Status::Present.can_transition_to(Status::Deleting));
        assert!(Status::Deleting.can_transition_to(Status::Absent));
        assert!(Status::Present.can_transition_to(Status::Absent));

        assert!(!Status::Absent.can_transition_to(Status::Updating));
        assert!(!Status::Absent.can_transition_to(Status::Deleting));
        assert!(!Status::Creating.can_transition_to(Status::Deleting));
    }

    #[test]
    fn test_clear_resets_identity() {
        let mut instance: ResourceInstance<()> =
            ResourceInstance::tracked(Identity::from("00g1"), None);
        instance.observed.insert("name".to_string(), json!("eng"));
        instance.clear();
        assert!(instance.identity.is_empty());
        assert!(instance.observed.is_empty());
        assert_eq!(instance.status, Status::Absent);
    }

    #[test]
    fn test_field_rules() {
        let rules = FieldRules {
            computed: &["created"],
            create_only: &["login"],
            sensitive: &["token"],
        };
        assert!(rules.participates("name"));
        assert!(!rules.participates("created"));
        assert!(!rules.participates("token"));
        assert!(rules.is_create_only("login"));
    }

    #[test]
    fn test_task_status_parse() {
        assert_eq!(TaskStatus::parse("COMPLETED"), Some(TaskStatus::Completed));
        assert_eq!(TaskStatus::parse("in_progress"), Some(TaskStatus::Running));
        assert_eq!(TaskStatus::parse("bogus"), None);
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Status::Present).unwrap(),
            "\"present\""
        );
    }
}
