//! Small resource kinds shared by the unit tests.

use crate::error::{Error, Result};
use crate::gateway::Request;
use crate::identity::{Identity, IdentityScheme, KeySpec};
use crate::kind::{ActionTracker, ResourceKind, Searchable};
use crate::types::{CreatePolicy, DeletePolicy, FieldMap, FieldRules, RemoteActionTask, TaskStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

fn object_fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => FieldMap::new(),
    }
}

fn parse(body: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(body)?)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GroupConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
        }
    }
}

/// Opaque IDs, name precheck, searchable.
pub struct GroupKind;

impl ResourceKind for GroupKind {
    type Config = GroupConfig;

    fn name(&self) -> &'static str {
        "group"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Opaque
    }

    fn create_policy(&self) -> CreatePolicy {
        CreatePolicy { precheck: true }
    }

    fn field_rules(&self) -> FieldRules {
        FieldRules {
            computed: &["id", "last_updated"],
            ..FieldRules::default()
        }
    }

    fn precheck_request(&self, config: &GroupConfig) -> Result<Option<Request>> {
        Ok(Some(Request::get(format!("/groups?q={}", config.name))))
    }

    fn find_conflict(&self, config: &GroupConfig, body: &[u8]) -> Result<Option<String>> {
        Ok(self
            .decode_matches(body)?
            .into_iter()
            .find(|(_, f)| f.get("name") == Some(&json!(config.name)))
            .map(|(id, _)| id.to_string()))
    }

    fn create_request(&self, config: &GroupConfig) -> Result<Request> {
        Ok(Request::post("/groups", serde_json::to_value(config)?))
    }

    fn identity_from_response(&self, body: &[u8]) -> Result<Identity> {
        parse(body)?["id"]
            .as_str()
            .map(Identity::from)
            .ok_or_else(|| Error::missing_field("group", "id"))
    }

    fn read_request(&self, identity: &Identity) -> Result<Request> {
        Ok(Request::get(format!("/groups/{identity}")))
    }

    fn decode_observed(&self, _identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        Ok(Some(object_fields(parse(body)?)))
    }

    fn update_request(&self, identity: &Identity, config: &GroupConfig) -> Result<Option<Request>> {
        Ok(Some(Request::put(
            format!("/groups/{identity}"),
            Some(serde_json::to_value(config)?),
        )))
    }

    fn delete_request(&self, identity: &Identity) -> Result<Option<Request>> {
        Ok(Some(Request::delete(format!("/groups/{identity}"))))
    }
}

impl Searchable for GroupKind {
    fn search_request(&self, name: &str) -> Result<Request> {
        Ok(Request::get(format!("/groups?q={name}")))
    }

    fn decode_matches(&self, body: &[u8]) -> Result<Vec<(Identity, FieldMap)>> {
        let Value::Array(items) = parse(body)? else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .filter_map(|item| {
                let id = item["id"].as_str().map(Identity::from)?;
                Some((id, object_fields(item)))
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub group_id: String,
    pub user_id: String,
}

pub const MEMBER_KEY: KeySpec = KeySpec::new(&["group_id", "user_id"]);

/// Composite key; membership read through a list.
pub struct MemberKind;

impl ResourceKind for MemberKind {
    type Config = MemberConfig;

    fn name(&self) -> &'static str {
        "member"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Composite(MEMBER_KEY)
    }

    fn field_rules(&self) -> FieldRules {
        FieldRules {
            create_only: &["group_id", "user_id"],
            ..FieldRules::default()
        }
    }

    fn key_segments(&self, config: &MemberConfig) -> Vec<String> {
        vec![config.group_id.clone(), config.user_id.clone()]
    }

    fn create_request(&self, config: &MemberConfig) -> Result<Request> {
        Ok(Request::put(
            format!("/groups/{}/users/{}", config.group_id, config.user_id),
            None,
        ))
    }

    fn read_request(&self, identity: &Identity) -> Result<Request> {
        let key = MEMBER_KEY.decode(identity)?;
        Ok(Request::get(format!("/groups/{}/users", key.segment(0))))
    }

    fn decode_observed(&self, identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        let key = MEMBER_KEY.decode(identity)?;
        let Value::Array(users) = parse(body)? else {
            return Ok(None);
        };
        let member = users
            .iter()
            .any(|u| u["id"].as_str() == Some(key.segment(1)));
        Ok(member.then(|| {
            object_fields(json!({ "group_id": key.segment(0), "user_id": key.segment(1) }))
        }))
    }

    fn delete_request(&self, identity: &Identity) -> Result<Option<Request>> {
        let key = MEMBER_KEY.decode(identity)?;
        Ok(Some(Request::delete(format!(
            "/groups/{}/users/{}",
            key.segment(0),
            key.segment(1)
        ))))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsConfig {
    pub timezone: String,
}

/// Singleton that resets instead of deleting.
pub struct SettingsKind;

impl ResourceKind for SettingsKind {
    type Config = SettingsConfig;

    fn name(&self) -> &'static str {
        "settings"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Opaque
    }

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::ResetToDefault
    }

    fn create_request(&self, config: &SettingsConfig) -> Result<Request> {
        Ok(Request::put("/settings", Some(serde_json::to_value(config)?)))
    }

    fn identity_from_response(&self, _body: &[u8]) -> Result<Identity> {
        Ok(Identity::from("org"))
    }

    fn read_request(&self, _identity: &Identity) -> Result<Request> {
        Ok(Request::get("/settings"))
    }

    fn decode_observed(&self, _identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        Ok(Some(object_fields(parse(body)?)))
    }

    fn update_request(&self, _identity: &Identity, config: &SettingsConfig) -> Result<Option<Request>> {
        self.create_request(config).map(Some)
    }

    fn delete_request(&self, _identity: &Identity) -> Result<Option<Request>> {
        Ok(Some(Request::put("/settings", Some(json!({ "timezone": "UTC" })))))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipeConfig {
    pub device_id: String,
    pub action: String,
}

pub const WIPE_KEY: KeySpec = KeySpec::new(&["device_id", "action"]);

/// Create starts a remote task; delete only forgets.
pub struct WipeKind;

impl ResourceKind for WipeKind {
    type Config = WipeConfig;

    fn name(&self) -> &'static str {
        "wipe"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Composite(WIPE_KEY)
    }

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::Forget
    }

    fn field_rules(&self) -> FieldRules {
        FieldRules {
            computed: &["device_status"],
            create_only: &["device_id", "action"],
            ..FieldRules::default()
        }
    }

    fn key_segments(&self, config: &WipeConfig) -> Vec<String> {
        vec![config.device_id.clone(), config.action.clone()]
    }

    fn create_request(&self, config: &WipeConfig) -> Result<Request> {
        Ok(Request::post(
            format!("/devices/{}/lifecycle/{}", config.device_id, config.action),
            json!({}),
        ))
    }

    fn read_request(&self, identity: &Identity) -> Result<Request> {
        let key = WIPE_KEY.decode(identity)?;
        Ok(Request::get(format!("/devices/{}", key.segment(0))))
    }

    fn decode_observed(&self, identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        let key = WIPE_KEY.decode(identity)?;
        let device = parse(body)?;
        Ok(Some(object_fields(json!({
            "device_id": key.segment(0),
            "action": key.segment(1),
            "device_status": device["status"],
        }))))
    }

    fn delete_request(&self, _identity: &Identity) -> Result<Option<Request>> {
        Ok(None)
    }

    fn actions(&self) -> Option<&dyn ActionTracker> {
        Some(self)
    }
}

impl ActionTracker for WipeKind {
    fn task_from_response(&self, identity: &Identity, body: &[u8]) -> Result<Option<RemoteActionTask>> {
        let value = parse(body)?;
        let Some(task_id) = value["task_id"].as_str() else {
            return Ok(None);
        };
        Ok(Some(RemoteActionTask {
            task_id: task_id.to_string(),
            target_resource_id: identity.to_string(),
            status: value["status"]
                .as_str()
                .and_then(TaskStatus::parse)
                .unwrap_or(TaskStatus::Pending),
            created_at: Utc::now(),
            message: None,
        }))
    }

    fn status_request(&self, task_id: &str) -> Request {
        Request::get(format!("/tasks/{task_id}"))
    }

    fn decode_status(&self, task_id: &str, body: &[u8]) -> Result<RemoteActionTask> {
        let value = parse(body)?;
        let status = value["status"]
            .as_str()
            .and_then(TaskStatus::parse)
            .ok_or_else(|| Error::missing_field("task", "status"))?;
        Ok(RemoteActionTask {
            task_id: task_id.to_string(),
            target_resource_id: value["target"].as_str().unwrap_or_default().to_string(),
            status,
            created_at: Utc::now(),
            message: value["message"].as_str().map(str::to_string),
        })
    }
}
