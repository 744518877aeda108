use super::{escape, object_fields, parse_body, str_field};
use chrono::Utc;
use reconcile::{
    ActionTracker, DeletePolicy, Error, FieldMap, FieldRules, Identity, IdentityScheme, KeySpec,
    RemoteActionTask, Request, ResourceKind, Result, TaskStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAction {
    Lock,
    Unlock,
    Suspend,
    Wipe,
}

impl DeviceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceAction::Lock => "lock",
            DeviceAction::Unlock => "unlock",
            DeviceAction::Suspend => "suspend",
            DeviceAction::Wipe => "wipe",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "lock" => Some(DeviceAction::Lock),
            "unlock" => Some(DeviceAction::Unlock),
            "suspend" => Some(DeviceAction::Suspend),
            "wipe" => Some(DeviceAction::Wipe),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceActionConfig {
    pub device_id: String,
    pub action: DeviceAction,
}

const KEY: KeySpec = KeySpec::new(&["device_id", "action"]);

/// A lifecycle action run against a device.
///
/// The device applies it asynchronously: create returns a task that is
/// polled until it finishes. There is nothing to undo remotely, so
/// delete only stops tracking the action.
pub struct DeviceActionKind;

fn device_path(device_id: &str) -> String {
    format!("/api/v1/devices/{}", escape(device_id))
}

fn task_status(value: &Value) -> Option<TaskStatus> {
    value["status"].as_str().and_then(TaskStatus::parse)
}

impl ResourceKind for DeviceActionKind {
    type Config = DeviceActionConfig;

    fn name(&self) -> &'static str {
        "device_action"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Composite(KEY)
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

    fn key_segments(&self, config: &DeviceActionConfig) -> Vec<String> {
        vec![config.device_id.clone(), config.action.to_string()]
    }

    fn create_request(&self, config: &DeviceActionConfig) -> Result<Request> {
        Ok(Request::post(
            format!("{}/lifecycle/{}", device_path(&config.device_id), config.action),
            json!({}),
        ))
    }

    fn read_request(&self, identity: &Identity) -> Result<Request> {
        let key = KEY.decode(identity)?;
        Ok(Request::get(device_path(key.segment(0))))
    }

    fn decode_observed(&self, identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        let key = KEY.decode(identity)?;
        let action = DeviceAction::parse(key.segment(1)).ok_or_else(|| Error::InvalidSegment {
            index: 1,
            segment: key.segment(1).to_string(),
            reason: "expected lock, unlock, suspend or wipe".to_string(),
        })?;
        let device = parse_body(body)?;
        Ok(Some(object_fields(json!({
            "device_id": key.segment(0),
            "action": action,
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

impl ActionTracker for DeviceActionKind {
    fn task_from_response(
        &self,
        identity: &Identity,
        body: &[u8],
    ) -> Result<Option<RemoteActionTask>> {
        let response = parse_body(body)?;
        let Some(task_id) = response["taskId"].as_str() else {
            log::debug!("device_action '{identity}' finished synchronously");
            return Ok(None);
        };
        Ok(Some(RemoteActionTask {
            task_id: task_id.to_string(),
            target_resource_id: identity.to_string(),
            status: task_status(&response).unwrap_or(TaskStatus::Pending),
            created_at: Utc::now(),
            message: None,
        }))
    }

    fn status_request(&self, task_id: &str) -> Request {
        Request::get(format!("/api/v1/tasks/{}", escape(task_id)))
    }

    fn decode_status(&self, task_id: &str, body: &[u8]) -> Result<RemoteActionTask> {
        let task = parse_body(body)?;
        let status = task_status(&task).ok_or_else(|| Error::missing_field("task", "status"))?;
        let created_at = task["created"]
            .as_str()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(Utc::now);
        Ok(RemoteActionTask {
            task_id: task_id.to_string(),
            target_resource_id: str_field(&task, "targetId", "task").unwrap_or_default(),
            status,
            created_at,
            message: task["message"].as_str().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::reconciler;
    use reconcile::{ErrorCategory, ManualClock, Method, MockGateway, ResourceInstance, Status};
    use std::time::Duration;

    const LIFECYCLE: &str = "/api/v1/devices/dev1/lifecycle/lock";

    fn lock() -> DeviceActionConfig {
        DeviceActionConfig {
            device_id: "dev1".to_string(),
            action: DeviceAction::Lock,
        }
    }

    #[test]
    fn test_create_waits_for_task() {
        let mock = MockGateway::new();
        mock.respond(Method::Post, LIFECYCLE, r#"{"taskId":"t1","status":"PENDING"}"#);
        mock.enqueue(
            Method::Get,
            "/api/v1/tasks/t1",
            Ok(br#"{"status":"IN_PROGRESS"}"#.to_vec()),
        );
        mock.respond(
            Method::Get,
            "/api/v1/tasks/t1",
            r#"{"status":"COMPLETED","targetId":"dev1"}"#,
        );
        mock.respond(Method::Get, "/api/v1/devices/dev1", r#"{"id":"dev1","status":"LOCKED"}"#);
        let clock = ManualClock::new();

        let instance = reconciler(&mock, &clock)
            .create(&DeviceActionKind, lock())
            .unwrap();
        assert_eq!(instance.identity.as_str(), "dev1:lock");
        assert_eq!(instance.observed["device_status"], json!("LOCKED"));
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
        assert_eq!(mock.count(Method::Get, "/api/v1/tasks/t1"), 2);
    }

    #[test]
    fn test_no_task_reads_immediately() {
        let mock = MockGateway::new();
        mock.respond(Method::Post, LIFECYCLE, "");
        mock.respond(Method::Get, "/api/v1/devices/dev1", r#"{"id":"dev1","status":"LOCKED"}"#);
        let clock = ManualClock::new();

        reconciler(&mock, &clock)
            .create(&DeviceActionKind, lock())
            .unwrap();
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_failed_task_keeps_identity() {
        let mock = MockGateway::new();
        mock.respond(Method::Post, LIFECYCLE, r#"{"taskId":"t1"}"#);
        mock.respond(
            Method::Get,
            "/api/v1/tasks/t1",
            r#"{"status":"FAILED","message":"device offline"}"#,
        );
        let clock = ManualClock::new();

        let err = reconciler(&mock, &clock)
            .create(&DeviceActionKind, lock())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Action);
        assert_eq!(err.created_identity(), Some("dev1:lock"));
        assert!(err.to_string().contains("device offline"));
    }

    #[test]
    fn test_stuck_task_times_out() {
        let mock = MockGateway::new();
        mock.respond(Method::Post, LIFECYCLE, r#"{"taskId":"t1"}"#);
        mock.respond(Method::Get, "/api/v1/tasks/t1", r#"{"status":"RUNNING"}"#);
        let clock = ManualClock::new();

        let err = reconciler(&mock, &clock)
            .create(&DeviceActionKind, lock())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert_eq!(clock.elapsed(), Duration::from_secs(12));
        assert_eq!(mock.count(Method::Get, "/api/v1/devices/dev1"), 0);
    }

    #[test]
    fn test_delete_only_forgets() {
        let mock = MockGateway::new();
        let clock = ManualClock::new();

        let instance = reconciler(&mock, &clock)
            .delete(
                &DeviceActionKind,
                ResourceInstance::tracked(Identity::from("dev1:lock"), Some(lock())),
            )
            .unwrap();
        assert_eq!(instance.status, Status::Absent);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_unknown_action_in_identity() {
        let err = DeviceActionKind
            .decode_observed(&Identity::from("dev1:explode"), br#"{"status":"ACTIVE"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSegment { index: 1, .. }));
    }
}
