use super::{escape, object_fields, parse_body};
use reconcile::{
    CompositeKey, Error, FieldMap, FieldRules, Identity, IdentityScheme, KeySpec, Request,
    ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// What kind of group is assigned. Persisted as the middle key segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    UserGroup,
    DeviceGroup,
}

impl AssignmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentType::UserGroup => "user_group",
            AssignmentType::DeviceGroup => "device_group",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "user_group" => Some(AssignmentType::UserGroup),
            "device_group" => Some(AssignmentType::DeviceGroup),
            _ => None,
        }
    }

    fn collection(self) -> &'static str {
        match self {
            AssignmentType::UserGroup => "groups",
            AssignmentType::DeviceGroup => "device-groups",
        }
    }
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppAssignmentConfig {
    pub app_id: String,
    pub assignment_type: AssignmentType,
    pub member_id: String,
    /// Lower wins when several assignments grant the same app.
    #[serde(default)]
    pub priority: u32,
}

const KEY: KeySpec = KeySpec::new(&["app_id", "assignment_type", "member_id"]);

/// A user group or device group assigned to an application.
pub struct AppAssignmentKind;

fn assignment_path(app_id: &str, kind: AssignmentType, member_id: &str) -> String {
    format!(
        "/api/v1/apps/{}/{}/{}",
        escape(app_id),
        kind.collection(),
        escape(member_id)
    )
}

/// Decode an identity into `(app_id, type, member_id)`.
fn parts(identity: &Identity) -> Result<(CompositeKey, AssignmentType)> {
    let key = KEY.decode(identity)?;
    let tag = key.segment(1);
    let kind = AssignmentType::parse(tag).ok_or_else(|| Error::InvalidSegment {
        index: 1,
        segment: tag.to_string(),
        reason: "expected user_group or device_group".to_string(),
    })?;
    Ok((key, kind))
}

impl ResourceKind for AppAssignmentKind {
    type Config = AppAssignmentConfig;

    fn name(&self) -> &'static str {
        "app_assignment"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Composite(KEY)
    }

    fn field_rules(&self) -> FieldRules {
        FieldRules {
            create_only: &["app_id", "assignment_type", "member_id"],
            ..FieldRules::default()
        }
    }

    fn key_segments(&self, config: &AppAssignmentConfig) -> Vec<String> {
        vec![
            config.app_id.clone(),
            config.assignment_type.to_string(),
            config.member_id.clone(),
        ]
    }

    fn create_request(&self, config: &AppAssignmentConfig) -> Result<Request> {
        Ok(Request::put(
            assignment_path(&config.app_id, config.assignment_type, &config.member_id),
            Some(json!({ "priority": config.priority })),
        ))
    }

    fn read_request(&self, identity: &Identity) -> Result<Request> {
        let (key, kind) = parts(identity)?;
        Ok(Request::get(assignment_path(
            key.segment(0),
            kind,
            key.segment(2),
        )))
    }

    fn decode_observed(&self, identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        let (key, kind) = parts(identity)?;
        let assignment = parse_body(body)?;
        Ok(Some(object_fields(json!({
            "app_id": key.segment(0),
            "assignment_type": kind,
            "member_id": key.segment(2),
            "priority": assignment["priority"],
        }))))
    }

    fn update_request(
        &self,
        identity: &Identity,
        config: &AppAssignmentConfig,
    ) -> Result<Option<Request>> {
        let (key, kind) = parts(identity)?;
        Ok(Some(Request::put(
            assignment_path(key.segment(0), kind, key.segment(2)),
            Some(json!({ "priority": config.priority })),
        )))
    }

    fn delete_request(&self, identity: &Identity) -> Result<Option<Request>> {
        let (key, kind) = parts(identity)?;
        Ok(Some(Request::delete(assignment_path(
            key.segment(0),
            kind,
            key.segment(2),
        ))))
    }
}
