//! Managed resource kinds
//!
//! Each kind maps a typed configuration onto the `/api/v1` REST layout of
//! the identity service:
//!
//! - `group` - directory groups (opaque ID, searchable by name)
//! - `group_membership` - user in group (`{group_id}:{user_id}`)
//! - `app_assignment` - group assigned to an app (`{app_id}:{type}:{member_id}`)
//! - `org_settings` - organization-wide settings singleton
//! - `service_token` - API token with a one-time secret
//! - `device_action` - lifecycle action on a device, tracked until done

mod app_assignment;
mod device_action;
mod group;
mod group_membership;
mod org_settings;
mod service_token;

use app_assignment::AppAssignmentKind;
use device_action::DeviceActionKind;
use group::GroupKind;
use group_membership::GroupMembershipKind;
use org_settings::OrgSettingsKind;
use service_token::ServiceTokenKind;

use reconcile::{Error, FieldMap, Registry, Result};
use serde_json::Value;

/// All kinds idsync can manage.
pub fn registry() -> Registry {
    Registry::builder()
        .register_searchable(GroupKind)
        .register(GroupMembershipKind)
        .register(AppAssignmentKind)
        .register(OrgSettingsKind)
        .register(ServiceTokenKind)
        .register(DeviceActionKind)
        .build()
}

/// Decode a JSON response body. An empty body decodes as `null`.
fn parse_body(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Object members as fields, without nulls.
fn object_fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => FieldMap::new(),
    }
}

/// Required string member of a response object.
fn str_field(value: &Value, field: &str, kind: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::missing_field(kind, field))
}

/// Escape a value for use as one path segment or query value.
fn escape(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_names() {
        let names: Vec<_> = registry().names().collect();
        assert_eq!(
            names,
            vec![
                "app_assignment",
                "device_action",
                "group",
                "group_membership",
                "org_settings",
                "service_token"
            ]
        );
    }

    #[test]
    fn test_only_groups_are_searchable() {
        let registry = registry();
        for name in registry.names() {
            assert_eq!(registry.get(name).unwrap().searchable(), name == "group");
        }
    }

    #[test]
    fn test_parse_body_empty() {
        assert_eq!(parse_body(b"").unwrap(), Value::Null);
        assert_eq!(parse_body(b" \n").unwrap(), Value::Null);
        assert_eq!(parse_body(br#"{"id":"1"}"#).unwrap(), json!({"id": "1"}));
        assert!(parse_body(b"<html>").is_err());
    }

    #[test]
    fn test_str_field_missing() {
        let err = str_field(&json!({"name": "x"}), "id", "group").unwrap_err();
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("Platform Team"), "Platform%20Team");
        assert_eq!(escape("00g1"), "00g1");
    }
}
