use super::{escape, object_fields, parse_body};
use reconcile::{
    FieldMap, FieldRules, Identity, IdentityScheme, KeySpec, Request, ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembershipConfig {
    pub group_id: String,
    pub user_id: String,
}

const KEY: KeySpec = KeySpec::new(&["group_id", "user_id"]);

/// A user's membership in a group. The API has no membership object, so
/// the identity is the `{group_id}:{user_id}` pair.
pub struct GroupMembershipKind;

fn member_path(group_id: &str, user_id: &str) -> String {
    format!("/api/v1/groups/{}/users/{}", escape(group_id), escape(user_id))
}

impl ResourceKind for GroupMembershipKind {
    type Config = GroupMembershipConfig;

    fn name(&self) -> &'static str {
        "group_membership"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Composite(KEY)
    }

    fn field_rules(&self) -> FieldRules {
        FieldRules {
            create_only: &["group_id", "user_id"],
            ..FieldRules::default()
        }
    }

    fn key_segments(&self, config: &GroupMembershipConfig) -> Vec<String> {
        vec![config.group_id.clone(), config.user_id.clone()]
    }

    fn create_request(&self, config: &GroupMembershipConfig) -> Result<Request> {
        Ok(Request::put(member_path(&config.group_id, &config.user_id), None))
    }

    /// Membership is read from the user's side; a group's member list
    /// is paged.
    fn read_request(&self, identity: &Identity) -> Result<Request> {
        let key = KEY.decode(identity)?;
        Ok(Request::get(format!(
            "/api/v1/users/{}/groups",
            escape(key.segment(1))
        )))
    }

    fn decode_observed(&self, identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        let key = KEY.decode(identity)?;
        let Value::Array(groups) = parse_body(body)? else {
            return Ok(None);
        };
        let member = groups
            .iter()
            .any(|group| group["id"].as_str() == Some(key.segment(0)));
        Ok(member.then(|| {
            object_fields(json!({ "group_id": key.segment(0), "user_id": key.segment(1) }))
        }))
    }

    fn delete_request(&self, identity: &Identity) -> Result<Option<Request>> {
        let key = KEY.decode(identity)?;
        Ok(Some(Request::delete(member_path(key.segment(0), key.segment(1)))))
    }
}
