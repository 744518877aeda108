use super::{escape, object_fields, parse_body, str_field};
use reconcile::{
    CreatePolicy, FieldMap, FieldRules, Identity, IdentityScheme, Request, ResourceKind, Result,
    Searchable,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Directory group. Names are unique remotely but the API doesn't
/// enforce it on create, so a name check runs first.
pub struct GroupKind;

impl GroupKind {
    fn profile(config: &GroupConfig) -> Value {
        json!({ "profile": { "name": config.name, "description": config.description } })
    }

    /// Flatten an API group object into fields.
    fn fields(group: &Value) -> Result<(Identity, FieldMap)> {
        let id = str_field(group, "id", "group")?;
        let fields = object_fields(json!({
            "id": id,
            "name": group["profile"]["name"],
            "description": group["profile"]["description"],
            "created": group["created"],
            "last_updated": group["lastUpdated"],
        }));
        Ok((Identity::new(id), fields))
    }
}

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
            computed: &["id", "created", "last_updated"],
            ..FieldRules::default()
        }
    }

    fn precheck_request(&self, config: &GroupConfig) -> Result<Option<Request>> {
        self.search_request(&config.name).map(Some)
    }

    /// The name search matches prefixes; only an exact name conflicts.
    fn find_conflict(&self, config: &GroupConfig, body: &[u8]) -> Result<Option<String>> {
        Ok(self
            .decode_matches(body)?
            .into_iter()
            .find(|(_, fields)| self.has_name(fields, &config.name))
            .map(|(id, _)| id.to_string()))
    }

    fn create_request(&self, config: &GroupConfig) -> Result<Request> {
        Ok(Request::post("/api/v1/groups", Self::profile(config)))
    }

    fn identity_from_response(&self, body: &[u8]) -> Result<Identity> {
        Ok(Identity::new(str_field(&parse_body(body)?, "id", "group")?))
    }

    fn read_request(&self, identity: &Identity) -> Result<Request> {
        Ok(Request::get(format!("/api/v1/groups/{}", escape(identity.as_str()))))
    }

    fn decode_observed(&self, _identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        let (_, fields) = Self::fields(&parse_body(body)?)?;
        Ok(Some(fields))
    }

    fn update_request(&self, identity: &Identity, config: &GroupConfig) -> Result<Option<Request>> {
        Ok(Some(Request::put(
            format!("/api/v1/groups/{}", escape(identity.as_str())),
            Some(Self::profile(config)),
        )))
    }

    fn delete_request(&self, identity: &Identity) -> Result<Option<Request>> {
        Ok(Some(Request::delete(format!(
            "/api/v1/groups/{}",
            escape(identity.as_str())
        ))))
    }
}

impl Searchable for GroupKind {
    fn search_request(&self, name: &str) -> Result<Request> {
        Ok(Request::get(format!("/api/v1/groups?q={}", escape(name))))
    }

    /// Groups in the order the API returned them.
    fn decode_matches(&self, body: &[u8]) -> Result<Vec<(Identity, FieldMap)>> {
        let Value::Array(groups) = parse_body(body)? else {
            return Ok(Vec::new());
        };
        groups.iter().map(Self::fields).collect()
    }
}
