use super::{escape, object_fields, parse_body, str_field};
use reconcile::{FieldMap, FieldRules, Identity, IdentityScheme, Request, ResourceKind, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTokenConfig {
    pub name: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

/// API token for automation. The secret is only in the create response;
/// it's kept from then on and never read again.
pub struct ServiceTokenKind;

impl ResourceKind for ServiceTokenKind {
    type Config = ServiceTokenConfig;

    fn name(&self) -> &'static str {
        "service_token"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Opaque
    }

    fn field_rules(&self) -> FieldRules {
        FieldRules {
            computed: &["id", "created", "expires_at"],
            create_only: &["name", "scopes"],
            sensitive: &["token"],
        }
    }

    fn create_request(&self, config: &ServiceTokenConfig) -> Result<Request> {
        Ok(Request::post("/api/v1/tokens", serde_json::to_value(config)?))
    }

    fn identity_from_response(&self, body: &[u8]) -> Result<Identity> {
        Ok(Identity::new(str_field(&parse_body(body)?, "id", "service_token")?))
    }

    fn secrets_from_response(&self, body: &[u8]) -> Result<FieldMap> {
        let token = str_field(&parse_body(body)?, "token", "service_token")?;
        Ok(FieldMap::from([("token".to_string(), Value::String(token))]))
    }

    fn read_request(&self, identity: &Identity) -> Result<Request> {
        Ok(Request::get(format!("/api/v1/tokens/{}", escape(identity.as_str()))))
    }

    fn decode_observed(&self, _identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        let token = parse_body(body)?;
        // Sorted so it compares equal to the configured set
        let scopes: Option<BTreeSet<&str>> = token["scopes"]
            .as_array()
            .map(|scopes| scopes.iter().filter_map(Value::as_str).collect());
        Ok(Some(object_fields(json!({
            "id": token["id"],
            "name": token["name"],
            "scopes": scopes,
            "created": token["created"],
            "expires_at": token["expiresAt"],
        }))))
    }

    fn delete_request(&self, identity: &Identity) -> Result<Option<Request>> {
        Ok(Some(Request::delete(format!(
            "/api/v1/tokens/{}",
            escape(identity.as_str())
        ))))
    }
}
