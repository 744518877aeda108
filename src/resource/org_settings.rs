use super::{object_fields, parse_body, str_field};
use reconcile::{
    DeletePolicy, FieldMap, FieldRules, Identity, IdentityScheme, Request, ResourceKind, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const PATH: &str = "/api/v1/org/settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgSettingsConfig {
    pub session_max_lifetime_minutes: u32,
    pub session_idle_timeout_minutes: u32,
    pub mfa_required: bool,
    pub default_locale: String,
}

/// Values the service ships with; "deleting" the settings restores these.
impl Default for OrgSettingsConfig {
    fn default() -> Self {
        Self {
            session_max_lifetime_minutes: 120,
            session_idle_timeout_minutes: 60,
            mfa_required: false,
            default_locale: "en-US".to_string(),
        }
    }
}

/// Organization-wide settings. Exactly one exists per org and it can't be
/// removed, so create and update both write it and delete resets it.
pub struct OrgSettingsKind;

impl OrgSettingsKind {
    /// Request body in the API's camelCase layout.
    fn body(config: &OrgSettingsConfig) -> Value {
        json!({
            "sessionMaxLifetimeMinutes": config.session_max_lifetime_minutes,
            "sessionIdleTimeoutMinutes": config.session_idle_timeout_minutes,
            "mfaRequired": config.mfa_required,
            "defaultLocale": config.default_locale,
        })
    }
}

impl ResourceKind for OrgSettingsKind {
    type Config = OrgSettingsConfig;

    fn name(&self) -> &'static str {
        "org_settings"
    }

    fn identity_scheme(&self) -> IdentityScheme {
        IdentityScheme::Opaque
    }

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::ResetToDefault
    }

    fn field_rules(&self) -> FieldRules {
        FieldRules {
            computed: &["org_id", "last_updated"],
            ..FieldRules::default()
        }
    }

    fn create_request(&self, config: &OrgSettingsConfig) -> Result<Request> {
        Ok(Request::put(PATH, Some(Self::body(config))))
    }

    fn identity_from_response(&self, body: &[u8]) -> Result<Identity> {
        Ok(Identity::new(str_field(&parse_body(body)?, "orgId", "org_settings")?))
    }

    fn read_request(&self, _identity: &Identity) -> Result<Request> {
        Ok(Request::get(PATH))
    }

    fn decode_observed(&self, _identity: &Identity, body: &[u8]) -> Result<Option<FieldMap>> {
        let settings = parse_body(body)?;
        Ok(Some(object_fields(json!({
            "org_id": settings["orgId"],
            "session_max_lifetime_minutes": settings["sessionMaxLifetimeMinutes"],
            "session_idle_timeout_minutes": settings["sessionIdleTimeoutMinutes"],
            "mfa_required": settings["mfaRequired"],
            "default_locale": settings["defaultLocale"],
            "last_updated": settings["lastUpdated"],
        }))))
    }

    fn update_request(
        &self,
        _identity: &Identity,
        config: &OrgSettingsConfig,
    ) -> Result<Option<Request>> {
        self.create_request(config).map(Some)
    }

    fn delete_request(&self, _identity: &Identity) -> Result<Option<Request>> {
        self.create_request(&OrgSettingsConfig::default()).map(Some)
    }
}
