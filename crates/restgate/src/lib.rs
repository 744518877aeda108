//! # Restgate
//!
//! Blocking HTTP implementation of [`reconcile::Gateway`].
//!
//! Requests go to `{base_url}{path}` with a token `Authorization` header.
//! Responses are classified the way the reconciler expects:
//!
//! - `404` becomes [`GatewayError::NotFound`]
//! - `408`, `429`, `5xx` and network failures become [`GatewayError::Transient`]
//! - every other non-success status becomes [`GatewayError::Fatal`]
//!
//! # Example
//!
//! ```no_run
//! use reconcile::{Gateway, Method};
//! use restgate::{GatewayConfig, HttpGateway};
//!
//! let gateway = HttpGateway::new(&GatewayConfig::new("https://example.okta.com").with_token("00abc"));
//! let body = gateway.request(Method::Get, "/api/v1/groups?q=eng", None).unwrap();
//! println!("{}", String::from_utf8_lossy(&body));
//! ```

use reconcile::{Gateway, GatewayError, Method};
use serde_json::Value;
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default authorization scheme (`Authorization: SSWS <token>`).
pub const DEFAULT_AUTH_SCHEME: &str = "SSWS";

const JSON: &str = "application/json";

const USER_AGENT: &str = concat!("idsync/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    /// API token; requests are sent unauthenticated without one.
    pub token: Option<String>,
    pub auth_scheme: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_auth_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.auth_scheme = scheme.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Gateway backed by a `ureq` agent.
pub struct HttpGateway {
    agent: ureq::Agent,
    base_url: String,
    authorization: Option<String>,
}

impl HttpGateway {
    /// Create a gateway from connection settings.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization: config
                .token
                .as_ref()
                .map(|token| format!("{} {}", config.auth_scheme, token)),
        }
    }

    /// Get the base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join an API path onto the base URL.
    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Add the headers every request carries.
    fn headers<B>(&self, builder: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let builder = builder
            .header("Accept", JSON)
            .header("User-Agent", USER_AGENT);
        match &self.authorization {
            Some(auth) => builder.header("Authorization", auth.as_str()),
            None => builder,
        }
    }

    fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let with_body = match method {
            Method::Get => return self.headers(self.agent.get(url)).call(),
            Method::Delete => return self.headers(self.agent.delete(url)).call(),
            Method::Post => self.headers(self.agent.post(url)),
            Method::Put => self.headers(self.agent.put(url)),
            Method::Patch => self.headers(self.agent.patch(url)),
        };
        match body {
            Some(bytes) => with_body.header("Content-Type", JSON).send(bytes),
            None => with_body.send_empty(),
        }
    }
}

impl Gateway for HttpGateway {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Vec<u8>, GatewayError> {
        let url = self.url(path);
        log::debug!("{method} {url}");

        let mut response = self
            .send(method, &url, body)
            .map_err(|e| classify_transport(&e))?;
        let status = response.status().as_u16();
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| classify_transport(&e))?;

        log::trace!("{method} {url} -> {status} ({} bytes)", bytes.len());
        classify_status(status, &bytes)?;
        Ok(bytes)
    }
}

/// Map an HTTP status to the gateway taxonomy. `Ok` for 2xx and 3xx.
pub fn classify_status(status: u16, body: &[u8]) -> Result<(), GatewayError> {
    match status {
        200..=399 => Ok(()),
        404 => Err(GatewayError::NotFound),
        408 | 429 | 500..=599 => Err(GatewayError::Transient {
            message: error_summary(status, body),
            status: Some(status),
        }),
        _ => Err(GatewayError::fatal(error_summary(status, body), Some(status))),
    }
}

/// Map a transport failure (no HTTP status) to the gateway taxonomy.
pub fn classify_transport(err: &ureq::Error) -> GatewayError {
    match err {
        ureq::Error::StatusCode(status) => {
            classify_status(*status, &[]).err().unwrap_or_else(|| {
                GatewayError::fatal(format!("unexpected HTTP {status}"), Some(*status))
            })
        }
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => GatewayError::transient(err.to_string()),
        other => GatewayError::fatal(other.to_string(), None),
    }
}

/// Human-readable message from an API error body.
fn error_summary(status: u16, body: &[u8]) -> String {
    let detail = serde_json::from_slice::<Value>(body).ok().and_then(|v| {
        ["errorSummary", "message", "error_description", "error"]
            .iter()
            .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    match detail {
        Some(detail) => format!("HTTP {status}: {detail}"),
        None => format!("HTTP {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let gateway = HttpGateway::new(&GatewayConfig::new("https://example.okta.com/"));
        assert_eq!(gateway.base_url(), "https://example.okta.com");
        assert_eq!(
            gateway.url("/api/v1/groups"),
            "https://example.okta.com/api/v1/groups"
        );
        assert_eq!(
            gateway.url("api/v1/groups"),
            "https://example.okta.com/api/v1/groups"
        );
    }

    #[test]
    fn test_authorization_header() {
        let config = GatewayConfig::new("https://example.okta.com").with_token("00abc");
        let gateway = HttpGateway::new(&config);
        assert_eq!(gateway.authorization.as_deref(), Some("SSWS 00abc"));

        let bearer = HttpGateway::new(&config.with_auth_scheme("Bearer"));
        assert_eq!(bearer.authorization.as_deref(), Some("Bearer 00abc"));

        let anonymous = HttpGateway::new(&GatewayConfig::new("https://example.okta.com"));
        assert!(anonymous.authorization.is_none());
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(200, b"").is_ok());
        assert!(classify_status(204, b"").is_ok());
        assert_eq!(classify_status(404, b""), Err(GatewayError::NotFound));
        assert!(matches!(
            classify_status(429, b""),
            Err(GatewayError::Transient { status: Some(429), .. })
        ));
        assert!(matches!(
            classify_status(503, b""),
            Err(GatewayError::Transient { status: Some(503), .. })
        ));
        assert!(matches!(
            classify_status(403, b""),
            Err(GatewayError::Fatal { status: Some(403), .. })
        ));
    }

    #[test]
    fn test_error_summary_from_body() {
        let body = br#"{"errorCode":"E0000001","errorSummary":"Api validation failed: name"}"#;
        match classify_status(400, body) {
            Err(GatewayError::Fatal { message, .. }) => {
                assert_eq!(message, "HTTP 400: Api validation failed: name");
            }
            other => panic!("expected fatal, got {other:?}"),
        }
        assert_eq!(error_summary(500, b"not json"), "HTTP 500");
    }

    #[test]
    fn test_classify_transport() {
        assert!(matches!(
            classify_transport(&ureq::Error::HostNotFound),
            GatewayError::Transient { .. }
        ));
        assert!(matches!(
            classify_transport(&ureq::Error::ConnectionFailed),
            GatewayError::Transient { .. }
        ));
        assert_eq!(
            classify_transport(&ureq::Error::StatusCode(404)),
            GatewayError::NotFound
        );
        assert!(matches!(
            classify_transport(&ureq::Error::BadUri("nope".to_string())),
            GatewayError::Fatal { .. }
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::new("https://example.okta.com");
        assert_eq!(config.auth_scheme, "SSWS");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.token.is_none());
    }
}
