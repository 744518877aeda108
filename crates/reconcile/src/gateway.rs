//! Remote gateway interface and an in-memory mock.
//!
//! The [`Gateway`] trait is the only way the reconciler talks to the
//! remote API: method + path + optional body in, raw bytes or a typed
//! failure out. Transport, authentication and retries of individual
//! requests belong to the implementation.
//!
//! # Testing
//!
//! Use [`MockGateway`] to script responses without network access:
//!
//! ```
//! use reconcile::gateway::{Gateway, GatewayError, Method, MockGateway};
//!
//! let mock = MockGateway::new();
//! mock.respond(Method::Get, "/api/v1/groups/00g1", r#"{"id":"00g1"}"#);
//!
//! let body = mock.request(Method::Get, "/api/v1/groups/00g1", None).unwrap();
//! assert_eq!(body, br#"{"id":"00g1"}"#);
//!
//! let missing = mock.request(Method::Get, "/api/v1/groups/nope", None);
//! assert!(matches!(missing, Err(GatewayError::NotFound)));
//! ```

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// HTTP method of a gateway request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request built by a resource kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    /// Send this request through a gateway, encoding the JSON body.
    pub fn send(&self, gateway: &dyn Gateway) -> Result<Vec<u8>, GatewayError> {
        let body = match &self.body {
            Some(value) => Some(serde_json::to_vec(value).map_err(|e| GatewayError::Fatal {
                message: format!("could not encode request body: {e}"),
                status: None,
            })?),
            None => None,
        };
        log::trace!("{} {}", self.method, self.path);
        gateway.request(self.method, &self.path, body.as_deref())
    }
}

/// Failure reported by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// HTTP 404 or the API's equivalent.
    #[error("not found")]
    NotFound,

    /// Network error, timeout, rate limit or 5xx.
    #[error("transient: {message}")]
    Transient {
        message: String,
        status: Option<u16>,
    },

    /// Any other rejection.
    #[error("fatal: {message}")]
    Fatal {
        message: String,
        status: Option<u16>,
    },
}

impl GatewayError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            status: None,
        }
    }

    pub fn fatal(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Fatal {
            message: message.into(),
            status,
        }
    }
}

/// The remote REST API as seen by the reconciler.
///
/// Implementations must be safe to share: the reconciler holds no state
/// of its own and may be used from many threads by the orchestrator.
pub trait Gateway: Send + Sync {
    /// Perform one request and return the raw response body.
    fn request(&self, method: Method, path: &str, body: Option<&[u8]>)
    -> Result<Vec<u8>, GatewayError>;
}

/// A request observed by [`MockGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

type Route = (Method, String);
type Reply = Result<Vec<u8>, GatewayError>;

#[derive(Debug, Default)]
struct MockState {
    /// Sticky replies, returned on every matching call.
    routes: HashMap<Route, Reply>,
    /// One-shot replies, consumed before sticky ones.
    queued: HashMap<Route, VecDeque<Reply>>,
    calls: Vec<RecordedCall>,
}

/// In-memory gateway for tests.
///
/// Unmatched routes answer [`GatewayError::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// Create a new mock with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Answer every call to `method path` with `body`.
    pub fn respond(&self, method: Method, path: &str, body: &str) {
        self.set(method, path, Ok(body.as_bytes().to_vec()));
    }

    /// Answer every call to `method path` with `error`.
    pub fn fail(&self, method: Method, path: &str, error: GatewayError) {
        self.set(method, path, Err(error));
    }

    /// Set the sticky reply for a route.
    pub fn set(&self, method: Method, path: &str, reply: Reply) {
        self.lock().routes.insert((method, path.to_string()), reply);
    }

    /// Remove the sticky reply for a route, so it answers not found.
    pub fn clear(&self, method: Method, path: &str) {
        self.lock().routes.remove(&(method, path.to_string()));
    }

    /// Queue a one-shot reply; queued replies are used in order.
    pub fn enqueue(&self, method: Method, path: &str, reply: Reply) {
        self.lock()
            .queued
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of calls made to `method path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

impl Gateway for MockGateway {
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Vec<u8>, GatewayError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            method,
            path: path.to_string(),
            body: body.map(|b| String::from_utf8_lossy(b).to_string()),
        });

        let route = (method, path.to_string());
        if let Some(reply) = state.queued.get_mut(&route).and_then(VecDeque::pop_front) {
            return reply;
        }
        state
            .routes
            .get(&route)
            .cloned()
            .unwrap_or(Err(GatewayError::NotFound))
    }
}
