//! Identity codec
//!
//! A resource instance is addressed by its [`Identity`]: either an opaque
//! ID assigned by the remote API, or a composite key built from foreign
//! references (`parentID:childID`, `parentID:typeTag:childID`) for
//! relationship resources that have no ID of their own.
//!
//! Composite formats are part of persisted state and must stay stable.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between composite key segments.
pub const DELIMITER: char = ':';

/// Persisted identifier of a resource instance. Empty means absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap a raw identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The empty identity of an absent instance.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Join segments into a composite identity.
///
/// Fails with [`Error::InvalidSegment`] if a segment is empty or contains
/// the delimiter.
pub fn encode<S: AsRef<str>>(segments: &[S]) -> Result<Identity> {
    encode_with(segments, false)
}

/// Split a composite identity, requiring exactly `arity` segments.
///
/// Fails with [`Error::MalformedIdentity`] on any other segment count.
pub fn decode(identity: &str, arity: usize) -> Result<Vec<String>> {
    let segments: Vec<String> = identity.split(DELIMITER).map(str::to_string).collect();
    if segments.len() != arity {
        return Err(Error::MalformedIdentity {
            identity: identity.to_string(),
            expected: arity,
            found: segments.len(),
        });
    }
    Ok(segments)
}

fn encode_with<S: AsRef<str>>(segments: &[S], allow_empty: bool) -> Result<Identity> {
    for (index, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        if segment.contains(DELIMITER) {
            return Err(Error::InvalidSegment {
                index,
                segment: segment.to_string(),
                reason: format!("contains delimiter '{DELIMITER}'"),
            });
        }
        if segment.is_empty() && !allow_empty {
            return Err(Error::InvalidSegment {
                index,
                segment: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
    }

    let joined = segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<&str>>()
        .join(&DELIMITER.to_string());
    Ok(Identity(joined))
}

/// Shape of a composite key for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    names: &'static [&'static str],
    allow_empty: bool,
}

impl KeySpec {
    /// Key with the given segment names, all required non-empty.
    pub const fn new(names: &'static [&'static str]) -> Self {
        Self {
            names,
            allow_empty: false,
        }
    }

    /// Permit empty segments.
    pub const fn allowing_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Number of segments in the key.
    pub fn arity(&self) -> usize {
        self.names.len()
    }

    /// Segment names, in order.
    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// Human-readable format, e.g. `{group_id}:{user_id}`.
    pub fn format_hint(&self) -> String {
        self.names
            .iter()
            .map(|n| format!("{{{n}}}"))
            .collect::<Vec<_>>()
            .join(&DELIMITER.to_string())
    }

    /// Encode segments, checking arity and content.
    pub fn encode<S: AsRef<str>>(&self, segments: &[S]) -> Result<Identity> {
        if segments.len() != self.arity() {
            let joined: Vec<&str> = segments.iter().map(|s| s.as_ref()).collect();
            return Err(Error::MalformedIdentity {
                identity: joined.join(&DELIMITER.to_string()),
                expected: self.arity(),
                found: segments.len(),
            });
        }
        encode_with(segments, self.allow_empty)
    }

    /// Decode an identity into its key, checking arity and content.
    pub fn decode(&self, identity: &Identity) -> Result<CompositeKey> {
        let segments = decode(identity.as_str(), self.arity())?;
        if !self.allow_empty
            && let Some(index) = segments.iter().position(String::is_empty)
        {
            return Err(Error::InvalidSegment {
                index,
                segment: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(CompositeKey {
            spec: *self,
            segments,
        })
    }
}

/// A decoded composite key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    spec: KeySpec,
    segments: Vec<String>,
}

impl CompositeKey {
    /// Segment by position.
    pub fn segment(&self, index: usize) -> &str {
        self.segments.get(index).map_or("", String::as_str)
    }

    /// Segment by name as declared in the [`KeySpec`].
    pub fn get(&self, name: &str) -> Option<&str> {
        self.spec
            .names()
            .iter()
            .position(|n| *n == name)
            .map(|i| self.segment(i))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }
}

/// How a resource kind derives its identity. Fixed per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityScheme {
    /// The remote API assigns an ID on creation; used verbatim.
    Opaque,
    /// Identity is a composite key built from configuration.
    Composite(KeySpec),
}

impl IdentityScheme {
    /// Validate a caller-supplied identity string (e.g. for import).
    pub fn parse(&self, raw: &str) -> Result<Identity> {
        let raw = raw.trim();
        match self {
            IdentityScheme::Opaque => {
                if raw.is_empty() {
                    return Err(Error::InvalidSegment {
                        index: 0,
                        segment: String::new(),
                        reason: "must not be empty".to_string(),
                    });
                }
                Ok(Identity::new(raw))
            }
            IdentityScheme::Composite(spec) => {
                let identity = Identity::new(raw);
                spec.decode(&identity)?;
                Ok(identity)
            }
        }
    }
}
