//! Type-safe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix for generated session identifiers.
pub const SESSION_ID_PREFIX: &str = "session-";

/// Identifier of one chat session.
///
/// Generated from a monotonically increasing counter (see
/// [`SessionId::from_seq`]) and never reused, so a deleted session's stale
/// reverse-lookup entry can never collide with a newer session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a SessionId from an arbitrary string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the SessionId for sequence number `seq`.
    pub fn from_seq(seq: u64) -> Self {
        Self(format!("{SESSION_ID_PREFIX}{seq}"))
    }

    /// Returns the sequence number if this ID was generated by `from_seq`.
    pub fn seq(&self) -> Option<u64> {
        self.0
            .strip_prefix(SESSION_ID_PREFIX)
            .and_then(|s| s.parse().ok())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque identifier naming one spawned agent subprocess.
///
/// This is the unit of event routing: every process event carries one, and
/// the session router resolves it to the owning session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

impl ProcessId {
    /// Creates a ProcessId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns true if no process has been assigned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProcessId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProcessId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProcessId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
