//! Basic type definitions for the chat relay
//!
//! Provides a newtype wrapper for session identity:
//! - `SessionId`: UUID-based identifier that survives renames

use uuid::Uuid;

/// Unique session identifier (newtype pattern)
///
/// Display names change on `rename|`, so the registry uses this to tell
/// whether an entry still belongs to a given session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
