//! Online-user registry
//!
//! Maps display name to [`SessionHandle`]. One mutex guards the whole map.
//! It is held only for in-memory map work and non-blocking mailbox pushes,
//! never across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::AppError;
use crate::mailbox::Mailbox;
use crate::message::ServerMessage;
use crate::types::SessionId;

/// What the registry knows about a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Identity, stable across renames
    pub id: SessionId,
    /// Remote address string
    pub addr: String,
    /// Outbound queue
    pub mailbox: Mailbox,
}

impl SessionHandle {
    /// Queue a line for this session, ignoring a closed mailbox
    pub fn deliver(&self, msg: ServerMessage) {
        if self.mailbox.push(msg).is_err() {
            debug!("Mailbox for {} already closed, line dropped", self.id);
        }
    }
}

/// Shared name → session map
///
/// Cloning is cheap and yields a handle to the same map. Each `Server`
/// owns its own registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<HashMap<String, SessionHandle>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `name`
    ///
    /// Fails with `NameTaken` if the name is in use.
    pub fn insert(&self, name: &str, handle: SessionHandle) -> Result<(), AppError> {
        let mut map = self.inner.lock();
        if map.contains_key(name) {
            return Err(AppError::NameTaken(name.to_string()));
        }
        map.insert(name.to_string(), handle);
        Ok(())
    }

    /// Remove `name` if it is registered to session `id`
    pub fn remove(&self, name: &str, id: SessionId) -> Option<SessionHandle> {
        let mut map = self.inner.lock();
        match map.get(name) {
            Some(handle) if handle.id == id => map.remove(name),
            _ => None,
        }
    }

    /// Move the entry under `old` to `new` in one step
    ///
    /// Fails with `NameTaken` if `new` is registered (the map is left
    /// untouched) or `UnknownUser` if `old` is not.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), AppError> {
        let mut map = self.inner.lock();
        if map.contains_key(new) {
            return Err(AppError::NameTaken(new.to_string()));
        }
        let Some(handle) = map.remove(old) else {
            return Err(AppError::UnknownUser(old.to_string()));
        };
        map.insert(new.to_string(), handle);
        Ok(())
    }

    /// Find the session registered under `name`
    pub fn lookup(&self, name: &str) -> Option<SessionHandle> {
        self.inner.lock().get(name).cloned()
    }

    /// Copy of every `(name, handle)` pair at this instant
    pub fn snapshot(&self) -> Vec<(String, SessionHandle)> {
        self.inner
            .lock()
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect()
    }

    /// Visit every entry while holding the lock
    ///
    /// `f` must not block; mailbox pushes are fine.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &SessionHandle),
    {
        let map = self.inner.lock();
        for (name, handle) in map.iter() {
            f(name, handle);
        }
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nobody is registered
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
