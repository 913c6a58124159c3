//! Server-side state for one connected client
//!
//! A session moves `Connecting → Online → (Offline | TimedOut)`. It holds
//! handles to the server's registry and broadcaster so it can register
//! itself, rename itself, and publish.

use std::time::Duration;

use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::error::{AppError, Field, ProtocolError};
use crate::mailbox::Mailbox;
use crate::message::{Request, ServerMessage};
use crate::registry::{Registry, SessionHandle};
use crate::types::SessionId;

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not yet registered
    Connecting,
    /// Registered and accepting lines
    Online,
    /// Disconnected by the peer or a read fault
    Offline,
    /// Dropped for inactivity
    TimedOut,
}

/// One connected client
#[derive(Debug)]
pub struct Session {
    /// Identity, stable across renames
    pub id: SessionId,
    name: String,
    addr: String,
    state: SessionState,
    mailbox: Mailbox,
    registry: Registry,
    broadcaster: Broadcaster,
}

impl Session {
    /// Create a session whose name defaults to its remote address
    pub fn new(
        id: SessionId,
        addr: String,
        mailbox: Mailbox,
        registry: Registry,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            id,
            name: addr.clone(),
            addr,
            state: SessionState::Connecting,
            mailbox,
            registry,
            broadcaster,
        }
    }

    /// Current display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            addr: self.addr.clone(),
            mailbox: self.mailbox.clone(),
        }
    }

    /// Queue a line for this session only
    pub fn send(&self, msg: ServerMessage) {
        if self.mailbox.push(msg).is_err() {
            debug!("Mailbox for {} already closed, line dropped", self.id);
        }
    }

    /// Register and announce the session
    ///
    /// On a name collision the session is told why, its mailbox is closed
    /// and it ends up `Offline` without ever being registered.
    pub fn join(&mut self) -> Result<(), AppError> {
        if let Err(e) = self.registry.insert(&self.name, self.handle()) {
            info!("Session {} rejected: {}", self.id, e);
            self.send(ServerMessage::Error {
                message: e.to_string(),
            });
            self.mailbox.close();
            self.state = SessionState::Offline;
            return Err(e);
        }

        self.state = SessionState::Online;
        info!("Session {} online as '{}'", self.id, self.name);
        debug!("Online sessions: {}", self.registry.len());

        self.broadcaster.publish(ServerMessage::Joined {
            addr: self.addr.clone(),
            name: self.name.clone(),
        });
        Ok(())
    }

    /// Peer went away: deregister, announce, close the mailbox
    pub fn leave(&mut self) {
        if self.state != SessionState::Online {
            return;
        }
        self.go_offline(SessionState::Offline);
    }

    /// Inactivity window elapsed: notify this session only, then go offline
    pub fn time_out(&mut self, window: Duration) {
        if self.state != SessionState::Online {
            return;
        }
        info!("Session {} ('{}') timed out", self.id, self.name);
        self.send(ServerMessage::TimedOut { idle: window });
        self.go_offline(SessionState::TimedOut);
    }

    fn go_offline(&mut self, state: SessionState) {
        if self.registry.remove(&self.name, self.id).is_some() {
            self.broadcaster.publish(ServerMessage::Left {
                addr: self.addr.clone(),
                name: self.name.clone(),
            });
        }
        self.mailbox.close();
        self.state = state;

        info!("Session {} ('{}') offline", self.id, self.name);
        debug!("Online sessions: {}", self.registry.len());
    }

    /// Interpret one inbound line (terminator already stripped)
    ///
    /// Errors are reported to this session only.
    pub fn dispatch(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }

        let result = match Request::parse(line) {
            Ok(Request::Who) => {
                self.handle_who();
                Ok(())
            }
            Ok(Request::Rename { name }) => self.handle_rename(name),
            Ok(Request::Private { target, content }) => self.handle_private(&target, content),
            Ok(Request::Public { content }) => {
                self.handle_public(content);
                Ok(())
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            debug!("Session {} request failed: {}", self.id, e);
            self.send(e.into());
        }
    }

    /// Handle `who`
    fn handle_who(&self) {
        self.registry.for_each(|name, handle| {
            self.send(ServerMessage::Presence {
                addr: handle.addr.clone(),
                name: name.to_string(),
            });
        });
    }

    /// Handle `rename|<name>`
    fn handle_rename(&mut self, new_name: String) -> Result<(), AppError> {
        self.registry.rename(&self.name, &new_name)?;

        info!(
            "Session {} renamed '{}' -> '{}'",
            self.id, self.name, new_name
        );
        self.name = new_name;
        self.send(ServerMessage::Renamed {
            name: self.name.clone(),
        });
        Ok(())
    }

    /// Handle `to|<target>|<content>`
    fn handle_private(&self, target: &str, content: String) -> Result<(), AppError> {
        let Some(recipient) = self.registry.lookup(target) else {
            return Err(AppError::UnknownUser(target.to_string()));
        };

        if content.is_empty() {
            return Err(ProtocolError::EmptyField(Field::Content).into());
        }

        recipient.deliver(ServerMessage::Private {
            from: self.name.clone(),
            content,
        });
        Ok(())
    }

    /// Handle public chat
    fn handle_public(&self, content: String) {
        self.broadcaster.publish(ServerMessage::Public {
            addr: self.addr.clone(),
            name: self.name.clone(),
            content,
        });
    }
}
