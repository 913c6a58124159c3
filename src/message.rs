//! Line protocol definitions
//!
//! Newline-terminated UTF-8 text in both directions. Inbound lines are
//! parsed into a [`Request`]; outbound lines are [`ServerMessage`] values
//! rendered through `Display` by the mailbox delivery task.
//!
//! | Inbound                 | Meaning                 |
//! |-------------------------|-------------------------|
//! | `who`                   | list online users       |
//! | `rename\|<name>`        | change display name     |
//! | `to\|<name>\|<content>` | private message         |
//! | anything else           | public broadcast        |
//!
//! Only the first two `|` in a `to|` line are significant; the content is
//! taken verbatim and may itself contain `|`. There is no escaping, so a
//! name can never contain `|`.

use std::fmt;
use std::time::Duration;

use crate::error::{AppError, Field, ProtocolError};

const WHO: &str = "who";
const RENAME_PREFIX: &str = "rename|";
const PRIVATE_PREFIX: &str = "to|";
const DELIMITER: char = '|';

/// Usage hint sent back for a malformed `to|` line
pub const PRIVATE_USAGE: &str = "to|<name>|<message>";

/// Client → Server request
///
/// One parsed inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// List everyone currently registered
    Who,
    /// Change own display name
    Rename { name: String },
    /// Send `content` to `target` only
    ///
    /// `content` may be empty here; it is checked after the target lookup
    /// so that an unknown target is reported first.
    Private { target: String, content: String },
    /// Broadcast to everyone, sender included
    Public { content: String },
}

impl Request {
    /// Classify one line (terminator already stripped), first match wins
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if line == WHO {
            return Ok(Request::Who);
        }

        if let Some(rest) = line.strip_prefix(RENAME_PREFIX) {
            // Anything after a further delimiter is ignored
            let name = rest.split(DELIMITER).next().unwrap_or_default();
            if name.is_empty() {
                return Err(ProtocolError::EmptyField(Field::Name));
            }
            return Ok(Request::Rename {
                name: name.to_string(),
            });
        }

        if let Some(rest) = line.strip_prefix(PRIVATE_PREFIX) {
            let Some((target, content)) = rest.split_once(DELIMITER) else {
                return Err(ProtocolError::MalformedDirective {
                    usage: PRIVATE_USAGE,
                });
            };
            if target.is_empty() {
                return Err(ProtocolError::EmptyField(Field::Target));
            }
            return Ok(Request::Private {
                target: target.to_string(),
                content: content.to_string(),
            });
        }

        Ok(Request::Public {
            content: line.to_string(),
        })
    }
}

/// Server → Client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Public chat: `[<addr>]<name>:<content>`
    Public {
        addr: String,
        name: String,
        content: String,
    },
    /// Private message: `[<from>](PM):<content>`
    Private { from: String, content: String },
    /// One `who` entry
    Presence { addr: String, name: String },
    /// A session came online
    Joined { addr: String, name: String },
    /// A session went offline
    Left { addr: String, name: String },
    /// Rename confirmation
    Renamed { name: String },
    /// Terminal notice before an idle session is closed
    TimedOut { idle: Duration },
    /// Error reported to the offending session only
    Error { message: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Public {
                addr,
                name,
                content,
            } => write!(f, "[{}]{}:{}", addr, name, content),
            ServerMessage::Private { from, content } => write!(f, "[{}](PM):{}", from, content),
            ServerMessage::Presence { addr, name } => write!(f, "[{}]{}:online", addr, name),
            ServerMessage::Joined { addr, name } => write!(f, "[{}]{}:joined", addr, name),
            ServerMessage::Left { addr, name } => write!(f, "[{}]{}:left", addr, name),
            ServerMessage::Renamed { name } => write!(f, "name changed to {}", name),
            ServerMessage::TimedOut { idle } => {
                write!(f, "timed out after {:?} of inactivity", idle)
            }
            ServerMessage::Error { message } => f.write_str(message),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let message = match &err {
            AppError::NameTaken(_) | AppError::UnknownUser(_) | AppError::Protocol(_) => {
                err.to_string()
            }
            // Fatal errors are not typically converted (connection closes)
            _ => "internal error".to_string(),
        };
        ServerMessage::Error { message }
    }
}

impl From<ProtocolError> for ServerMessage {
    fn from(err: ProtocolError) -> Self {
        AppError::from(err).into()
    }
}
