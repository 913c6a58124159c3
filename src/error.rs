//! Error types for the chat relay
//!
//! Defines application-level errors, line grammar errors and mailbox
//! send errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (reported back to the client as a line).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error (fatal unless it is an over-long or non-UTF-8 line)
    #[error("line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    /// Display name already registered
    #[error("name '{0}' is already taken")]
    NameTaken(String),

    /// No session registered under this name
    #[error("user '{0}' does not exist")]
    UnknownUser(String),

    /// Malformed inbound line
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Which part of a directive was empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// `rename|<name>`
    Name,
    /// `to|<target>|...`
    Target,
    /// `to|...|<content>`
    Content,
}

/// Inbound line grammar errors
///
/// These never close the connection; they are reported to the sender only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Directive is missing a required delimiter
    #[error("bad format, use {usage}")]
    MalformedDirective { usage: &'static str },

    /// A required field is present but empty
    #[error("{}", empty_field_message(.0))]
    EmptyField(Field),

    /// Line longer than the configured maximum
    #[error("line too long, the limit is {0} bytes")]
    LineTooLong(usize),

    /// Line bytes are not UTF-8; the line is dropped
    #[error("line is not valid UTF-8, nothing sent")]
    InvalidUtf8,
}

fn empty_field_message(field: &Field) -> &'static str {
    match field {
        Field::Name => "name must not be empty",
        Field::Target => "bad format, use to|<name>|<message>",
        Field::Content => "empty message, nothing sent",
    }
}

/// Message send errors
///
/// Occurs when pushing into a mailbox whose delivery task has exited.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
