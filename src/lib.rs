//! Multi-user line-based TCP chat relay
//!
//! Clients connect over TCP and exchange newline-terminated text lines.
//!
//! # Features
//! - Public chat broadcast to everyone online
//! - Private messages by display name (`to|<name>|<message>`)
//! - Renaming (`rename|<name>`)
//! - Online list (`who`)
//! - Idle sessions dropped after a configurable window
//!
//! # Architecture
//! - `Registry` maps display names to sessions behind a single mutex
//! - Each session has an unbounded `Mailbox` drained by its own write task
//! - One `FanOut` task pushes every public line into every mailbox
//! - Each connection's read loop races input against a `Watchdog`
//!
//! # Example
//! ```ignore
//! use line_chat::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::bind(Config::default()).await.unwrap();
//!     server.run().await;
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod handler;
pub mod liveness;
pub mod mailbox;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcast::{Broadcaster, FanOut};
pub use config::{Config, ConfigError};
pub use error::{AppError, Field, ProtocolError, SendError};
pub use handler::{handle_connection, serve, ConnectionContext};
pub use liveness::Watchdog;
pub use mailbox::{mailbox, Mailbox, MailboxReceiver};
pub use message::{Request, ServerMessage};
pub use registry::{Registry, SessionHandle};
pub use server::Server;
pub use session::{Session, SessionState};
pub use types::SessionId;
