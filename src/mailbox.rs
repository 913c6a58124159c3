//! Per-session outbound queue
//!
//! Capacity policy: unbounded. Pushing never waits, which is what lets the
//! broadcaster and `who` push while holding the registry lock. Memory is the
//! only bound.
//!
//! Close contract: [`Mailbox::close`] enqueues a marker. The delivery task
//! writes everything queued ahead of the marker, shuts the writer down and
//! exits, dropping the receiver. Pushes after that fail with
//! [`SendError::ChannelClosed`], which callers treat as a no-op.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedWrite, LinesCodec};
use tracing::debug;

use crate::error::{AppError, SendError};
use crate::message::ServerMessage;
use crate::types::SessionId;

#[derive(Debug)]
enum Envelope {
    Line(ServerMessage),
    Close,
}

/// Sending side, cloned into the registry
#[derive(Debug, Clone)]
pub struct Mailbox {
    sender: mpsc::UnboundedSender<Envelope>,
}

/// Receiving side, owned by the delivery task
#[derive(Debug)]
pub struct MailboxReceiver {
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

/// Create a connected mailbox pair
pub fn mailbox() -> (Mailbox, MailboxReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Mailbox { sender }, MailboxReceiver { receiver })
}

impl Mailbox {
    /// Queue a line for delivery
    ///
    /// Returns an error if the delivery task has already exited.
    pub fn push(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .send(Envelope::Line(msg))
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Ask the delivery task to flush what is queued and stop
    pub fn close(&self) {
        let _ = self.sender.send(Envelope::Close);
    }
}

impl MailboxReceiver {
    /// Next queued line, or `None` once closed
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        match self.receiver.recv().await {
            Some(Envelope::Line(msg)) => Some(msg),
            Some(Envelope::Close) | None => None,
        }
    }

    /// Drain the mailbox into `writer`, one newline-terminated line each
    ///
    /// Runs until the mailbox is closed or a write fails, then shuts the
    /// writer down. Returns the number of lines written.
    pub async fn deliver<W>(mut self, session_id: SessionId, writer: W) -> Result<usize, AppError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut sink = FramedWrite::new(writer, LinesCodec::new());
        let mut delivered = 0;

        while let Some(msg) = self.recv().await {
            if let Err(e) = sink.send(msg.to_string()).await {
                debug!("Write failed for {}, ending delivery task", session_id);
                return Err(e.into());
            }
            delivered += 1;
        }

        debug!(
            "Delivery task for {} ending after {} lines",
            session_id, delivered
        );

        // Flush and shut down the write half
        if let Err(e) = SinkExt::<String>::close(&mut sink).await {
            debug!("Shutting down writer for {} failed: {}", session_id, e);
        }

        Ok(delivered)
    }
}
