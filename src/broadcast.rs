//! Public fan-out
//!
//! [`Broadcaster`] is the cheap, cloneable publish side. [`FanOut`] is the
//! single task that drains the queue and pushes each line into every
//! registered mailbox under the registry lock.
//!
//! Delivery is to whoever is registered when the line is fanned out, not
//! when it was published; late joiners miss earlier lines.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::ServerMessage;
use crate::registry::Registry;

/// Publish handle for public lines
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Broadcaster {
    /// Queue a line for every registered session
    ///
    /// Never blocks. A line published after the fan-out task has stopped
    /// is dropped.
    pub fn publish(&self, msg: ServerMessage) {
        if self.sender.send(msg).is_err() {
            debug!("Fan-out task stopped, broadcast dropped");
        }
    }
}

/// The fan-out task
pub struct FanOut {
    receiver: mpsc::UnboundedReceiver<ServerMessage>,
    registry: Registry,
}

/// Create a broadcaster and the task that serves it
pub fn channel(registry: Registry) -> (Broadcaster, FanOut) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Broadcaster { sender }, FanOut { receiver, registry })
}

impl FanOut {
    /// Run until every `Broadcaster` handle is dropped
    ///
    /// Lines go out one at a time, so all recipients see broadcasts in
    /// publish order.
    pub async fn run(mut self) {
        info!("Broadcast fan-out started");

        while let Some(msg) = self.receiver.recv().await {
            let mut recipients = 0usize;
            self.registry.for_each(|_, handle| {
                handle.deliver(msg.clone());
                recipients += 1;
            });
            debug!("Broadcast delivered to {} sessions", recipients);
        }

        info!("Broadcast fan-out shutting down");
    }
}
