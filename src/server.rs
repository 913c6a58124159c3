//! Connection acceptor
//!
//! A `Server` owns the listening socket, the registry, and the publish
//! side of the broadcaster. `run` spawns the fan-out task and then one
//! handler task per accepted connection.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::broadcast::{self, Broadcaster, FanOut};
use crate::config::Config;
use crate::error::AppError;
use crate::handler::{handle_connection, ConnectionContext};
use crate::registry::Registry;

/// The chat relay
pub struct Server {
    listener: TcpListener,
    config: Config,
    registry: Registry,
    broadcaster: Broadcaster,
    fan_out: FanOut,
}

impl Server {
    /// Bind the listener described by `config`
    pub async fn bind(config: Config) -> Result<Self, AppError> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let registry = Registry::new();
        let (broadcaster, fan_out) = broadcast::channel(registry.clone());

        Ok(Self {
            listener,
            config,
            registry,
            broadcaster,
            fan_out,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to this server's registry
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Accept connections forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Sessions already running are left to end on their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            config,
            registry,
            broadcaster,
            fan_out,
        } = self;

        tokio::spawn(fan_out.run());

        let ctx = ConnectionContext {
            registry,
            broadcaster,
            idle_timeout: config.idle_timeout(),
            max_line_length: config.max_line_length,
        };

        if let Ok(addr) = listener.local_addr() {
            info!("Chat relay listening on {}", addr);
        }
        debug!(
            "Idle timeout {:?}, max line length {}",
            ctx.idle_timeout, ctx.max_line_length
        );

        tokio::pin!(shutdown);

        // Connection accept loop
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("New connection from {}", addr);
                        let ctx = ctx.clone();

                        // Spawn handler task for each connection
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, ctx).await {
                                error!("Connection handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                _ = &mut shutdown => {
                    info!("Chat relay no longer accepting connections");
                    break;
                }
            }
        }

        let registry = &ctx.registry;
        if !registry.is_empty() {
            info!("{} sessions still connected", registry.len());
            for (name, handle) in registry.snapshot() {
                debug!("Still connected: '{}' from {} ({})", name, handle.addr, handle.id);
            }
        }
    }
}
