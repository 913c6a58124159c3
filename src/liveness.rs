//! Inactivity deadline
//!
//! A [`Watchdog`] is raced against the next inbound line with
//! `tokio::select!`. Every line calls [`Watchdog::touch`], pushing the
//! deadline a full window into the future.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// Resettable inactivity timer
#[derive(Debug)]
pub struct Watchdog {
    window: Duration,
    deadline: Pin<Box<Sleep>>,
}

impl Watchdog {
    /// Start a watchdog that fires `window` from now
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: Box::pin(sleep(window)),
        }
    }

    /// Record activity
    pub fn touch(&mut self) {
        self.deadline.as_mut().reset(Instant::now() + self.window);
    }

    /// Resolves once the window passes without a `touch`
    ///
    /// Cancel safe: dropping the future leaves the deadline in place.
    pub async fn expired(&mut self) {
        self.deadline.as_mut().await;
    }

    /// Length of the inactivity window
    pub fn window(&self) -> Duration {
        self.window
    }
}
