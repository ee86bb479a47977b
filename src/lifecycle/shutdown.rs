//! Shutdown coordination for the server.
//!
//! One [`Shutdown`] is created in `main`. The HTTP server and the window
//! pruner each hold a receiver; an OS signal or an explicit
//! [`Shutdown::trigger`] stops them both.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::signals;

/// Broadcast handle fanning one stop signal out to every long-running task.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop every subscriber. Triggering twice is harmless.
    pub fn trigger(&self) {
        if self.tx.send(()).is_err() {
            tracing::debug!("Shutdown triggered with no running tasks");
        }
    }

    /// Trigger on SIGINT or SIGTERM from a background task.
    pub fn trigger_on_signal(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_server_and_pruner() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut pruner = server.resubscribe();

        shutdown.clone().trigger();
        assert!(server.recv().await.is_ok());
        assert!(pruner.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_without_subscribers_is_harmless() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
    }
}
