//! Background task that keeps a notification stream open.
//!
//! Notifications arrive through the caller's handler on the transport's own
//! tasks. The session still owns one task per stream that waits for the stop
//! signal, so that `stream()` returns immediately while streaming has a
//! definite owner that is cancelled and joined on teardown.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Owner of a running stream's background task.
#[derive(Debug)]
pub struct StreamController {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl StreamController {
    /// Spawn the background task, which runs until `cancel_token` fires.
    pub fn start(address: String, cancel_token: CancellationToken) -> Self {
        let task_token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            debug!(address = %address, "Streaming until stopped");
            task_token.cancelled().await;
            debug!(address = %address, "Stream stop signal received");
        });

        Self {
            cancel_token,
            handle: Some(handle),
        }
    }

    /// The stop signal observed by the background task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Whether the background task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Whether the stop signal has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Raise the stop signal and wait for the background task to finish.
    pub async fn stop(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            warn!("Stream task ended abnormally: {}", e);
        }
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        // A dropped controller must not leave its task waiting forever.
        self.cancel_token.cancel();
    }
}
