//! Post-run notifications.
//!
//! After a run is finalized the executor hands one [`ActionNotification`]
//! to an [`ActionDispatcher`]. Delivery is best effort: a failed dispatch is
//! logged and never affects the validation record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::DispatchConfig;
use crate::model::Validation;

/// Errors raised while handing off or delivering a notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("dispatch queue is closed")]
    Closed,

    #[error("delivery timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("delivery failed: {message}")]
    Delivery { message: String },
}

impl DispatchError {
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failure,
}

impl ActionStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            ActionStatus::Success
        } else {
            ActionStatus::Failure
        }
    }
}

/// The message handed to alerting after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionNotification {
    /// Dataset the run belongs to.
    pub resource_key: String,
    pub action_type: ActionType,
    pub status: ActionStatus,
    pub validation: Validation,
}

impl ActionNotification {
    pub fn validation(resource_key: impl Into<String>, validation: Validation) -> Self {
        Self {
            resource_key: resource_key.into(),
            action_type: ActionType::Validation,
            status: ActionStatus::from_success(validation.success),
            validation,
        }
    }
}

/// Receives post-run notifications.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, notification: ActionNotification) -> Result<(), DispatchError>;
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl ActionDispatcher for NoopDispatcher {
    async fn dispatch(&self, notification: ActionNotification) -> Result<(), DispatchError> {
        debug!(resource_key = %notification.resource_key, "Discarding notification");
        Ok(())
    }
}

/// Statistics from the dispatch worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
    pub timed_out: u64,
}

/// Fire-and-forget dispatcher backed by a bounded queue and a background
/// worker that forwards to an inner dispatcher.
///
/// `dispatch` only enqueues, so a slow alerting backend never holds up a run.
#[derive(Debug, Clone)]
pub struct QueuedDispatcher {
    sender: mpsc::Sender<ActionNotification>,
    capacity: usize,
}

/// Handle to the background worker of a [`QueuedDispatcher`].
pub struct DispatchWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<DispatchStats>,
}

impl DispatchWorker {
    /// Stops the worker after delivering everything already queued.
    pub async fn shutdown(self) -> DispatchStats {
        let _ = self.shutdown.send(true);
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Dispatch worker panicked: {}", e);
                DispatchStats::default()
            }
        }
    }
}

impl QueuedDispatcher {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(inner: Arc<dyn ActionDispatcher>, config: DispatchConfig) -> (Self, DispatchWorker) {
        let capacity = config.capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = Worker {
            inner,
            receiver,
            shutdown: shutdown_rx,
            timeout: config.timeout,
            stats: DispatchStats::default(),
        };
        let handle = tokio::spawn(worker.run());

        (
            Self { sender, capacity },
            DispatchWorker {
                shutdown: shutdown_tx,
                handle,
            },
        )
    }
}

#[async_trait]
impl ActionDispatcher for QueuedDispatcher {
    async fn dispatch(&self, notification: ActionNotification) -> Result<(), DispatchError> {
        self.sender.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

struct Worker {
    inner: Arc<dyn ActionDispatcher>,
    receiver: mpsc::Receiver<ActionNotification>,
    shutdown: watch::Receiver<bool>,
    timeout: Duration,
    stats: DispatchStats,
}

impl Worker {
    #[instrument(skip(self))]
    async fn run(mut self) -> DispatchStats {
        info!("Dispatch worker started");

        loop {
            tokio::select! {
                next = self.receiver.recv() => match next {
                    Some(notification) => self.deliver(notification).await,
                    None => break,
                },
                Ok(()) = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("Shutdown signal received, draining queued notifications");
                        self.receiver.close();
                        while let Some(notification) = self.receiver.recv().await {
                            self.deliver(notification).await;
                        }
                        break;
                    }
                }
            }
        }

        info!(
            "Dispatch worker stopped: {} delivered, {} failed, {} timed out",
            self.stats.delivered, self.stats.failed, self.stats.timed_out
        );
        self.stats
    }

    async fn deliver(&mut self, notification: ActionNotification) {
        let resource_key = notification.resource_key.clone();
        match tokio::time::timeout(self.timeout, self.inner.dispatch(notification)).await {
            Ok(Ok(())) => {
                debug!(%resource_key, "Notification delivered");
                self.stats.delivered += 1;
            }
            Ok(Err(e)) => {
                warn!(%resource_key, error = %e, "Notification delivery failed");
                self.stats.failed += 1;
            }
            Err(_) => {
                warn!(
                    %resource_key,
                    timeout_secs = self.timeout.as_secs(),
                    "Notification delivery timed out"
                );
                self.stats.timed_out += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::validation_with_success;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ActionNotification>>,
    }

    #[async_trait]
    impl ActionDispatcher for Recorder {
        async fn dispatch(&self, notification: ActionNotification) -> Result<(), DispatchError> {
            self.seen.lock().await.push(notification);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl ActionDispatcher for Failing {
        async fn dispatch(&self, _: ActionNotification) -> Result<(), DispatchError> {
            Err(DispatchError::delivery("webhook returned 500"))
        }
    }

    #[test]
    fn test_notification_serializes_lowercase() {
        let notification = ActionNotification::validation("orders", validation_with_success(false));
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["action_type"], "validation");
        assert_eq!(value["status"], "failure");
        assert_eq!(value["resource_key"], "orders");
    }

    #[tokio::test]
    async fn test_queued_dispatcher_delivers_before_shutdown() {
        let recorder = Arc::new(Recorder::default());
        let (dispatcher, worker) =
            QueuedDispatcher::spawn(recorder.clone(), DispatchConfig::default());

        for _ in 0..3 {
            dispatcher
                .dispatch(ActionNotification::validation(
                    "orders",
                    validation_with_success(true),
                ))
                .await
                .unwrap();
        }

        let stats = worker.shutdown().await;
        assert_eq!(stats.delivered, 3);
        assert_eq!(recorder.seen.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_deliveries_are_counted() {
        let (dispatcher, worker) =
            QueuedDispatcher::spawn(Arc::new(Failing), DispatchConfig::default());
        dispatcher
            .dispatch(ActionNotification::validation(
                "orders",
                validation_with_success(true),
            ))
            .await
            .unwrap();

        let stats = worker.shutdown().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (dispatcher, worker) =
            QueuedDispatcher::spawn(Arc::new(NoopDispatcher), DispatchConfig::default());
        worker.shutdown().await;

        let err = dispatcher
            .dispatch(ActionNotification::validation(
                "orders",
                validation_with_success(true),
            ))
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Closed);
    }
}
