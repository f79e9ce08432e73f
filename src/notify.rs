use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::board::Notification;
use crate::remote::Remote;

/// Notice severity for status-bar coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible, non-blocking message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Pending notices, oldest first, waiting for the UI to drain them.
#[derive(Debug, Default)]
pub struct Notices {
    queue: VecDeque<Notice>,
}

impl Notices {
    pub fn info(&mut self, msg: impl Into<String>) {
        self.push(NoticeLevel::Info, msg.into());
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.push(NoticeLevel::Warning, msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.push(NoticeLevel::Error, msg.into());
    }

    fn push(&mut self, level: NoticeLevel, message: String) {
        self.queue.push_back(Notice { level, message });
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Best-effort outbound queue for assignee notifications.
///
/// Enqueueing never blocks and never fails the caller; a background worker
/// delivers records and only logs delivery failures.
pub struct Outbox {
    tx: Option<mpsc::UnboundedSender<Notification>>,
    worker: Option<JoinHandle<usize>>,
}

impl Outbox {
    /// Start the delivery worker on the current tokio runtime.
    pub fn spawn(remote: Arc<dyn Remote>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
        let worker = tokio::spawn(async move {
            let mut delivered = 0;
            while let Some(notification) = rx.recv().await {
                match remote.create_notification(&notification).await {
                    Ok(()) => {
                        delivered += 1;
                        debug!(user = %notification.user_id, task = %notification.task_id, "notification sent");
                    }
                    Err(e) => {
                        warn!(user = %notification.user_id, task = %notification.task_id, error = %e, "notification dropped");
                    }
                }
            }
            delivered
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    pub fn enqueue(&self, notification: Notification) {
        let Some(tx) = &self.tx else {
            warn!("outbox closed, notification dropped");
            return;
        };
        if tx.send(notification).is_err() {
            warn!("outbox worker gone, notification dropped");
        }
    }

    /// Close the queue and wait for queued records to be attempted.
    /// Returns how many were delivered.
    pub async fn shutdown(&mut self) -> usize {
        self.tx.take();
        match self.worker.take() {
            Some(worker) => worker.await.unwrap_or_else(|e| {
                warn!(error = %e, "outbox worker failed");
                0
            }),
            None => 0,
        }
    }
}
