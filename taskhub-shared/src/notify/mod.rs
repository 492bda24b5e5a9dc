/// Outbound notifications
///
/// Status changes are announced by email, but the request path never talks to
/// a mail server. The lifecycle service drops a [`Notification`] into a
/// bounded [`NotificationQueue`]; a dispatcher task drains the queue into a
/// [`Notifier`]. Delivery is best-effort: a full queue or a failed notifier
/// is logged and the message dropped.
///
/// ```text
/// TaskService ──enqueue──▶ mpsc ──▶ dispatcher ──▶ Notifier
///                                                  ├─ RedisOutbox ──▶ worker ──▶ SMTP
///                                                  └─ LogNotifier
/// ```
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhub_shared::notify::{self, LogNotifier};
///
/// # async fn example() {
/// let (queue, rx) = notify::channel(1024);
/// let dispatcher = notify::spawn_dispatcher(rx, Arc::new(LogNotifier));
///
/// // hand `queue` to the services; drop it to stop the dispatcher
/// drop(queue);
/// dispatcher.await.ok();
/// # }
/// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::task::{Task, TaskStatus};

pub mod outbox;

pub use outbox::RedisOutbox;

/// Default capacity of the in-process queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Errors raised by notifiers
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Message could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Redis hand-off failed
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Mail could not be built or sent
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// An email to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique message ID, used for log correlation
    pub id: Uuid,

    /// Recipient address
    pub to: String,

    pub subject: String,

    /// HTML body
    pub body: String,
}

impl Notification {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Email telling a task's creator that its status moved
    pub fn status_changed(to: &str, task: &Task, from: TaskStatus, to_status: TaskStatus) -> Self {
        let name = escape_html(&task.name);
        let subject = format!("Task \"{}\" status changed", task.name);
        let body = format!(
            "<p>The status of your task <strong>{name}</strong> (#{id}) changed \
             from <em>{from}</em> to <em>{to_status}</em>.</p>",
            id = task.id,
        );

        Self::new(to, subject, body)
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Delivers notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier that only logs; used when no outbox is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            notification_id = %notification.id,
            to = %notification.to,
            subject = %notification.subject,
            "Notification (not delivered, no outbox configured)"
        );
        Ok(())
    }
}

/// Sending half of the notification channel
///
/// Cloned into every service that emits notifications.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

/// Creates a bounded queue and its receiving end
pub fn channel(capacity: usize) -> (NotificationQueue, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationQueue { tx }, rx)
}

impl NotificationQueue {
    /// Queues a notification without waiting
    ///
    /// Never fails the caller: a full or closed queue drops the message.
    pub fn enqueue(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    notification_id = %dropped.id,
                    to = %dropped.to,
                    "Notification queue full, dropping message"
                );
            }
            Err(TrySendError::Closed(dropped)) => {
                warn!(
                    notification_id = %dropped.id,
                    to = %dropped.to,
                    "Notification dispatcher stopped, dropping message"
                );
            }
        }
    }
}

/// Drains the queue into `notifier` until every sender is dropped
pub fn spawn_dispatcher(
    mut rx: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Notification dispatcher started");

        while let Some(notification) = rx.recv().await {
            if let Err(e) = notifier.notify(&notification).await {
                warn!(
                    notification_id = %notification.id,
                    to = %notification.to,
                    error = %e,
                    "Notification delivery failed, dropping message"
                );
            }
        }

        debug!("Notification dispatcher stopped");
    })
}
