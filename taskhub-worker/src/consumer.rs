/// Outbox consumer
///
/// Drains the notification outbox into a [`Notifier`] until shut down.
/// Delivery is best effort: a notification that fails to send is logged and
/// dropped, never re-queued.
///
/// # Architecture
///
/// ```text
/// OutboxConsumer
///   ├─> OutboxSource: Pop the next notification (bounded wait)
///   └─> Notifier: Deliver it (SMTP in production)
/// ```
///
/// Shutdown is checked between polls, so a notification already popped is
/// always delivered before the loop exits.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use taskhub_shared::notify::{LogNotifier, RedisOutbox};
/// use taskhub_worker::consumer::OutboxConsumer;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let outbox = RedisOutbox::connect("redis://localhost:6379").await?;
/// let consumer = OutboxConsumer::new(outbox, Arc::new(LogNotifier), Duration::from_secs(5));
///
/// let shutdown = consumer.shutdown_token();
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     shutdown.cancel();
/// });
///
/// consumer.run().await;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskhub_shared::notify::{Notification, Notifier, NotifyError, RedisOutbox};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Pause after a failed poll before trying again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where pending notifications come from
#[async_trait]
pub trait OutboxSource: Send + Sync {
    /// Takes the oldest notification, waiting at most `timeout`
    async fn next(&self, timeout: Duration) -> Result<Option<Notification>, NotifyError>;
}

#[async_trait]
impl OutboxSource for RedisOutbox {
    async fn next(&self, timeout: Duration) -> Result<Option<Notification>, NotifyError> {
        self.pop(timeout).await
    }
}

/// Counters reported when the consumer stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub delivered: u64,
    pub dropped: u64,
}

pub struct OutboxConsumer<S> {
    source: S,
    notifier: Arc<dyn Notifier>,
    pop_timeout: Duration,
    shutdown_token: CancellationToken,
}

impl<S: OutboxSource> OutboxConsumer<S> {
    pub fn new(source: S, notifier: Arc<dyn Notifier>, pop_timeout: Duration) -> Self {
        Self {
            source,
            notifier,
            pop_timeout,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) after the current poll
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until the shutdown token is cancelled
    pub async fn run(&self) -> ConsumerStats {
        tracing::info!(timeout_secs = self.pop_timeout.as_secs(), "Outbox consumer starting");
        let mut stats = ConsumerStats::default();

        while !self.shutdown_token.is_cancelled() {
            let notification = match self.source.next(self.pop_timeout).await {
                Ok(Some(notification)) => notification,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to poll notification outbox");
                    tokio::select! {
                        _ = self.shutdown_token.cancelled() => {}
                        _ = sleep(POLL_RETRY_DELAY) => {}
                    }
                    continue;
                }
            };

            match self.notifier.notify(&notification).await {
                Ok(()) => {
                    stats.delivered += 1;
                    tracing::info!(
                        notification_id = %notification.id,
                        to = %notification.to,
                        "Notification delivered"
                    );
                }
                Err(e) => {
                    stats.dropped += 1;
                    tracing::warn!(
                        notification_id = %notification.id,
                        to = %notification.to,
                        error = %e,
                        "Notification delivery failed, dropping"
                    );
                }
            }
        }

        tracing::info!(
            delivered = stats.delivered,
            dropped = stats.dropped,
            "Outbox consumer stopped"
        );
        stats
    }
}
