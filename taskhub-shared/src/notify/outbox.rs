/// Redis outbox
///
/// The API pushes serialized notifications onto a Redis list and the worker
/// pops them off for SMTP delivery, so mail server outages never reach the
/// request path.
///
/// Producers `LPUSH`, consumers `BRPOP`, which keeps the list FIFO.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::{Notification, Notifier, NotifyError};

/// Redis list holding pending notifications
pub const OUTBOX_KEY: &str = "taskhub:notifications";

/// Notification outbox on a Redis list
#[derive(Clone)]
pub struct RedisOutbox {
    manager: ConnectionManager,
    key: String,
}

impl RedisOutbox {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first connection fails.
    pub async fn connect(url: &str) -> Result<Self, NotifyError> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        info!(url = %sanitize_url(url), "Connected to notification outbox");

        Ok(Self {
            manager,
            key: OUTBOX_KEY.to_string(),
        })
    }

    /// Uses a different list key (tests)
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Appends a notification to the outbox
    pub async fn push(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification)?;
        let mut conn = self.manager.clone();

        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!(notification_id = %notification.id, "Notification pushed to outbox");
        Ok(())
    }

    /// Pops the oldest notification, waiting up to `timeout`
    ///
    /// Returns `None` when the wait times out.
    pub async fn pop(&self, timeout: Duration) -> Result<Option<Notification>, NotifyError> {
        let mut conn = self.manager.clone();

        let entry: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        match entry {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Number of notifications waiting
    pub async fn len(&self) -> Result<usize, NotifyError> {
        let mut conn = self.manager.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }
}

#[async_trait]
impl Notifier for RedisOutbox {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.push(notification).await
    }
}

/// Masks credentials in a Redis URL for logging
pub(crate) fn sanitize_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > scheme_end {
            return format!("{}***:***@{}", &url[..scheme_end + 3], &url[at_pos + 1..]);
        }
    }
    url.to_string()
}
