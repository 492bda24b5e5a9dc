//! # taskhub Worker
//!
//! Pops status-change notifications off the Redis outbox and emails them
//! through the configured SMTP relay. Failed deliveries are logged and
//! dropped.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskhub-worker
//! ```

use std::sync::Arc;

use taskhub_shared::notify::RedisOutbox;
use taskhub_worker::{config::WorkerConfig, consumer::OutboxConsumer, mailer::SmtpMailer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskhub_worker=debug,taskhub_shared=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("taskhub worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;
    let outbox = RedisOutbox::connect(&config.redis_url).await?;
    let mailer = SmtpMailer::new(&config.smtp)?;

    let consumer = OutboxConsumer::new(outbox, Arc::new(mailer), config.pop_timeout);
    let shutdown = consumer.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, finishing current poll...");
        shutdown.cancel();
    });

    tracing::info!("Worker ready and listening for notifications");
    consumer.run().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
