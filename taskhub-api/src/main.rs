//! # taskhub API Server
//!
//! REST API for users, login and tasks. Status changes are handed to the
//! notification pipeline; with `REDIS_URL` set they go to the outbox drained
//! by `taskhub-worker`, otherwise they are only logged.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskhub-api
//! ```

use std::sync::Arc;

use taskhub_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskhub_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    notify::{self, LogNotifier, Notifier, RedisOutbox},
    store::postgres::PgStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskhub_api=debug,taskhub_shared=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("taskhub API server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let notifier: Arc<dyn Notifier> = match &config.notifications.redis_url {
        Some(url) => Arc::new(RedisOutbox::connect(url).await?),
        None => {
            tracing::warn!("REDIS_URL not set, status notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let (queue, rx) = notify::channel(config.notifications.queue_capacity);
    let dispatcher = notify::spawn_dispatcher(rx, notifier);

    let bind_address = config.bind_address();
    let admin = config.admin.clone();
    let state = AppState::new(Arc::new(PgStore::new(pool.clone())), queue, config);

    if let Some(seed) = admin {
        state.users.bootstrap_admin(&seed).await?;
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue handle; the dispatcher finishes what is queued.
    if let Err(e) = dispatcher.await {
        tracing::warn!(error = %e, "Notification dispatcher ended abnormally");
    }
    close_pool(pool).await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
