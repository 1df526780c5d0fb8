//! OpenSASE Store - Self-hosted Store API

use std::sync::Arc;

use anyhow::Result;
use opensase_store::{
    config::StoreConfig,
    db::{self, postgres::PgStore},
    notifications::{EventListener, NatsPublisher},
    routes, AppState,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = StoreConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opensase_store=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    let mut listeners: Vec<Arc<dyn EventListener>> = Vec::new();
    if let Some(nats) = &config.nats {
        match async_nats::connect(&nats.url).await {
            Ok(client) => {
                tracing::info!(url = %nats.url, prefix = %nats.subject_prefix, "publishing events to NATS");
                listeners.push(Arc::new(NatsPublisher::new(client, nats.subject_prefix.clone())));
            }
            Err(e) => tracing::warn!(url = %nats.url, error = %e, "NATS unavailable, events stay in process"),
        }
    }

    let addr = config.socket_addr();
    let state = AppState::new(config, Arc::new(PgStore::new(pool)), listeners);
    tracing::info!(listeners = state.events().listener_count(), "event bus ready");
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("OpenSASE Store listening on {addr}");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
