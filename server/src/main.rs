//! Client portal HTTP server.
//!
//! Entitlement ledger and support-ticket workflow over `PostgreSQL`.

use client_portal_core::{PortalEngine, SystemClock};
use client_portal_postgres::{PostgresActorResolver, PostgresPortalStore};
use client_portal_server::{Config, metrics};
use client_portal_web::{AppState, build_router};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "client_portal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting client portal server");

    let config = Config::from_env();
    info!(
        database = %config.database.redacted_url(),
        bind = %config.server.bind_address(),
        "Configuration loaded"
    );

    metrics::install_exporter(config.server.metrics_address()?)?;

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.connect_timeout())
        .connect(&config.database.url)
        .await?;
    info!("PostgreSQL connected");

    let store = PostgresPortalStore::from_pool(pool.clone());
    if config.database.run_migrations {
        info!("Running database migrations...");
        store.migrate().await?;
        info!("Migrations complete");
    }

    let engine = PortalEngine::new(Arc::new(store), Arc::new(SystemClock));
    let resolver = Arc::new(PostgresActorResolver::new(pool.clone()));
    let app = build_router(AppState::new(engine, resolver));

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = stop_tx.send(());

    match tokio::time::timeout(config.server.shutdown_timeout(), server).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_error)) => error!(error = %join_error, "Server task failed"),
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    pool.close().await;
    info!("Server stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
