//! Social graph REST API server: profiles, follows, search, recommendations.

use social_api::config::{Config, StoreBackend};
use social_api::server::{self, AppState};
use social_graph::InMemoryGraphStore;
use social_profile::{GraphProfileRepository, ProfileRepository};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type DynRepository = Arc<dyn ProfileRepository + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let repo = build_repository(&config)?;

    if let Err(e) = repo.check_connection().await {
        tracing::error!(error = %e, "graph store unreachable at startup");
        return Err(e.into());
    }

    let app = server::router(Arc::new(AppState { repo }));
    tracing::info!(store = ?config.store, "social API listening on {}", config.listen);
    axum::serve(
        tokio::net::TcpListener::bind(config.listen).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    tracing::info!("social API stopped");
    Ok(())
}

fn build_repository(
    config: &Config,
) -> Result<DynRepository, Box<dyn std::error::Error + Send + Sync>> {
    match config.store {
        StoreBackend::Memory => Ok(Arc::new(
            GraphProfileRepository::new(InMemoryGraphStore::new())
                .with_store_timeout(config.store_timeout)
                .with_search_limit(config.search_limit),
        )),
        StoreBackend::Sqlite => sqlite_repository(config),
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_repository(
    config: &Config,
) -> Result<DynRepository, Box<dyn std::error::Error + Send + Sync>> {
    let store = social_graph::SqliteGraphStore::new(&config.sqlite_path)?;
    Ok(Arc::new(
        GraphProfileRepository::new(store)
            .with_store_timeout(config.store_timeout)
            .with_search_limit(config.search_limit),
    ))
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_repository(
    _config: &Config,
) -> Result<DynRepository, Box<dyn std::error::Error + Send + Sync>> {
    Err("SOCIAL_STORE=sqlite requires building with the `sqlite` feature".into())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}
