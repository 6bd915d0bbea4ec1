use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use notes_api::cli::Cli;
use notes_api::config::AppConfig;
use notes_api::database::{CredentialStore, MemoryStore, PgStore};
use notes_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notes_api=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;
    info!("Starting notes-api in {:?} mode", config.environment);

    let store = build_store(&config).await?;
    let state = AppState::new(&config, Arc::clone(&store)).context("failed to initialise password hasher")?;
    let app = router(state, &config);

    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CredentialStore>> {
    if config.database.url.is_none() {
        info!("No DATABASE_URL configured; using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    if config.database.auto_migrate {
        store.migrate().await.context("failed to migrate database")?;
    }
    Ok(Arc::new(store))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received, draining connections");
}
