use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{error, info, warn};

use yatube::{
    app::{create_router, AppState},
    config::{Config, StorageConfig},
    db::Database,
    memory::InMemoryStore,
    middleware::init_tracing,
    store::{load_seed_file, seed_groups, SharedStore},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!("Configuration loaded successfully ({:?})", config.environment);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let store = match build_store(&config.storage).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    // Seed groups from disk when configured
    if let Some(path) = &config.seed_groups_file {
        let groups = match load_seed_file(path).await {
            Ok(groups) => groups,
            Err(e) => {
                error!("Failed to load group seed file: {:#}", e);
                std::process::exit(1);
            }
        };
        match seed_groups(store.as_ref(), groups).await {
            Ok(created) => info!("Seeded {} groups from {}", created, path.display()),
            Err(e) => {
                error!("Failed to seed groups: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Create the Axum router with all endpoints
    let app = create_router(AppState::new(store, config.site.clone()));

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Start the server with graceful shutdown handling
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Connects and migrates PostgreSQL, or builds the in-memory store
async fn build_store(storage: &StorageConfig) -> Result<SharedStore, yatube::AppError> {
    match storage {
        StorageConfig::Postgres(db_config) => {
            let database = Database::new(db_config.clone()).await?;
            info!("Database connection established");

            database.migrate().await?;
            let store: SharedStore = Arc::new(database);
            Ok(store)
        }
        StorageConfig::Memory => {
            warn!("Using the in-memory store; all data is lost on shutdown");
            let store: SharedStore = Arc::new(InMemoryStore::new());
            Ok(store)
        }
    }
}

/// Graceful shutdown signal handler
/// Listens for SIGTERM and SIGINT signals
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, initiating graceful shutdown");
        },
    }
}
