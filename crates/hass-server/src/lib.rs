//! HASS API server
//!
//! REST API for the hospital system: authentication, patient registry,
//! visits, clinical records, beds, case sheets, messaging, administration
//! and real-time alerts, persisted in SQLite.

pub mod access;
pub mod alerts;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod seed;
pub mod server;
pub mod store;

use anyhow::Context;
use chrono::Duration;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use config::ServerConfig;
pub use server::build_router;

use alerts::AlertHub;
use auth::TokenSigner;
use store::Store;

/// Application state shared by every handler
pub struct AppState {
    pub store: Store,
    pub config: ServerConfig,
    pub signer: TokenSigner,
    pub alerts: AlertHub,
}

impl AppState {
    /// Open the database, prepare the upload directory and seed accounts.
    pub async fn initialize(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let store = Store::connect(&config.database_url)
            .await
            .with_context(|| format!("opening database {}", config.database_url))?;
        if config.is_in_memory() {
            tracing::info!("in-memory database; records are lost on exit");
        }

        let secret = match &config.token_secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                tracing::warn!("HASS_TOKEN_SECRET not set; tokens will not survive a restart");
                auth::random_bytes::<32>().to_vec()
            }
        };
        let signer = TokenSigner::new(
            &secret,
            Duration::minutes(config.access_token_minutes),
            Duration::days(config.refresh_token_days),
        );

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| format!("creating upload directory {}", config.upload_dir.display()))?;

        let state = Arc::new(Self {
            store,
            config,
            signer,
            alerts: AlertHub::new(),
        });

        seed::bootstrap(&state).await?;
        if state.config.seed_demo {
            seed::demo(&state).await?;
        }
        Ok(state)
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let bind = config.bind;
    let state = AppState::initialize(config).await?;
    let listener = TcpListener::bind(bind).await.with_context(|| format!("binding {}", bind))?;
    tracing::info!(addr = %listener.local_addr()?, "hass-server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

/// Serve in a background task and return the bound address.
pub async fn spawn(config: ServerConfig) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let bind = config.bind;
    let state = AppState::initialize(config).await?;
    let listener = TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, build_router(state)).await {
            tracing::error!(%err, "server stopped");
        }
    });
    Ok((addr, handle))
}
