//! RMD Server - duplicate publication admin API
//!
//! JSON endpoints for reviewing, dismissing and merging duplicate groups.

pub mod extract;
pub mod http;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use rmd_core::{Repository, RmdConfig};

/// Shared application state
pub struct AppState {
    pub repository: Mutex<Repository>,
    pub config: RmdConfig,
}

impl AppState {
    pub fn new(repository: Repository, config: RmdConfig) -> Self {
        Self {
            repository: Mutex::new(repository),
            config,
        }
    }

    /// Open the database named in the server configuration
    pub fn open(config: RmdConfig) -> rmd_core::Result<Self> {
        let repository = Repository::new(&config.server.database_path)?;
        tracing::info!("Opened database {:?}", config.server.database_path);
        Ok(Self::new(repository, config))
    }

    /// State backed by an in-memory database
    pub fn in_memory(config: RmdConfig) -> rmd_core::Result<Self> {
        Ok(Self::new(Repository::in_memory()?, config))
    }

    /// Lock the repository for one request
    pub fn repository(&self) -> Result<MutexGuard<'_, Repository>, String> {
        self.repository
            .lock()
            .map_err(|e| format!("Mutex poisoned: {}", e))
    }

    pub fn database_path(&self) -> &Path {
        &self.config.server.database_path
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Publication endpoints
        .route("/publications", get(http::list_publications))
        .route("/publications", post(http::create_publication))
        .route("/publications/{id}", get(http::get_publication))
        .route("/publications/{id}", delete(http::delete_publication))
        .route("/publications/{id}/imports", post(http::add_import))
        .route("/publications/{id}/duplicates", post(http::find_duplicates_of))
        // Duplicate group endpoints
        .route("/duplicate-groups", get(http::list_duplicate_groups))
        .route("/duplicate-groups", post(http::create_duplicate_group))
        .route("/duplicate-groups/detect", post(http::detect_duplicates))
        .route("/duplicate-groups/auto-merge", post(http::auto_merge_groups))
        .route("/duplicate-groups/{id}", get(http::get_duplicate_group))
        .route("/duplicate-groups/{id}/ignore", post(http::ignore_duplicate_group))
        .route("/duplicate-groups/{id}/merge", post(http::merge_duplicate_group))
        .route(
            "/duplicate-groups/{id}/publications/{publication_id}",
            delete(http::remove_group_member),
        )
        // Non-duplicate decisions
        .route("/non-duplicate-groups", get(http::list_non_duplicate_groups))
        .route("/non-duplicate-groups", post(http::create_non_duplicate_group))
        // System endpoints
        .route("/health", get(http::health))
        .route("/status", get(http::get_status))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("RMD server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
