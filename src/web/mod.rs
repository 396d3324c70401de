//! HTTP surface for the dashboard.

mod handlers;

pub use handlers::*;

use crate::config::DashboardConfig;
use crate::status::StatusReconciler;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub reconciler: StatusReconciler,
}

impl AppState {
    pub fn new(config: Arc<DashboardConfig>) -> Self {
        Self {
            reconciler: StatusReconciler::new(Arc::clone(&config)),
            config,
        }
    }
}

/// Web server for the dashboard.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: Arc<DashboardConfig>) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve until the listener fails.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let server = &self.state.config.server;
        let addr = format!("{}:{}", server.bind, server.port);
        let router = self.routes();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Dashboard listening on http://{}", listener.local_addr()?);
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Router over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Dashboard
        .route("/", get(handlers::handle_dashboard))
        // Status
        .route("/api/status", get(handlers::handle_status))
        // Actions
        .route("/api/run-check", post(handlers::handle_run_check))
        .route("/api/run-chk-syncd", post(handlers::handle_run_check))
        .route("/api/sync-now", post(handlers::handle_sync_now))
        .route("/api/update", post(handlers::handle_update))
        .route("/api/restart-pf", post(handlers::handle_restart_pf))
        .route("/api/restart-web", post(handlers::handle_restart_web))
        // Settings
        .route(
            "/api/config",
            get(handlers::handle_get_config).post(handlers::handle_set_config),
        )
        .route("/api/config/test-remote", post(handlers::handle_test_remote))
        .route("/api/config/export", get(handlers::handle_export_config))
        // Sources
        .route("/api/sources", get(handlers::handle_get_sources))
        .route("/api/sources/create", post(handlers::handle_create_source))
        .route("/api/sources/delete", post(handlers::handle_delete_source))
        .route("/api/sources/active", post(handlers::handle_set_active_source))
        // Frame
        .route(
            "/api/frame-live",
            get(handlers::handle_get_frame_live).post(handlers::handle_set_frame_live),
        )
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}
