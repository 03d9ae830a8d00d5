use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use tokio::net::TcpListener;

use crate::activities::ActivityStore;
use crate::api;
use crate::api::routes::state::AppState;
use crate::config::{ActivitiesConfig, ServerConfig};
use crate::error::ActivityError;
use crate::notifier::{BroadcastNotifier, NoopNotifier, Notifier};

pub struct WebServer {
    host: String,
    port: u16,
    state: AppState,
}

impl WebServer {
    pub fn new(server: &ServerConfig, activities: &ActivitiesConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            state: Self::create_state(activities),
        }
    }

    fn create_state(activities: &ActivitiesConfig) -> AppState {
        let store = if activities.seed_mock_data {
            ActivityStore::seeded()
        } else {
            ActivityStore::new()
        };
        if store.is_empty() {
            log::info!("Activity store initialised empty");
        } else {
            log::info!("Activity store initialised with {} record(s)", store.len());
        }

        let notifier: Arc<dyn Notifier> = if activities.broadcast {
            Arc::new(BroadcastNotifier::new(activities.broadcast_capacity))
        } else {
            log::info!("Real-time broadcast disabled");
            Arc::new(NoopNotifier)
        };

        AppState::new(Arc::new(store), notifier)
    }

    pub async fn start(&self) -> Result<(), ActivityError> {
        let app = build_router(self.state.clone());

        let listener = self.bind_listener().await?;
        match listener.local_addr() {
            Ok(addr) => println!("🚀 activity-feed server starting on http://{}", addr),
            Err(_) => println!(
                "🚀 activity-feed server starting on http://{}:{}",
                self.host, self.port
            ),
        }

        log::info!("Server ready to handle requests");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                log::info!("Shutdown signal received, stopping server");
                println!("\n🛑 Shutdown signal received - stopping server gracefully...");
            })
            .await
            .map_err(|e| ActivityError::Error(format!("Server error: {}", e)))?;

        log::info!("Server shutdown complete");
        println!("   Server stopped");
        Ok(())
    }
}

impl WebServer {
    /// Host may be an IP literal or a name such as `localhost`
    async fn bind_listener(&self) -> Result<TcpListener, ActivityError> {
        TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                ActivityError::Error(format!(
                    "Failed to bind to {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }
}

/// Full application router; tests drive this directly
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // App info
        .route("/api/app-info", get(api::app::get_app_info))

        // Activity endpoints
        .nest("/api/activities", api::activities::activity_routes())

        // Add state for handlers
        .with_state(state)
}

async fn health_check() -> (StatusCode, Html<&'static str>) {
    (
        StatusCode::OK,
        Html("<h1>activity-feed</h1><p>✅ Server is running</p>"),
    )
}

/// Waits for a shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
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
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received SIGINT (Ctrl+C)");
        },
        _ = terminate => {
            log::info!("Received SIGTERM");
        },
    }
}
