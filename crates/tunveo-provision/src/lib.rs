//! Provisioning service
//!
//! Accepts an ingress rule set over HTTP, creates a tunnel for it on the
//! control plane, routes its hostnames, and returns the connector token.

pub mod error;
pub mod handlers;
pub mod ingress;
pub mod models;
pub mod naming;
pub mod provisioner;

pub use error::ProvisionError;
pub use naming::{generate_secret, random_label, LabelGenerator, RandomLabels};
pub use provisioner::{ProvisionConfig, Provisioned, Provisioner};

use axum::{
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

/// Application state shared across handlers
pub struct AppState {
    pub provisioner: Provisioner,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tunveo Provisioning API",
        description = "Creates ephemeral tunnels and routes public hostnames to them",
        contact(
            name = "Tunveo Team",
            email = "team@tunveo.dev"
        )
    ),
    paths(handlers::provision, handlers::health_check),
    components(
        schemas(
            models::ProvisionResponse,
            models::HealthResponse,
            tunveo_cfapi::ConfigurationsRequest,
            tunveo_cfapi::IngressConfig,
            tunveo_cfapi::IngressRule,
        )
    ),
    tags(
        (name = "provisioning", description = "Tunnel provisioning"),
        (name = "system", description = "System health and info endpoints")
    )
)]
pub struct ApiDoc;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, provisioner: Provisioner) -> Self {
        Self {
            config,
            state: Arc::new(AppState { provisioner }),
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            .route(
                "/",
                post(handlers::provision).fallback(handlers::not_found),
            )
            .route("/api/health", get(handlers::health_check))
            .route("/api/openapi.json", get(handlers::openapi_spec))
            .fallback(handlers::not_found)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests
    pub async fn start(self, shutdown: CancellationToken) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!("Starting provisioning API on {}", listener.local_addr()?);
        info!(
            "OpenAPI spec: http://{}/api/openapi.json",
            self.config.bind_addr
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        info!("Provisioning API stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/"));
        assert!(doc.paths.paths.contains_key("/api/health"));
    }
}
