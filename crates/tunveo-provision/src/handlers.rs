use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tunveo_cfapi::ConfigurationsRequest;
use utoipa::OpenApi;

use crate::error::ProvisionError;
use crate::models::*;
use crate::{ApiDoc, AppState};

/// Create a tunnel for an ingress rule set
#[utoipa::path(
    post,
    path = "/",
    request_body = ConfigurationsRequest,
    responses(
        (status = 200, description = "Tunnel provisioned", body = ProvisionResponse),
        (status = 400, description = "Malformed or invalid ingress", body = ProvisionResponse),
        (status = 409, description = "Generated tunnel name already taken; retry", body = ProvisionResponse),
        (status = 413, description = "Request body too large", body = ProvisionResponse),
        (status = 502, description = "Control plane failure", body = ProvisionResponse)
    ),
    tag = "provisioning"
)]
pub async fn provision(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<ProvisionResponse>) {
    let result = match body {
        Ok(body) => match serde_json::from_slice::<ConfigurationsRequest>(&body) {
            Ok(request) => state.provisioner.provision(request.config.ingress).await,
            Err(e) => Err(ProvisionError::MalformedBody(e.to_string())),
        },
        Err(rejection) => Err(ProvisionError::from(rejection)),
    };

    match result {
        Ok(provisioned) => {
            info!(
                "Issued token for tunnel {} ({})",
                provisioned.tunnel_name, provisioned.tunnel_id
            );
            (StatusCode::OK, Json(ProvisionResponse::success(provisioned)))
        }
        Err(e) => {
            let status = e.status_code();
            warn!("Provisioning failed with {}: {}", status, e);
            (status, Json(ProvisionResponse::error(status, e.to_string())))
        }
    }
}

/// Envelope for unknown paths and unsupported methods
pub async fn not_found() -> (StatusCode, Json<ProvisionResponse>) {
    debug!("Rejecting request for unknown route");
    (
        StatusCode::NOT_FOUND,
        Json(ProvisionResponse::error(
            StatusCode::NOT_FOUND,
            "404 not found",
        )),
    )
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// OpenAPI document for this service
pub async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
