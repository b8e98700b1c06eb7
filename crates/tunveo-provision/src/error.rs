use axum::{extract::rejection::BytesRejection, http::StatusCode};
use thiserror::Error;
use tunveo_cfapi::ApiError;

/// Errors returned by the provisioning path
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Request body is not a valid ingress document
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// Body could not be read, e.g. it exceeds the size limit
    #[error("Unreadable request body: {0}")]
    UnreadableBody(#[from] BytesRejection),

    #[error("Invalid ingress: {0}")]
    InvalidIngress(String),

    #[error(transparent)]
    ControlPlane(#[from] ApiError),
}

impl ProvisionError {
    /// Status reported to the caller, both on the wire and in the envelope `Code`
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProvisionError::MalformedBody(_) | ProvisionError::InvalidIngress(_) => {
                StatusCode::BAD_REQUEST
            }
            ProvisionError::UnreadableBody(rejection) => rejection.status(),
            ProvisionError::ControlPlane(ApiError::NameConflict(_)) => StatusCode::CONFLICT,
            ProvisionError::ControlPlane(ApiError::Validation(_)) => StatusCode::BAD_REQUEST,
            ProvisionError::ControlPlane(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
