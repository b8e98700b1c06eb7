//! Typed errors returned by every control plane operation

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, ApiError>;

/// A DNS alias that could not be created while configuring a tunnel's ingress
#[derive(Debug)]
pub struct DnsFailure {
    pub hostname: String,
    pub error: Box<ApiError>,
}

/// Errors that can occur talking to the control plane
///
/// The client never retries. Callers branch on the variant to decide what to
/// do next (e.g. pick a fresh name on `NameConflict`).
#[derive(Debug, Error)]
pub enum ApiError {
    /// The control plane could not be reached (connect, TLS, timeout)
    #[error("{operation}: REST request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("tunnel with name '{0}' already exists")]
    NameConflict(String),

    /// Any non-success response not covered by a more specific variant
    #[error("{operation}: control plane returned status {code}: {body}")]
    Status {
        code: u16,
        body: String,
        operation: &'static str,
    },

    /// The response body did not have the shape the operation expects
    #[error("{operation}: failed to decode response: {source}")]
    Serialization {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Ingress was pushed but one or more DNS aliases could not be created
    #[error(
        "ingress configured for tunnel {tunnel_id}, but DNS creation failed for: {}",
        failed_hostnames(.failures)
    )]
    PartialConfiguration {
        tunnel_id: Uuid,
        failures: Vec<DnsFailure>,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ApiError {
    /// True when the control plane answered 404 for the addressed resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { code: 404, .. })
    }

    pub fn is_name_conflict(&self) -> bool {
        matches!(self, ApiError::NameConflict(_))
    }
}

fn failed_hostnames(failures: &[DnsFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.hostname, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}
