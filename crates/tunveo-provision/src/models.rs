//! Response bodies of the provisioning API

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::provisioner::Provisioned;

/// Envelope returned by the provisioning endpoint
///
/// `Code` always equals the HTTP status of the response. Empty fields are
/// omitted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ProvisionResponse {
    /// HTTP status code
    #[serde(rename = "Code")]
    pub code: u16,
    /// Connector token for the new tunnel
    #[serde(rename = "Token", default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    /// Hostname generated for `auto` rules
    #[serde(rename = "HostName", default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    /// All hostnames routed to the tunnel
    #[serde(rename = "HostNames", default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
    #[serde(rename = "TunnelId", default, skip_serializing_if = "Option::is_none")]
    pub tunnel_id: Option<Uuid>,
    /// Error description
    #[serde(rename = "Message", default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl ProvisionResponse {
    pub fn success(provisioned: Provisioned) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            token: provisioned.token,
            hostname: provisioned.hostname.unwrap_or_default(),
            hostnames: provisioned.hostnames,
            tunnel_id: Some(provisioned.tunnel_id),
            message: String::new(),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            token: String::new(),
            hostname: String::new(),
            hostnames: Vec::new(),
            tunnel_id: None,
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}
