//! Client for the tunnel and DNS management API
//!
//! Talks to an account-scoped tunnel collection and a zone-scoped DNS record
//! collection. Everything above this crate depends on the [`ControlPlane`]
//! trait so it can run against [`RestClient`] or an in-memory double.

pub mod client;
pub mod control_plane;
pub mod endpoints;
pub mod error;
pub mod filter;
#[cfg(feature = "test-utils")]
pub mod testing;
pub mod types;

pub use client::{user_agent, ClientConfig, RestClient, DEFAULT_REQUEST_TIMEOUT};
pub use control_plane::{validate_tunnel_name, ControlPlane};
pub use endpoints::{Endpoints, DEFAULT_API_ROOT};
pub use error::{ApiError, DnsFailure, Result};
pub use filter::{CleanupParams, TunnelFilter};
pub use types::{
    managed_alias, ActiveClient, ConfigurationsRequest, Connection, DnsRecord, DnsRecordMeta,
    IngressConfig, IngressRule, NewDnsRecord, Tunnel, TunnelWithToken, CATCH_ALL_SERVICE,
    MANAGED_ALIAS_SUFFIX,
};

/// Re-exported so callers can build [`Endpoints`] without depending on reqwest
pub use reqwest::Url;
