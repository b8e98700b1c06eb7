//! Trait describing the remote tunnel/DNS management API
//!
//! `RestClient` is the production implementation. The provisioning service and
//! the reconciliation loops only ever see `Arc<dyn ControlPlane>`.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, DnsFailure, Result};
use crate::filter::{CleanupParams, TunnelFilter};
use crate::types::{
    ActiveClient, DnsRecord, IngressRule, NewDnsRecord, Tunnel, TunnelWithToken,
};

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create a tunnel; `NameConflict` if the name is taken
    async fn create_tunnel(&self, name: &str, secret: &[u8]) -> Result<TunnelWithToken>;

    async fn get_tunnel(&self, id: Uuid) -> Result<Tunnel>;

    /// Fetch the connector token of an existing tunnel
    async fn get_tunnel_token(&self, id: Uuid) -> Result<String>;

    async fn delete_tunnel(&self, id: Uuid) -> Result<()>;

    async fn list_tunnels(&self, filter: &TunnelFilter) -> Result<Vec<Tunnel>>;

    /// Connector instances currently attached to a tunnel
    async fn list_active_clients(&self, id: Uuid) -> Result<Vec<ActiveClient>>;

    /// Drop stale connections of a tunnel (optionally for one client only)
    async fn cleanup_connections(&self, id: Uuid, params: &CleanupParams) -> Result<()>;

    /// Push the ordered ingress rule set, without touching DNS
    async fn put_ingress(&self, id: Uuid, ingress: &[IngressRule]) -> Result<()>;

    async fn create_dns_record(&self, record: &NewDnsRecord) -> Result<DnsRecord>;

    async fn list_dns_records(&self) -> Result<Vec<DnsRecord>>;

    async fn delete_dns_record(&self, record_id: &str) -> Result<()>;

    /// Push ingress, then create one proxied CNAME per distinct routed hostname
    ///
    /// The two phases are not atomic. When the push fails nothing else is
    /// attempted. When some aliases fail the remaining ones are still created
    /// and `PartialConfiguration` names every failed hostname. No retry, no
    /// rollback.
    async fn configure_ingress(&self, id: Uuid, ingress: &[IngressRule]) -> Result<()> {
        self.put_ingress(id, ingress).await?;
        info!("Ingress configured for tunnel {} ({} rules)", id, ingress.len());

        let mut failures = Vec::new();
        let mut seen = HashSet::new();
        for hostname in ingress.iter().filter_map(IngressRule::aliased_hostname) {
            if !seen.insert(hostname) {
                continue;
            }
            let record = NewDnsRecord::tunnel_alias(hostname, id);
            match self.create_dns_record(&record).await {
                Ok(created) => {
                    info!("DNS alias {} -> {} created", created.name, created.content);
                }
                Err(e) => {
                    warn!("Failed to create DNS alias {} for tunnel {}: {}", hostname, id, e);
                    failures.push(DnsFailure {
                        hostname: hostname.to_string(),
                        error: Box::new(e),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ApiError::PartialConfiguration {
                tunnel_id: id,
                failures,
            })
        }
    }
}

/// Names are free text but must not be empty or look like a system-assigned id
pub fn validate_tunnel_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ApiError::Validation("tunnel name required".to_string()));
    }
    if Uuid::parse_str(name).is_ok() {
        return Err(ApiError::Validation(
            "you cannot use UUIDs as tunnel names".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tunnel_name() {
        assert!(validate_tunnel_name("qwertyuiop").is_ok());
        assert!(matches!(
            validate_tunnel_name(""),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_tunnel_name("f70ff985-a4ef-4643-bbbc-4a0ed4fc8415"),
            Err(ApiError::Validation(_))
        ));
    }
}
