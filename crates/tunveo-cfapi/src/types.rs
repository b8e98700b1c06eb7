//! Wire types exchanged with the control plane

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Suffix of every DNS record content that routes to a tunnel
pub const MANAGED_ALIAS_SUFFIX: &str = ".cfargotunnel.com";

/// Service of the mandatory last ingress rule
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

/// DNS content pointing at a tunnel: `<id>.cfargotunnel.com`
pub fn managed_alias(tunnel_id: Uuid) -> String {
    format!("{}{}", tunnel_id, MANAGED_ALIAS_SUFFIX)
}

/// Remote tunnel resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tunnel {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Tunnel {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Tunnel as returned by creation, carrying the connector token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TunnelWithToken {
    #[serde(flatten)]
    pub tunnel: Tunnel,
    /// Opaque credential for the connector; never inspected
    pub token: String,
}

/// One edge connection of a connector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    #[serde(default)]
    pub colo_name: String,
    pub id: Uuid,
    #[serde(default)]
    pub is_pending_reconnect: bool,
    #[serde(default)]
    pub origin_ip: Option<IpAddr>,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
}

/// Connector process currently serving a tunnel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveClient {
    pub id: Uuid,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub run_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "conns")]
    pub connections: Vec<Connection>,
}

/// Hostname to origin service mapping
///
/// A rule without a hostname is a catch-all; the configured set must end with one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub service: String,
    /// Origin connection options, passed through untouched
    #[serde(
        rename = "originRequest",
        default,
        skip_serializing_if = "serde_json::Map::is_empty"
    )]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub origin_request: serde_json::Map<String, serde_json::Value>,
}

impl IngressRule {
    pub fn new(hostname: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            service: service.into(),
            origin_request: serde_json::Map::new(),
        }
    }

    /// The fixed "not found" rule closing every rule set
    pub fn catch_all() -> Self {
        Self {
            hostname: None,
            service: CATCH_ALL_SERVICE.to_string(),
            origin_request: serde_json::Map::new(),
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.hostname.is_none()
    }

    /// Hostname that needs a DNS alias, if any
    pub fn aliased_hostname(&self) -> Option<&str> {
        match self.hostname.as_deref() {
            Some(hostname) if self.service != CATCH_ALL_SERVICE => Some(hostname),
            _ => None,
        }
    }
}

/// Body of the tunnel `configurations` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ConfigurationsRequest {
    pub config: IngressConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct IngressConfig {
    pub ingress: Vec<IngressRule>,
}

impl ConfigurationsRequest {
    pub fn new(ingress: Vec<IngressRule>) -> Self {
        Self {
            config: IngressConfig { ingress },
        }
    }
}

/// DNS record in the managed zone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnsRecord {
    pub id: String,
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub zone_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    #[serde(default)]
    pub proxiable: bool,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub meta: DnsRecordMeta,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

impl DnsRecord {
    /// Tunnel identifier encoded in the record content, if the record is tunnel-managed
    ///
    /// Returns `Some(Err(..))` for a managed-looking record whose prefix is not
    /// a well-formed identifier.
    pub fn managed_tunnel_id(&self) -> Option<Result<Uuid, uuid::Error>> {
        self.content
            .strip_suffix(MANAGED_ALIAS_SUFFIX)
            .map(Uuid::parse_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DnsRecordMeta {
    #[serde(default)]
    pub auto_added: bool,
    #[serde(default)]
    pub managed_by_apps: bool,
    #[serde(default)]
    pub managed_by_argo_tunnel: bool,
    #[serde(default)]
    pub source: String,
}

/// Body for creating a DNS record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub proxied: bool,
    pub name: String,
    pub content: String,
}

impl NewDnsRecord {
    /// Proxied CNAME from `hostname` to the tunnel's managed alias
    pub fn tunnel_alias(hostname: impl Into<String>, tunnel_id: Uuid) -> Self {
        Self {
            record_type: "CNAME".to_string(),
            proxied: true,
            name: hostname.into(),
            content: managed_alias(tunnel_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tunnel_with_token_flattens() {
        let body = json!({
            "id": "f70ff985-a4ef-4643-bbbc-4a0ed4fc8415",
            "name": "qwertyuiop",
            "created_at": "2024-05-01T10:00:00Z",
            "deleted_at": null,
            "connections": [],
            "token": "eyJhIjoi"
        });

        let parsed: TunnelWithToken = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.tunnel.name, "qwertyuiop");
        assert_eq!(parsed.token, "eyJhIjoi");
        assert!(!parsed.tunnel.is_deleted());
    }

    #[test]
    fn test_active_client_reads_conns() {
        let body = json!({
            "id": "1bedc50d-42b3-473c-b108-ff3d10c0d925",
            "features": ["ha-origin"],
            "version": "2024.5.0",
            "arch": "linux_amd64",
            "run_at": "2024-05-01T10:00:00Z",
            "conns": [{
                "colo_name": "ams01",
                "id": "5d3d1a46-4ac8-4b1c-a2b3-6e3c7b6a1f10",
                "is_pending_reconnect": false,
                "origin_ip": "203.0.113.7",
                "opened_at": "2024-05-01T10:00:01Z"
            }]
        });

        let client: ActiveClient = serde_json::from_value(body).unwrap();
        assert_eq!(client.connections.len(), 1);
        assert_eq!(client.connections[0].colo_name, "ams01");
        assert_eq!(
            client.connections[0].origin_ip,
            Some("203.0.113.7".parse().unwrap())
        );
    }

    #[test]
    fn test_ingress_rule_serialization() {
        let rules = vec![
            IngressRule::new("app.example.com", "http://localhost:8080"),
            IngressRule::catch_all(),
        ];
        let body = serde_json::to_value(ConfigurationsRequest::new(rules)).unwrap();

        assert_eq!(
            body,
            json!({"config": {"ingress": [
                {"hostname": "app.example.com", "service": "http://localhost:8080"},
                {"service": "http_status:404"}
            ]}})
        );
    }

    #[test]
    fn test_aliased_hostname_skips_catch_all() {
        assert_eq!(
            IngressRule::new("a.example.com", "http://localhost:1").aliased_hostname(),
            Some("a.example.com")
        );
        assert_eq!(IngressRule::catch_all().aliased_hostname(), None);
        assert_eq!(
            IngressRule::new("b.example.com", CATCH_ALL_SERVICE).aliased_hostname(),
            None
        );
    }

    #[test]
    fn test_managed_tunnel_id() {
        let id = Uuid::new_v4();
        let mut record = DnsRecord {
            id: "rec".to_string(),
            zone_id: String::new(),
            zone_name: String::new(),
            name: "app.example.com".to_string(),
            record_type: "CNAME".to_string(),
            content: managed_alias(id),
            proxiable: true,
            proxied: true,
            ttl: 1,
            locked: false,
            meta: DnsRecordMeta::default(),
            created_on: None,
            modified_on: None,
        };
        assert_eq!(record.managed_tunnel_id().unwrap().unwrap(), id);

        record.content = format!("abc123{}", MANAGED_ALIAS_SUFFIX);
        assert!(record.managed_tunnel_id().unwrap().is_err());

        record.content = "origin.example.net".to_string();
        assert!(record.managed_tunnel_id().is_none());
    }
}
