//! Query builders for list and cleanup calls

use uuid::Uuid;

use crate::types::Tunnel;

/// Filter for listing tunnels
///
/// # Example
/// ```
/// use tunveo_cfapi::TunnelFilter;
/// use uuid::Uuid;
///
/// let filter = TunnelFilter::new().no_deleted().by_tunnel_id(Uuid::nil());
/// assert_eq!(filter.query_pairs().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelFilter {
    is_deleted: Option<bool>,
    tunnel_id: Option<Uuid>,
    name: Option<String>,
    per_page: Option<u32>,
}

impl TunnelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only return tunnels that have not been deleted
    pub fn no_deleted(mut self) -> Self {
        self.is_deleted = Some(false);
        self
    }

    pub fn by_tunnel_id(mut self, id: Uuid) -> Self {
        self.tunnel_id = Some(id);
        self
    }

    pub fn by_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Page size requested from the control plane
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Encode as query parameters, in a stable order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(is_deleted) = self.is_deleted {
            pairs.push(("is_deleted", is_deleted.to_string()));
        }
        if let Some(id) = self.tunnel_id {
            pairs.push(("uuid", id.to_string()));
        }
        if let Some(ref name) = self.name {
            pairs.push(("name", name.clone()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page", per_page.to_string()));
        }
        pairs
    }

    /// Evaluate the filter locally against a tunnel
    pub fn matches(&self, tunnel: &Tunnel) -> bool {
        if let Some(is_deleted) = self.is_deleted {
            if tunnel.is_deleted() != is_deleted {
                return false;
            }
        }
        if let Some(id) = self.tunnel_id {
            if tunnel.id != id {
                return false;
            }
        }
        if let Some(ref name) = self.name {
            if &tunnel.name != name {
                return false;
            }
        }
        true
    }
}

/// Parameters for dropping a tunnel's stale connections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupParams {
    client_id: Option<Uuid>,
}

impl CleanupParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only drop connections belonging to one connector instance
    pub fn for_client(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn client_id(&self) -> Option<Uuid> {
        self.client_id
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.client_id
            .map(|id| vec![("client_id", id.to_string())])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tunnel(name: &str) -> Tunnel {
        Tunnel {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
            connections: Vec::new(),
        }
    }

    #[test]
    fn test_query_encoding() {
        let id = Uuid::new_v4();
        let filter = TunnelFilter::new()
            .no_deleted()
            .by_tunnel_id(id)
            .by_name("qwertyuiop")
            .per_page(50);

        assert_eq!(
            filter.query_pairs(),
            vec![
                ("is_deleted", "false".to_string()),
                ("uuid", id.to_string()),
                ("name", "qwertyuiop".to_string()),
                ("per_page", "50".to_string()),
            ]
        );
        assert!(TunnelFilter::new().query_pairs().is_empty());
    }

    #[test]
    fn test_local_matching() {
        let live = tunnel("live");
        let mut gone = tunnel("gone");
        gone.deleted_at = Some(Utc::now());

        let filter = TunnelFilter::new().no_deleted();
        assert!(filter.matches(&live));
        assert!(!filter.matches(&gone));

        let by_id = TunnelFilter::new().by_tunnel_id(live.id);
        assert!(by_id.matches(&live));
        assert!(!by_id.matches(&gone));
    }

    #[test]
    fn test_cleanup_params() {
        assert!(CleanupParams::new().query_pairs().is_empty());

        let client = Uuid::new_v4();
        let params = CleanupParams::new().for_client(client);
        assert_eq!(params.query_pairs(), vec![("client_id", client.to_string())]);
    }
}
