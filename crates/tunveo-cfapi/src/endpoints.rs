//! Base addresses for the control plane API
//!
//! Tunnel lifecycle calls live under an account-scoped root and DNS calls under
//! a zone-scoped root. Both roots are configured independently; every operation
//! appends path segments to the root it belongs to.

use reqwest::Url;
use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Default public API root
pub const DEFAULT_API_ROOT: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Clone)]
pub struct Endpoints {
    account: Url,
    zone: Url,
}

impl Endpoints {
    /// Use two explicitly configured roots
    ///
    /// `account` is the tunnel collection (e.g. `.../accounts/{id}/cfd_tunnel`),
    /// `zone` is the DNS record collection (e.g. `.../zones/{id}/dns_records`).
    pub fn new(account: Url, zone: Url) -> Result<Self> {
        for (label, url) in [("account", &account), ("zone", &zone)] {
            if url.cannot_be_a_base() {
                return Err(ApiError::Validation(format!(
                    "{} endpoint '{}' cannot be used as a base URL",
                    label, url
                )));
            }
        }

        Ok(Self { account, zone })
    }

    /// Build both roots from the API root plus account and zone identifiers
    pub fn from_ids(api_root: &Url, account_id: &str, zone_id: &str) -> Result<Self> {
        Self::new(
            Self::account_root(api_root, account_id)?,
            Self::zone_root(api_root, zone_id)?,
        )
    }

    /// `<api_root>/accounts/<account_id>/cfd_tunnel`
    pub fn account_root(api_root: &Url, account_id: &str) -> Result<Url> {
        if account_id.is_empty() {
            return Err(ApiError::Validation("account id required".to_string()));
        }
        Ok(join(api_root, &["accounts", account_id, "cfd_tunnel"]))
    }

    /// `<api_root>/zones/<zone_id>/dns_records`
    pub fn zone_root(api_root: &Url, zone_id: &str) -> Result<Url> {
        if zone_id.is_empty() {
            return Err(ApiError::Validation("zone id required".to_string()));
        }
        Ok(join(api_root, &["zones", zone_id, "dns_records"]))
    }

    pub fn account(&self) -> &Url {
        &self.account
    }

    pub fn zone(&self) -> &Url {
        &self.zone
    }

    pub fn tunnels(&self) -> Url {
        self.account.clone()
    }

    pub fn tunnel(&self, id: Uuid) -> Url {
        join(&self.account, &[&id.to_string()])
    }

    pub fn tunnel_token(&self, id: Uuid) -> Url {
        join(&self.account, &[&id.to_string(), "token"])
    }

    pub fn tunnel_connections(&self, id: Uuid) -> Url {
        join(&self.account, &[&id.to_string(), "connections"])
    }

    pub fn tunnel_configurations(&self, id: Uuid) -> Url {
        join(&self.account, &[&id.to_string(), "configurations"])
    }

    pub fn dns_records(&self) -> Url {
        self.zone.clone()
    }

    pub fn dns_record(&self, record_id: &str) -> Url {
        join(&self.zone, &[record_id])
    }
}

/// Append path segments to a base URL, keeping its query untouched
fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Url {
        Url::parse(DEFAULT_API_ROOT).unwrap()
    }

    #[test]
    fn test_roots_from_ids() {
        let endpoints = Endpoints::from_ids(&root(), "acct", "zone1").unwrap();

        assert_eq!(
            endpoints.account().as_str(),
            "https://api.cloudflare.com/client/v4/accounts/acct/cfd_tunnel"
        );
        assert_eq!(
            endpoints.zone().as_str(),
            "https://api.cloudflare.com/client/v4/zones/zone1/dns_records"
        );
    }

    #[test]
    fn test_tunnel_paths_stay_under_account_root() {
        let endpoints = Endpoints::from_ids(&root(), "acct", "zone1").unwrap();
        let id = Uuid::parse_str("f70ff985-a4ef-4643-bbbc-4a0ed4fc8415").unwrap();

        assert_eq!(
            endpoints.tunnel_configurations(id).path(),
            "/client/v4/accounts/acct/cfd_tunnel/f70ff985-a4ef-4643-bbbc-4a0ed4fc8415/configurations"
        );
        assert_eq!(
            endpoints.tunnel_token(id).path(),
            "/client/v4/accounts/acct/cfd_tunnel/f70ff985-a4ef-4643-bbbc-4a0ed4fc8415/token"
        );
    }

    #[test]
    fn test_dns_paths_stay_under_zone_root() {
        // A zone root whose path happens to contain "tunnels" must not be rewritten
        let account = Url::parse("https://cp.internal/v1/acct/tunnels").unwrap();
        let zone = Url::parse("https://dns.internal/v2/tunnels-zone/records/").unwrap();
        let endpoints = Endpoints::new(account, zone).unwrap();

        assert_eq!(
            endpoints.dns_record("rec-1").as_str(),
            "https://dns.internal/v2/tunnels-zone/records/rec-1"
        );
        assert_eq!(
            endpoints.tunnels().as_str(),
            "https://cp.internal/v1/acct/tunnels"
        );
    }

    #[test]
    fn test_rejects_non_base_urls_and_empty_ids() {
        let account = Url::parse("mailto:ops@example.com").unwrap();
        let zone = Url::parse("https://dns.internal/records").unwrap();
        assert!(Endpoints::new(account, zone).is_err());

        assert!(Endpoints::from_ids(&root(), "", "zone").is_err());
        assert!(Endpoints::from_ids(&root(), "acct", "").is_err());
    }
}
