//! REST implementation of [`ControlPlane`]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::control_plane::{validate_tunnel_name, ControlPlane};
use crate::endpoints::Endpoints;
use crate::error::{ApiError, Result};
use crate::filter::{CleanupParams, TunnelFilter};
use crate::types::{
    ActiveClient, ConfigurationsRequest, DnsRecord, IngressRule, NewDnsRecord, Tunnel,
    TunnelWithToken,
};

/// Default bound on every remote call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client identification sent with every request
pub fn user_agent() -> String {
    format!("tunveo/{}", env!("CARGO_PKG_VERSION"))
}

/// Connection settings for the control plane
#[derive(Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    /// Account-level bearer credential
    pub api_token: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(endpoints: Endpoints, api_token: impl Into<String>) -> Self {
        Self {
            endpoints,
            api_token: api_token.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: user_agent(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoints", &self.endpoints)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Response envelope wrapping every control plane payload
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    per_page: u32,
    #[serde(default)]
    total_count: u32,
    #[serde(default)]
    total_pages: Option<u32>,
}

impl ResultInfo {
    /// Whether pages remain after `fetched_page`, the page number we requested
    fn has_more(&self, fetched_page: u32) -> bool {
        let total_pages = match self.total_pages {
            Some(pages) => pages,
            None if self.per_page > 0 => self.total_count.div_ceil(self.per_page),
            None => return false,
        };
        fetched_page < total_pages
    }
}

#[derive(Serialize)]
struct NewTunnel<'a> {
    name: &'a str,
    tunnel_secret: String,
    config_src: &'static str,
}

/// Status and raw body of a finished request
struct Reply {
    status: StatusCode,
    body: String,
}

impl Reply {
    fn into_status_error(self, operation: &'static str) -> ApiError {
        ApiError::Status {
            code: self.status.as_u16(),
            body: self.body,
            operation,
        }
    }

    /// Any 2xx is success; the body is not inspected
    fn ensure_success(self, operation: &'static str) -> Result<()> {
        if self.status.is_success() {
            Ok(())
        } else {
            Err(self.into_status_error(operation))
        }
    }

    fn decode<T: DeserializeOwned>(self, operation: &'static str) -> Result<(T, Option<ResultInfo>)> {
        if !self.status.is_success() {
            return Err(self.into_status_error(operation));
        }

        let envelope: Envelope<T> = serde_json::from_str(&self.body)
            .map_err(|source| ApiError::Serialization { operation, source })?;

        if !envelope.success {
            return Err(self.into_status_error(operation));
        }

        let result = envelope.result.ok_or_else(|| ApiError::Serialization {
            operation,
            source: serde::de::Error::missing_field("result"),
        })?;

        Ok((result, envelope.result_info))
    }
}

/// Authenticated client for the tunnel and DNS APIs
pub struct RestClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    api_token: String,
}

impl RestClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                operation: "build http client",
                source,
            })?;

        Ok(Self {
            http,
            endpoints: config.endpoints,
            api_token: config.api_token,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.api_token)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Reply> {
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { operation, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport { operation, source })?;

        debug!("{} -> {}", operation, status);
        Ok(Reply { status, body })
    }

    /// GET every page of a listing, following `result_info`
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut page_url = url.clone();
            page_url
                .query_pairs_mut()
                .append_pair("page", &page.to_string());

            let reply = self
                .send(operation, self.request(Method::GET, page_url))
                .await?;
            let (batch, info): (Vec<T>, _) = reply.decode(operation)?;

            let fetched = batch.len();
            items.extend(batch);

            match info {
                Some(info) if fetched > 0 && info.has_more(page) => page += 1,
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl ControlPlane for RestClient {
    async fn create_tunnel(&self, name: &str, secret: &[u8]) -> Result<TunnelWithToken> {
        const OP: &str = "create tunnel";
        validate_tunnel_name(name)?;

        let body = NewTunnel {
            name,
            tunnel_secret: STANDARD.encode(secret),
            config_src: "cloudflare",
        };
        let reply = self
            .send(OP, self.request(Method::POST, self.endpoints.tunnels()).json(&body))
            .await?;

        if reply.status == StatusCode::CONFLICT {
            return Err(ApiError::NameConflict(name.to_string()));
        }

        let (tunnel, _): (TunnelWithToken, _) = reply.decode(OP)?;
        info!("Created tunnel {} ({})", tunnel.tunnel.name, tunnel.tunnel.id);
        Ok(tunnel)
    }

    async fn get_tunnel(&self, id: Uuid) -> Result<Tunnel> {
        const OP: &str = "get tunnel";
        let reply = self
            .send(OP, self.request(Method::GET, self.endpoints.tunnel(id)))
            .await?;
        Ok(reply.decode::<Tunnel>(OP)?.0)
    }

    async fn get_tunnel_token(&self, id: Uuid) -> Result<String> {
        const OP: &str = "get tunnel token";
        let reply = self
            .send(OP, self.request(Method::GET, self.endpoints.tunnel_token(id)))
            .await?;
        Ok(reply.decode::<String>(OP)?.0)
    }

    async fn delete_tunnel(&self, id: Uuid) -> Result<()> {
        const OP: &str = "delete tunnel";
        self.send(OP, self.request(Method::DELETE, self.endpoints.tunnel(id)))
            .await?
            .ensure_success(OP)
    }

    async fn list_tunnels(&self, filter: &TunnelFilter) -> Result<Vec<Tunnel>> {
        let mut url = self.endpoints.tunnels();
        url.query_pairs_mut().extend_pairs(filter.query_pairs());
        self.get_all_pages("list tunnels", url).await
    }

    async fn list_active_clients(&self, id: Uuid) -> Result<Vec<ActiveClient>> {
        const OP: &str = "list connection details";
        let reply = self
            .send(
                OP,
                self.request(Method::GET, self.endpoints.tunnel_connections(id)),
            )
            .await?;
        Ok(reply.decode::<Vec<ActiveClient>>(OP)?.0)
    }

    async fn cleanup_connections(&self, id: Uuid, params: &CleanupParams) -> Result<()> {
        const OP: &str = "cleanup connections";
        let mut url = self.endpoints.tunnel_connections(id);
        let pairs = params.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        self.send(OP, self.request(Method::DELETE, url))
            .await?
            .ensure_success(OP)
    }

    async fn put_ingress(&self, id: Uuid, ingress: &[IngressRule]) -> Result<()> {
        const OP: &str = "configure tunnel ingress";
        let body = ConfigurationsRequest::new(ingress.to_vec());
        self.send(
            OP,
            self.request(Method::PUT, self.endpoints.tunnel_configurations(id))
                .json(&body),
        )
        .await?
        .ensure_success(OP)
    }

    async fn create_dns_record(&self, record: &NewDnsRecord) -> Result<DnsRecord> {
        const OP: &str = "create dns record";
        let reply = self
            .send(
                OP,
                self.request(Method::POST, self.endpoints.dns_records())
                    .json(record),
            )
            .await?;
        Ok(reply.decode::<DnsRecord>(OP)?.0)
    }

    async fn list_dns_records(&self) -> Result<Vec<DnsRecord>> {
        self.get_all_pages("list dns records", self.endpoints.dns_records())
            .await
    }

    async fn delete_dns_record(&self, record_id: &str) -> Result<()> {
        const OP: &str = "delete dns record";
        self.send(
            OP,
            self.request(Method::DELETE, self.endpoints.dns_record(record_id)),
        )
        .await?
        .ensure_success(OP)
    }
}
