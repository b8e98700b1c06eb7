//! In-memory control plane for tests
//!
//! Behaves like the remote API for the calls this workspace makes: name
//! conflicts, soft-deleted tunnels, 404s on missing resources. Failures and
//! active-client counts can be scripted per tunnel or hostname.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::control_plane::{validate_tunnel_name, ControlPlane};
use crate::error::{ApiError, Result};
use crate::filter::{CleanupParams, TunnelFilter};
use crate::types::{
    ActiveClient, DnsRecord, DnsRecordMeta, IngressRule, NewDnsRecord, Tunnel, TunnelWithToken,
};

#[derive(Default)]
struct State {
    tunnels: Vec<Tunnel>,
    secrets: HashMap<Uuid, Vec<u8>>,
    ingress: HashMap<Uuid, Vec<IngressRule>>,
    /// Steady-state number of connectors per tunnel
    active_clients: HashMap<Uuid, usize>,
    /// Counts returned by the next `list_active_clients` calls, ahead of the steady state
    active_client_script: HashMap<Uuid, VecDeque<usize>>,
    dns_records: Vec<DnsRecord>,
    next_record: u64,

    failing_hostnames: HashSet<String>,
    failing_active_clients: HashSet<Uuid>,
    fail_list_dns: bool,
    fail_put_ingress: bool,

    tunnel_deletions: Vec<Uuid>,
    dns_deletions: Vec<String>,
}

fn not_found(operation: &'static str, what: impl std::fmt::Display) -> ApiError {
    ApiError::Status {
        code: 404,
        body: format!("{} not found", what),
        operation,
    }
}

fn injected(operation: &'static str) -> ApiError {
    ApiError::Status {
        code: 500,
        body: "injected failure".to_string(),
        operation,
    }
}

#[derive(Default)]
pub struct InMemoryControlPlane {
    state: Mutex<State>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a live tunnel with no connectors
    pub fn insert_tunnel(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state().tunnels.push(Tunnel {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
            connections: Vec::new(),
        });
        id
    }

    /// Seed a DNS record, returning its id
    pub fn insert_dns_record(&self, name: &str, content: &str) -> String {
        let mut state = self.state();
        let id = Self::next_record_id(&mut state);
        state.dns_records.push(DnsRecord {
            id: id.clone(),
            zone_id: "zone".to_string(),
            zone_name: "example.com".to_string(),
            name: name.to_string(),
            record_type: "CNAME".to_string(),
            content: content.to_string(),
            proxiable: true,
            proxied: true,
            ttl: 1,
            locked: false,
            meta: DnsRecordMeta::default(),
            created_on: Some(Utc::now()),
            modified_on: Some(Utc::now()),
        });
        id
    }

    fn next_record_id(state: &mut State) -> String {
        state.next_record += 1;
        format!("rec-{}", state.next_record)
    }

    pub fn set_active_clients(&self, id: Uuid, count: usize) {
        self.state().active_clients.insert(id, count);
    }

    /// Answer the next `list_active_clients` calls for `id` with these counts
    pub fn script_active_clients(&self, id: Uuid, counts: impl IntoIterator<Item = usize>) {
        self.state()
            .active_client_script
            .entry(id)
            .or_default()
            .extend(counts);
    }

    pub fn fail_dns_for(&self, hostname: &str) {
        self.state().failing_hostnames.insert(hostname.to_string());
    }

    pub fn fail_active_clients_for(&self, id: Uuid) {
        self.state().failing_active_clients.insert(id);
    }

    pub fn fail_list_dns(&self, fail: bool) {
        self.state().fail_list_dns = fail;
    }

    pub fn fail_put_ingress(&self, fail: bool) {
        self.state().fail_put_ingress = fail;
    }

    pub fn tunnels(&self) -> Vec<Tunnel> {
        self.state().tunnels.clone()
    }

    pub fn live_tunnels(&self) -> Vec<Tunnel> {
        self.state()
            .tunnels
            .iter()
            .filter(|t| !t.is_deleted())
            .cloned()
            .collect()
    }

    pub fn dns_records(&self) -> Vec<DnsRecord> {
        self.state().dns_records.clone()
    }

    pub fn ingress(&self, id: Uuid) -> Option<Vec<IngressRule>> {
        self.state().ingress.get(&id).cloned()
    }

    pub fn secret(&self, id: Uuid) -> Option<Vec<u8>> {
        self.state().secrets.get(&id).cloned()
    }

    /// Successful tunnel deletions, in order
    pub fn tunnel_deletions(&self) -> Vec<Uuid> {
        self.state().tunnel_deletions.clone()
    }

    /// Successful DNS record deletions, in order
    pub fn dns_deletions(&self) -> Vec<String> {
        self.state().dns_deletions.clone()
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn create_tunnel(&self, name: &str, secret: &[u8]) -> Result<TunnelWithToken> {
        validate_tunnel_name(name)?;

        let mut state = self.state();
        if state
            .tunnels
            .iter()
            .any(|t| !t.is_deleted() && t.name == name)
        {
            return Err(ApiError::NameConflict(name.to_string()));
        }

        let tunnel = Tunnel {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
            connections: Vec::new(),
        };
        state.secrets.insert(tunnel.id, secret.to_vec());
        state.tunnels.push(tunnel.clone());

        Ok(TunnelWithToken {
            token: format!("token-{}", tunnel.id),
            tunnel,
        })
    }

    async fn get_tunnel(&self, id: Uuid) -> Result<Tunnel> {
        self.state()
            .tunnels
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found("get tunnel", id))
    }

    async fn get_tunnel_token(&self, id: Uuid) -> Result<String> {
        let tunnel = self.get_tunnel(id).await?;
        Ok(format!("token-{}", tunnel.id))
    }

    async fn delete_tunnel(&self, id: Uuid) -> Result<()> {
        let mut state = self.state();
        let tunnel = state
            .tunnels
            .iter_mut()
            .find(|t| t.id == id && !t.is_deleted())
            .ok_or_else(|| not_found("delete tunnel", id))?;
        tunnel.deleted_at = Some(Utc::now());
        state.tunnel_deletions.push(id);
        Ok(())
    }

    async fn list_tunnels(&self, filter: &TunnelFilter) -> Result<Vec<Tunnel>> {
        Ok(self
            .state()
            .tunnels
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn list_active_clients(&self, id: Uuid) -> Result<Vec<ActiveClient>> {
        let mut state = self.state();
        if state.failing_active_clients.contains(&id) {
            return Err(injected("list connection details"));
        }
        if !state.tunnels.iter().any(|t| t.id == id) {
            return Err(not_found("list connection details", id));
        }

        let scripted = state
            .active_client_script
            .get_mut(&id)
            .and_then(|script| script.pop_front());
        let count = scripted.unwrap_or_else(|| state.active_clients.get(&id).copied().unwrap_or(0));

        Ok((0..count)
            .map(|_| ActiveClient {
                id: Uuid::new_v4(),
                features: Vec::new(),
                version: "test".to_string(),
                arch: "test".to_string(),
                run_at: Some(Utc::now()),
                connections: Vec::new(),
            })
            .collect())
    }

    async fn cleanup_connections(&self, id: Uuid, params: &CleanupParams) -> Result<()> {
        let mut state = self.state();
        if !state.tunnels.iter().any(|t| t.id == id) {
            return Err(not_found("cleanup connections", id));
        }
        let count = state.active_clients.entry(id).or_insert(0);
        if params.client_id().is_some() {
            *count = count.saturating_sub(1);
        } else {
            *count = 0;
        }
        Ok(())
    }

    async fn put_ingress(&self, id: Uuid, ingress: &[IngressRule]) -> Result<()> {
        let mut state = self.state();
        if state.fail_put_ingress {
            return Err(injected("configure tunnel ingress"));
        }
        if !state.tunnels.iter().any(|t| t.id == id && !t.is_deleted()) {
            return Err(not_found("configure tunnel ingress", id));
        }
        state.ingress.insert(id, ingress.to_vec());
        Ok(())
    }

    async fn create_dns_record(&self, record: &NewDnsRecord) -> Result<DnsRecord> {
        let mut state = self.state();
        if state.failing_hostnames.contains(&record.name) {
            return Err(injected("create dns record"));
        }
        if state.dns_records.iter().any(|r| r.name == record.name) {
            return Err(ApiError::Status {
                code: 400,
                body: "An A, AAAA, or CNAME record with that host already exists.".to_string(),
                operation: "create dns record",
            });
        }

        let created = DnsRecord {
            id: Self::next_record_id(&mut state),
            zone_id: "zone".to_string(),
            zone_name: "example.com".to_string(),
            name: record.name.clone(),
            record_type: record.record_type.clone(),
            content: record.content.clone(),
            proxiable: true,
            proxied: record.proxied,
            ttl: 1,
            locked: false,
            meta: DnsRecordMeta::default(),
            created_on: Some(Utc::now()),
            modified_on: Some(Utc::now()),
        };
        state.dns_records.push(created.clone());
        Ok(created)
    }

    async fn list_dns_records(&self) -> Result<Vec<DnsRecord>> {
        let state = self.state();
        if state.fail_list_dns {
            return Err(injected("list dns records"));
        }
        Ok(state.dns_records.clone())
    }

    async fn delete_dns_record(&self, record_id: &str) -> Result<()> {
        let mut state = self.state();
        let before = state.dns_records.len();
        state.dns_records.retain(|r| r.id != record_id);
        if state.dns_records.len() == before {
            return Err(not_found("delete dns record", record_id));
        }
        state.dns_deletions.push(record_id.to_string());
        Ok(())
    }
}
