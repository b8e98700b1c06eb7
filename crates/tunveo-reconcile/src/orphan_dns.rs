//! Removes tunnel-managed DNS aliases whose tunnel no longer exists

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tunveo_cfapi::{ControlPlane, TunnelFilter};

use crate::periodic::Reconciler;
use crate::report::SweepReport;

pub struct OrphanDnsReclaimer {
    control_plane: Arc<dyn ControlPlane>,
}

impl OrphanDnsReclaimer {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }
}

#[async_trait]
impl Reconciler for OrphanDnsReclaimer {
    fn name(&self) -> &'static str {
        "orphan-dns"
    }

    async fn run_once(&self) -> SweepReport {
        let records = match self.control_plane.list_dns_records().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Orphan DNS sweep aborted, cannot list records: {}", e);
                return SweepReport::aborted();
            }
        };

        let mut report = SweepReport::default();

        for record in records {
            let Some(parsed) = record.managed_tunnel_id() else {
                continue;
            };
            report.examined += 1;

            let tunnel_id = match parsed {
                Ok(id) => id,
                Err(e) => {
                    warn!(
                        "Skipping DNS record {} ({}): malformed tunnel id in '{}': {}",
                        record.name, record.id, record.content, e
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            let filter = TunnelFilter::new().no_deleted().by_tunnel_id(tunnel_id);
            let tunnels = match self.control_plane.list_tunnels(&filter).await {
                Ok(tunnels) => tunnels,
                Err(e) => {
                    warn!(
                        "Skipping DNS record {}: lookup of tunnel {} failed: {}",
                        record.name, tunnel_id, e
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            if tunnels.iter().any(|t| filter.matches(t)) {
                debug!("DNS record {} still routes to tunnel {}", record.name, tunnel_id);
                report.retained += 1;
                continue;
            }

            match self.control_plane.delete_dns_record(&record.id).await {
                Ok(()) => {
                    info!(
                        "Deleted orphan DNS record {} -> {}",
                        record.name, record.content
                    );
                    report.deleted += 1;
                }
                Err(e) if e.is_not_found() => {
                    debug!("DNS record {} already removed", record.name);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Failed to delete DNS record {}: {}", record.name, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
