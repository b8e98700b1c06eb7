//! Deletes tunnels that have no connector attached
//!
//! A tunnel is deleted only when it reports zero active clients at two checks
//! separated by the grace interval. A connector that attaches between the
//! second check and the delete call can still lose its tunnel; callers treat a
//! token as valid until proven otherwise.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tunveo_cfapi::{ControlPlane, Tunnel, TunnelFilter};
use uuid::Uuid;

use crate::periodic::Reconciler;
use crate::report::SweepReport;

/// Default wait between the two liveness checks
pub const DEFAULT_GRACE: Duration = Duration::from_secs(30);

pub struct IdleTunnelReaper {
    control_plane: Arc<dyn ControlPlane>,
    grace: Duration,
}

impl IdleTunnelReaper {
    pub fn new(control_plane: Arc<dyn ControlPlane>, grace: Duration) -> Self {
        Self {
            control_plane,
            grace,
        }
    }

    /// `Some(true)` when the tunnel has no active client, `None` when unknown
    async fn is_idle(&self, id: Uuid) -> Option<bool> {
        match self.control_plane.list_active_clients(id).await {
            Ok(clients) => Some(clients.is_empty()),
            Err(e) => {
                warn!("Cannot check active clients of tunnel {}: {}", id, e);
                None
            }
        }
    }
}

#[async_trait]
impl Reconciler for IdleTunnelReaper {
    fn name(&self) -> &'static str {
        "idle-tunnels"
    }

    async fn run_once(&self) -> SweepReport {
        let tunnels = match self
            .control_plane
            .list_tunnels(&TunnelFilter::new().no_deleted())
            .await
        {
            Ok(tunnels) => tunnels,
            Err(e) => {
                warn!("Idle tunnel sweep aborted, cannot list tunnels: {}", e);
                return SweepReport::aborted();
            }
        };

        let mut report = SweepReport {
            examined: tunnels.len(),
            ..SweepReport::default()
        };

        let mut candidates: Vec<Tunnel> = Vec::new();
        for tunnel in tunnels {
            match self.is_idle(tunnel.id).await {
                Some(true) => candidates.push(tunnel),
                Some(false) => report.retained += 1,
                None => report.skipped += 1,
            }
        }

        if candidates.is_empty() {
            return report;
        }

        debug!(
            "{} idle tunnel(s), rechecking in {:?}",
            candidates.len(),
            self.grace
        );
        tokio::time::sleep(self.grace).await;

        for tunnel in candidates {
            match self.is_idle(tunnel.id).await {
                Some(true) => {}
                Some(false) => {
                    debug!("Tunnel {} gained a client during the grace period", tunnel.id);
                    report.retained += 1;
                    continue;
                }
                None => {
                    report.skipped += 1;
                    continue;
                }
            }

            match self.control_plane.delete_tunnel(tunnel.id).await {
                Ok(()) => {
                    info!("Deleted idle tunnel {} ({})", tunnel.name, tunnel.id);
                    report.deleted += 1;
                }
                Err(e) if e.is_not_found() => {
                    debug!("Tunnel {} already deleted", tunnel.id);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Failed to delete idle tunnel {}: {}", tunnel.id, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
