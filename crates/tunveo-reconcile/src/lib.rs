//! Background reconciliation of remote tunnel state
//!
//! Two independent loops keep the control plane tidy without any local
//! bookkeeping: the orphan DNS reclaimer removes aliases pointing at tunnels
//! that no longer exist, and the idle tunnel reaper deletes tunnels no
//! connector ever attached to (or that were abandoned). Every decision re-reads
//! remote state.

pub mod idle_tunnels;
pub mod orphan_dns;
pub mod periodic;
pub mod report;

pub use idle_tunnels::IdleTunnelReaper;
pub use orphan_dns::OrphanDnsReclaimer;
pub use periodic::{PeriodicTask, Reconciler};
pub use report::SweepReport;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tunveo_cfapi::ControlPlane;

/// Schedules for both loops
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// How often the DNS zone is scanned for orphaned aliases
    pub orphan_dns_interval: Duration,
    /// How often tunnels are checked for connectors
    pub idle_tunnel_interval: Duration,
    /// Wait between the two connector checks before deleting
    pub idle_grace: Duration,
    pub enable_orphan_dns: bool,
    pub enable_idle_tunnels: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            orphan_dns_interval: Duration::from_secs(48 * 60 * 60),
            idle_tunnel_interval: Duration::from_secs(10),
            idle_grace: idle_tunnels::DEFAULT_GRACE,
            enable_orphan_dns: true,
            enable_idle_tunnels: true,
        }
    }
}

impl ReconcileConfig {
    /// Reconcilers enabled by this configuration, paired with their period
    pub fn reconcilers(
        &self,
        control_plane: Arc<dyn ControlPlane>,
    ) -> Vec<(Arc<dyn Reconciler>, Duration)> {
        let mut reconcilers: Vec<(Arc<dyn Reconciler>, Duration)> = Vec::new();
        if self.enable_orphan_dns {
            reconcilers.push((
                Arc::new(OrphanDnsReclaimer::new(control_plane.clone())),
                self.orphan_dns_interval,
            ));
        }
        if self.enable_idle_tunnels {
            reconcilers.push((
                Arc::new(IdleTunnelReaper::new(control_plane, self.idle_grace)),
                self.idle_tunnel_interval,
            ));
        }
        reconcilers
    }

    /// Spawn one periodic task per enabled reconciler
    pub fn spawn_all(
        &self,
        control_plane: Arc<dyn ControlPlane>,
        shutdown: &CancellationToken,
    ) -> Vec<JoinHandle<usize>> {
        self.reconcilers(control_plane)
            .into_iter()
            .map(|(reconciler, period)| PeriodicTask::new(reconciler, period).spawn(shutdown.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunveo_cfapi::testing::InMemoryControlPlane;

    #[test]
    fn test_disabled_loops_are_not_built() {
        let cp: Arc<dyn ControlPlane> = Arc::new(InMemoryControlPlane::new());

        let all = ReconcileConfig::default().reconcilers(cp.clone());
        let names: Vec<_> = all.iter().map(|(r, _)| r.name()).collect();
        assert_eq!(names, vec!["orphan-dns", "idle-tunnels"]);

        let config = ReconcileConfig {
            enable_orphan_dns: false,
            ..ReconcileConfig::default()
        };
        let only_reaper = config.reconcilers(cp);
        assert_eq!(only_reaper.len(), 1);
        assert_eq!(only_reaper[0].1, Duration::from_secs(10));
    }
}
