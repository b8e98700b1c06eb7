//! Tunveo server
//!
//! Serves the provisioning API and runs the reconciliation loops against one
//! control plane account. `tunveo sweep` runs a single reconciliation pass and
//! exits.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunveo_cfapi::{ClientConfig, ControlPlane, Endpoints, RestClient, Url, DEFAULT_API_ROOT};
use tunveo_provision::{ApiServer, ApiServerConfig, ProvisionConfig, Provisioner};
use tunveo_reconcile::ReconcileConfig;

/// Ephemeral tunnel provisioning and reconciliation
#[derive(Parser, Debug)]
#[command(name = "tunveo")]
#[command(about = "Provision ephemeral tunnels and reclaim abandoned ones", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", env = "TUNVEO_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the provisioning API and run the reconciliation loops
    Serve {
        #[command(flatten)]
        control_plane: ControlPlaneArgs,

        #[command(flatten)]
        server: ServerArgs,
    },

    /// Run one reconciliation pass and exit
    Sweep {
        #[command(flatten)]
        control_plane: ControlPlaneArgs,

        /// Which reconciler to run
        #[arg(long, value_enum, default_value_t = SweepTarget::All)]
        target: SweepTarget,

        /// Seconds between the two connector checks of the idle tunnel reaper
        #[arg(long, default_value = "30")]
        idle_grace_secs: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SweepTarget {
    All,
    OrphanDns,
    IdleTunnels,
}

#[derive(Args, Debug)]
struct ControlPlaneArgs {
    /// Account-level API token
    #[arg(long, env = "TUNVEO_API_TOKEN", hide_env_values = true)]
    api_token: String,

    /// Account owning the tunnels
    #[arg(long, env = "TUNVEO_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Zone holding the public DNS aliases
    #[arg(long, env = "TUNVEO_ZONE_ID")]
    zone_id: Option<String>,

    /// Control plane API root
    #[arg(long, env = "TUNVEO_API_ROOT", default_value = DEFAULT_API_ROOT)]
    api_root: String,

    /// Full tunnel collection URL, overriding --api-root/--account-id
    #[arg(long, env = "TUNVEO_ACCOUNT_ENDPOINT")]
    account_endpoint: Option<String>,

    /// Full DNS record collection URL, overriding --api-root/--zone-id
    #[arg(long, env = "TUNVEO_ZONE_ENDPOINT")]
    zone_endpoint: Option<String>,

    /// Timeout for every control plane request, in seconds
    #[arg(long, env = "TUNVEO_REQUEST_TIMEOUT", default_value = "30")]
    request_timeout_secs: u64,
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Provisioning API bind address
    #[arg(long, env = "TUNVEO_BIND_ADDR", default_value = "0.0.0.0:9090")]
    bind_addr: SocketAddr,

    /// Parent domain of generated hostnames: {label}.{public_domain}
    #[arg(long, env = "TUNVEO_PUBLIC_DOMAIN")]
    public_domain: String,

    /// Seconds between orphan DNS sweeps
    #[arg(long, default_value = "172800")]
    orphan_dns_interval_secs: u64,

    /// Seconds between idle tunnel sweeps
    #[arg(long, default_value = "10")]
    idle_interval_secs: u64,

    /// Seconds between the two connector checks of the idle tunnel reaper
    #[arg(long, default_value = "30")]
    idle_grace_secs: u64,

    /// Do not run the orphan DNS reclaimer
    #[arg(long)]
    no_orphan_dns: bool,

    /// Do not run the idle tunnel reaper
    #[arg(long)]
    no_idle_reaper: bool,
}

impl ControlPlaneArgs {
    fn endpoints(&self) -> Result<Endpoints> {
        let api_root = Url::parse(&self.api_root)
            .with_context(|| format!("Invalid API root '{}'", self.api_root))?;

        let account = match (&self.account_endpoint, &self.account_id) {
            (Some(url), _) => Url::parse(url)
                .with_context(|| format!("Invalid account endpoint '{}'", url))?,
            (None, Some(id)) => Endpoints::account_root(&api_root, id)?,
            (None, None) => anyhow::bail!("--account-id or --account-endpoint is required"),
        };

        let zone = match (&self.zone_endpoint, &self.zone_id) {
            (Some(url), _) => {
                Url::parse(url).with_context(|| format!("Invalid zone endpoint '{}'", url))?
            }
            (None, Some(id)) => Endpoints::zone_root(&api_root, id)?,
            (None, None) => anyhow::bail!("--zone-id or --zone-endpoint is required"),
        };

        Ok(Endpoints::new(account, zone)?)
    }

    fn connect(&self) -> Result<Arc<dyn ControlPlane>> {
        let config = ClientConfig::new(self.endpoints()?, self.api_token.clone())
            .with_timeout(Duration::from_secs(self.request_timeout_secs));
        let client = RestClient::new(config).context("Failed to build control plane client")?;
        info!("Tunnel endpoint: {}", client.endpoints().account());
        info!("DNS endpoint: {}", client.endpoints().zone());

        Ok(Arc::new(client))
    }
}

impl ServerArgs {
    fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            orphan_dns_interval: Duration::from_secs(self.orphan_dns_interval_secs),
            idle_tunnel_interval: Duration::from_secs(self.idle_interval_secs),
            idle_grace: Duration::from_secs(self.idle_grace_secs),
            enable_orphan_dns: !self.no_orphan_dns,
            enable_idle_tunnels: !self.no_idle_reaper,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Serve {
            control_plane,
            server,
        } => serve(control_plane, server).await,
        Commands::Sweep {
            control_plane,
            target,
            idle_grace_secs,
        } => sweep(control_plane, target, idle_grace_secs).await,
    }
}

async fn serve(control_plane: ControlPlaneArgs, server: ServerArgs) -> Result<()> {
    if server.public_domain.trim().is_empty() {
        anyhow::bail!("--public-domain must not be empty");
    }
    if server.idle_interval_secs == 0 || server.orphan_dns_interval_secs == 0 {
        anyhow::bail!("Reconciler intervals must be at least one second");
    }

    info!("Starting tunveo {}", env!("CARGO_PKG_VERSION"));

    let control_plane = control_plane.connect()?;
    let shutdown = CancellationToken::new();

    let reconcile = server.reconcile_config();
    let loops = reconcile.spawn_all(control_plane.clone(), &shutdown);
    info!("✅ {} reconciler(s) running", loops.len());

    let provisioner = Provisioner::new(
        control_plane,
        ProvisionConfig::new(server.public_domain.clone()),
    );
    info!("Generated hostnames: {{label}}.{}", server.public_domain);

    let api = ApiServer::new(
        ApiServerConfig {
            bind_addr: server.bind_addr,
        },
        provisioner,
    );
    let mut api_handle = tokio::spawn(api.start(shutdown.clone()));

    info!("Press Ctrl+C to stop");

    let api_result = tokio::select! {
        received = signal::ctrl_c() => {
            match received {
                Ok(()) => info!("Shutdown signal received, stopping..."),
                Err(err) => error!("Error listening for shutdown signal: {}", err),
            }
            shutdown.cancel();
            (&mut api_handle).await
        }
        result = &mut api_handle => {
            shutdown.cancel();
            result
        }
    };

    for handle in loops {
        if let Err(e) = handle.await {
            warn!("Reconciler task ended abnormally: {}", e);
        }
    }

    api_result.context("Provisioning API task failed")??;
    info!("Shutdown complete");
    Ok(())
}

async fn sweep(
    control_plane: ControlPlaneArgs,
    target: SweepTarget,
    idle_grace_secs: u64,
) -> Result<()> {
    let control_plane = control_plane.connect()?;

    let config = ReconcileConfig {
        idle_grace: Duration::from_secs(idle_grace_secs),
        enable_orphan_dns: matches!(target, SweepTarget::All | SweepTarget::OrphanDns),
        enable_idle_tunnels: matches!(target, SweepTarget::All | SweepTarget::IdleTunnels),
        ..ReconcileConfig::default()
    };

    for (reconciler, _) in config.reconcilers(control_plane) {
        let report = reconciler.run_once().await;
        info!("{} pass finished: {}", reconciler.name(), report);
    }

    Ok(())
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control_plane_args() -> ControlPlaneArgs {
        ControlPlaneArgs {
            api_token: "token".to_string(),
            account_id: Some("acct".to_string()),
            zone_id: Some("zone1".to_string()),
            api_root: DEFAULT_API_ROOT.to_string(),
            account_endpoint: None,
            zone_endpoint: None,
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_endpoints_from_ids() {
        let endpoints = control_plane_args().endpoints().unwrap();
        assert_eq!(
            endpoints.zone().as_str(),
            "https://api.cloudflare.com/client/v4/zones/zone1/dns_records"
        );
    }

    #[test]
    fn test_endpoint_override_wins() {
        let mut args = control_plane_args();
        args.zone_endpoint = Some("https://dns.internal/records".to_string());
        args.account_id = None;
        assert!(args.endpoints().is_err());

        args.account_endpoint = Some("https://cp.internal/tunnels".to_string());
        let endpoints = args.endpoints().unwrap();
        assert_eq!(endpoints.account().as_str(), "https://cp.internal/tunnels");
        assert_eq!(endpoints.zone().as_str(), "https://dns.internal/records");
    }

    #[test]
    fn test_sweep_parses() {
        let cli = Cli::try_parse_from([
            "tunveo",
            "sweep",
            "--api-token",
            "t",
            "--account-id",
            "a",
            "--zone-id",
            "z",
            "--target",
            "orphan-dns",
        ])
        .unwrap();

        match cli.command {
            Commands::Sweep { target, .. } => assert_eq!(target, SweepTarget::OrphanDns),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
