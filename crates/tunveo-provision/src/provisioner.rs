//! Turns an ingress document into a live tunnel, its routes, and a connector token

use std::sync::Arc;
use tracing::{info, warn};
use tunveo_cfapi::{ControlPlane, IngressRule};
use uuid::Uuid;

use crate::error::ProvisionError;
use crate::ingress;
use crate::naming::{generate_secret, LabelGenerator, RandomLabels};

/// Provisioning settings
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Domain under which `auto` hostnames are generated (e.g. `tunnels.example.com`)
    pub parent_domain: String,
}

impl ProvisionConfig {
    pub fn new(parent_domain: impl Into<String>) -> Self {
        Self {
            parent_domain: parent_domain.into(),
        }
    }
}

/// Outcome of a successful provisioning request
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    pub tunnel_id: Uuid,
    pub tunnel_name: String,
    /// Opaque connector credential
    pub token: String,
    /// Hostname generated for `auto` rules, if the request had any
    pub hostname: Option<String>,
    /// Every hostname routed to the tunnel
    pub hostnames: Vec<String>,
}

pub struct Provisioner {
    control_plane: Arc<dyn ControlPlane>,
    config: ProvisionConfig,
    labels: Arc<dyn LabelGenerator>,
}

impl Provisioner {
    pub fn new(control_plane: Arc<dyn ControlPlane>, config: ProvisionConfig) -> Self {
        Self {
            control_plane,
            config,
            labels: Arc::new(RandomLabels),
        }
    }

    /// Replace the source of tunnel names and generated hostname labels
    pub fn with_label_generator(mut self, labels: Arc<dyn LabelGenerator>) -> Self {
        self.labels = labels;
        self
    }

    /// Create a tunnel for `ingress` and route its hostnames to it
    ///
    /// A creation failure leaves no remote state. A configuration failure
    /// leaves the tunnel behind without connectors; the idle reaper removes it.
    pub async fn provision(
        &self,
        mut ingress: Vec<IngressRule>,
    ) -> Result<Provisioned, ProvisionError> {
        ingress::validate(&ingress)?;

        let hostname = if ingress.iter().any(ingress::is_auto) {
            let hostname = format!("{}.{}", self.labels.generate(), self.config.parent_domain);
            ingress::substitute_auto(&mut ingress, &hostname);
            Some(hostname)
        } else {
            None
        };

        let secret = generate_secret();
        let name = self.labels.generate();

        let created = self.control_plane.create_tunnel(&name, &secret).await?;
        let tunnel_id = created.tunnel.id;
        info!("Created tunnel {} ({})", name, tunnel_id);

        if let Err(e) = self
            .control_plane
            .configure_ingress(tunnel_id, &ingress)
            .await
        {
            warn!("Tunnel {} left unconfigured: {}", tunnel_id, e);
            return Err(e.into());
        }

        let hostnames = ingress::routed_hostnames(&ingress);
        info!(
            "Provisioned tunnel {} for {}",
            tunnel_id,
            hostnames.join(", ")
        );

        Ok(Provisioned {
            tunnel_id,
            tunnel_name: created.tunnel.name,
            token: created.token,
            hostname,
            hostnames,
        })
    }
}
