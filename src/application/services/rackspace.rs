//! Rackspace Cloud Servers

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::services::bootstrap::{BootstrapRequest, BootstrapService};
use crate::application::services::objects::require;
use crate::application::services::polling::Polling;
use crate::application::{ApplicationError, ApplicationResult, Ui};
use crate::domain::{RackspaceServer, ServerRequest};
use crate::infrastructure::traits::{PortProbe, RackspaceApi};

pub const DEFAULT_FLAVOR: &str = "1";
pub const DEFAULT_IMAGE: &str = "14362";

#[derive(Debug, Clone, Default)]
pub struct RackspaceCreate {
    pub name: Option<String>,
    pub flavor: Option<String>,
    pub image: Option<String>,
    pub run_list: Vec<String>,
    pub distro: Option<String>,
}

pub struct RackspaceService {
    api: Arc<dyn RackspaceApi>,
    ui: Arc<Ui>,
    probe: Arc<dyn PortProbe>,
    bootstrap: BootstrapService,
    polling: Polling,
}

impl RackspaceService {
    pub fn new(
        api: Arc<dyn RackspaceApi>,
        ui: Arc<Ui>,
        probe: Arc<dyn PortProbe>,
        bootstrap: BootstrapService,
        polling: Polling,
    ) -> Self {
        Self {
            api,
            ui,
            probe,
            bootstrap,
            polling,
        }
    }

    pub fn list(&self) -> ApplicationResult<Vec<RackspaceServer>> {
        Ok(self.api.list_servers()?)
    }

    /// Create a server, wait for it and its sshd, then bootstrap it.
    pub fn create(&self, options: &RackspaceCreate) -> ApplicationResult<RackspaceServer> {
        let request = ServerRequest {
            name: options.name.clone().unwrap_or_default(),
            flavor_id: options
                .flavor
                .clone()
                .unwrap_or_else(|| DEFAULT_FLAVOR.to_string()),
            image_id: options
                .image
                .clone()
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        };
        let created = self.api.create_server(&request)?;

        self.ui.heading("Requesting server");
        self.ui.field("Instance ID", &created.id);
        self.ui.field("Name", &created.name);
        self.ui.field("Flavor", &created.flavor_id);
        self.ui.field("Image", &created.image_id);

        let server = self.polling.wait_until(
            &self.ui,
            &format!("server {}", created.id),
            created.clone(),
            |server| {
                if server.is_failed() {
                    return Err(ApplicationError::fatal(format!(
                        "Server {} entered state {}",
                        server.id, server.status
                    )));
                }
                Ok(server.is_ready())
            },
            || {
                let server = self.api.get_server(&created.id)?;
                debug!("rackspace: {} is {}", server.id, server.status);
                Ok(server)
            },
        )?;
        self.ui.say("");

        let public_ip = server.public_ips.first().cloned().unwrap_or_default();
        self.ui.field("Public IP Address", &public_ip);
        self.ui.field(
            "Private IP Address",
            &server.private_ips.first().cloned().unwrap_or_default(),
        );
        // Only the create response carries the root password.
        let password = created.password.clone().or_else(|| server.password.clone());
        self.ui.field("Password", password.as_deref().unwrap_or(""));

        if public_ip.is_empty() {
            return Err(ApplicationError::fatal(format!(
                "Server {} has no public IP address",
                server.id
            )));
        }
        self.ui.print("Waiting for sshd");
        self.polling.wait_until(
            &self.ui,
            &format!("sshd on {public_ip}"),
            self.probe.is_listening(&public_ip, 22),
            |listening| Ok(*listening),
            || Ok(self.probe.is_listening(&public_ip, 22)),
        )?;
        self.ui.say("done");

        self.bootstrap.run(&BootstrapRequest {
            host: public_ip,
            ssh_user: "root".to_string(),
            ssh_password: password,
            node_name: Some(server.name.clone()),
            run_list: options.run_list.clone(),
            distro: options.distro.clone(),
            sudo: false,
        })?;
        info!("Bootstrapped {}", server.name);
        Ok(server)
    }

    pub fn delete(&self, id: Option<&str>) -> ApplicationResult<()> {
        let id = require(id, "You must specify a server id")?;
        let server = self.api.get_server(id)?;
        self.ui.confirm(&format!(
            "Do you really want to delete server ID {} named {}",
            server.id, server.name
        ))?;
        self.api.delete_server(&server.id)?;
        warn!("Deleted server {} named {}", server.id, server.name);
        Ok(())
    }
}
