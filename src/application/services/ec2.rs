//! EC2: instance user data and server management

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::application::services::ValidationConfig;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt, Ui};
use crate::domain::Ec2Server;
use crate::infrastructure::traits::{Ec2Api, FileSystem};

/// User data that lets a fresh instance register itself.
pub struct InstanceDataService {
    fs: Arc<dyn FileSystem>,
    ui: Arc<Ui>,
    validation: ValidationConfig,
}

impl InstanceDataService {
    pub fn new(fs: Arc<dyn FileSystem>, ui: Arc<Ui>, validation: ValidationConfig) -> Self {
        Self { fs, ui, validation }
    }

    pub fn instance_data(&self, run_list: &[String], edit: bool) -> ApplicationResult<Value> {
        let key_path = &self.validation.validation_key;
        let key = self
            .fs
            .read_to_string(key_path)
            .with_path_context("read validation key", key_path)?;
        let data = json!({
            "chef_server": self.validation.chef_server_url,
            "validation_client_name": self.validation.validation_client_name,
            "validation_key": key,
            "attributes": { "run_list": run_list },
        });
        if edit {
            self.ui.edit_data(&data)
        } else {
            Ok(data)
        }
    }
}

pub struct Ec2Service {
    api: Arc<dyn Ec2Api>,
    ui: Arc<Ui>,
}

impl Ec2Service {
    pub fn new(api: Arc<dyn Ec2Api>, ui: Arc<Ui>) -> Self {
        Self { api, ui }
    }

    pub fn list(&self) -> ApplicationResult<Vec<Ec2Server>> {
        Ok(self.api.list_servers()?)
    }

    /// Show each instance, confirm, terminate.
    pub fn delete(&self, ids: &[String]) -> ApplicationResult<()> {
        if ids.is_empty() {
            return Err(ApplicationError::usage("You must specify at least one instance id"));
        }
        for id in ids {
            let server = self
                .api
                .get_server(id)?
                .ok_or_else(|| ApplicationError::fatal(format!("Could not find server {id}")))?;
            self.describe(&server);
            self.ui.confirm("Do you really want to delete this server")?;
            self.api.terminate_server(&server.id)?;
            warn!("Deleted server {}", server.id);
        }
        Ok(())
    }

    fn describe(&self, server: &Ec2Server) {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        self.ui.field("Instance ID", &server.id);
        self.ui.field("Flavor", &server.flavor_id);
        self.ui.field("Image", &server.image_id);
        self.ui.field("Availability Zone", &opt(&server.availability_zone));
        self.ui.field("Security Groups", &server.groups.join(", "));
        self.ui.field("SSH Key", &opt(&server.key_name));
        self.ui.field("Public DNS Name", &opt(&server.dns_name));
        self.ui.field("Public IP Address", &opt(&server.ip_address));
        self.ui.field("Private DNS Name", &opt(&server.private_dns_name));
        self.ui.field("Private IP Address", &opt(&server.private_ip_address));
    }
}
