//! Application services
//!
//! One service per subcommand family. Services depend on I/O boundary
//! traits (RestClient, FileSystem, CommandRunner, cloud APIs) but are
//! themselves concrete structs, not traits.

use std::path::PathBuf;

use crate::config::Settings;

pub mod bootstrap;
pub mod client;
pub mod configure;
pub mod cookbook;
pub mod cookbook_site;
pub mod data_bag;
pub mod ec2;
pub mod exec;
pub mod node;
pub mod objects;
pub mod polling;
pub mod rackspace;
pub mod role;
pub mod search;
pub mod slicehost;

pub use bootstrap::{BootstrapRequest, BootstrapService};
pub use client::ClientService;
pub use configure::ConfigureService;
pub use cookbook::{CookbookService, DownloadOptions};
pub use cookbook_site::{CookbookSiteService, SiteDownload};
pub use data_bag::DataBagService;
pub use ec2::{Ec2Service, InstanceDataService};
pub use exec::{ExecService, ScriptCommand, ScriptSource};
pub use node::NodeService;
pub use objects::ObjectStore;
pub use polling::Polling;
pub use rackspace::{RackspaceCreate, RackspaceService};
pub use role::RoleService;
pub use search::{SearchOutput, SearchQuery, SearchService};
pub use slicehost::{SliceCreate, SliceRow, SlicehostService};

/// What a new host needs to register itself with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    pub chef_server_url: String,
    pub validation_client_name: String,
    pub validation_key: PathBuf,
}

impl ValidationConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chef_server_url: settings.chef_server_url.clone(),
            validation_client_name: settings.validation_client_name.clone(),
            validation_key: settings.validation_key.clone(),
        }
    }
}
