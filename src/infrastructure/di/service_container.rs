//! Service container for dependency injection
//!
//! Wires up all services with their dependencies. Remote clients are built
//! on first use so commands that never talk to a server need no credentials.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::application::services::{
    BootstrapService, ClientService, ConfigureService, CookbookService, CookbookSiteService,
    DataBagService, Ec2Service, ExecService, InstanceDataService, NodeService, ObjectStore,
    Polling, RackspaceService, RoleService, SearchService, SlicehostService, ValidationConfig,
};
use crate::application::{ApplicationError, Ui, UiOptions};
use crate::config::Settings;
use crate::infrastructure::cloud::{
    AwsCredentials, Ec2Client, RackspaceClient, RackspaceCredentials, SlicehostClient,
};
use crate::infrastructure::rest::{HttpRestClient, LazySignedClient};
use crate::infrastructure::traits::{
    CommandEditor, CommandRunner, Console, Ec2Api, Editor, FileSystem, PortProbe, RackspaceApi,
    RealCommandRunner, RealFileSystem, RestClient, SlicehostApi, TcpPortProbe, TerminalConsole,
};
use crate::infrastructure::InfraResult;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Container holding settings, I/O implementations and service factories.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Command runner abstraction
    pub cmd: Arc<dyn CommandRunner>,

    pub console: Arc<dyn Console>,
    pub ui: Arc<Ui>,
    pub options: UiOptions,
    editor: Arc<dyn Editor>,
    probe: Arc<dyn PortProbe>,

    rest: Option<Arc<dyn RestClient>>,
    site: Option<Arc<dyn RestClient>>,
    ec2: Option<Arc<dyn Ec2Api>>,
    rackspace: Option<Arc<dyn RackspaceApi>>,
    slicehost: Option<Arc<dyn SlicehostApi>>,
    poll_interval: Duration,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings, options: UiOptions) -> Self {
        let editor: Arc<dyn Editor> = Arc::new(CommandEditor::new(settings.editor.clone()));
        Self::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(RealCommandRunner),
            Arc::new(TerminalConsole),
            editor,
            options,
        )
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        console: Arc<dyn Console>,
        editor: Arc<dyn Editor>,
        options: UiOptions,
    ) -> Self {
        let ui = Arc::new(Ui::new(console.clone(), editor.clone(), fs.clone(), options));
        Self {
            settings: Arc::new(settings),
            fs,
            cmd,
            console,
            ui,
            options,
            editor,
            probe: Arc::new(TcpPortProbe::default()),
            rest: None,
            site: None,
            ec2: None,
            rackspace: None,
            slicehost: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_rest(mut self, rest: Arc<dyn RestClient>) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn with_site(mut self, site: Arc<dyn RestClient>) -> Self {
        self.site = Some(site);
        self
    }

    pub fn with_ec2(mut self, api: Arc<dyn Ec2Api>) -> Self {
        self.ec2 = Some(api);
        self
    }

    pub fn with_rackspace(mut self, api: Arc<dyn RackspaceApi>) -> Self {
        self.rackspace = Some(api);
        self
    }

    pub fn with_slicehost(mut self, api: Arc<dyn SlicehostApi>) -> Self {
        self.slicehost = Some(api);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn PortProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Same wiring with other settings and prompt options, for one `exec` line.
    ///
    /// Injected clients are kept; a changed editor command gets a new editor.
    pub fn derive(&self, settings: Settings, options: UiOptions) -> Self {
        let editor: Arc<dyn Editor> = if settings.editor == self.settings.editor {
            self.editor.clone()
        } else {
            Arc::new(CommandEditor::new(settings.editor.clone()))
        };
        let ui = Arc::new(Ui::new(
            self.console.clone(),
            editor.clone(),
            self.fs.clone(),
            options,
        ));
        Self {
            settings: Arc::new(settings),
            fs: self.fs.clone(),
            cmd: self.cmd.clone(),
            console: self.console.clone(),
            ui,
            options,
            editor,
            probe: self.probe.clone(),
            rest: self.rest.clone(),
            site: self.site.clone(),
            ec2: self.ec2.clone(),
            rackspace: self.rackspace.clone(),
            slicehost: self.slicehost.clone(),
            poll_interval: self.poll_interval,
        }
    }

    // ---- remote clients ----

    /// Signed client for the configuration server; the key is read on first use.
    pub fn rest(&self) -> InfraResult<Arc<dyn RestClient>> {
        if let Some(rest) = &self.rest {
            return Ok(rest.clone());
        }
        let s = &self.settings;
        debug!("rest: {} as {}", s.chef_server_url, s.node_name);
        Ok(Arc::new(LazySignedClient::new(
            &s.chef_server_url,
            &s.node_name,
            s.client_key.clone(),
        )))
    }

    /// Unsigned client for the community cookbook site.
    pub fn site(&self) -> InfraResult<Arc<dyn RestClient>> {
        if let Some(site) = &self.site {
            return Ok(site.clone());
        }
        Ok(Arc::new(HttpRestClient::unsigned(
            &self.settings.cookbook_site_url,
        )?))
    }

    pub fn ec2_api(&self) -> InfraResult<Arc<dyn Ec2Api>> {
        if let Some(api) = &self.ec2 {
            return Ok(api.clone());
        }
        let knife = &self.settings.knife;
        let credentials = AwsCredentials {
            access_key_id: required(&knife.aws_access_key_id, "knife.aws_access_key_id")?,
            secret_access_key: required(
                &knife.aws_secret_access_key,
                "knife.aws_secret_access_key",
            )?,
            region: knife.region.clone(),
        };
        Ok(Arc::new(Ec2Client::new(credentials)?))
    }

    pub fn rackspace_api(&self) -> InfraResult<Arc<dyn RackspaceApi>> {
        if let Some(api) = &self.rackspace {
            return Ok(api.clone());
        }
        let knife = &self.settings.knife;
        let credentials = RackspaceCredentials {
            username: required(&knife.rackspace_api_username, "knife.rackspace_api_username")?,
            api_key: required(&knife.rackspace_api_key, "knife.rackspace_api_key")?,
            auth_url: knife.rackspace_auth_url.clone(),
        };
        Ok(Arc::new(RackspaceClient::new(credentials)?))
    }

    pub fn slicehost_api(&self) -> InfraResult<Arc<dyn SlicehostApi>> {
        if let Some(api) = &self.slicehost {
            return Ok(api.clone());
        }
        let password = required(
            &self.settings.knife.slicehost_password,
            "knife.slicehost_password",
        )?;
        Ok(Arc::new(SlicehostClient::new(&password)?))
    }

    // ---- services ----

    pub fn validation(&self) -> ValidationConfig {
        ValidationConfig::from_settings(&self.settings)
    }

    fn polling(&self) -> Polling {
        Polling::new(
            self.poll_interval,
            Duration::from_secs(self.settings.knife.server_ready_timeout),
        )
    }

    fn store(&self) -> InfraResult<ObjectStore> {
        Ok(ObjectStore::new(self.rest()?, self.ui.clone()))
    }

    pub fn client_service(&self) -> InfraResult<ClientService> {
        Ok(ClientService::new(self.store()?, self.fs.clone()))
    }

    pub fn configure_service(&self) -> ConfigureService {
        ConfigureService::new(self.fs.clone(), self.validation())
    }

    pub fn cookbook_service(&self) -> InfraResult<CookbookService> {
        Ok(CookbookService::new(
            self.store()?,
            self.fs.clone(),
            self.settings.cookbook_path.clone(),
            self.settings.environment.clone(),
        ))
    }

    pub fn cookbook_site_service(&self) -> InfraResult<CookbookSiteService> {
        Ok(CookbookSiteService::new(
            self.site()?,
            self.fs.clone(),
            self.cmd.clone(),
            &self.settings.cookbook_site_url,
            self.settings.cookbook_path.clone(),
        ))
    }

    pub fn data_bag_service(&self) -> InfraResult<DataBagService> {
        let cwd = std::env::current_dir()
            .map_err(|e| crate::infrastructure::InfraError::io("determine working directory", e))?;
        Ok(DataBagService::new(self.store()?, self.fs.clone(), cwd))
    }

    pub fn node_service(&self) -> InfraResult<NodeService> {
        Ok(NodeService::new(self.store()?))
    }

    pub fn role_service(&self) -> InfraResult<RoleService> {
        Ok(RoleService::new(self.store()?))
    }

    pub fn search_service(&self) -> InfraResult<SearchService> {
        Ok(SearchService::new(self.rest()?))
    }

    pub fn exec_service(&self) -> ExecService {
        ExecService::new(self.fs.clone())
    }

    pub fn instance_data_service(&self) -> InstanceDataService {
        InstanceDataService::new(self.fs.clone(), self.ui.clone(), self.validation())
    }

    pub fn ec2_service(&self) -> InfraResult<Ec2Service> {
        Ok(Ec2Service::new(self.ec2_api()?, self.ui.clone()))
    }

    pub fn bootstrap_service(&self) -> BootstrapService {
        BootstrapService::new(
            self.cmd.clone(),
            self.fs.clone(),
            self.validation(),
            &self.settings.knife.distro,
        )
    }

    pub fn rackspace_service(&self) -> InfraResult<RackspaceService> {
        Ok(RackspaceService::new(
            self.rackspace_api()?,
            self.ui.clone(),
            self.probe.clone(),
            self.bootstrap_service(),
            self.polling(),
        ))
    }

    pub fn slicehost_service(&self) -> InfraResult<SlicehostService> {
        Ok(SlicehostService::new(
            self.slicehost_api()?,
            self.ui.clone(),
            self.settings.knife.slicehost_server_name.clone(),
            self.polling(),
        ))
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String, ApplicationError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApplicationError::Config {
            message: format!("{key} is not set"),
        })
}
