//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/knife/knife.toml`
//! 3. Local config: `.chef/knife.toml` in the working directory or an ancestor (or `-c PATH`)
//! 4. Environment variables: `KNIFE_*` prefix
//!
//! Command-line overrides are applied on top by the CLI layer.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::bootstrap::DEFAULT_DISTRO;
use crate::domain::expand_env_vars;

pub const LOCAL_CONFIG_DIR: &str = ".chef";
pub const CONFIG_FILE_NAME: &str = "knife.toml";
pub const DEFAULT_SITE_URL: &str = "http://cookbooks.opscode.com/api/v1";
pub const DEFAULT_SERVER_READY_TIMEOUT: u64 = 600;
pub const DEFAULT_RACKSPACE_AUTH_URL: &str = "https://auth.api.rackspacecloud.com/v1.0";

/// Cloud credentials and bootstrap defaults (`[knife]` table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KnifeConfig {
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub region: String,
    pub rackspace_api_username: Option<String>,
    pub rackspace_api_key: Option<String>,
    pub rackspace_auth_url: String,
    pub slicehost_password: Option<String>,
    pub slicehost_server_name: Option<String>,
    pub ssh_user: String,
    pub distro: String,
    /// Seconds to wait for a new server (and its sshd) before giving up
    pub server_ready_timeout: u64,
}

impl Default for KnifeConfig {
    fn default() -> Self {
        Self {
            aws_access_key_id: None,
            aws_secret_access_key: None,
            region: "us-east-1".into(),
            rackspace_api_username: None,
            rackspace_api_key: None,
            rackspace_auth_url: DEFAULT_RACKSPACE_AUTH_URL.into(),
            slicehost_password: None,
            slicehost_server_name: None,
            ssh_user: "root".into(),
            distro: DEFAULT_DISTRO.into(),
            server_ready_timeout: DEFAULT_SERVER_READY_TIMEOUT,
        }
    }
}

/// Raw `[knife]` table: every field optional so a layer only overrides what it names.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawKnifeConfig {
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub region: Option<String>,
    pub rackspace_api_username: Option<String>,
    pub rackspace_api_key: Option<String>,
    pub rackspace_auth_url: Option<String>,
    pub slicehost_password: Option<String>,
    pub slicehost_server_name: Option<String>,
    pub ssh_user: Option<String>,
    pub distro: Option<String>,
    pub server_ready_timeout: Option<u64>,
}

impl KnifeConfig {
    /// Overlay wins field by field.
    pub fn merge(&self, overlay: &RawKnifeConfig) -> Self {
        fn pick<T: Clone>(overlay: &Option<T>, base: &T) -> T {
            overlay.clone().unwrap_or_else(|| base.clone())
        }
        fn pick_opt<T: Clone>(overlay: &Option<T>, base: &Option<T>) -> Option<T> {
            overlay.clone().or_else(|| base.clone())
        }
        Self {
            aws_access_key_id: pick_opt(&overlay.aws_access_key_id, &self.aws_access_key_id),
            aws_secret_access_key: pick_opt(
                &overlay.aws_secret_access_key,
                &self.aws_secret_access_key,
            ),
            region: pick(&overlay.region, &self.region),
            rackspace_api_username: pick_opt(
                &overlay.rackspace_api_username,
                &self.rackspace_api_username,
            ),
            rackspace_api_key: pick_opt(&overlay.rackspace_api_key, &self.rackspace_api_key),
            rackspace_auth_url: pick(&overlay.rackspace_auth_url, &self.rackspace_auth_url),
            slicehost_password: pick_opt(&overlay.slicehost_password, &self.slicehost_password),
            slicehost_server_name: pick_opt(
                &overlay.slicehost_server_name,
                &self.slicehost_server_name,
            ),
            ssh_user: pick(&overlay.ssh_user, &self.ssh_user),
            distro: pick(&overlay.distro, &self.distro),
            server_ready_timeout: pick(&overlay.server_ready_timeout, &self.server_ready_timeout),
        }
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified, inherit").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub chef_server_url: Option<String>,
    pub node_name: Option<String>,
    pub client_key: Option<PathBuf>,
    pub validation_client_name: Option<String>,
    pub validation_key: Option<PathBuf>,
    pub cookbook_path: Option<Vec<PathBuf>>,
    pub cookbook_site_url: Option<String>,
    pub environment: Option<String>,
    pub editor: Option<String>,
    pub knife: RawKnifeConfig,
}

/// Effective client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the configuration server
    pub chef_server_url: String,
    /// Client name used to sign requests
    pub node_name: String,
    /// Private key of `node_name`
    pub client_key: PathBuf,
    pub validation_client_name: String,
    pub validation_key: PathBuf,
    /// Directories searched for cookbooks, in order
    pub cookbook_path: Vec<PathBuf>,
    /// Community cookbook site API
    pub cookbook_site_url: String,
    pub environment: Option<String>,
    pub editor: String,
    pub knife: KnifeConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chef_server_url: "http://localhost:4000".into(),
            node_name: default_node_name(),
            client_key: PathBuf::from("/etc/chef/client.pem"),
            validation_client_name: "chef-validator".into(),
            validation_key: PathBuf::from("/etc/chef/validation.pem"),
            cookbook_path: vec![PathBuf::from("/var/chef/cookbooks")],
            cookbook_site_url: DEFAULT_SITE_URL.into(),
            environment: None,
            editor: std::env::var("EDITOR").unwrap_or_else(|_| "vi".into()),
            knife: KnifeConfig::default(),
        }
    }
}

fn default_node_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".into())
}

/// Get the global config directory path.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "knife").map(|p| p.config_dir().to_path_buf())
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Nearest `.chef/knife.toml` at or above `start`.
pub fn find_local_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .build()
        .map_err(config_err)?;
    config.try_deserialize().map_err(config_err)
}

impl Settings {
    /// Expand `~`, `$VAR` and `${VAR}` in path-like fields.
    fn expand_paths(&mut self) {
        let expand = |p: &Path| PathBuf::from(expand_env_vars(p.to_string_lossy().as_ref()));
        self.client_key = expand(&self.client_key);
        self.validation_key = expand(&self.validation_key);
        self.cookbook_path = self.cookbook_path.iter().map(|p| expand(p)).collect();
        self.editor = expand_env_vars(&self.editor);
    }

    /// Overlay wins for every field it specifies; lists are replaced, not merged.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            chef_server_url: overlay
                .chef_server_url
                .clone()
                .unwrap_or_else(|| self.chef_server_url.clone()),
            node_name: overlay
                .node_name
                .clone()
                .unwrap_or_else(|| self.node_name.clone()),
            client_key: overlay
                .client_key
                .clone()
                .unwrap_or_else(|| self.client_key.clone()),
            validation_client_name: overlay
                .validation_client_name
                .clone()
                .unwrap_or_else(|| self.validation_client_name.clone()),
            validation_key: overlay
                .validation_key
                .clone()
                .unwrap_or_else(|| self.validation_key.clone()),
            cookbook_path: overlay
                .cookbook_path
                .clone()
                .unwrap_or_else(|| self.cookbook_path.clone()),
            cookbook_site_url: overlay
                .cookbook_site_url
                .clone()
                .unwrap_or_else(|| self.cookbook_site_url.clone()),
            environment: overlay
                .environment
                .clone()
                .or_else(|| self.environment.clone()),
            editor: overlay.editor.clone().unwrap_or_else(|| self.editor.clone()),
            knife: self.knife.merge(&overlay.knife),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// `config_file` replaces the `.chef/knife.toml` lookup and must exist.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let local = match config_file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ApplicationError::Config {
                        message: format!("config file not found: {}", path.display()),
                    });
                }
                Some(path.to_path_buf())
            }
            None => std::env::current_dir()
                .ok()
                .and_then(|cwd| find_local_config(&cwd)),
        };
        Self::load_layers(global_config_path().as_deref(), local.as_deref())
    }

    /// Load from explicit global and local files (either may be absent).
    pub fn load_layers(global: Option<&Path>, local: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        for path in [global, local].into_iter().flatten() {
            if path.exists() {
                let raw = load_raw_settings(path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        Ok(current)
    }

    /// Apply `KNIFE_*` environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("KNIFE")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cookbook_path")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("chef_server_url") {
            settings.chef_server_url = val;
        }
        if let Ok(val) = config.get_string("node_name") {
            settings.node_name = val;
        }
        if let Ok(val) = config.get_string("client_key") {
            settings.client_key = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("validation_client_name") {
            settings.validation_client_name = val;
        }
        if let Ok(val) = config.get_string("validation_key") {
            settings.validation_key = PathBuf::from(val);
        }
        if let Ok(val) = config.get::<Vec<String>>("cookbook_path") {
            settings.cookbook_path = val.into_iter().map(PathBuf::from).collect();
        }
        if let Ok(val) = config.get_string("cookbook_site_url") {
            settings.cookbook_site_url = val;
        }
        if let Ok(val) = config.get_string("environment") {
            settings.environment = Some(val);
        }
        if let Ok(val) = config.get_string("editor") {
            settings.editor = val;
        }
        if let Ok(val) = config.get_string("knife.aws_access_key_id") {
            settings.knife.aws_access_key_id = Some(val);
        }
        if let Ok(val) = config.get_string("knife.aws_secret_access_key") {
            settings.knife.aws_secret_access_key = Some(val);
        }
        if let Ok(val) = config.get_string("knife.region") {
            settings.knife.region = val;
        }
        if let Ok(val) = config.get_string("knife.rackspace_api_username") {
            settings.knife.rackspace_api_username = Some(val);
        }
        if let Ok(val) = config.get_string("knife.rackspace_api_key") {
            settings.knife.rackspace_api_key = Some(val);
        }
        if let Ok(val) = config.get_string("knife.slicehost_password") {
            settings.knife.slicehost_password = Some(val);
        }
        if let Ok(val) = config.get::<u64>("knife.server_ready_timeout") {
            settings.knife.server_ready_timeout = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# knife configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/knife/knife.toml
#   Local:  .chef/knife.toml in the working directory or any parent
#   Env:    KNIFE_* environment variables (KNIFE_KNIFE__REGION for [knife] keys)

# chef_server_url = "http://localhost:4000"
# node_name = "my-workstation"
# client_key = "~/.chef/my-workstation.pem"
# validation_client_name = "chef-validator"
# validation_key = "~/.chef/validation.pem"
# cookbook_path = ["~/chef-repo/cookbooks"]
# cookbook_site_url = "http://cookbooks.opscode.com/api/v1"
# environment = "production"
# editor = "vim"

[knife]
# aws_access_key_id = "AKIA..."
# aws_secret_access_key = "..."
# region = "us-east-1"
# rackspace_api_username = "..."
# rackspace_api_key = "..."
# slicehost_password = "..."
# slicehost_server_name = "chef-node"
# ssh_user = "root"
# distro = "ubuntu10.04-gems"
# server_ready_timeout = 600
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
