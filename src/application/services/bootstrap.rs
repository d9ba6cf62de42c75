//! Bootstrap a host over ssh

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::services::ValidationConfig;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::bootstrap::{render_bootstrap_script, BootstrapContext};
use crate::infrastructure::traits::{CommandRunner, FileSystem};

#[derive(Debug, Clone, Default)]
pub struct BootstrapRequest {
    pub host: String,
    pub ssh_user: String,
    pub ssh_password: Option<String>,
    pub node_name: Option<String>,
    pub run_list: Vec<String>,
    pub distro: Option<String>,
    pub sudo: bool,
}

pub struct BootstrapService {
    cmd: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
    validation: ValidationConfig,
    default_distro: String,
}

impl BootstrapService {
    pub fn new(
        cmd: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
        validation: ValidationConfig,
        default_distro: &str,
    ) -> Self {
        Self {
            cmd,
            fs,
            validation,
            default_distro: default_distro.to_string(),
        }
    }

    /// Render the script for `request` with the validation key inlined.
    pub fn script(&self, request: &BootstrapRequest) -> ApplicationResult<String> {
        let key_path = &self.validation.validation_key;
        let validation_key = self
            .fs
            .read_to_string(key_path)
            .with_path_context("read validation key", key_path)?;
        let context = BootstrapContext {
            chef_server_url: self.validation.chef_server_url.clone(),
            validation_client_name: self.validation.validation_client_name.clone(),
            validation_key,
            node_name: request.node_name.clone(),
            run_list: request.run_list.clone(),
            distro: request
                .distro
                .clone()
                .unwrap_or_else(|| self.default_distro.clone()),
        };
        Ok(render_bootstrap_script(&context)?)
    }

    /// Pipe the script into `bash` on the host.
    pub fn run(&self, request: &BootstrapRequest) -> ApplicationResult<()> {
        if request.host.is_empty() {
            return Err(ApplicationError::usage(
                "You must specify a host name or address to bootstrap",
            ));
        }
        let script = self.script(request)?;
        let (program, args) = ssh_command(request);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();

        info!("Bootstrapping Chef on {}", request.host);
        debug!("bootstrap: {} {}", program, redact(&args).join(" "));
        let output = self
            .cmd
            .run_with_stdin(program, &argv, &script)
            .with_context("run ssh")?;
        if !output.status.success() {
            return Err(ApplicationError::CommandFailed {
                command: format!("ssh {}", request.host),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// `ssh` argv, wrapped in `sshpass` when a password is known.
fn ssh_command(request: &BootstrapRequest) -> (&'static str, Vec<String>) {
    let mut ssh = vec![
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        format!("{}@{}", request.ssh_user, request.host),
    ];
    if request.sudo {
        ssh.push("sudo".to_string());
    }
    ssh.extend(["bash".to_string(), "-s".to_string()]);

    match &request.ssh_password {
        Some(password) => {
            let mut args = vec!["-p".to_string(), password.clone(), "ssh".to_string()];
            args.extend(ssh);
            ("sshpass", args)
        }
        None => ("ssh", ssh),
    }
}

fn redact(args: &[String]) -> Vec<String> {
    let mut out = args.to_vec();
    if out.first().map(String::as_str) == Some("-p") && out.len() > 1 {
        out[1] = "******".to_string();
    }
    out
}
