//! Client configuration bootstrap (`configure client DIR`)

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::application::services::ValidationConfig;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::infrastructure::traits::FileSystem;

pub struct ConfigureService {
    fs: Arc<dyn FileSystem>,
    validation: ValidationConfig,
}

impl ConfigureService {
    pub fn new(fs: Arc<dyn FileSystem>, validation: ValidationConfig) -> Self {
        Self { fs, validation }
    }

    /// Write `client.rb` and `validation.pem` into `dir`.
    pub fn configure_client(&self, dir: Option<&Path>) -> ApplicationResult<()> {
        let dir = dir.ok_or_else(|| {
            ApplicationError::usage("You must provide the directory to put the files in")
        })?;

        info!("Creating client configuration");
        self.fs
            .create_dir_all(dir)
            .with_path_context("create directory", dir)?;

        info!("Writing client.rb");
        let client_rb = dir.join("client.rb");
        self.fs
            .write(&client_rb, &self.client_rb())
            .with_path_context("write client config", &client_rb)?;

        info!("Writing validation.pem");
        let key = self
            .fs
            .read_to_string(&self.validation.validation_key)
            .with_path_context("read validation key", &self.validation.validation_key)?;
        let validation_pem = dir.join("validation.pem");
        self.fs
            .write(&validation_pem, &terminate_line(key))
            .with_path_context("write validation key", &validation_pem)?;
        Ok(())
    }

    fn client_rb(&self) -> String {
        [
            "log_level        :info".to_string(),
            "log_location     STDOUT".to_string(),
            format!("chef_server_url  '{}'", self.validation.chef_server_url),
            format!(
                "validation_client_name '{}'",
                self.validation.validation_client_name
            ),
        ]
        .iter()
        .map(|line| format!("{line}\n"))
        .collect()
    }
}

fn terminate_line(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
