//! API client management

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::application::services::objects::{require, ObjectStore};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::default_client;
use crate::infrastructure::traits::FileSystem;

const NAME_REQUIRED: &str = "You must specify a client name";

pub struct ClientService {
    store: ObjectStore,
    fs: Arc<dyn FileSystem>,
}

impl ClientService {
    pub fn new(store: ObjectStore, fs: Arc<dyn FileSystem>) -> Self {
        Self { store, fs }
    }

    pub fn list(&self, with_uri: bool) -> ApplicationResult<Value> {
        self.store.list("clients", with_uri)
    }

    pub fn show(&self, name: Option<&str>, attribute: Option<&str>) -> ApplicationResult<Value> {
        let name = require(name, NAME_REQUIRED)?;
        self.store.show(&format!("clients/{name}"), attribute)
    }

    pub fn edit(&self, name: Option<&str>) -> ApplicationResult<Value> {
        let name = require(name, NAME_REQUIRED)?;
        self.store
            .edit_object("client", name, &format!("clients/{name}"))
    }

    pub fn delete(&self, name: Option<&str>) -> ApplicationResult<()> {
        let name = require(name, NAME_REQUIRED)?;
        self.store
            .delete_object("client", name, &format!("clients/{name}"))
    }

    /// Create a client; returns its new private key.
    pub fn create(&self, name: Option<&str>, admin: bool) -> ApplicationResult<String> {
        let name = require(name, NAME_REQUIRED)?;
        let created = self
            .store
            .create_object("client", name, "clients", default_client(name, admin))?;
        private_key(&created)
    }

    /// Regenerate the key pair of an existing client; returns the new private key.
    pub fn reregister(&self, name: Option<&str>) -> ApplicationResult<String> {
        let name = require(name, NAME_REQUIRED)?;
        debug!("reregister: {}", name);
        let response = self.store.rest().put(
            &format!("clients/{name}"),
            &json!({"name": name, "private_key": true}),
        )?;
        private_key(&response)
    }

    /// Write a key exactly as received, no trailing newline.
    pub fn write_key(&self, path: &Path, key: &str) -> ApplicationResult<()> {
        self.fs
            .write(path, key)
            .with_path_context("write private key", path)?;
        info!("Private key written to {}", path.display());
        Ok(())
    }
}

fn private_key(response: &Value) -> ApplicationResult<String> {
    response
        .get("private_key")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| ApplicationError::fatal("The server response did not include a private key"))
}
