//! Role records

use serde_json::Value;

use crate::application::services::objects::{require, ObjectStore};
use crate::application::ApplicationResult;

const NAME_REQUIRED: &str = "You must specify a role name";

pub struct RoleService {
    store: ObjectStore,
}

impl RoleService {
    pub fn new(store: ObjectStore) -> Self {
        Self { store }
    }

    pub fn list(&self, with_uri: bool) -> ApplicationResult<Value> {
        self.store.list("roles", with_uri)
    }

    pub fn show(&self, name: Option<&str>, attribute: Option<&str>) -> ApplicationResult<Value> {
        let name = require(name, NAME_REQUIRED)?;
        self.store.show(&format!("roles/{name}"), attribute)
    }

    pub fn delete(&self, name: Option<&str>) -> ApplicationResult<()> {
        let name = require(name, NAME_REQUIRED)?;
        self.store.delete_object("role", name, &format!("roles/{name}"))
    }
}
