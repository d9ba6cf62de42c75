//! Node records

use serde_json::{json, Value};

use crate::application::services::objects::{require, ObjectStore};
use crate::application::ApplicationResult;
use crate::domain::default_node;

const NAME_REQUIRED: &str = "You must specify a node name";

pub struct NodeService {
    store: ObjectStore,
}

impl NodeService {
    pub fn new(store: ObjectStore) -> Self {
        Self { store }
    }

    pub fn list(&self, with_uri: bool) -> ApplicationResult<Value> {
        self.store.list("nodes", with_uri)
    }

    /// Full node, one attribute, or only the run list.
    pub fn show(
        &self,
        name: Option<&str>,
        attribute: Option<&str>,
        run_list: bool,
    ) -> ApplicationResult<Value> {
        let name = require(name, NAME_REQUIRED)?;
        let path = format!("nodes/{name}");
        if run_list {
            let node = self.store.rest().get(&path)?;
            let entries = node.get("run_list").cloned().unwrap_or_else(|| json!([]));
            return Ok(json!({ "run_list": entries }));
        }
        self.store.show(&path, attribute)
    }

    pub fn create(&self, name: Option<&str>) -> ApplicationResult<Value> {
        let name = require(name, NAME_REQUIRED)?;
        self.store
            .create_object("node", name, "nodes", default_node(name))
    }

    pub fn edit(&self, name: Option<&str>) -> ApplicationResult<Value> {
        let name = require(name, NAME_REQUIRED)?;
        self.store.edit_object("node", name, &format!("nodes/{name}"))
    }

    pub fn delete(&self, name: Option<&str>) -> ApplicationResult<()> {
        let name = require(name, NAME_REQUIRED)?;
        self.store.delete_object("node", name, &format!("nodes/{name}"))
    }
}
