//! Show/edit/create/delete round-trips shared by every REST-backed command

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::application::{ApplicationError, ApplicationResult, Ui};
use crate::domain::cookbook::name_listing;
use crate::domain::lookup_attribute;
use crate::infrastructure::traits::RestClient;

/// Positional argument or a usage failure carrying `message`.
pub fn require<'a>(arg: Option<&'a str>, message: &str) -> ApplicationResult<&'a str> {
    arg.filter(|a| !a.is_empty())
        .ok_or_else(|| ApplicationError::usage(message))
}

/// `{attribute: value}` for a dotted attribute path; missing values are null.
pub fn project_attribute(value: &Value, attribute: &str) -> Value {
    let mut projected = Map::new();
    projected.insert(
        attribute.to_string(),
        lookup_attribute(value, attribute).cloned().unwrap_or(Value::Null),
    );
    Value::Object(projected)
}

#[derive(Clone)]
pub struct ObjectStore {
    rest: Arc<dyn RestClient>,
    ui: Arc<Ui>,
}

impl ObjectStore {
    pub fn new(rest: Arc<dyn RestClient>, ui: Arc<Ui>) -> Self {
        Self { rest, ui }
    }

    pub fn rest(&self) -> &dyn RestClient {
        self.rest.as_ref()
    }

    pub fn ui(&self) -> &Ui {
        &self.ui
    }

    /// Names, or name → uri with `with_uri`.
    pub fn list(&self, path: &str, with_uri: bool) -> ApplicationResult<Value> {
        let response = self.rest.get(path)?;
        Ok(name_listing(&response, with_uri))
    }

    pub fn show(&self, path: &str, attribute: Option<&str>) -> ApplicationResult<Value> {
        let object = self.rest.get(path)?;
        Ok(match attribute {
            Some(attribute) => project_attribute(&object, attribute),
            None => object,
        })
    }

    pub fn delete_object(&self, kind: &str, name: &str, path: &str) -> ApplicationResult<()> {
        self.ui.confirm(&format!("Do you really want to delete {name}"))?;
        self.rest.delete(path)?;
        info!("Deleted {}[{}]", kind, name);
        Ok(())
    }

    /// GET, edit, PUT back. Returns the saved document.
    pub fn edit_object(&self, kind: &str, name: &str, path: &str) -> ApplicationResult<Value> {
        let current = self.rest.get(path)?;
        let edited = self.ui.edit_data(&current)?;
        debug!("edit_object: saving {}[{}] to {}", kind, name, path);
        self.rest.put(path, &edited)?;
        info!("Saved {}[{}]", kind, name);
        Ok(edited)
    }

    /// Edit `object`, then POST it to `path`. Returns the created document.
    pub fn create_object(
        &self,
        kind: &str,
        name: &str,
        path: &str,
        object: Value,
    ) -> ApplicationResult<Value> {
        let edited = self.ui.edit_data(&object)?;
        let response = self.rest.post(path, &edited)?;
        info!("Created (or updated) {}[{}]", kind, name);
        Ok(merge_response(edited, response))
    }
}

/// Server replies to POST with a partial document (uri, private_key); fold it in.
fn merge_response(mut sent: Value, response: Value) -> Value {
    if let (Some(target), Value::Object(extra)) = (sent.as_object_mut(), response) {
        for (k, v) in extra {
            target.insert(k, v);
        }
        return sent;
    }
    if sent.is_null() {
        return json!({});
    }
    sent
}
