//! Data bags and data bag items

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::application::services::objects::{require, ObjectStore};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{item_id, DomainError};
use crate::infrastructure::traits::FileSystem;

pub struct DataBagService {
    store: ObjectStore,
    fs: Arc<dyn FileSystem>,
    /// Root for `data_bags/<bag>/<file>` lookups
    repo_root: PathBuf,
}

impl DataBagService {
    pub fn new(store: ObjectStore, fs: Arc<dyn FileSystem>, repo_root: PathBuf) -> Self {
        Self {
            store,
            fs,
            repo_root,
        }
    }

    pub fn list(&self, with_uri: bool) -> ApplicationResult<Value> {
        self.store.list("data", with_uri)
    }

    /// Item names of a bag, or one item.
    pub fn show(&self, bag: Option<&str>, item: Option<&str>) -> ApplicationResult<Value> {
        let bag = require(bag, "You must specify at least a data bag name")?;
        match item {
            Some(item) => self.store.show(&format!("data/{bag}/{item}"), None),
            None => self.store.list(&format!("data/{bag}"), false),
        }
    }

    pub fn create(&self, bag: Option<&str>, item: Option<&str>) -> ApplicationResult<Option<Value>> {
        let bag = require(bag, "You must specify a data bag name")?;
        match item {
            Some(item) => self
                .store
                .create_object("data_bag_item", item, &format!("data/{bag}"), json!({ "id": item }))
                .map(Some),
            None => {
                self.store.rest().post("data", &json!({ "name": bag }))?;
                info!("Created data_bag[{}]", bag);
                Ok(None)
            }
        }
    }

    pub fn delete(&self, bag: Option<&str>, item: Option<&str>) -> ApplicationResult<()> {
        let bag = require(bag, "You must specify at least a data bag name")?;
        match item {
            Some(item) => self
                .store
                .delete_object("data_bag_item", item, &format!("data/{bag}/{item}")),
            None => self
                .store
                .delete_object("data_bag", bag, &format!("data/{bag}")),
        }
    }

    /// Edit one item; exactly `[bag, item]` is accepted. Returns the saved item.
    pub fn edit(&self, args: &[String]) -> ApplicationResult<Value> {
        let [bag, item] = args else {
            return Err(ApplicationError::Fatal {
                message: "You must supply the data bag and an item to edit!".to_string(),
                exit_code: crate::exitcode::DATA_BAG_EDIT_USAGE,
            });
        };
        let path = format!("data/{bag}/{item}");
        let current = self.store.rest().get(&path)?;
        let edited = self.store.ui().edit_data(&current)?;
        self.store.rest().put(&path, &edited)?;
        info!("Saved data_bag_item[{}]", item);
        Ok(edited)
    }

    /// Create or update an item from a JSON file.
    pub fn from_file(&self, bag: Option<&str>, file: Option<&str>) -> ApplicationResult<()> {
        let (Some(bag), Some(file)) = (bag, file) else {
            return Err(ApplicationError::usage(
                "You must specify a data bag and a file to load from",
            ));
        };
        let path = self.locate(bag, file)?;
        let content = self
            .fs
            .read_to_string(&path)
            .with_path_context("read data bag item", &path)?;
        let item: Value = serde_json::from_str(&content).map_err(|e| DomainError::InvalidDocument {
            message: format!("{}: {e}", path.display()),
        })?;
        let id = item_id(&item).ok_or_else(|| DomainError::InvalidDocument {
            message: format!("{}: data bag item has no id", path.display()),
        })?;

        match self.store.rest().put(&format!("data/{bag}/{id}"), &item) {
            Err(e) if e.is_not_found() => {
                debug!("from_file: {} not found, creating", id);
                self.store.rest().post(&format!("data/{bag}"), &item)?;
            }
            other => {
                other?;
            }
        }
        info!("Updated data_bag_item[{}]", file);
        Ok(())
    }

    /// `file` as given, else `data_bags/<bag>/<file>[.json]` under the repo root.
    fn locate(&self, bag: &str, file: &str) -> ApplicationResult<PathBuf> {
        let direct = Path::new(file);
        let in_repo = self.repo_root.join("data_bags").join(bag);
        let candidates = [
            direct.to_path_buf(),
            in_repo.join(file),
            in_repo.join(format!("{file}.json")),
        ];
        candidates
            .into_iter()
            .find(|c| self.fs.is_file(c))
            .ok_or_else(|| ApplicationError::fatal(format!("Cannot find data bag item file {file}")))
    }
}
