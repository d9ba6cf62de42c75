//! Cookbook listing, deletion, download, metadata generation and upload

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use md5::{Digest, Md5};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::application::services::objects::{require, ObjectStore};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::cookbook::available_versions;
use crate::domain::version::{
    latest_version, parse_menu_selection, parse_single_choice, render_menu, MenuChoice,
};
use crate::domain::{parse_metadata_rb, CookbookManifest, CookbookMetadata, DomainError, SEGMENTS};
use crate::infrastructure::traits::FileSystem;

pub const PURGE_WARNING: &str = "Files that are common to multiple cookbooks are shared, so purging the files may disable other cookbooks. Are you sure you want to purge files instead of just deleting the cookbook";

/// Options for `cookbook download`.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Parent directory of the unpacked cookbook (default: cwd)
    pub dir: Option<PathBuf>,
    pub force: bool,
    pub latest: bool,
}

pub struct CookbookService {
    store: ObjectStore,
    fs: Arc<dyn FileSystem>,
    cookbook_paths: Vec<PathBuf>,
    environment: Option<String>,
}

impl CookbookService {
    pub fn new(
        store: ObjectStore,
        fs: Arc<dyn FileSystem>,
        cookbook_paths: Vec<PathBuf>,
        environment: Option<String>,
    ) -> Self {
        Self {
            store,
            fs,
            cookbook_paths,
            environment,
        }
    }

    pub fn list(&self, with_uri: bool) -> ApplicationResult<Value> {
        let path = match &self.environment {
            Some(env) => format!("environments/{env}/cookbooks"),
            None => "cookbooks/_latest".to_string(),
        };
        self.store.list(&path, with_uri)
    }

    // ---- delete ----

    pub fn delete(
        &self,
        name: Option<&str>,
        version: Option<&str>,
        all: bool,
        purge: bool,
    ) -> ApplicationResult<()> {
        let name = require(name, "You must provide the name of the cookbook to delete")?;
        if purge {
            self.store.ui().confirm(PURGE_WARNING)?;
        }

        if let Some(version) = version {
            return self.delete_explicit_version(name, version, purge);
        }

        let response = match self.store.rest().get(&format!("cookbooks/{name}")) {
            Err(e) if e.is_not_found() => {
                return Err(ApplicationError::fatal(format!(
                    "Cannot find a cookbook named {name} to delete"
                )))
            }
            other => other?,
        };
        let versions = available_versions(name, &response)?;

        match versions.as_slice() {
            [] => Err(ApplicationError::fatal(format!(
                "Cannot find a cookbook named {name} to delete"
            ))),
            [only] => self.delete_explicit_version(name, only, purge),
            _ if all => self.delete_all_versions(name, &versions, purge),
            _ => self.delete_chosen_versions(name, &versions, purge),
        }
    }

    fn delete_explicit_version(&self, name: &str, version: &str, purge: bool) -> ApplicationResult<()> {
        self.store
            .ui()
            .confirm(&format!("Do you really want to delete {name} version {version}"))?;
        self.delete_version(name, version, purge)
    }

    fn delete_all_versions(&self, name: &str, versions: &[String], purge: bool) -> ApplicationResult<()> {
        self.store
            .ui()
            .confirm(&format!("Do you really want to delete all versions of {name}"))?;
        versions
            .iter()
            .try_for_each(|v| self.delete_version(name, v, purge))
    }

    fn delete_chosen_versions(&self, name: &str, versions: &[String], purge: bool) -> ApplicationResult<()> {
        let entries: Vec<String> = versions.iter().map(|v| format!("{name} {v}")).collect();
        let ui = self.store.ui();
        ui.print(&render_menu(
            "Which version(s) do you want to delete?",
            &entries,
            Some("All versions"),
        ));
        let answer = ui.ask("")?;
        let selection = parse_menu_selection(&answer, versions.len());

        if selection.is_empty() {
            return Err(ApplicationError::fatal("No versions specified, exiting"));
        }
        for token in &selection.invalid {
            error!("{} is not a valid choice, skipping it", token);
        }

        if selection.includes_all() {
            return versions
                .iter()
                .try_for_each(|v| self.delete_version(name, v, purge));
        }
        let mut indices: Vec<usize> = selection
            .choices
            .iter()
            .filter_map(|c| match c {
                MenuChoice::Version(i) => Some(*i),
                MenuChoice::All => None,
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .try_for_each(|i| self.delete_version(name, &versions[i], purge))
    }

    fn delete_version(&self, name: &str, version: &str, purge: bool) -> ApplicationResult<()> {
        let mut path = format!("cookbooks/{name}/{version}");
        if purge {
            path.push_str("?purge=true");
        }
        self.store.rest().delete(&path)?;
        info!("Deleted cookbook[{}][{}]", name, version);
        Ok(())
    }

    // ---- download ----

    /// Download a cookbook version into `<dir>/<name>-<version>`.
    ///
    /// Returns the target directory.
    pub fn download(
        &self,
        name: Option<&str>,
        version: Option<&str>,
        options: &DownloadOptions,
    ) -> ApplicationResult<PathBuf> {
        let name = require(name, "You must specify a cookbook name")?;
        let version = match version {
            Some(v) => v.to_string(),
            None => self.determine_version(name, options.latest)?,
        };

        info!("Downloading {} cookbook version {}", name, version);
        let manifest =
            CookbookManifest::from_value(self.store.rest().get(&format!("cookbooks/{name}/{version}"))?)?;

        let parent = match &options.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().with_context("determine working directory")?,
        };
        let target = parent.join(format!("{name}-{version}"));
        if self.fs.exists(&target) {
            if !options.force {
                return Err(ApplicationError::Fatal {
                    message: format!(
                        "Directory {} exists, use --force to overwrite",
                        target.display()
                    ),
                    exit_code: crate::exitcode::OK,
                });
            }
            self.fs
                .remove_dir_all(&target)
                .with_path_context("remove existing download", &target)?;
        }
        self.fs
            .create_dir_all(&target)
            .with_path_context("create directory", &target)?;

        for segment in SEGMENTS {
            info!("Downloading {}", segment);
            match segment {
                "files" | "templates" => {
                    let dir = target.join(segment).join("default");
                    self.fs.create_dir_all(&dir).with_path_context("create directory", &dir)?;
                }
                "root_files" => {}
                _ => {
                    let dir = target.join(segment);
                    self.fs.create_dir_all(&dir).with_path_context("create directory", &dir)?;
                }
            }
            for file in manifest.segment(segment) {
                let url = file.url.as_deref().ok_or_else(|| DomainError::InvalidDocument {
                    message: format!("manifest entry {} has no url", file.path),
                })?;
                let content = self.store.rest().get_raw(url)?;
                let dest = target.join(&file.path);
                self.fs
                    .ensure_parent(&dest)
                    .with_path_context("create parent directory", &dest)?;
                self.fs
                    .write_bytes(&dest, &content)
                    .with_path_context("write cookbook file", &dest)?;
            }
        }

        info!("Cookbook downloaded to {}", target.display());
        Ok(target)
    }

    fn determine_version(&self, name: &str, latest: bool) -> ApplicationResult<String> {
        let response = self.store.rest().get(&format!("cookbooks/{name}"))?;
        let versions = available_versions(name, &response)?;
        match versions.as_slice() {
            [] => Err(ApplicationError::fatal(format!(
                "No versions of cookbook {name} found"
            ))),
            [only] => Ok(only.clone()),
            _ if latest => latest_version(&versions).ok_or_else(|| {
                ApplicationError::fatal(format!("No versions of cookbook {name} found"))
            }),
            _ => {
                let entries: Vec<String> = versions.iter().map(|v| format!("{name} {v}")).collect();
                let ui = self.store.ui();
                ui.print(&render_menu("Which version do you want to download?", &entries, None));
                let answer = ui.ask("")?;
                parse_single_choice(&answer, versions.len())
                    .map(|i| versions[i].clone())
                    .ok_or_else(|| {
                        ApplicationError::fatal(format!("'{}' is not a valid value.", answer.trim()))
                    })
            }
        }
    }

    // ---- metadata ----

    pub fn generate_metadata(&self, name: Option<&str>, all: bool) -> ApplicationResult<()> {
        info!("Generating Metadata");
        match (name, all) {
            (_, true) => {
                for path in &self.cookbook_paths {
                    for cookbook in self.cookbook_dirs(path)? {
                        self.generate_metadata_from_file(path, &cookbook)?;
                    }
                }
                Ok(())
            }
            (Some(name), false) => self
                .cookbook_paths
                .iter()
                .try_for_each(|path| self.generate_metadata_from_file(path, name)),
            (None, false) => Err(ApplicationError::usage(
                "You must specify the cookbook to generate metadata for, or use the --all option.",
            )),
        }
    }

    fn generate_metadata_from_file(&self, path: &Path, name: &str) -> ApplicationResult<()> {
        let cookbook_dir = path.join(name);
        let rb = cookbook_dir.join("metadata.rb");
        if !self.fs.exists(&rb) {
            debug!("No {} found; skipping!", rb.display());
            return Ok(());
        }
        debug!("Generating metadata for {} from {}", name, rb.display());
        let metadata = read_metadata_rb(self.fs.as_ref(), &cookbook_dir, name)?;
        let json_file = cookbook_dir.join("metadata.json");
        self.fs
            .write(&json_file, &metadata.to_json_pretty()?)
            .with_path_context("write metadata", &json_file)?;
        debug!("Generated {}", json_file.display());
        Ok(())
    }

    /// Cookbook directory names under `path`, sorted.
    fn cookbook_dirs(&self, path: &Path) -> ApplicationResult<Vec<String>> {
        if !self.fs.is_dir(path) {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = self
            .fs
            .list_dirs(path)
            .with_path_context("list cookbook path", path)?
            .iter()
            .filter_map(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        Ok(names)
    }

    // ---- upload ----

    pub fn upload(&self, names: &[String], all: bool) -> ApplicationResult<()> {
        if all {
            let mut seen = Vec::new();
            for path in &self.cookbook_paths {
                for name in self.cookbook_dirs(path)? {
                    if seen.contains(&name) {
                        continue;
                    }
                    info!("** {} **", name);
                    self.upload_cookbook(&name, &path.join(&name))?;
                    seen.push(name);
                }
            }
            return Ok(());
        }
        if names.is_empty() {
            return Err(ApplicationError::usage(
                "You must specify the --all flag or at least one cookbook name",
            ));
        }
        for name in names {
            match self.find_cookbook(name) {
                Some(dir) => self.upload_cookbook(name, &dir)?,
                None => error!(
                    "Could not find cookbook {} in your cookbook path, skipping it",
                    name
                ),
            }
        }
        Ok(())
    }

    fn find_cookbook(&self, name: &str) -> Option<PathBuf> {
        self.cookbook_paths
            .iter()
            .map(|p| p.join(name))
            .find(|dir| self.fs.is_dir(dir))
    }

    /// Sandbox round-trip: announce checksums, upload the missing files,
    /// commit the sandbox, then save the manifest.
    fn upload_cookbook(&self, name: &str, dir: &Path) -> ApplicationResult<()> {
        let metadata = self.load_metadata(dir, name)?;
        info!("Uploading {} [{}]", name, metadata.version);

        let mut manifest = CookbookManifest::new(name, &metadata.version, metadata.to_value());
        let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
        for (relative, absolute) in self.cookbook_files(dir)? {
            let content = self
                .fs
                .read_bytes(&absolute)
                .with_path_context("read cookbook file", &absolute)?;
            let checksum = md5_hex(&content);
            manifest.add_file(&relative, &checksum);
            files.insert(checksum, absolute);
        }

        let announced: Map<String, Value> = manifest
            .checksums()
            .into_iter()
            .map(|c| (c, Value::Null))
            .collect();
        let rest = self.store.rest();
        let sandbox = rest.post("sandboxes", &json!({ "checksums": announced }))?;
        let sandbox_id = sandbox
            .get("sandbox_id")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::InvalidDocument {
                message: "sandbox response has no sandbox_id".to_string(),
            })?;

        if let Some(Value::Object(checksums)) = sandbox.get("checksums") {
            for (checksum, info) in checksums {
                let needs_upload = info
                    .get("needs_upload")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let Some(path) = files.get(checksum) else {
                    continue;
                };
                if !needs_upload {
                    debug!("Skipping {} (checksum {}), already on server", path.display(), checksum);
                    continue;
                }
                let url = info.get("url").and_then(Value::as_str).ok_or_else(|| {
                    DomainError::InvalidDocument {
                        message: format!("no upload url for checksum {checksum}"),
                    }
                })?;
                debug!("Uploading {} (checksum {})", path.display(), checksum);
                let content = self
                    .fs
                    .read_bytes(path)
                    .with_path_context("read cookbook file", path)?;
                rest.put_file(url, checksum, &content)?;
            }
        }

        rest.put(&format!("sandboxes/{sandbox_id}"), &json!({"is_completed": true}))?;
        rest.put(
            &format!("cookbooks/{}/{}", name, metadata.version),
            &manifest.to_value(),
        )?;
        info!("Upload complete!");
        Ok(())
    }

    fn load_metadata(&self, dir: &Path, name: &str) -> ApplicationResult<CookbookMetadata> {
        if self.fs.exists(&dir.join("metadata.rb")) {
            return read_metadata_rb(self.fs.as_ref(), dir, name);
        }
        let json_file = dir.join("metadata.json");
        if self.fs.exists(&json_file) {
            let content = self
                .fs
                .read_to_string(&json_file)
                .with_path_context("read metadata", &json_file)?;
            let metadata: CookbookMetadata =
                serde_json::from_str(&content).map_err(|e| DomainError::InvalidDocument {
                    message: format!("{}: {e}", json_file.display()),
                })?;
            if metadata.version.trim().is_empty() {
                return Err(ApplicationError::fatal(format!(
                    "Cookbook {} has no version in {}",
                    name,
                    json_file.display()
                )));
            }
            return Ok(metadata);
        }
        Err(ApplicationError::fatal(format!(
            "Cookbook {} has no metadata.rb or metadata.json in {}, cannot determine its version",
            name,
            dir.display()
        )))
    }

    /// `(relative path, absolute path)` of every non-hidden file, sorted.
    fn cookbook_files(&self, dir: &Path) -> ApplicationResult<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = entry.map_err(|e| ApplicationError::OperationFailed {
                context: format!("walk cookbook {}", dir.display()),
                source: Box::new(e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| ApplicationError::OperationFailed {
                    context: format!("relativize {}", entry.path().display()),
                    source: Box::new(e),
                })?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push((relative, entry.path().to_path_buf()));
        }
        Ok(files)
    }
}

/// Parse `<cookbook_dir>/metadata.rb`.
pub fn read_metadata_rb(
    fs: &dyn FileSystem,
    cookbook_dir: &Path,
    name: &str,
) -> ApplicationResult<CookbookMetadata> {
    let rb = cookbook_dir.join("metadata.rb");
    let source = fs
        .read_to_string(&rb)
        .with_path_context("read metadata", &rb)?;
    let metadata = parse_metadata_rb(name, &source, |sibling| {
        fs.read_to_string(&cookbook_dir.join(sibling)).ok()
    })?;
    Ok(metadata)
}

fn md5_hex(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}
