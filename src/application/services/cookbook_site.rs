//! Community cookbook site: browse, download, and vendor into a git repository

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::application::services::cookbook::read_metadata_rb;
use crate::application::services::objects::require;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::DomainError;
use crate::infrastructure::traits::{CommandRunner, FileSystem, RestClient};

const PAGE_SIZE: u64 = 10;

/// A downloaded site tarball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDownload {
    pub version: String,
    pub file: PathBuf,
}

pub struct CookbookSiteService {
    site: Arc<dyn RestClient>,
    fs: Arc<dyn FileSystem>,
    cmd: Arc<dyn CommandRunner>,
    base_url: String,
    cookbook_paths: Vec<PathBuf>,
}

impl CookbookSiteService {
    pub fn new(
        site: Arc<dyn RestClient>,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        base_url: &str,
        cookbook_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            site,
            fs,
            cmd,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookbook_paths,
        }
    }

    /// Every cookbook on the site: names, or name → uri with `with_uri`.
    pub fn list(&self, with_uri: bool) -> ApplicationResult<Value> {
        let items = self.collect_pages(&format!("{}/cookbooks?", self.base_url))?;
        Ok(project_items(&items, with_uri))
    }

    /// Cookbooks matching `query` as name → uri.
    pub fn search(&self, query: Option<&str>) -> ApplicationResult<Value> {
        let q: String = url::form_urlencoded::byte_serialize(query.unwrap_or("").as_bytes()).collect();
        let items = self.collect_pages(&format!("{}/search?q={}&", self.base_url, q))?;
        Ok(project_items(&items, true))
    }

    pub fn show(&self, name: Option<&str>, version: Option<&str>) -> ApplicationResult<Value> {
        let name = require(name, "You must specify a cookbook name")?;
        let url = match version {
            Some(v) => self.version_url(name, v),
            None => format!("{}/cookbooks/{}", self.base_url, name),
        };
        Ok(self.site.get(&url)?)
    }

    /// Download a release tarball (latest unless `version` is given).
    pub fn download(
        &self,
        name: Option<&str>,
        version: Option<&str>,
        file: Option<&Path>,
    ) -> ApplicationResult<SiteDownload> {
        let name = require(name, "You must specify a cookbook name")?;
        let version_url = match version {
            Some(v) => self.version_url(name, v),
            None => {
                let cookbook = self.site.get(&format!("{}/cookbooks/{}", self.base_url, name))?;
                string_field(&cookbook, "latest_version")?
            }
        };
        let release = self.site.get(&version_url)?;
        let version = string_field(&release, "version")?;
        let tarball_url = string_field(&release, "file")?;

        info!(
            "Downloading {} from the cookbooks site at version {}",
            name, version
        );
        let file = match file {
            Some(f) => f.to_path_buf(),
            None => std::env::current_dir()
                .with_context("determine working directory")?
                .join(format!("{name}-{version}.tar.gz")),
        };
        let content = self.site.get_raw(&tarball_url)?;
        self.fs
            .ensure_parent(&file)
            .with_path_context("create parent directory", &file)?;
        self.fs
            .write_bytes(&file, &content)
            .with_path_context("save cookbook", &file)?;
        info!("Cookbook saved: {}", file.display());

        Ok(SiteDownload { version, file })
    }

    /// Import a site cookbook onto a `chef-vendor-<name>` branch of the
    /// cookbook repository and merge it into master.
    pub fn vendor(&self, name: Option<&str>, dependencies: bool) -> ApplicationResult<()> {
        let name = require(name, "You must specify a cookbook name")?;
        let mut visited = BTreeSet::new();
        self.vendor_recursive(name, dependencies, &mut visited)
    }

    fn vendor_recursive(
        &self,
        name: &str,
        dependencies: bool,
        visited: &mut BTreeSet<String>,
    ) -> ApplicationResult<()> {
        if !visited.insert(name.to_string()) {
            debug!("vendor: {} already handled", name);
            return Ok(());
        }
        let repo = self.repository()?;
        let vendor_branch = format!("chef-vendor-{name}");

        info!("Checking out the master branch.");
        self.git(&repo, &["checkout", "master"])?;

        info!("Checking the status of the vendor branch.");
        let branches = self.git(&repo, &["branch", "--no-color"])?;
        if branch_exists(&branches, &vendor_branch) {
            info!("Vendor branch found.");
            self.git(&repo, &["checkout", &vendor_branch])?;
        } else {
            info!("Creating vendor branch.");
            self.git(&repo, &["checkout", "-b", &vendor_branch])?;
        }

        let tarball = repo.join(format!("{name}.tar.gz"));
        let download = self.download(Some(name), None, Some(&tarball))?;
        let version = download.version;

        let cookbook_dir = repo.join(name);
        if self.fs.is_dir(&cookbook_dir) {
            info!("Removing pre-existing version.");
            self.fs
                .remove_dir_all(&cookbook_dir)
                .with_path_context("remove cookbook", &cookbook_dir)?;
        }

        info!("Uncompressing {} version {}.", name, version);
        self.unpack(&tarball, &repo)?;
        self.fs
            .remove_file(&tarball)
            .with_path_context("remove tarball", &tarball)?;

        info!("Adding changes.");
        self.git(&repo, &["add", name])?;

        info!("Committing changes.");
        let message = format!("Import {name} version {version}");
        if self.git(&repo, &["commit", "-a", "-m", &message]).is_err() {
            warn!("Checking out the master branch.");
            warn!("No changes from current vendor {}", name);
            self.git(&repo, &["checkout", "master"])?;
        } else {
            let tag = format!("chef-vendor-{name}-{version}");
            info!("Creating tag {}.", tag);
            self.git(&repo, &["tag", "-f", &tag])?;
            info!("Checking out the master branch.");
            self.git(&repo, &["checkout", "master"])?;
            info!("Merging changes from {} version {}.", name, version);
            if self.git(&repo, &["merge", &vendor_branch]).is_ok() {
                info!("Cookbook {} version {} successfully vendored!", name, version);
            } else {
                error!("You have merge conflicts - please resolve manually!");
                return Err(ApplicationError::fatal(format!(
                    "(Hint: cd {}; git status)",
                    repo.display()
                )));
            }
        }

        if dependencies {
            let metadata = read_metadata_rb(self.fs.as_ref(), &cookbook_dir, name)?;
            for dependency in metadata.dependencies.keys() {
                self.vendor_recursive(dependency, dependencies, visited)?;
            }
        }
        Ok(())
    }

    /// First cookbook path; it must be an existing directory.
    fn repository(&self) -> ApplicationResult<PathBuf> {
        let repo = self.cookbook_paths.first().cloned().unwrap_or_default();
        if !self.fs.is_dir(&repo) {
            return Err(ApplicationError::fatal(format!(
                "{}/ doesn't exist!.  Make sure you have cookbook_path configured correctly",
                repo.display()
            )));
        }
        Ok(repo)
    }

    /// Run git in `repo`; non-zero exit is an error. Returns stdout.
    fn git(&self, repo: &Path, args: &[&str]) -> ApplicationResult<String> {
        debug!("git {}", args.join(" "));
        let output = self
            .cmd
            .run_in(repo, "git", args)
            .with_context("run git")?;
        if !output.status.success() {
            return Err(ApplicationError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn unpack(&self, tarball: &Path, into: &Path) -> ApplicationResult<()> {
        let bytes = self
            .fs
            .read_bytes(tarball)
            .with_path_context("read tarball", tarball)?;
        tar::Archive::new(GzDecoder::new(bytes.as_slice()))
            .unpack(into)
            .with_path_context("unpack tarball", tarball)
    }

    fn version_url(&self, name: &str, version: &str) -> String {
        format!(
            "{}/cookbooks/{}/versions/{}",
            self.base_url,
            name,
            version.replace('.', "_")
        )
    }

    /// Follow `start`/`total` paging; `prefix` ends in `?` or `&`.
    fn collect_pages(&self, prefix: &str) -> ApplicationResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut start = 0u64;
        loop {
            let page = self
                .site
                .get(&format!("{prefix}items={PAGE_SIZE}&start={start}"))?;
            if let Some(page_items) = page.get("items").and_then(Value::as_array) {
                items.extend(page_items.iter().cloned());
            }
            let total = page.get("total").and_then(Value::as_u64).unwrap_or(0);
            start += PAGE_SIZE;
            if start >= total {
                break;
            }
        }
        Ok(items)
    }
}

fn branch_exists(listing: &str, branch: &str) -> bool {
    listing
        .lines()
        .map(|l| l.trim_start_matches('*').trim())
        .any(|l| l == branch)
}

fn string_field(value: &Value, key: &str) -> ApplicationResult<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| {
            DomainError::InvalidDocument {
                message: format!("site response has no {key}"),
            }
            .into()
        })
}

/// Site items → names (sorted) or name → uri.
fn project_items(items: &[Value], with_uri: bool) -> Value {
    let pairs = items.iter().filter_map(|item| {
        let name = item.get("cookbook_name")?.as_str()?;
        Some((name.to_string(), item.get("cookbook").cloned().unwrap_or(Value::Null)))
    });
    if with_uri {
        Value::Object(pairs.collect::<Map<String, Value>>())
    } else {
        let mut names: Vec<Value> = pairs.map(|(n, _)| Value::String(n)).collect();
        names.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        Value::Array(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_branch_listing_when_checking_then_matches_whole_names_only() {
        let listing = "  chef-vendor-pasta\n* master\n  chef-vendor-pizza-old\n";
        assert!(!branch_exists(listing, "chef-vendor-pizza"));
        assert!(branch_exists("* chef-vendor-pizza\n", "chef-vendor-pizza"));
    }

    #[test]
    fn given_site_items_when_projecting_then_names_sorted() {
        let items = vec![
            json!({"cookbook_name": "b", "cookbook": "http://site/b"}),
            json!({"cookbook_name": "a", "cookbook": "http://site/a"}),
        ];
        assert_eq!(project_items(&items, false), json!(["a", "b"]));
        assert_eq!(
            project_items(&items, true),
            json!({"a": "http://site/a", "b": "http://site/b"})
        );
    }
}
