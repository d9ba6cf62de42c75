//! Cookbook version documents as exchanged with the server

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::version::sort_versions;
use crate::domain::DomainError;

/// Manifest segments in download order.
pub const SEGMENTS: [&str; 9] = [
    "resources",
    "providers",
    "recipes",
    "definitions",
    "libraries",
    "attributes",
    "files",
    "templates",
    "root_files",
];

/// One file entry in a cookbook manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub name: String,
    pub path: String,
    pub checksum: String,
    #[serde(default = "default_specificity")]
    pub specificity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

fn default_specificity() -> String {
    "default".to_string()
}

/// A cookbook version document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookbookManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cookbook_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub json_class: String,
    #[serde(default)]
    pub chef_type: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub resources: Vec<ManifestFile>,
    #[serde(default)]
    pub providers: Vec<ManifestFile>,
    #[serde(default)]
    pub recipes: Vec<ManifestFile>,
    #[serde(default)]
    pub definitions: Vec<ManifestFile>,
    #[serde(default)]
    pub libraries: Vec<ManifestFile>,
    #[serde(default)]
    pub attributes: Vec<ManifestFile>,
    #[serde(default)]
    pub files: Vec<ManifestFile>,
    #[serde(default)]
    pub templates: Vec<ManifestFile>,
    #[serde(default)]
    pub root_files: Vec<ManifestFile>,
}

impl CookbookManifest {
    /// Empty manifest for `name` at `version`.
    pub fn new(name: &str, version: &str, metadata: Value) -> Self {
        Self {
            name: format!("{name}-{version}"),
            cookbook_name: name.to_string(),
            version: version.to_string(),
            json_class: "Chef::CookbookVersion".to_string(),
            chef_type: "cookbook_version".to_string(),
            metadata,
            ..Default::default()
        }
    }

    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        serde_json::from_value(value).map_err(|e| DomainError::InvalidDocument {
            message: format!("cookbook manifest: {e}"),
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn segment(&self, segment: &str) -> &[ManifestFile] {
        match segment {
            "resources" => &self.resources,
            "providers" => &self.providers,
            "recipes" => &self.recipes,
            "definitions" => &self.definitions,
            "libraries" => &self.libraries,
            "attributes" => &self.attributes,
            "files" => &self.files,
            "templates" => &self.templates,
            "root_files" => &self.root_files,
            _ => &[],
        }
    }

    fn segment_mut(&mut self, segment: &str) -> &mut Vec<ManifestFile> {
        match segment {
            "resources" => &mut self.resources,
            "providers" => &mut self.providers,
            "recipes" => &mut self.recipes,
            "definitions" => &mut self.definitions,
            "libraries" => &mut self.libraries,
            "attributes" => &mut self.attributes,
            "files" => &mut self.files,
            "templates" => &mut self.templates,
            _ => &mut self.root_files,
        }
    }

    /// Add a file by its path relative to the cookbook root.
    pub fn add_file(&mut self, relative_path: &str, checksum: &str) {
        let (segment, specificity) = classify_path(relative_path);
        let name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string();
        self.segment_mut(segment).push(ManifestFile {
            name,
            path: relative_path.to_string(),
            checksum: checksum.to_string(),
            specificity,
            url: None,
        });
    }

    /// All checksums across every segment.
    pub fn checksums(&self) -> Vec<String> {
        SEGMENTS
            .iter()
            .flat_map(|s| self.segment(s).iter().map(|f| f.checksum.clone()))
            .collect()
    }
}

/// Map a cookbook-relative path to its segment and specificity.
///
/// `files/<specificity>/...` and `templates/<specificity>/...` carry their
/// specificity in the second component; everything else is `default`.
pub fn classify_path(relative_path: &str) -> (&'static str, String) {
    let parts: Vec<&str> = relative_path.split('/').collect();
    if parts.len() < 2 {
        return ("root_files", default_specificity());
    }
    match parts[0] {
        "files" | "templates" => {
            let segment = if parts[0] == "files" { "files" } else { "templates" };
            let specificity = if parts.len() >= 3 {
                parts[1].to_string()
            } else {
                default_specificity()
            };
            (segment, specificity)
        }
        "resources" => ("resources", default_specificity()),
        "providers" => ("providers", default_specificity()),
        "recipes" => ("recipes", default_specificity()),
        "definitions" => ("definitions", default_specificity()),
        "libraries" => ("libraries", default_specificity()),
        "attributes" => ("attributes", default_specificity()),
        _ => ("root_files", default_specificity()),
    }
}

/// Versions available for `name`, ascending.
///
/// Accepts both `{"name": ["0.1.0"]}` and
/// `{"name": {"versions": [{"version": "0.1.0", "url": ...}]}}`.
pub fn available_versions(name: &str, response: &Value) -> Result<Vec<String>, DomainError> {
    let entry = response
        .get(name)
        .ok_or_else(|| DomainError::InvalidDocument {
            message: format!("no entry for cookbook {name}"),
        })?;

    let raw: Vec<&Value> = match entry {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("versions") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut versions: Vec<String> = raw
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("version").and_then(Value::as_str).map(String::from),
            _ => None,
        })
        .collect();
    sort_versions(&mut versions);
    Ok(versions)
}

/// Project a name → uri listing to names, or name → uri when `with_uri`.
///
/// Entries may be a bare url string or an object carrying `url`.
pub fn name_listing(response: &Value, with_uri: bool) -> Value {
    let Some(map) = response.as_object() else {
        return json!([]);
    };
    if with_uri {
        let uris: BTreeMap<&String, Value> = map
            .iter()
            .map(|(name, entry)| {
                let url = match entry {
                    Value::String(_) => entry.clone(),
                    Value::Object(o) => o.get("url").cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                (name, url)
            })
            .collect();
        json!(uris)
    } else {
        let mut names: Vec<&String> = map.keys().collect();
        names.sort();
        json!(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn given_legacy_shape_when_listing_versions_then_sorted() {
        let response = json!({"pizza": ["0.0.2", "0.0.1"]});
        let versions = available_versions("pizza", &response).unwrap();
        assert_eq!(versions, vec!["0.0.1", "0.0.2"]);
    }

    #[test]
    fn given_versions_object_shape_when_listing_versions_then_extracts_version_field() {
        let response = json!({"tatft": {"url": "http://x/cookbooks/tatft", "versions": [
            {"version": "0.2.0", "url": "http://x/cookbooks/tatft/0.2.0"},
            {"version": "0.1.0", "url": "http://x/cookbooks/tatft/0.1.0"}
        ]}});
        let versions = available_versions("tatft", &response).unwrap();
        assert_eq!(versions, vec!["0.1.0", "0.2.0"]);
    }

    #[test]
    fn given_missing_entry_when_listing_versions_then_error() {
        assert!(available_versions("pizza", &json!({})).is_err());
    }

    #[rstest]
    #[case("recipes/default.rb", "recipes", "default")]
    #[case("files/ubuntu/motd", "files", "ubuntu")]
    #[case("files/motd", "files", "default")]
    #[case("templates/default/app.conf.erb", "templates", "default")]
    #[case("README.md", "root_files", "default")]
    #[case("spec/foo_spec.rb", "root_files", "default")]
    fn given_relative_path_when_classified_then_segment_and_specificity(
        #[case] path: &str,
        #[case] segment: &str,
        #[case] specificity: &str,
    ) {
        let (seg, spec) = classify_path(path);
        assert_eq!(seg, segment);
        assert_eq!(spec, specificity);
    }

    #[test]
    fn given_files_added_when_collecting_checksums_then_covers_every_segment() {
        let mut manifest = CookbookManifest::new("apache2", "0.1.0", json!({}));
        manifest.add_file("recipes/default.rb", "aaa");
        manifest.add_file("metadata.rb", "bbb");

        assert_eq!(manifest.name, "apache2-0.1.0");
        assert_eq!(manifest.recipes[0].name, "default.rb");
        assert_eq!(manifest.root_files[0].path, "metadata.rb");
        assert_eq!(manifest.checksums(), vec!["aaa", "bbb"]);
    }

    #[test]
    fn given_listing_when_projected_with_uri_then_name_to_url() {
        let response = json!({
            "b": {"url": "http://x/cookbooks/b", "versions": []},
            "a": "http://x/cookbooks/a"
        });
        assert_eq!(name_listing(&response, false), json!(["a", "b"]));
        assert_eq!(
            name_listing(&response, true),
            json!({"a": "http://x/cookbooks/a", "b": "http://x/cookbooks/b"})
        );
    }
}
