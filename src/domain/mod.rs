//! Domain layer: documents, versions and pure transformations
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod bootstrap;
pub mod cloud;
pub mod cookbook;
pub mod entities;
pub mod error;
pub mod metadata;
pub mod script;
pub mod version;

pub use cloud::{Ec2Server, NamedResource, RackspaceServer, ServerRequest, Slice};
pub use cookbook::{CookbookManifest, ManifestFile, SEGMENTS};
pub use entities::*;
pub use error::DomainError;
pub use metadata::{parse_metadata_rb, CookbookMetadata};
pub use version::VersionNumber;
