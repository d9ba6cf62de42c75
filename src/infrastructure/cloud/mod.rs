//! Cloud provider clients

pub mod ec2;
pub mod rackspace;
pub mod slicehost;

use roxmltree::Node;

pub use ec2::{AwsCredentials, Ec2Client};
pub use rackspace::{RackspaceClient, RackspaceCredentials};
pub use slicehost::SlicehostClient;

/// First element child called `name`.
pub(crate) fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

/// Trimmed, non-empty text of the child called `name`.
pub(crate) fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name)
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}
