//! Cloud provider records

use serde::{Deserialize, Serialize};

/// EC2 instance as reported by DescribeInstances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ec2Server {
    pub id: String,
    pub image_id: String,
    pub flavor_id: String,
    pub state: String,
    pub groups: Vec<String>,
    pub availability_zone: Option<String>,
    pub key_name: Option<String>,
    pub dns_name: Option<String>,
    pub ip_address: Option<String>,
    pub private_dns_name: Option<String>,
    pub private_ip_address: Option<String>,
}

/// Rackspace Cloud Server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackspaceServer {
    pub id: String,
    pub name: String,
    pub flavor_id: String,
    pub image_id: String,
    pub status: String,
    pub public_ips: Vec<String>,
    pub private_ips: Vec<String>,
    pub password: Option<String>,
}

impl RackspaceServer {
    pub fn is_ready(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }

    /// Terminal failure; the server will never become active.
    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }
}

/// Request to create a server or slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRequest {
    pub name: String,
    pub flavor_id: String,
    pub image_id: String,
}

/// Slicehost slice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub id: String,
    pub name: String,
    pub flavor_id: String,
    pub image_id: String,
    pub status: String,
    pub addresses: Vec<String>,
    pub root_password: Option<String>,
}

impl Slice {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }
}

/// Image or flavor: anything listed by id and name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResource {
    pub id: String,
    pub name: String,
}

/// Name for `id` in `resources`, or the id itself when unknown.
pub fn name_for(resources: &[NamedResource], id: &str) -> String {
    resources
        .iter()
        .find(|r| r.id == id)
        .map(|r| r.name.clone())
        .unwrap_or_else(|| id.to_string())
}
