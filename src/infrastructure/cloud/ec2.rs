//! EC2 Query API client (Signature Version 4)

use chrono::{DateTime, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use roxmltree::{Document, Node};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::application::RemoteError;
use crate::domain::Ec2Server;
use crate::infrastructure::traits::Ec2Api;
use crate::infrastructure::{InfraError, InfraResult};

use super::{child, child_text};

const API_VERSION: &str = "2016-11-15";
const SERVICE: &str = "ec2";

type HmacSha256 = Hmac<Sha256>;

/// AWS credentials and region.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

pub struct Ec2Client {
    credentials: AwsCredentials,
    endpoint: String,
    http: Client,
}

impl Ec2Client {
    pub fn new(credentials: AwsCredentials) -> InfraResult<Self> {
        let endpoint = format!("https://ec2.{}.amazonaws.com", credentials.region);
        Self::with_endpoint(credentials, &endpoint)
    }

    pub fn with_endpoint(credentials: AwsCredentials, endpoint: &str) -> InfraResult<Self> {
        let http = Client::builder().build().map_err(|e| InfraError::Http {
            message: e.to_string(),
        })?;
        Ok(Self {
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn call(&self, action: &str, params: &[(String, String)]) -> Result<String, RemoteError> {
        let mut query: Vec<(String, String)> = vec![
            ("Action".to_string(), action.to_string()),
            ("Version".to_string(), API_VERSION.to_string()),
        ];
        query.extend(params.iter().cloned());
        let canonical_query = canonical_query(&query);
        let url = format!("{}/?{}", self.endpoint, canonical_query);
        let host = host_of(&self.endpoint);
        let fail = |status: Option<u16>, message: String| RemoteError::new("GET", &url, status, message);

        let now = Utc::now();
        let authorization = authorization_header(&self.credentials, &host, &canonical_query, now)
            .map_err(|e| fail(None, format!("signing failed: {e}")))?;
        debug!("EC2 {}", action);

        let response = self
            .http
            .get(&url)
            .header("x-amz-date", amz_date(now))
            .header("Authorization", authorization)
            .send()
            .map_err(|e| fail(None, e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| fail(Some(status.as_u16()), e.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            let (code, message) = parse_error(&body)
                .unwrap_or_else(|| (String::new(), status.to_string()));
            Err(fail(Some(status.as_u16()), format!("{code} {message}").trim().to_string()))
        }
    }
}

impl Ec2Api for Ec2Client {
    fn list_servers(&self) -> Result<Vec<Ec2Server>, RemoteError> {
        let body = self.call("DescribeInstances", &[])?;
        parse_describe_instances(&body).map_err(|e| RemoteError::new("GET", &self.endpoint, None, e))
    }

    fn get_server(&self, id: &str) -> Result<Option<Ec2Server>, RemoteError> {
        let params = [("InstanceId.1".to_string(), id.to_string())];
        match self.call("DescribeInstances", &params) {
            Ok(body) => parse_describe_instances(&body)
                .map(|servers| servers.into_iter().next())
                .map_err(|e| RemoteError::new("GET", &self.endpoint, None, e)),
            Err(e) if e.message.starts_with("InvalidInstanceID") => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn terminate_server(&self, id: &str) -> Result<(), RemoteError> {
        let params = [("InstanceId.1".to_string(), id.to_string())];
        self.call("TerminateInstances", &params).map(|_| ())
    }
}

fn host_of(endpoint: &str) -> String {
    endpoint
        .split("://")
        .nth(1)
        .unwrap_or(endpoint)
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// RFC 3986 encoding as SigV4 requires (space is `%20`, `~` unescaped).
pub fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Sorted, encoded query string.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k), uri_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derived SigV4 signing key.
pub fn signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, InvalidLength> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date)?;
    let k_region = hmac(&k_date, region)?;
    let k_service = hmac(&k_region, service)?;
    hmac(&k_service, "aws4_request")
}

/// `Authorization` header for a GET with no body.
pub fn authorization_header(
    credentials: &AwsCredentials,
    host: &str,
    canonical_query: &str,
    now: DateTime<Utc>,
) -> Result<String, InvalidLength> {
    let amz_date = amz_date(now);
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{}/{}/{}/aws4_request", date, credentials.region, SERVICE);
    let payload_hash = hex::encode(Sha256::digest(b""));
    let canonical_request = format!(
        "GET\n/\n{canonical_query}\nhost:{host}\nx-amz-date:{amz_date}\n\nhost;x-amz-date\n{payload_hash}"
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );
    let key = signing_key(
        &credentials.secret_access_key,
        &date,
        &credentials.region,
        SERVICE,
    )?;
    let signature = hex::encode(hmac(&key, &string_to_sign)?);
    Ok(format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders=host;x-amz-date, Signature={}",
        credentials.access_key_id, scope, signature
    ))
}

fn items<'a, 'i>(node: Node<'a, 'i>, set: &str) -> Vec<Node<'a, 'i>> {
    child(node, set)
        .map(|s| {
            s.children()
                .filter(|c| c.is_element() && c.tag_name().name() == "item")
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a DescribeInstances response.
pub fn parse_describe_instances(xml: &str) -> Result<Vec<Ec2Server>, String> {
    let doc = Document::parse(xml).map_err(|e| e.to_string())?;
    let root = doc.root_element();
    let mut servers = Vec::new();

    for reservation in items(root, "reservationSet") {
        let reservation_groups: Vec<String> = items(reservation, "groupSet")
            .into_iter()
            .filter_map(|g| child_text(g, "groupName").or_else(|| child_text(g, "groupId")))
            .collect();

        for instance in items(reservation, "instancesSet") {
            let mut groups: Vec<String> = items(instance, "groupSet")
                .into_iter()
                .filter_map(|g| child_text(g, "groupName").or_else(|| child_text(g, "groupId")))
                .collect();
            if groups.is_empty() {
                groups = reservation_groups.clone();
            }
            servers.push(Ec2Server {
                id: child_text(instance, "instanceId").unwrap_or_default(),
                image_id: child_text(instance, "imageId").unwrap_or_default(),
                flavor_id: child_text(instance, "instanceType").unwrap_or_default(),
                state: child(instance, "instanceState")
                    .and_then(|s| child_text(s, "name"))
                    .unwrap_or_default(),
                groups,
                availability_zone: child(instance, "placement")
                    .and_then(|p| child_text(p, "availabilityZone")),
                key_name: child_text(instance, "keyName"),
                dns_name: child_text(instance, "dnsName"),
                ip_address: child_text(instance, "ipAddress"),
                private_dns_name: child_text(instance, "privateDnsName"),
                private_ip_address: child_text(instance, "privateIpAddress"),
            });
        }
    }
    Ok(servers)
}

/// `(Code, Message)` from an EC2 error document.
fn parse_error(xml: &str) -> Option<(String, String)> {
    let doc = Document::parse(xml).ok()?;
    let error = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "Error")?;
    Some((
        child_text(error, "Code").unwrap_or_default(),
        child_text(error, "Message").unwrap_or_default(),
    ))
}
