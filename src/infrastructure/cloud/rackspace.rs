//! Rackspace Cloud Servers (API v1.0) client

use std::sync::Mutex;

use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::application::RemoteError;
use crate::domain::{NamedResource, RackspaceServer, ServerRequest};
use crate::infrastructure::traits::RackspaceApi;
use crate::infrastructure::{InfraError, InfraResult};

pub const DEFAULT_AUTH_URL: &str = "https://auth.api.rackspacecloud.com/v1.0";

#[derive(Debug, Clone)]
pub struct RackspaceCredentials {
    pub username: String,
    pub api_key: String,
    pub auth_url: String,
}

#[derive(Debug, Clone)]
struct Session {
    management_url: String,
    token: String,
}

pub struct RackspaceClient {
    credentials: RackspaceCredentials,
    http: Client,
    session: Mutex<Option<Session>>,
}

impl RackspaceClient {
    pub fn new(credentials: RackspaceCredentials) -> InfraResult<Self> {
        let http = Client::builder().build().map_err(|e| InfraError::Http {
            message: e.to_string(),
        })?;
        Ok(Self {
            credentials,
            http,
            session: Mutex::new(None),
        })
    }

    /// Authenticate once; later calls reuse the token.
    fn session(&self) -> Result<Session, RemoteError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|_| RemoteError::new("GET", &self.credentials.auth_url, None, "session lock poisoned"))?;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let url = &self.credentials.auth_url;
        debug!("authenticating against {}", url);
        let response = self
            .http
            .get(url)
            .header("X-Auth-User", &self.credentials.username)
            .header("X-Auth-Key", &self.credentials.api_key)
            .send()
            .map_err(|e| RemoteError::new("GET", url, None, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::new(
                "GET",
                url,
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("authentication failed"),
            ));
        }
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
                .ok_or_else(|| RemoteError::new("GET", url, Some(status.as_u16()), format!("missing {name} header")))
        };
        let session = Session {
            management_url: header("X-Server-Management-Url")?,
            token: header("X-Auth-Token")?,
        };
        *guard = Some(session.clone());
        Ok(session)
    }

    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, RemoteError> {
        let session = self.session()?;
        let url = format!("{}/{}", session.management_url.trim_end_matches('/'), path);
        let fail = |status: Option<u16>, message: String| {
            RemoteError::new(method.as_str(), &url, status, message)
        };

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("X-Auth-Token", &session.token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().map_err(|e| fail(None, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| fail(Some(status.as_u16()), e.to_string()))?;
        if !status.is_success() {
            return Err(fail(Some(status.as_u16()), fault_message(&text, status.as_str())));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| fail(Some(status.as_u16()), e.to_string()))
    }
}

/// `{"itemNotFound": {"message": ...}}`-style fault bodies.
fn fault_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.as_object()?
                .values()
                .find_map(|fault| fault.get("message")?.as_str().map(String::from))
        })
        .unwrap_or_else(|| fallback.to_string())
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default()
}

/// Map a v1.0 server document.
pub fn parse_server(value: &Value) -> RackspaceServer {
    let addresses = value.get("addresses");
    RackspaceServer {
        id: value.get("id").map(id_string).unwrap_or_default(),
        name: value.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        flavor_id: value.get("flavorId").map(id_string).unwrap_or_default(),
        image_id: value.get("imageId").map(id_string).unwrap_or_default(),
        status: value.get("status").and_then(Value::as_str).unwrap_or_default().to_string(),
        public_ips: string_list(addresses.and_then(|a| a.get("public"))),
        private_ips: string_list(addresses.and_then(|a| a.get("private"))),
        password: value.get("adminPass").and_then(Value::as_str).map(String::from),
    }
}

fn parse_named(list: &Value, key: &str) -> Vec<NamedResource> {
    list.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| NamedResource {
                    id: item.get("id").map(id_string).unwrap_or_default(),
                    name: item.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl RackspaceApi for RackspaceClient {
    fn list_servers(&self) -> Result<Vec<RackspaceServer>, RemoteError> {
        let body = self.request(Method::GET, "servers/detail", None)?;
        Ok(body
            .get("servers")
            .and_then(Value::as_array)
            .map(|servers| servers.iter().map(parse_server).collect())
            .unwrap_or_default())
    }

    fn get_server(&self, id: &str) -> Result<RackspaceServer, RemoteError> {
        let body = self.request(Method::GET, &format!("servers/{id}"), None)?;
        Ok(parse_server(body.get("server").unwrap_or(&Value::Null)))
    }

    fn create_server(&self, request: &ServerRequest) -> Result<RackspaceServer, RemoteError> {
        let payload = json!({
            "server": {
                "name": request.name,
                "imageId": request.image_id.parse::<u64>().map(Value::from).unwrap_or_else(|_| json!(request.image_id)),
                "flavorId": request.flavor_id.parse::<u64>().map(Value::from).unwrap_or_else(|_| json!(request.flavor_id)),
            }
        });
        let body = self.request(Method::POST, "servers", Some(&payload))?;
        Ok(parse_server(body.get("server").unwrap_or(&Value::Null)))
    }

    fn delete_server(&self, id: &str) -> Result<(), RemoteError> {
        self.request(Method::DELETE, &format!("servers/{id}"), None)
            .map(|_| ())
    }

    fn list_flavors(&self) -> Result<Vec<NamedResource>, RemoteError> {
        let body = self.request(Method::GET, "flavors/detail", None)?;
        Ok(parse_named(&body, "flavors"))
    }

    fn list_images(&self) -> Result<Vec<NamedResource>, RemoteError> {
        let body = self.request(Method::GET, "images/detail", None)?;
        Ok(parse_named(&body, "images"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_server_document_when_parsed_then_maps_addresses_and_password() {
        let doc = json!({
            "id": 1234, "name": "web01", "imageId": 14362, "flavorId": 1,
            "status": "BUILD", "adminPass": "s3cret",
            "addresses": {"public": ["67.23.10.138"], "private": ["10.176.68.3"]}
        });
        let server = parse_server(&doc);
        assert_eq!(server.id, "1234");
        assert_eq!(server.image_id, "14362");
        assert_eq!(server.public_ips, vec!["67.23.10.138"]);
        assert_eq!(server.private_ips, vec!["10.176.68.3"]);
        assert_eq!(server.password.as_deref(), Some("s3cret"));
        assert!(!server.is_ready());
    }

    #[test]
    fn given_fault_body_when_describing_then_uses_fault_message() {
        let body = r#"{"itemNotFound": {"message": "The server could not be found", "code": 404}}"#;
        assert_eq!(fault_message(body, "404"), "The server could not be found");
        assert_eq!(fault_message("oops", "500"), "500");
    }
}
