//! JSON REST client for the configuration server and the cookbook site

pub mod auth;

use std::path::PathBuf;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::application::RemoteError;
use crate::infrastructure::traits::RestClient;
use crate::infrastructure::{InfraError, InfraResult};

pub use auth::RequestSigner;

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Blocking HTTP client. Requests are signed when a signer is configured.
pub struct HttpRestClient {
    base_url: String,
    signer: Option<RequestSigner>,
    http: Client,
}

impl HttpRestClient {
    /// Client for the configuration server, signing as `signer`.
    pub fn signed(base_url: &str, signer: RequestSigner) -> InfraResult<Self> {
        Self::build(base_url, Some(signer))
    }

    /// Client for public endpoints (cookbook site).
    pub fn unsigned(base_url: &str) -> InfraResult<Self> {
        Self::build(base_url, None)
    }

    fn build(base_url: &str, signer: Option<RequestSigner>) -> InfraResult<Self> {
        let http = Client::builder()
            .user_agent(format!("knife/{CLIENT_VERSION}"))
            .build()
            .map_err(|e| InfraError::Http {
                message: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            http,
        })
    }

    /// Absolute urls pass through; anything else is joined to the base url.
    pub fn resolve(&self, path: &str) -> Result<Url, RemoteError> {
        let candidate = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        Url::parse(&candidate).map_err(|e| RemoteError::new("PARSE", candidate, None, e.to_string()))
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<(&[u8], &str)>,
        extra_headers: &[(&str, String)],
    ) -> Result<Vec<u8>, RemoteError> {
        let url = self.resolve(path)?;
        let fail = |status: Option<u16>, message: String| {
            RemoteError::new(method.as_str(), url.as_str(), status, message)
        };
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json")
            .header("X-Chef-Version", CLIENT_VERSION);

        let payload: &[u8] = body.map(|(bytes, _)| bytes).unwrap_or_default();
        if let Some((bytes, content_type)) = body {
            request = request
                .header(CONTENT_TYPE, content_type)
                .body(bytes.to_vec());
        }
        for (name, value) in extra_headers {
            request = request.header(*name, value.as_str());
        }
        if let Some(signer) = &self.signer {
            let headers = signer
                .sign(method.as_str(), url.path(), payload, Utc::now())
                .map_err(|e| fail(None, format!("signing failed: {e}")))?;
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }

        let response = request.send().map_err(|e| fail(None, e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .map_err(|e| fail(Some(status.as_u16()), e.to_string()))?;
        trace!("{} {} -> {}", method, url, status);

        if status.is_success() {
            Ok(bytes.to_vec())
        } else {
            Err(fail(Some(status.as_u16()), error_message(status, &bytes)))
        }
    }

    fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, RemoteError> {
        let encoded = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| RemoteError::new(method.as_str(), path, None, e.to_string()))?;
        let bytes = self.send(
            method.clone(),
            path,
            encoded.as_deref().map(|b| (b, "application/json")),
            &[],
        )?;
        decode_json(&bytes).map_err(|e| RemoteError::new(method.as_str(), path, None, e))
    }
}

/// Server error text: `{"error": [...]}` / `{"error": "..."}`, else the
/// status reason.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            _ => reason,
        },
        _ => reason,
    }
}

fn decode_json(bytes: &[u8]) -> Result<Value, String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON response: {e}"))
}

impl RestClient for HttpRestClient {
    fn get(&self, path: &str) -> Result<Value, RemoteError> {
        self.send_json(Method::GET, path, None)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.send_json(Method::PUT, path, Some(body))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.send_json(Method::POST, path, Some(body))
    }

    fn delete(&self, path: &str) -> Result<Value, RemoteError> {
        self.send_json(Method::DELETE, path, None)
    }

    fn get_raw(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.send(Method::GET, path, None, &[])
    }

    fn put_file(&self, url: &str, checksum: &str, content: &[u8]) -> Result<(), RemoteError> {
        let digest = hex::decode(checksum)
            .map_err(|e| RemoteError::new("PUT", url, None, format!("bad checksum: {e}")))?;
        self.send(
            Method::PUT,
            url,
            Some((content, "application/x-binary")),
            &[("Content-MD5", STANDARD.encode(digest))],
        )
        .map(|_| ())
    }
}

/// Signed client that reads its key on the first request, so commands
/// rejected for bad arguments never touch the key file.
pub struct LazySignedClient {
    base_url: String,
    user_id: String,
    key_path: PathBuf,
    client: OnceLock<Result<HttpRestClient, String>>,
}

impl LazySignedClient {
    pub fn new(base_url: &str, user_id: &str, key_path: PathBuf) -> Self {
        Self {
            base_url: base_url.to_string(),
            user_id: user_id.to_string(),
            key_path,
            client: OnceLock::new(),
        }
    }

    fn client(&self, method: &str, path: &str) -> Result<&HttpRestClient, RemoteError> {
        self.client
            .get_or_init(|| {
                debug!("rest: signing as {} with {}", self.user_id, self.key_path.display());
                RequestSigner::load(&self.user_id, &self.key_path)
                    .and_then(|signer| HttpRestClient::signed(&self.base_url, signer))
                    .map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|message| RemoteError::new(method, path, None, message.clone()))
    }
}

impl RestClient for LazySignedClient {
    fn get(&self, path: &str) -> Result<Value, RemoteError> {
        self.client("GET", path)?.get(path)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.client("PUT", path)?.put(path, body)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.client("POST", path)?.post(path, body)
    }

    fn delete(&self, path: &str) -> Result<Value, RemoteError> {
        self.client("DELETE", path)?.delete(path)
    }

    fn get_raw(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.client("GET", path)?.get_raw(path)
    }

    fn put_file(&self, url: &str, checksum: &str, content: &[u8]) -> Result<(), RemoteError> {
        self.client("PUT", url)?.put_file(url, checksum, content)
    }
}
