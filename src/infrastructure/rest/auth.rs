//! Request signing (protocol version 1.0)
//!
//! Every request carries the user id, a UTC timestamp, the base64 SHA-1 of
//! the body, and an RSA signature over a canonical description of the
//! request, split into 60-character `X-Ops-Authorization-N` headers.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::{Digest, Sha1};

use crate::infrastructure::{InfraError, InfraResult};

pub const SIGNING_VERSION: &str = "1.0";
const AUTHORIZATION_CHUNK: usize = 60;

/// Signs requests on behalf of one client.
pub struct RequestSigner {
    user_id: String,
    key: RsaPrivateKey,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Parse a PKCS#1 or PKCS#8 PEM private key.
    pub fn from_pem(user_id: impl Into<String>, pem: &str) -> Result<Self, String> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| e.to_string())?;
        Ok(Self {
            user_id: user_id.into(),
            key,
        })
    }

    /// Load the key file for `user_id`.
    pub fn load(user_id: &str, path: &Path) -> InfraResult<Self> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| InfraError::io(format!("read signing key {}", path.display()), e))?;
        Self::from_pem(user_id, &pem).map_err(|message| InfraError::SigningKey {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Authentication headers for one request.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, rsa::Error> {
        let timestamp = format_timestamp(timestamp);
        let content_hash = hash_body(body);
        let canonical = canonical_request(
            method,
            &hash_path(path),
            &content_hash,
            &timestamp,
            &self.user_id,
        );
        let signature = self
            .key
            .sign(Pkcs1v15Sign::new_unprefixed(), canonical.as_bytes())?;
        let encoded = STANDARD.encode(signature);

        let mut headers = vec![
            ("X-Ops-Sign".to_string(), format!("version={SIGNING_VERSION}")),
            ("X-Ops-UserId".to_string(), self.user_id.clone()),
            ("X-Ops-Timestamp".to_string(), timestamp),
            ("X-Ops-Content-Hash".to_string(), content_hash),
        ];
        headers.extend(authorization_headers(&encoded));
        Ok(headers)
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Base64 SHA-1 of the request body.
pub fn hash_body(body: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(body))
}

/// Base64 SHA-1 of the canonical path: repeated slashes collapsed, no
/// trailing slash.
pub fn hash_path(path: &str) -> String {
    STANDARD.encode(Sha1::digest(canonical_path(path).as_bytes()))
}

pub fn canonical_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !last_slash {
                out.push(c);
            }
            last_slash = true;
        } else {
            out.push(c);
            last_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

pub fn canonical_request(
    method: &str,
    hashed_path: &str,
    content_hash: &str,
    timestamp: &str,
    user_id: &str,
) -> String {
    format!(
        "Method:{}\nHashed Path:{}\nX-Ops-Content-Hash:{}\nX-Ops-Timestamp:{}\nX-Ops-UserId:{}",
        method.to_uppercase(),
        hashed_path,
        content_hash,
        timestamp,
        user_id
    )
}

fn authorization_headers(signature: &str) -> Vec<(String, String)> {
    signature
        .as_bytes()
        .chunks(AUTHORIZATION_CHUNK)
        .enumerate()
        .map(|(i, chunk)| {
            (
                format!("X-Ops-Authorization-{}", i + 1),
                String::from_utf8_lossy(chunk).into_owned(),
            )
        })
        .collect()
}
