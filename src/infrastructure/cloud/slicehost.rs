//! Slicehost API client (XML over HTTP basic auth)

use reqwest::blocking::Client;
use reqwest::Method;
use roxmltree::{Document, Node};
use tracing::debug;

use crate::application::RemoteError;
use crate::domain::{NamedResource, ServerRequest, Slice};
use crate::infrastructure::traits::SlicehostApi;
use crate::infrastructure::{InfraError, InfraResult};

use super::{child, child_text};

pub const DEFAULT_ENDPOINT: &str = "https://api.slicehost.com";

/// The API password doubles as the basic-auth user name.
pub struct SlicehostClient {
    password: String,
    endpoint: String,
    http: Client,
}

impl SlicehostClient {
    pub fn new(password: &str) -> InfraResult<Self> {
        Self::with_endpoint(password, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(password: &str, endpoint: &str) -> InfraResult<Self> {
        let http = Client::builder().build().map_err(|e| InfraError::Http {
            message: e.to_string(),
        })?;
        Ok(Self {
            password: password.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn request(&self, method: Method, path: &str, body: Option<String>) -> Result<String, RemoteError> {
        let url = format!("{}/{}", self.endpoint, path);
        let fail = |status: Option<u16>, message: String| {
            RemoteError::new(method.as_str(), &url, status, message)
        };
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.password, None::<&str>);
        if let Some(body) = body {
            request = request.header("Content-Type", "application/xml").body(body);
        }
        let response = request.send().map_err(|e| fail(None, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| fail(Some(status.as_u16()), e.to_string()))?;
        if status.is_success() {
            Ok(text)
        } else {
            let message = parse_errors(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            Err(fail(Some(status.as_u16()), message))
        }
    }

    fn parse<T>(&self, path: &str, xml: &str, parse: fn(&str) -> Result<T, String>) -> Result<T, RemoteError> {
        parse(xml).map_err(|e| RemoteError::new("GET", format!("{}/{}", self.endpoint, path), None, e))
    }
}

fn slice_from(node: Node<'_, '_>) -> Slice {
    let addresses = child(node, "addresses")
        .map(|a| {
            a.children()
                .filter(|c| c.is_element() && c.tag_name().name() == "address")
                .filter_map(|c| c.text().map(str::trim).map(String::from))
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();
    Slice {
        id: child_text(node, "id").unwrap_or_default(),
        name: child_text(node, "name").unwrap_or_default(),
        flavor_id: child_text(node, "flavor-id").unwrap_or_default(),
        image_id: child_text(node, "image-id").unwrap_or_default(),
        status: child_text(node, "status").unwrap_or_default(),
        addresses,
        root_password: child_text(node, "root-password"),
    }
}

fn elements<'a, 'i>(doc: &'a Document<'i>, name: &str) -> Vec<Node<'a, 'i>> {
    doc.root_element()
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == name)
        .collect()
}

/// `<slices><slice>...</slice></slices>`
pub fn parse_slices(xml: &str) -> Result<Vec<Slice>, String> {
    let doc = Document::parse(xml).map_err(|e| e.to_string())?;
    Ok(elements(&doc, "slice").into_iter().map(slice_from).collect())
}

/// A single `<slice>` document.
pub fn parse_slice(xml: &str) -> Result<Slice, String> {
    let doc = Document::parse(xml).map_err(|e| e.to_string())?;
    Ok(slice_from(doc.root_element()))
}

/// `<images><image>` or `<flavors><flavor>` listings.
pub fn parse_named(xml: &str) -> Result<Vec<NamedResource>, String> {
    let doc = Document::parse(xml).map_err(|e| e.to_string())?;
    Ok(doc
        .root_element()
        .children()
        .filter(Node::is_element)
        .map(|n| NamedResource {
            id: child_text(n, "id").unwrap_or_default(),
            name: child_text(n, "name").unwrap_or_default(),
        })
        .collect())
}

fn parse_errors(xml: &str) -> Option<String> {
    let doc = Document::parse(xml).ok()?;
    let messages: Vec<&str> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "error")
        .filter_map(|n| n.text())
        .collect();
    (!messages.is_empty()).then(|| messages.join(", "))
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn create_body(request: &ServerRequest) -> String {
    format!(
        "<slice><flavor-id type=\"integer\">{}</flavor-id><image-id type=\"integer\">{}</image-id><name>{}</name></slice>",
        escape(&request.flavor_id),
        escape(&request.image_id),
        escape(&request.name)
    )
}

impl SlicehostApi for SlicehostClient {
    fn list_slices(&self) -> Result<Vec<Slice>, RemoteError> {
        let xml = self.request(Method::GET, "slices.xml", None)?;
        self.parse("slices.xml", &xml, parse_slices)
    }

    fn get_slice(&self, id: &str) -> Result<Slice, RemoteError> {
        let path = format!("slices/{id}.xml");
        let xml = self.request(Method::GET, &path, None)?;
        self.parse(&path, &xml, parse_slice)
    }

    fn create_slice(&self, request: &ServerRequest) -> Result<Slice, RemoteError> {
        let xml = self.request(Method::POST, "slices.xml", Some(create_body(request)))?;
        self.parse("slices.xml", &xml, parse_slice)
    }

    fn delete_slice(&self, id: &str) -> Result<(), RemoteError> {
        self.request(Method::DELETE, &format!("slices/{id}.xml"), None)
            .map(|_| ())
    }

    fn list_images(&self) -> Result<Vec<NamedResource>, RemoteError> {
        let xml = self.request(Method::GET, "images.xml", None)?;
        self.parse("images.xml", &xml, parse_named)
    }

    fn list_flavors(&self) -> Result<Vec<NamedResource>, RemoteError> {
        let xml = self.request(Method::GET, "flavors.xml", None)?;
        self.parse("flavors.xml", &xml, parse_named)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLICES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<slices type="array">
  <slice>
    <name>web01</name>
    <image-id type="integer">11</image-id>
    <addresses type="array">
      <address>173.45.1.1</address>
      <address>10.176.1.1</address>
    </addresses>
    <progress type="integer">100</progress>
    <id type="integer">44</id>
    <bw-out type="float">0.0</bw-out>
    <bw-in type="float">0.0</bw-in>
    <flavor-id type="integer">1</flavor-id>
    <status>active</status>
  </slice>
</slices>"#;

    #[test]
    fn given_slices_listing_when_parsed_then_maps_fields() {
        let slices = parse_slices(SLICES).unwrap();
        assert_eq!(slices.len(), 1);
        let slice = &slices[0];
        assert_eq!(slice.id, "44");
        assert_eq!(slice.name, "web01");
        assert_eq!(slice.image_id, "11");
        assert_eq!(slice.flavor_id, "1");
        assert_eq!(slice.addresses, vec!["173.45.1.1", "10.176.1.1"]);
        assert!(slice.is_active());
        assert_eq!(slice.root_password, None);
    }

    #[test]
    fn given_images_listing_when_parsed_then_id_and_name() {
        let xml = r#"<images type="array"><image><name>Ubuntu 10.04</name><id type="integer">49</id></image></images>"#;
        assert_eq!(
            parse_named(xml).unwrap(),
            vec![NamedResource {
                id: "49".into(),
                name: "Ubuntu 10.04".into()
            }]
        );
    }

    #[test]
    fn given_request_when_building_create_body_then_escapes_name() {
        let body = create_body(&ServerRequest {
            name: "a&b".into(),
            flavor_id: "1".into(),
            image_id: "49".into(),
        });
        assert!(body.contains("<name>a&amp;b</name>"));
        assert!(body.contains("<image-id type=\"integer\">49</image-id>"));
    }

    #[test]
    fn given_error_document_when_parsed_then_joins_messages() {
        let xml = "<errors><error>Name can't be blank</error><error>Flavor is invalid</error></errors>";
        assert_eq!(
            parse_errors(xml).as_deref(),
            Some("Name can't be blank, Flavor is invalid")
        );
    }
}
