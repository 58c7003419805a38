//! Import manifest retrieval and decoding
//!
//! Rancher serves the agent bootstrap manifest as a multi-document YAML
//! stream. Each document is decoded on its own: blank or `{}` documents are
//! skipped, `*List` containers are expanded into their items in order, and
//! any document that fails to decode fails the whole fetch so nothing is
//! applied from a partially understood manifest.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{DynamicObject, GroupVersionKind};
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use tracing::{debug, trace};

use turtles_common::kube_utils::gvk_from_api_version;
use turtles_common::yaml::{parse_yaml, split_documents};
use turtles_common::Error;

/// Default timeout for a manifest download
pub const DEFAULT_MANIFEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A decoded manifest object together with its identity
#[derive(Clone, Debug)]
pub struct ManifestObject {
    /// Group/version/kind from the object's apiVersion and kind
    pub gvk: GroupVersionKind,
    /// metadata.name
    pub name: String,
    /// metadata.namespace (None for cluster-scoped or defaulted objects)
    pub namespace: Option<String>,
    /// The full object as decoded
    pub object: DynamicObject,
}

impl fmt::Display for ManifestObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.gvk.kind, ns, self.name),
            None => write!(f, "{} {}", self.gvk.kind, self.name),
        }
    }
}

/// Source of decoded import manifests
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Download the manifest at `url` and decode it into objects in document order
    async fn fetch(&self, url: &str) -> Result<Vec<ManifestObject>, Error>;
}

/// Fetches manifests over plain HTTP(S) GET
pub struct HttpManifestFetcher {
    http: reqwest::Client,
}

impl HttpManifestFetcher {
    /// Create a fetcher with the given request timeout
    ///
    /// `insecure_skip_tls_verify` disables certificate verification for
    /// registries serving self-signed certificates.
    pub fn new(timeout: Duration, insecure_skip_tls_verify: bool) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_skip_tls_verify)
            .build()
            .map_err(|e| {
                Error::internal_with_context(
                    "manifest_fetcher",
                    format!("failed to build HTTP client: {}", e),
                )
            })?;
        Ok(Self { http })
    }

    /// Download the raw manifest body
    async fn download(&self, url: &str) -> Result<String, Error> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::download(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download(url, format!("unexpected status {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::download(url, format!("reading body: {}", e)))
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<ManifestObject>, Error> {
        let body = self.download(url).await?;
        debug!(url = %url, bytes = body.len(), "downloaded import manifest");
        decode_manifest(&body)
    }
}

/// Decode a multi-document YAML stream into manifest objects
pub fn decode_manifest(input: &str) -> Result<Vec<ManifestObject>, Error> {
    let documents = split_documents(input)
        .map_err(|e| Error::decode(e.document, format!("invalid stream: {}", e)))?;

    let mut objects = Vec::new();
    for (index, document) in documents.iter().enumerate() {
        let value = parse_yaml(document).map_err(|e| Error::decode(index, e.to_string()))?;

        if is_blank(&value) {
            trace!(document = index, "skipping empty manifest document");
            continue;
        }

        match list_items(&value) {
            Some(items) => {
                for item in items {
                    objects.push(decode_object(index, item.clone())?);
                }
            }
            None => objects.push(decode_object(index, value)?),
        }
    }

    Ok(objects)
}

/// `null` and `{}` documents carry nothing to apply
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Items of a `*List` container, if the value is one
///
/// A list with a null or missing `items` holds nothing.
fn list_items(value: &Value) -> Option<&[Value]> {
    let kind = value.get("kind")?.as_str()?;
    if !kind.ends_with("List") {
        return None;
    }
    match value.get("items") {
        None | Some(Value::Null) => Some(&[]),
        Some(items) => items.as_array().map(Vec::as_slice),
    }
}

fn decode_object(document: usize, value: Value) -> Result<ManifestObject, Error> {
    if !value.is_object() {
        return Err(Error::decode(document, "expected a mapping at the top level"));
    }

    let api_version = required_str(&value, "/apiVersion")
        .ok_or_else(|| Error::decode(document, "object is missing apiVersion"))?;
    let kind = required_str(&value, "/kind")
        .ok_or_else(|| Error::decode(document, "object is missing kind"))?;
    let name = required_str(&value, "/metadata/name").ok_or_else(|| {
        Error::decode(document, format!("{} object is missing metadata.name", kind))
    })?;
    let namespace = required_str(&value, "/metadata/namespace");

    let gvk = gvk_from_api_version(&api_version, &kind);
    let object: DynamicObject = serde_json::from_value(value)
        .map_err(|e| Error::decode(document, format!("{} {}: {}", kind, name, e)))?;

    Ok(ManifestObject {
        gvk,
        name,
        namespace,
        object,
    })
}

/// Non-empty string at a JSON pointer
fn required_str(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
