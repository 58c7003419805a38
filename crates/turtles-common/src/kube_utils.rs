//! Shared Kubernetes utilities using kube-rs
//!
//! Client construction for the management cluster and for target clusters
//! reached through a kubeconfig, plus small apiVersion helpers.

use std::path::Path;
use std::time::Duration;

use kube::api::GroupVersionKind;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    debug!(kubeconfig = ?kubeconfig, "building kube client");
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig: {}", e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Create a kube client from raw kubeconfig YAML (e.g. a CAPI kubeconfig secret)
///
/// `cluster` is only used for error context.
pub async fn client_from_kubeconfig_yaml(cluster: &str, yaml: &str) -> Result<Client, Error> {
    let kubeconfig = Kubeconfig::from_yaml(yaml)
        .map_err(|e| Error::remote(cluster, format!("invalid kubeconfig: {}", e)))?;
    let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::remote(cluster, format!("failed to load kubeconfig: {}", e)))?;
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Client::try_from(config)
        .map_err(|e| Error::remote(cluster, format!("failed to create client: {}", e)))
}

/// Parse apiVersion into (group, version)
///
/// # Examples
/// ```
/// use turtles_common::kube_utils::parse_api_version;
///
/// let (group, version) = parse_api_version("apps/v1");
/// assert_eq!(group, "apps");
/// assert_eq!(version, "v1");
///
/// let (group, version) = parse_api_version("v1");
/// assert_eq!(group, "");
/// assert_eq!(version, "v1");
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build a GroupVersionKind from an apiVersion string and kind
pub fn gvk_from_api_version(api_version: &str, kind: &str) -> GroupVersionKind {
    let (group, version) = parse_api_version(api_version);
    GroupVersionKind::gvk(&group, &version, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gvk_for_core_and_grouped_kinds() {
        let gvk = gvk_from_api_version("v1", "Namespace");
        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Namespace");

        let gvk = gvk_from_api_version("rbac.authorization.k8s.io/v1", "ClusterRole");
        assert_eq!(gvk.group, "rbac.authorization.k8s.io");
        assert_eq!(gvk.version, "v1");
    }

    #[tokio::test]
    async fn invalid_kubeconfig_is_a_remote_error() {
        let Err(err) = client_from_kubeconfig_yaml("fleet/workload", "this: [is not").await else {
            panic!("invalid kubeconfig should not build a client");
        };
        assert!(matches!(err, Error::Remote { .. }));
        assert!(err.to_string().contains("fleet/workload"));
    }
}
