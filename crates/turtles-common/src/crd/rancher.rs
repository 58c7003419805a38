//! Rancher-side resources: the provisioning `Cluster` (registry record) and
//! the `ClusterRegistrationToken` carrying the import manifest URL

use kube::api::ObjectMeta;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::REGISTRY_NAME_SUFFIX;

/// Derive the registry cluster name for a CAPI cluster.
///
/// This is the only naming scheme used for registry records; every lookup
/// goes through it.
pub fn registry_cluster_name(capi_cluster_name: &str) -> String {
    format!("{}{}", capi_cluster_name, REGISTRY_NAME_SUFFIX)
}

/// Rancher provisioning cluster specification
///
/// The import controller creates these with an empty spec; Rancher fills in
/// everything else.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "provisioning.cattle.io",
    version = "v1",
    kind = "Cluster",
    root = "RancherCluster",
    plural = "clusters",
    status = "RancherClusterStatus",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct RancherClusterSpec {}

/// Rancher provisioning cluster status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RancherClusterStatus {
    /// Management cluster name resolved by Rancher (e.g. `c-m-abc123`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    /// Whether the Rancher agent is running in the downstream cluster
    #[serde(default)]
    pub agent_deployed: bool,
}

impl RancherCluster {
    /// Build the registry record for a CAPI cluster
    pub fn for_capi_cluster(namespace: &str, capi_cluster_name: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(registry_cluster_name(capi_cluster_name)),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: RancherClusterSpec::default(),
            status: None,
        }
    }

    /// Resolved management cluster name, if Rancher has set a non-empty one
    pub fn resolved_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.cluster_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// Whether the Rancher agent has been deployed
    pub fn agent_deployed(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| s.agent_deployed)
            .unwrap_or(false)
    }

    /// `namespace/name` for logs
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        )
    }
}

/// Cluster registration token specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "management.cattle.io",
    version = "v3",
    kind = "ClusterRegistrationToken",
    plural = "clusterregistrationtokens",
    status = "ClusterRegistrationTokenStatus",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistrationTokenSpec {
    /// Management cluster the token belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

/// Cluster registration token status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistrationTokenStatus {
    /// URL serving the import manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,
}

impl ClusterRegistrationToken {
    /// The manifest URL, if Rancher has provisioned a non-empty one
    pub fn manifest_url(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.manifest_url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_name_is_derived_from_capi_name() {
        assert_eq!(registry_cluster_name("workload"), "workload-capi");
        assert_eq!(registry_cluster_name("workload"), registry_cluster_name("workload"));
        assert_ne!(registry_cluster_name("a"), registry_cluster_name("b"));
    }

    #[test]
    fn registry_record_for_capi_cluster() {
        let rc = RancherCluster::for_capi_cluster("fleet", "workload");
        assert_eq!(rc.name_any(), "workload-capi");
        assert_eq!(rc.namespace().as_deref(), Some("fleet"));
        assert!(rc.status.is_none());

        let body = serde_json::to_value(&rc).unwrap();
        assert_eq!(body["apiVersion"], "provisioning.cattle.io/v1");
        assert_eq!(body["kind"], "Cluster");
        assert_eq!(body["spec"], serde_json::json!({}));
        assert!(body.get("status").is_none());
    }

    #[test]
    fn resolved_name_ignores_empty_values() {
        let mut rc = RancherCluster::for_capi_cluster("fleet", "workload");
        assert_eq!(rc.resolved_name(), None);

        rc.status = Some(RancherClusterStatus {
            cluster_name: Some(String::new()),
            agent_deployed: false,
        });
        assert_eq!(rc.resolved_name(), None);

        rc.status = Some(RancherClusterStatus {
            cluster_name: Some("c-m-abc123".to_string()),
            agent_deployed: true,
        });
        assert_eq!(rc.resolved_name(), Some("c-m-abc123"));
        assert!(rc.agent_deployed());
    }

    #[test]
    fn status_reads_upstream_field_names() {
        let rc: RancherCluster = serde_json::from_value(serde_json::json!({
            "apiVersion": "provisioning.cattle.io/v1",
            "kind": "Cluster",
            "metadata": {"name": "workload-capi", "namespace": "fleet"},
            "spec": {"kubernetesVersion": "v1.30.1"},
            "status": {"clusterName": "c-m-xyz", "agentDeployed": true, "ready": true}
        }))
        .unwrap();
        assert_eq!(rc.resolved_name(), Some("c-m-xyz"));
        assert!(rc.agent_deployed());

        let token: ClusterRegistrationToken = serde_json::from_value(serde_json::json!({
            "apiVersion": "management.cattle.io/v3",
            "kind": "ClusterRegistrationToken",
            "metadata": {"name": "default-token", "namespace": "c-m-xyz"},
            "spec": {"clusterName": "c-m-xyz"},
            "status": {"manifestUrl": "https://rancher.example/v3/import/abc.yaml", "token": "abc"}
        }))
        .unwrap();
        assert_eq!(
            token.manifest_url(),
            Some("https://rancher.example/v3/import/abc.yaml")
        );
    }

    #[test]
    fn empty_manifest_url_is_not_ready() {
        let mut token = ClusterRegistrationToken::new("default-token", Default::default());
        assert_eq!(token.manifest_url(), None);

        token.status = Some(ClusterRegistrationTokenStatus {
            manifest_url: Some("  ".to_string()),
        });
        assert_eq!(token.manifest_url(), None);
    }

    #[test]
    fn generated_root_types_target_rancher_groups() {
        use kube::{CustomResourceExt, Resource};

        assert_eq!(RancherCluster::crd_name(), "clusters.provisioning.cattle.io");
        assert_eq!(RancherCluster::kind(&()), "Cluster");
        assert_eq!(
            ClusterRegistrationToken::crd_name(),
            "clusterregistrationtokens.management.cattle.io"
        );
    }
}
