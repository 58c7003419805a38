//! Cluster API `Cluster` resource (primary resource)

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster API cluster specification
///
/// Only the fields needed for identification are modelled. Everything else
/// in the upstream spec is ignored when reading.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    root = "CapiCluster",
    plural = "clusters",
    status = "CapiClusterStatus",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CapiClusterSpec {
    /// Whether reconciliation of the cluster is paused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    /// Endpoint of the workload cluster's API server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<ApiEndpoint>,
}

/// Host/port pair of an API server endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ApiEndpoint {
    /// Hostname or IP
    #[serde(default)]
    pub host: String,
    /// Port
    #[serde(default)]
    pub port: i32,
}

/// Cluster API cluster status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapiClusterStatus {
    /// Lifecycle phase reported by CAPI (Pending, Provisioning, Provisioned, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Whether the control plane is ready to serve requests
    #[serde(default)]
    pub control_plane_ready: bool,

    /// Whether the infrastructure is ready
    #[serde(default)]
    pub infrastructure_ready: bool,
}

impl CapiCluster {
    /// Whether the control plane has been reported ready
    pub fn is_control_plane_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| s.control_plane_ready)
            .unwrap_or(false)
    }

    /// Whether the cluster carries a deletion timestamp
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// `namespace/name` for logs and error messages
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    #[test]
    fn status_deserializes_from_upstream_shape() {
        let cluster: CapiCluster = serde_json::from_value(serde_json::json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "Cluster",
            "metadata": {"name": "workload", "namespace": "fleet"},
            "spec": {
                "clusterNetwork": {"pods": {"cidrBlocks": ["10.0.0.0/16"]}},
                "controlPlaneEndpoint": {"host": "10.0.0.1", "port": 6443}
            },
            "status": {"phase": "Provisioned", "controlPlaneReady": true}
        }))
        .unwrap();

        assert!(cluster.is_control_plane_ready());
        assert_eq!(cluster.key(), "fleet/workload");
        assert_eq!(
            cluster.spec.control_plane_endpoint.as_ref().map(|e| e.port),
            Some(6443)
        );
    }

    #[test]
    fn missing_status_means_not_ready() {
        let cluster = CapiCluster::new("workload", CapiClusterSpec::default());
        assert!(!cluster.is_control_plane_ready());
        assert!(!cluster.is_deleting());
    }

    #[test]
    fn deletion_timestamp_marks_deleting() {
        let mut cluster = CapiCluster::new("workload", CapiClusterSpec::default());
        cluster.metadata.deletion_timestamp = Some(Time(Default::default()));
        assert!(cluster.is_deleting());
    }

    #[test]
    fn generated_root_type_targets_capi_clusters() {
        use kube::{CustomResourceExt, Resource};

        assert_eq!(CapiCluster::crd_name(), "clusters.cluster.x-k8s.io");
        assert_eq!(CapiCluster::kind(&()), "Cluster");
        assert_eq!(CapiCluster::api_version(&()), "cluster.x-k8s.io/v1beta1");
    }
}
