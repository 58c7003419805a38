//! Watch event mappers
//!
//! Translate changes on Rancher clusters and namespaces into reconcile keys
//! for CAPI clusters. Lookups go through the controller's reflector cache, so
//! mapping never performs API calls.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;
use tracing::trace;

use turtles_common::crd::{CapiCluster, RancherCluster};
use turtles_common::REGISTRY_NAME_SUFFIX;

use crate::policy::AutoImportDecision;

/// Read-only view over known CAPI clusters
pub trait ClusterIndex: Send + Sync {
    /// Look up a cluster by namespace and name
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<CapiCluster>>;

    /// All clusters in a namespace
    fn list_in_namespace(&self, namespace: &str) -> Vec<Arc<CapiCluster>>;
}

impl ClusterIndex for Store<CapiCluster> {
    fn get(&self, namespace: &str, name: &str) -> Option<Arc<CapiCluster>> {
        Store::get(self, &ObjectRef::new(name).within(namespace))
    }

    fn list_in_namespace(&self, namespace: &str) -> Vec<Arc<CapiCluster>> {
        self.state()
            .into_iter()
            .filter(|c| c.namespace().as_deref() == Some(namespace))
            .collect()
    }
}

/// Map a Rancher cluster to the CAPI cluster it represents
///
/// The same namespace/name is tried first. Failing that, a name carrying the
/// registry suffix is mapped back to the CAPI cluster it was derived from.
/// At most one key is returned.
pub fn capi_cluster_for_rancher_cluster(
    index: &dyn ClusterIndex,
    rancher: &RancherCluster,
) -> Vec<ObjectRef<CapiCluster>> {
    let Some(namespace) = rancher.namespace() else {
        return Vec::new();
    };
    let name = rancher.name_any();

    let candidates = std::iter::once(name.as_str()).chain(name.strip_suffix(REGISTRY_NAME_SUFFIX));
    for candidate in candidates {
        if let Some(cluster) = index.get(&namespace, candidate) {
            return vec![ObjectRef::from_obj(cluster.as_ref())];
        }
    }

    trace!(namespace = %namespace, name = %name, "no CAPI cluster for rancher cluster");
    Vec::new()
}

/// Map a namespace to every CAPI cluster in it, if the namespace opts into auto-import
///
/// Only the namespace's own annotation is consulted.
pub fn capi_clusters_for_namespace(
    index: &dyn ClusterIndex,
    namespace: &Namespace,
) -> Vec<ObjectRef<CapiCluster>> {
    if !AutoImportDecision::from_meta(&namespace.metadata).is_eligible() {
        return Vec::new();
    }

    let name = namespace.name_any();
    index
        .list_in_namespace(&name)
        .iter()
        .map(|cluster| ObjectRef::from_obj(cluster.as_ref()))
        .collect()
}
