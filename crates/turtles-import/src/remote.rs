//! Target cluster access
//!
//! CAPI publishes an admin kubeconfig for every workload cluster in the
//! `<cluster>-kubeconfig` secret next to the Cluster object. The resolver reads
//! that secret, builds a client from it, and hands back a [`TargetCluster`]
//! that addresses arbitrary kinds through API discovery.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, PostParams};
use kube::discovery::{pinned_kind, Scope};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, trace};

use turtles_common::kube_utils::client_from_kubeconfig_yaml;
use turtles_common::{Error, FIELD_MANAGER};

use crate::apply::TargetCluster;
use crate::manifest::ManifestObject;

/// Key in the kubeconfig secret holding the kubeconfig document
pub const KUBECONFIG_SECRET_KEY: &str = "value";

/// Name of the secret CAPI writes the workload kubeconfig to
pub fn kubeconfig_secret_name(cluster_name: &str) -> String {
    format!("{}-kubeconfig", cluster_name)
}

/// Resolves a primary cluster identity to a client for that cluster's API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteClusterResolver: Send + Sync {
    /// Build a target for the cluster `namespace/name`
    async fn resolve(&self, namespace: &str, name: &str) -> Result<Arc<dyn TargetCluster>, Error>;
}

/// Resolver backed by the CAPI kubeconfig secret
pub struct KubeconfigSecretResolver {
    client: Client,
}

impl KubeconfigSecretResolver {
    /// Create a resolver reading secrets through the management cluster client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteClusterResolver for KubeconfigSecretResolver {
    async fn resolve(&self, namespace: &str, name: &str) -> Result<Arc<dyn TargetCluster>, Error> {
        let cluster = format!("{}/{}", namespace, name);
        let secret_name = kubeconfig_secret_name(name);

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets
            .get_opt(&secret_name)
            .await
            .map_err(|e| {
                Error::remote(&cluster, format!("reading secret {}: {}", secret_name, e))
            })?
            .ok_or_else(|| Error::remote(&cluster, format!("secret {} not found", secret_name)))?;

        let kubeconfig = kubeconfig_from_secret(&cluster, &secret)?;
        let client = client_from_kubeconfig_yaml(&cluster, &kubeconfig).await?;
        debug!(cluster = %cluster, "built target cluster client");

        Ok(Arc::new(DynamicTargetCluster::new(client)))
    }
}

/// Extract the kubeconfig document from a CAPI kubeconfig secret
pub fn kubeconfig_from_secret(cluster: &str, secret: &Secret) -> Result<String, Error> {
    let bytes = secret
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_SECRET_KEY))
        .ok_or_else(|| {
            Error::remote(
                cluster,
                format!("kubeconfig secret missing '{}' key", KUBECONFIG_SECRET_KEY),
            )
        })?;

    String::from_utf8(bytes.0.clone())
        .map_err(|e| Error::remote(cluster, format!("kubeconfig is not valid UTF-8: {}", e)))
}

/// Discovery results per kind, kept for the lifetime of one target client
#[derive(Default)]
struct DiscoveryCache {
    entries: Mutex<HashMap<GroupVersionKind, (ApiResource, Scope)>>,
}

impl DiscoveryCache {
    /// Cached resource for `gvk`, running `discover` on a miss
    ///
    /// The lock is not held while discovery runs; a concurrent miss for the
    /// same kind discovers twice and the last result wins.
    async fn resolve_with<F, Fut>(
        &self,
        gvk: &GroupVersionKind,
        discover: F,
    ) -> Result<(ApiResource, Scope), Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(ApiResource, Scope), Error>>,
    {
        let cached = self.lock().get(gvk).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }

        let resolved = discover().await?;
        self.lock().insert(gvk.clone(), resolved.clone());
        Ok(resolved)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<GroupVersionKind, (ApiResource, Scope)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Target cluster addressed through API discovery
///
/// Each kind is resolved with discovery once per target so the correct
/// plural and scope are used; namespaced objects without a namespace land in
/// the client's default namespace.
pub struct DynamicTargetCluster {
    client: Client,
    discovery: DiscoveryCache,
}

impl DynamicTargetCluster {
    /// Wrap a client for the target cluster
    pub fn new(client: Client) -> Self {
        Self {
            client,
            discovery: DiscoveryCache::default(),
        }
    }

    async fn api_for(&self, object: &ManifestObject) -> Result<Api<DynamicObject>, Error> {
        let (resource, scope) = self
            .discovery
            .resolve_with(&object.gvk, || async {
                let (resource, capabilities) = pinned_kind(&self.client, &object.gvk)
                    .await
                    .map_err(|e| Error::apply_from_kube(object.to_string(), e))?;
                trace!(object = %object, plural = %resource.plural, "resolved api resource");
                Ok((resource, capabilities.scope))
            })
            .await?;

        let api = match (&scope, object.namespace.as_deref()) {
            (Scope::Cluster, _) => Api::all_with(self.client.clone(), &resource),
            (Scope::Namespaced, Some(ns)) => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            (Scope::Namespaced, None) => {
                Api::default_namespaced_with(self.client.clone(), &resource)
            }
        };
        Ok(api)
    }
}

#[async_trait]
impl TargetCluster for DynamicTargetCluster {
    async fn get(&self, object: &ManifestObject) -> Result<Option<DynamicObject>, Error> {
        let api = self.api_for(object).await?;
        api.get_opt(&object.name)
            .await
            .map_err(|e| Error::apply_from_kube(object.to_string(), e))
    }

    async fn create(&self, object: &ManifestObject) -> Result<(), Error> {
        let api = self.api_for(object).await?;
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.create(&params, &object.object)
            .await
            .map_err(|e| Error::apply_from_kube(object.to_string(), e))?;
        Ok(())
    }
}
