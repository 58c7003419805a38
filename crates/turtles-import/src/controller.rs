//! CAPI cluster import controller
//!
//! Drives a CAPI cluster from "unregistered" to "agent deployed":
//!
//! 1. Re-read the cluster; if it vanished, requeue.
//! 2. Wait for the control plane to become ready.
//! 3. Deleting clusters are left alone.
//! 4. Without a Rancher cluster, resolve the auto-import policy and create one.
//! 5. Once Rancher has issued a registration token, download the import
//!    manifest and create its objects on the workload cluster.
//!
//! Nothing is persisted between passes; every step is re-derived from the
//! management cluster and Rancher state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, PostParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, error, info, instrument, warn};

use turtles_common::crd::{
    registry_cluster_name, CapiCluster, ClusterRegistrationToken, RancherCluster,
};
use turtles_common::{Error, FIELD_MANAGER, REGISTRATION_TOKEN_NAME};

use crate::apply::apply_objects;
use crate::manifest::{HttpManifestFetcher, ManifestFetcher, DEFAULT_MANIFEST_TIMEOUT};
use crate::policy;
use crate::predicates::{has_filter_label, is_imported};
use crate::remote::{KubeconfigSecretResolver, RemoteClusterResolver};

/// Default wait while a control plane comes up
pub const DEFAULT_CONTROL_PLANE_REQUEUE: Duration = Duration::from_secs(60);

/// Default short requeue for "not ready yet" states
pub const DEFAULT_REQUEUE: Duration = Duration::from_secs(5);

/// Tunables for the import controller
#[derive(Clone, Debug)]
pub struct ImportConfig {
    /// Requeue delay while the control plane is not ready
    pub control_plane_requeue: Duration,
    /// Requeue delay for short waits (record just created, token pending) and retryable errors
    pub requeue: Duration,
    /// Timeout for downloading the import manifest
    pub manifest_timeout: Duration,
    /// Accept invalid TLS certificates when downloading manifests
    pub insecure_skip_tls_verify: bool,
    /// Only handle clusters labelled with this watch-filter value
    pub watch_filter: Option<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            control_plane_requeue: DEFAULT_CONTROL_PLANE_REQUEUE,
            requeue: DEFAULT_REQUEUE,
            manifest_timeout: DEFAULT_MANIFEST_TIMEOUT,
            insecure_skip_tls_verify: false,
            watch_filter: None,
        }
    }
}

/// Reads from the management cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Get a CAPI cluster by namespace and name
    async fn get_capi_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CapiCluster>, Error>;

    /// Get a namespace by name
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;
}

/// Real [`ClusterClient`] backed by the kube API
pub struct ClusterClientImpl {
    client: Client,
}

impl ClusterClientImpl {
    /// Create a new ClusterClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for ClusterClientImpl {
    async fn get_capi_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<CapiCluster>, Error> {
        let api: Api<CapiCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }
}

/// Rancher registry operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Get a Rancher provisioning cluster
    async fn get_rancher_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RancherCluster>, Error>;

    /// Create a Rancher provisioning cluster
    async fn create_rancher_cluster(&self, cluster: &RancherCluster) -> Result<(), Error>;

    /// Get a cluster registration token
    async fn get_registration_token(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterRegistrationToken>, Error>;
}

/// Real [`RegistryClient`] backed by the kube API
pub struct RegistryClientImpl {
    client: Client,
}

impl RegistryClientImpl {
    /// Create a new RegistryClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RegistryClient for RegistryClientImpl {
    async fn get_rancher_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<RancherCluster>, Error> {
        let api: Api<RancherCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_rancher_cluster(&self, cluster: &RancherCluster) -> Result<(), Error> {
        let namespace = cluster.namespace().ok_or_else(|| {
            Error::internal_with_context("create_rancher_cluster", "cluster has no namespace")
        })?;
        let api: Api<RancherCluster> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        match api.create(&params, cluster).await {
            Ok(_) => Ok(()),
            // Created concurrently; the next pass observes it
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!(cluster = %cluster.key(), "rancher cluster already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_registration_token(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterRegistrationToken>, Error> {
        let api: Api<ClusterRegistrationToken> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}

/// Controller context shared across reconciliations
pub struct Context {
    /// Management cluster reads
    pub clusters: Arc<dyn ClusterClient>,
    /// Rancher registry operations
    pub registry: Arc<dyn RegistryClient>,
    /// Import manifest source
    pub fetcher: Arc<dyn ManifestFetcher>,
    /// Workload cluster client resolver
    pub remote: Arc<dyn RemoteClusterResolver>,
    /// Tunables
    pub config: ImportConfig,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with mock collaborators
    #[cfg(test)]
    pub fn for_testing(
        clusters: Arc<dyn ClusterClient>,
        registry: Arc<dyn RegistryClient>,
        fetcher: Arc<dyn ManifestFetcher>,
        remote: Arc<dyn RemoteClusterResolver>,
    ) -> Self {
        Self {
            clusters,
            registry,
            fetcher,
            remote,
            config: ImportConfig::default(),
        }
    }
}

/// Builder for constructing [`Context`] instances
///
/// ```text
/// let ctx = Context::builder(client)
///     .config(ImportConfig { watch_filter: Some("shard-a".into()), ..Default::default() })
///     .build()?;
/// ```
pub struct ContextBuilder {
    client: Client,
    clusters: Option<Arc<dyn ClusterClient>>,
    registry: Option<Arc<dyn RegistryClient>>,
    fetcher: Option<Arc<dyn ManifestFetcher>>,
    remote: Option<Arc<dyn RemoteClusterResolver>>,
    config: ImportConfig,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            clusters: None,
            registry: None,
            fetcher: None,
            remote: None,
            config: ImportConfig::default(),
        }
    }

    /// Set controller tunables
    pub fn config(mut self, config: ImportConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the management cluster client
    pub fn cluster_client(mut self, clusters: Arc<dyn ClusterClient>) -> Self {
        self.clusters = Some(clusters);
        self
    }

    /// Override the registry client
    pub fn registry_client(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Override the manifest fetcher
    pub fn manifest_fetcher(mut self, fetcher: Arc<dyn ManifestFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Override the remote cluster resolver
    pub fn remote_resolver(mut self, remote: Arc<dyn RemoteClusterResolver>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Build the Context
    ///
    /// Fails only if the HTTP client for manifest downloads cannot be built.
    pub fn build(self) -> Result<Context, Error> {
        let fetcher: Arc<dyn ManifestFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpManifestFetcher::new(
                self.config.manifest_timeout,
                self.config.insecure_skip_tls_verify,
            )?),
        };

        Ok(Context {
            clusters: self
                .clusters
                .unwrap_or_else(|| Arc::new(ClusterClientImpl::new(self.client.clone()))),
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(RegistryClientImpl::new(self.client.clone()))),
            fetcher,
            remote: self
                .remote
                .unwrap_or_else(|| Arc::new(KubeconfigSecretResolver::new(self.client.clone()))),
            config: self.config,
        })
    }
}

/// Reconcile a CAPI cluster
///
/// The cached object only supplies the identity; current state is re-read
/// before any decision is made.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.key()))]
pub async fn reconcile(cluster: Arc<CapiCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cluster.name_any();
    let namespace = cluster
        .namespace()
        .ok_or_else(|| Error::internal_with_context("reconcile", "cluster has no namespace"))?;
    debug!("reconciling cluster");

    let Some(cluster) = ctx.clusters.get_capi_cluster(&namespace, &name).await? else {
        debug!("cluster no longer exists, requeueing");
        return Ok(Action::requeue(ctx.config.requeue));
    };

    if !has_filter_label(&cluster.metadata, ctx.config.watch_filter.as_deref()) {
        debug!("cluster not in watch filter, ignoring");
        return Ok(Action::await_change());
    }
    if is_imported(&cluster.metadata) {
        debug!("cluster already marked as imported, ignoring");
        return Ok(Action::await_change());
    }

    if !cluster.is_control_plane_ready() {
        info!("control plane is not ready, requeueing");
        return Ok(Action::requeue(ctx.config.control_plane_requeue));
    }

    if cluster.is_deleting() {
        return reconcile_delete(&cluster, &ctx).await;
    }

    let rancher_name = registry_cluster_name(&name);
    match ctx
        .registry
        .get_rancher_cluster(&namespace, &rancher_name)
        .await?
    {
        None => register(&cluster, &namespace, &ctx).await,
        Some(rancher) => import(&cluster, &namespace, &rancher, &ctx).await,
    }
}

/// Deletion hook
///
/// Deregistration from Rancher and agent cleanup are not performed; a
/// deleting cluster is acknowledged without side effects.
async fn reconcile_delete(cluster: &CapiCluster, _ctx: &Context) -> Result<Action, Error> {
    info!(cluster = %cluster.key(), "cluster is being deleted, nothing to clean up");
    Ok(Action::await_change())
}

/// Create the Rancher cluster if the auto-import policy allows it
async fn register(cluster: &CapiCluster, namespace: &str, ctx: &Context) -> Result<Action, Error> {
    if !should_auto_import(cluster, namespace, ctx).await? {
        info!("cluster is not marked for auto-import");
        return Ok(Action::await_change());
    }

    let rancher = RancherCluster::for_capi_cluster(namespace, &cluster.name_any());
    ctx.registry.create_rancher_cluster(&rancher).await?;
    info!(rancher_cluster = %rancher.key(), "created rancher cluster");

    Ok(Action::requeue(ctx.config.requeue))
}

/// Resolve the auto-import annotation: cluster first, then its namespace
async fn should_auto_import(
    cluster: &CapiCluster,
    namespace: &str,
    ctx: &Context,
) -> Result<bool, Error> {
    let decision = policy::AutoImportDecision::from_meta(&cluster.metadata);
    if decision.present {
        debug!(value = decision.value, "auto-import set on cluster");
        return Ok(decision.is_eligible());
    }

    let Some(ns) = ctx.clusters.get_namespace(namespace).await? else {
        debug!(namespace = %namespace, "namespace not found, treating as not eligible");
        return Ok(false);
    };

    Ok(policy::resolve([&cluster.metadata, &ns.metadata]).is_eligible())
}

/// Apply the Rancher import manifest to the workload cluster
async fn import(
    cluster: &CapiCluster,
    namespace: &str,
    rancher: &RancherCluster,
    ctx: &Context,
) -> Result<Action, Error> {
    if rancher.agent_deployed() {
        debug!("agent already deployed, nothing to do");
        return Ok(Action::await_change());
    }

    let Some(management_name) = rancher.resolved_name() else {
        debug!(rancher_cluster = %rancher.key(), "rancher has not assigned a cluster name yet");
        return Ok(Action::requeue(ctx.config.requeue));
    };
    info!(management_cluster = %management_name, "found rancher cluster");

    let token = ctx
        .registry
        .get_registration_token(management_name, REGISTRATION_TOKEN_NAME)
        .await?;
    let Some(url) = token.as_ref().and_then(|t| t.manifest_url()) else {
        info!("import manifest URL not set yet, requeueing");
        return Ok(Action::requeue(ctx.config.requeue));
    };

    let objects = ctx.fetcher.fetch(url).await?;
    info!(objects = objects.len(), "applying import manifest");

    let target = ctx.remote.resolve(namespace, &cluster.name_any()).await?;
    let summary = apply_objects(target.as_ref(), &objects).await?;
    info!(
        created = summary.created,
        skipped = summary.skipped,
        "import manifest applied"
    );

    Ok(Action::await_change())
}

/// Error policy for the controller
///
/// Errors that a retry cannot fix back off on the longer control plane delay.
pub fn error_policy(cluster: Arc<CapiCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    if error.is_retryable() {
        error!(?error, cluster = %cluster.key(), "reconciliation failed");
        Action::requeue(ctx.config.requeue)
    } else {
        warn!(%error, cluster = %cluster.key(), "reconciliation failed with non-retryable error");
        Action::requeue(ctx.config.control_plane_requeue)
    }
}
