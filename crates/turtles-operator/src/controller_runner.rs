//! Controller runner - wires the import controller to its watches

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::controller::Config as ControllerConfig;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use turtles_common::crd::{CapiCluster, RancherCluster};
use turtles_import::mappers::{capi_cluster_for_rancher_cluster, capi_clusters_for_namespace};
use turtles_import::predicates::watch_filter_selector;
use turtles_import::{error_policy, reconcile, Context};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Watcher config for CAPI clusters, restricted to the shard if a filter is set
pub fn cluster_watcher_config(watch_filter: Option<&str>) -> WatcherConfig {
    let config = WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS);
    match watch_filter {
        Some(filter) => config.labels(&watch_filter_selector(filter)),
        None => config,
    }
}

/// Build the import controller future
///
/// Primary watch: CAPI clusters. Rancher clusters and namespaces are mapped
/// back to CAPI clusters through the controller's own cache.
pub fn build_import_controller(
    client: Client,
    ctx: Arc<Context>,
    concurrency: u16,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let clusters: Api<CapiCluster> = Api::all(client.clone());
    let rancher_clusters: Api<RancherCluster> = Api::all(client.clone());
    let namespaces: Api<Namespace> = Api::all(client);

    let controller = Controller::new(
        clusters,
        cluster_watcher_config(ctx.config.watch_filter.as_deref()),
    )
    .with_config(ControllerConfig::default().concurrency(concurrency));

    let store = controller.store();
    let ns_store = store.clone();

    tracing::info!(concurrency, "- CAPI cluster import controller");

    Box::pin(
        controller
            .watches(
                rancher_clusters,
                WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
                move |rancher| capi_cluster_for_rancher_cluster(&store, &rancher),
            )
            .watches(
                namespaces,
                WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
                move |ns| capi_clusters_for_namespace(&ns_store, &ns),
            )
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(log_reconcile_result("Import")),
    )
}

/// Create a logging callback for controller reconciliation results
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_filter_becomes_label_selector() {
        let config = cluster_watcher_config(Some("shard-a"));
        assert_eq!(
            config.label_selector.as_deref(),
            Some("cluster.x-k8s.io/watch-filter=shard-a")
        );
        assert_eq!(config.timeout, Some(WATCH_TIMEOUT_SECS));
    }

    #[test]
    fn no_filter_watches_everything() {
        assert_eq!(cluster_watcher_config(None).label_selector, None);
    }
}
