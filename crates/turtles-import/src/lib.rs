//! Auto-import of CAPI clusters into Rancher
//!
//! The [`controller`] module holds the reconciliation state machine. It is fed
//! by the [`mappers`] and gated by [`policy`] and [`predicates`]; the import
//! manifest flows through [`manifest`] and [`apply`] onto the workload cluster
//! reached via [`remote`].

#![deny(missing_docs)]

pub mod apply;
pub mod controller;
pub mod manifest;
pub mod mappers;
pub mod policy;
pub mod predicates;
pub mod remote;

pub use apply::{apply_objects, ApplySummary, TargetCluster};
pub use controller::{error_policy, reconcile, Context, ContextBuilder, ImportConfig};
pub use manifest::{decode_manifest, HttpManifestFetcher, ManifestFetcher, ManifestObject};
pub use mappers::{capi_cluster_for_rancher_cluster, capi_clusters_for_namespace, ClusterIndex};
pub use policy::AutoImportDecision;
pub use remote::{KubeconfigSecretResolver, RemoteClusterResolver};
