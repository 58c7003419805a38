//! Resource definitions for the kinds the import controller reads and writes
//!
//! None of these kinds are owned by this project. The definitions carry only
//! the fields the controller interprets; unknown fields are ignored on read.

mod capi;
mod rancher;

pub use capi::{ApiEndpoint, CapiCluster, CapiClusterSpec, CapiClusterStatus};
pub use rancher::{
    registry_cluster_name, ClusterRegistrationToken, ClusterRegistrationTokenSpec,
    ClusterRegistrationTokenStatus, RancherCluster, RancherClusterSpec, RancherClusterStatus,
};
