//! Common types for rancher-turtles: resource definitions, errors and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Annotation controlling auto-import, on a cluster or its namespace
pub const AUTO_IMPORT_ANNOTATION: &str = "rancher-auto-import";

/// Annotation marking a cluster that has already been imported
pub const IMPORTED_ANNOTATION: &str = "imported";

/// Label used to shard clusters between controller instances
pub const WATCH_FILTER_LABEL: &str = "cluster.x-k8s.io/watch-filter";

/// Suffix appended to a CAPI cluster name to form its registry cluster name
pub const REGISTRY_NAME_SUFFIX: &str = "-capi";

/// Well-known name of the registration token in a management cluster namespace
pub const REGISTRATION_TOKEN_NAME: &str = "default-token";

/// Field manager used for every write this project performs
pub const FIELD_MANAGER: &str = "rancher-turtles";
