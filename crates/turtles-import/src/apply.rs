//! Idempotent create-if-absent application of manifest objects
//!
//! Objects are applied strictly in manifest order. An object that already
//! exists on the target cluster is left untouched (no update, no patch), so
//! re-running the same manifest is a no-op. The first failure aborts the run
//! and objects after it are not attempted.

use async_trait::async_trait;
use kube::api::DynamicObject;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, info};

use turtles_common::Error;

use crate::manifest::ManifestObject;

/// Operations needed on the cluster receiving the import manifest
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TargetCluster: Send + Sync {
    /// Look up an object by identity, returning None when absent
    async fn get(&self, object: &ManifestObject) -> Result<Option<DynamicObject>, Error>;

    /// Create the object as decoded from the manifest
    async fn create(&self, object: &ManifestObject) -> Result<(), Error>;
}

/// What an apply pass did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Objects created by this pass
    pub created: usize,
    /// Objects that already existed and were left as-is
    pub skipped: usize,
}

/// Apply objects to the target in order, creating only the missing ones
pub async fn apply_objects(
    target: &dyn TargetCluster,
    objects: &[ManifestObject],
) -> Result<ApplySummary, Error> {
    let mut summary = ApplySummary::default();

    for object in objects {
        if target.get(object).await?.is_some() {
            debug!(object = %object, "object already exists, skipping");
            summary.skipped += 1;
            continue;
        }

        target.create(object).await?;
        info!(object = %object, "created object on target cluster");
        summary.created += 1;
    }

    Ok(summary)
}
