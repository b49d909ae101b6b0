// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cluster Resource Manager - Anti-Corruption Layer for the Kubernetes API
//!
//! Everything the reconciler does to the cluster goes through this trait, so
//! the reconcile logic can be driven against an in-memory cluster in tests
//! and the immutability guard can be verified by counting mutating calls.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use thiserror::Error;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "charmarr-storage";

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "charmarr-storage";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Cluster operations needed to manage the shared volume.
///
/// `get_*` return `Ok(None)` when the object does not exist. `apply_*` create
/// or update. `delete_*` return `NotFound` for missing objects; callers that
/// tolerate absence check [`ClusterError::is_not_found`].
#[async_trait]
pub trait ClusterResourceManager: Send + Sync {
    async fn get_persistent_volume(&self, name: &str)
        -> Result<Option<PersistentVolume>, ClusterError>;

    async fn get_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<PersistentVolumeClaim>, ClusterError>;

    /// Create or update a PV.
    ///
    /// With `force` the stored object is replaced wholesale, which drops any
    /// existing claim reference and lets a Released volume bind again.
    async fn apply_persistent_volume(
        &self,
        volume: &PersistentVolume,
        force: bool,
    ) -> Result<(), ClusterError>;

    async fn apply_persistent_volume_claim(
        &self,
        claim: &PersistentVolumeClaim,
    ) -> Result<(), ClusterError>;

    /// Merge patch against an existing claim
    async fn patch_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ClusterError>;

    async fn delete_persistent_volume(&self, name: &str) -> Result<(), ClusterError>;

    async fn delete_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<(), ClusterError>;

    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>, ClusterError>;

    async fn apply_job(&self, job: &Job) -> Result<(), ClusterError>;

    /// Delete with background propagation so the probe pod goes with it
    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClusterError>;
}

/// Map `NotFound` to success for idempotent deletes.
pub fn tolerate_not_found(result: Result<(), ClusterError>) -> Result<(), ClusterError> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}
