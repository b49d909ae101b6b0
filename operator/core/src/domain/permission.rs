// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Permission verification port.
//!
//! Before consumers are told the volume is ready, an out-of-band probe mounts
//! the claim and checks that the configured owner ids can create files on it.
//! The probe outlives a single reconcile pass: it is requested, then polled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::cluster::ClusterError;
use crate::domain::volume::OwnerIds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionCheckStatus {
    /// Probe requested or still running
    Pending,
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheckResult {
    pub status: PermissionCheckStatus,
    /// Diagnostic shown to the operator on failure
    pub message: String,
}

impl PermissionCheckResult {
    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            status: PermissionCheckStatus::Pending,
            message: message.into(),
        }
    }

    pub fn passed() -> Self {
        Self {
            status: PermissionCheckStatus::Passed,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: PermissionCheckStatus::Failed,
            message: message.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == PermissionCheckStatus::Passed
    }
}

/// One probe is identified by the (claim, uid, gid) triple; the mount path
/// only says where inside the probe pod the claim is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheckRequest {
    pub claim_name: String,
    pub owner: OwnerIds,
    pub mount_path: String,
}

#[derive(Debug, Error)]
pub enum PermissionCheckError {
    #[error("cluster error while managing permission check: {0}")]
    Cluster(#[from] ClusterError),

    #[error("permission probe could not be set up: {0}")]
    Probe(String),
}

/// Worker that runs the ownership probe
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Request (if needed) and poll the probe for this triple.
    ///
    /// Must be a no-op when an identical probe is already in flight and must
    /// supersede a probe created for different owner ids.
    async fn check_storage_permissions(
        &self,
        request: &PermissionCheckRequest,
    ) -> Result<PermissionCheckResult, PermissionCheckError>;

    /// Remove any probe for the claim. Absence is not an error.
    async fn delete_permission_check_job(&self, claim_name: &str)
        -> Result<(), PermissionCheckError>;
}
