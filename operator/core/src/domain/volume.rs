// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::capacity::Capacity;

/// Claim shared by every media workload.
pub const SHARED_CLAIM_NAME: &str = "charmarr-shared-media";

/// Statically provisioned volume backing the shared claim (static backends only).
pub const SHARED_VOLUME_NAME: &str = "charmarr-shared-media-pv";

/// Where consumers mount the shared claim.
pub const DEFAULT_MOUNT_PATH: &str = "/data";

// ============================================================================
// Value Objects
// ============================================================================

/// Storage provisioning strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    /// Dynamic provisioning through a StorageClass
    #[serde(rename = "storage-class")]
    StorageClass,
    /// Static PV pointing at a remote NFS export
    #[serde(rename = "native-nfs")]
    NativeNfs,
    /// Static PV pointing at a directory on the node
    #[serde(rename = "hostpath")]
    HostPath,
}

impl BackendType {
    pub const ALL: [BackendType; 3] = [Self::StorageClass, Self::NativeNfs, Self::HostPath];

    /// Configuration spelling (`backend-type` option value)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StorageClass => "storage-class",
            Self::NativeNfs => "native-nfs",
            Self::HostPath => "hostpath",
        }
    }

    /// Static backends own an explicit PV; storage-class delegates to a provisioner.
    pub fn is_static(&self) -> bool {
        !matches!(self, Self::StorageClass)
    }

    /// Human label used in status messages ("Creating NFS PV", "Check hostPath backend").
    pub fn volume_label(&self) -> &'static str {
        match self {
            Self::StorageClass => "storage",
            Self::NativeNfs => "NFS",
            Self::HostPath => "hostPath",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backend type: {0}")]
pub struct UnknownBackendType(pub String);

impl FromStr for BackendType {
    type Err = UnknownBackendType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.as_str() == s)
            .ok_or_else(|| UnknownBackendType(s.to_string()))
    }
}

/// PV/PVC access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AccessMode {
    #[default]
    ReadWriteMany,
    ReadWriteOnce,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadWriteMany => "ReadWriteMany",
            Self::ReadWriteOnce => "ReadWriteOnce",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown access mode: {0}")]
pub struct UnknownAccessMode(pub String);

impl FromStr for AccessMode {
    type Err = UnknownAccessMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ReadWriteMany" => Ok(Self::ReadWriteMany),
            "ReadWriteOnce" => Ok(Self::ReadWriteOnce),
            other => Err(UnknownAccessMode(other.to_string())),
        }
    }
}

/// Backend-specific way of reaching the storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VolumeLocator {
    StorageClass { class_name: String },
    NativeNfs { server: String, path: String },
    HostPath { path: String },
}

impl VolumeLocator {
    pub fn backend(&self) -> BackendType {
        match self {
            Self::StorageClass { .. } => BackendType::StorageClass,
            Self::NativeNfs { .. } => BackendType::NativeNfs,
            Self::HostPath { .. } => BackendType::HostPath,
        }
    }
}

/// Numeric owner of the media files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerIds {
    pub puid: u32,
    pub pgid: u32,
}

impl std::fmt::Display for OwnerIds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.puid, self.pgid)
    }
}

/// Desired volume, derived from configuration on every pass and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub locator: VolumeLocator,
    pub capacity: Capacity,
    pub access_mode: AccessMode,
    pub owner: OwnerIds,
}

impl VolumeSpec {
    pub fn backend(&self) -> BackendType {
        self.locator.backend()
    }
}

/// Names and placement of the singleton PV/PVC pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeNames {
    pub claim_name: String,
    pub volume_name: String,
    pub namespace: String,
    pub mount_path: String,
}

impl VolumeNames {
    /// Well-known names inside the given deployment namespace
    pub fn for_namespace(namespace: impl Into<String>) -> Self {
        Self {
            claim_name: SHARED_CLAIM_NAME.to_string(),
            volume_name: SHARED_VOLUME_NAME.to_string(),
            namespace: namespace.into(),
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
        }
    }
}
