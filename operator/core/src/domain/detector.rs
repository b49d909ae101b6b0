// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backend Detector
//!
//! Infers which backend owns the materialized volume purely from the shape of
//! the existing resources. Nothing else records which backend created the
//! claim, so this is the only source of truth for the immutability guard.

use crate::domain::resources::{ClaimSnapshot, VolumeSnapshot, VolumeSource};
use crate::domain::volume::BackendType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedBackend {
    /// No claim exists yet, nothing is committed
    Absent,
    Known(BackendType),
    /// A statically bound claim exists but its volume is gone
    MissingVolume,
    /// A statically bound claim points at a volume no backend manages
    Unrecognised { volume: String },
}

impl DetectedBackend {
    pub fn backend(&self) -> Option<BackendType> {
        match self {
            Self::Known(backend) => Some(*backend),
            _ => None,
        }
    }

    /// Name used in operator-facing messages
    pub fn label(&self) -> String {
        match self {
            Self::Absent => "none".to_string(),
            Self::Known(backend) => backend.as_str().to_string(),
            Self::MissingVolume => "static (volume missing)".to_string(),
            Self::Unrecognised { volume } => format!("unrecognised volume {volume}"),
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            Self::Known(backend) => backend.is_static(),
            Self::MissingVolume | Self::Unrecognised { .. } => true,
            Self::Absent => false,
        }
    }
}

impl std::fmt::Display for DetectedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Detect the backend from the claim and, for static claims, the well-known volume.
pub fn detect_backend(
    claim: Option<&ClaimSnapshot>,
    volume: Option<&VolumeSnapshot>,
) -> DetectedBackend {
    let Some(claim) = claim else {
        return DetectedBackend::Absent;
    };

    if !claim.is_statically_bound() {
        return DetectedBackend::Known(BackendType::StorageClass);
    }

    let Some(volume) = volume else {
        return DetectedBackend::MissingVolume;
    };

    match volume.source {
        VolumeSource::HostPath { .. } => DetectedBackend::Known(BackendType::HostPath),
        VolumeSource::Nfs { .. } => DetectedBackend::Known(BackendType::NativeNfs),
        VolumeSource::Other => DetectedBackend::Unrecognised {
            volume: volume.name.clone(),
        },
    }
}
