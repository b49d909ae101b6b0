// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Normalized snapshots of the PV/PVC pair.
//!
//! Detection, drift comparison and status aggregation work on these plain
//! structs instead of the raw `k8s-openapi` objects, so every decision can be
//! made (and tested) without a cluster.

use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use serde::{Deserialize, Serialize};

use crate::domain::capacity::Capacity;

/// PersistentVolume lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumePhase {
    Pending,
    Available,
    Bound,
    Released,
    Failed,
}

impl VolumePhase {
    /// Missing or unrecognised phases are treated as Pending.
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Available") => Self::Available,
            Some("Bound") => Self::Bound,
            Some("Released") => Self::Released,
            Some("Failed") => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// PersistentVolumeClaim lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimPhase {
    Pending,
    Bound,
    Lost,
}

impl ClaimPhase {
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Bound") => Self::Bound,
            Some("Lost") => Self::Lost,
            _ => Self::Pending,
        }
    }
}

/// The storage a PV points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeSource {
    Nfs { server: String, path: String },
    HostPath { path: String },
    /// Some other volume plugin (CSI, local, ...)
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSnapshot {
    pub name: String,
    pub source: VolumeSource,
    pub capacity: Option<Capacity>,
    pub phase: VolumePhase,
    /// Name of the claim currently holding the volume, if any
    pub claim_ref: Option<String>,
}

impl From<&PersistentVolume> for VolumeSnapshot {
    fn from(pv: &PersistentVolume) -> Self {
        let spec = pv.spec.as_ref();

        let source = match spec {
            Some(spec) if spec.host_path.is_some() => VolumeSource::HostPath {
                path: spec
                    .host_path
                    .as_ref()
                    .map(|hp| hp.path.clone())
                    .unwrap_or_default(),
            },
            Some(spec) if spec.nfs.is_some() => {
                let nfs = spec.nfs.as_ref();
                VolumeSource::Nfs {
                    server: nfs.map(|n| n.server.clone()).unwrap_or_default(),
                    path: nfs.map(|n| n.path.clone()).unwrap_or_default(),
                }
            }
            _ => VolumeSource::Other,
        };

        let capacity = spec
            .and_then(|s| s.capacity.as_ref())
            .and_then(|c| c.get("storage"))
            .map(|q| Capacity::from_cluster(q.0.clone()));

        let phase = VolumePhase::from_status(
            pv.status.as_ref().and_then(|s| s.phase.as_deref()),
        );

        let claim_ref = spec
            .and_then(|s| s.claim_ref.as_ref())
            .and_then(|r| r.name.clone());

        Self {
            name: pv.metadata.name.clone().unwrap_or_default(),
            source,
            capacity,
            phase,
            claim_ref,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSnapshot {
    pub name: String,
    pub storage_class_name: Option<String>,
    pub volume_name: Option<String>,
    pub requested: Option<Capacity>,
    pub phase: ClaimPhase,
}

impl ClaimSnapshot {
    /// A claim with no storage class name (or an empty one) binds to an explicit PV.
    pub fn is_statically_bound(&self) -> bool {
        self.storage_class_name.as_deref().map_or(true, str::is_empty)
    }
}

impl From<&PersistentVolumeClaim> for ClaimSnapshot {
    fn from(pvc: &PersistentVolumeClaim) -> Self {
        let spec = pvc.spec.as_ref();

        let requested = spec
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("storage"))
            .map(|q| Capacity::from_cluster(q.0.clone()));

        Self {
            name: pvc.metadata.name.clone().unwrap_or_default(),
            storage_class_name: spec.and_then(|s| s.storage_class_name.clone()),
            volume_name: spec.and_then(|s| s.volume_name.clone()),
            requested,
            phase: ClaimPhase::from_status(
                pvc.status.as_ref().and_then(|s| s.phase.as_deref()),
            ),
        }
    }
}

/// What existed in the cluster at the start of a reconcile pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedVolume {
    pub claim: Option<ClaimSnapshot>,
    pub volume: Option<VolumeSnapshot>,
}
