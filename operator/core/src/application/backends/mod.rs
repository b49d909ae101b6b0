// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backend Reconcilers
//!
//! One implementation per storage backend behind a common `ensure` /
//! `reconcile_existing` pair. `ensure` creates whatever is missing and then
//! reconciles what already existed; both must be idempotent.
//!
//! Reconcilers work from the snapshot observed at the start of the pass and
//! never read the cluster again themselves.

pub mod hostpath;
pub mod native_nfs;
pub mod static_volume;
pub mod storage_class;

pub use hostpath::HostPathBackend;
pub use native_nfs::NativeNfsBackend;
pub use storage_class::StorageClassBackend;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::capacity::Capacity;
use crate::domain::cluster::{ClusterError, ClusterResourceManager, MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use crate::domain::resources::ObservedVolume;
use crate::domain::volume::{BackendType, VolumeNames, VolumeSpec};
use crate::infrastructure::event_bus::EventBus;

/// Non-fatal findings of an `ensure` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// Storage-class resize that was rejected or failed
    pub resize_error: Option<String>,
    /// Static claim whose requested size differs from configuration
    pub static_size_mismatch: Option<String>,
}

/// Collaborators shared by every backend
#[derive(Clone)]
pub struct BackendContext {
    pub cluster: Arc<dyn ClusterResourceManager>,
    pub names: VolumeNames,
    pub event_bus: Arc<EventBus>,
}

#[async_trait]
pub trait BackendReconciler: Send + Sync {
    fn backend(&self) -> BackendType;

    /// Create missing resources, then reconcile the existing ones
    async fn ensure(
        &self,
        spec: &VolumeSpec,
        observed: &ObservedVolume,
    ) -> Result<EnsureOutcome, ClusterError>;

    /// Bring resources that already existed at the start of the pass in line
    async fn reconcile_existing(
        &self,
        spec: &VolumeSpec,
        observed: &ObservedVolume,
    ) -> Result<EnsureOutcome, ClusterError>;
}

/// Select the reconciler for the configured backend
pub fn reconciler_for(backend: BackendType, ctx: BackendContext) -> Box<dyn BackendReconciler> {
    match backend {
        BackendType::StorageClass => Box::new(StorageClassBackend::new(ctx)),
        BackendType::NativeNfs => Box::new(NativeNfsBackend::new(ctx)),
        BackendType::HostPath => Box::new(HostPathBackend::new(ctx)),
    }
}

pub(crate) fn count_mutation(kind: &'static str) {
    metrics::counter!("charmarr_storage_cluster_mutations_total", "kind" => kind).increment(1);
}

pub(crate) fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string())])
}

pub(crate) fn storage_request(capacity: &Capacity) -> BTreeMap<String, Quantity> {
    BTreeMap::from([("storage".to_string(), Quantity(capacity.as_str().to_string()))])
}

/// Claim for the shared volume.
///
/// Dynamic claims name their storage class; static claims carry an empty
/// class name and bind explicitly to `volume_name`.
pub(crate) fn build_claim(
    names: &VolumeNames,
    spec: &VolumeSpec,
    storage_class_name: &str,
    volume_name: Option<&str>,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(names.claim_name.clone()),
            namespace: Some(names.namespace.clone()),
            labels: Some(managed_labels()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: Some(storage_class_name.to_string()),
            access_modes: Some(vec![spec.access_mode.as_str().to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(storage_request(&spec.capacity)),
                ..Default::default()
            }),
            volume_name: volume_name.map(str::to_string),
            ..Default::default()
        }),
        status: None,
    }
}
