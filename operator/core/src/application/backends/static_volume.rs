// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Static Volume Backend
//!
//! Shared machinery for backends that own an explicit PV: the PV itself, a
//! claim bound to it by name, and the drift comparator that decides when an
//! existing PV has to be re-applied.
//!
//! Re-applies are forced and clear the claim reference. No other writer
//! manages these PVs, so overwriting a concurrent change is acceptable.
//! Static claims are never patched; a size mismatch is only reported.

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::marker::PhantomData;
use tracing::info;

use super::{
    build_claim, count_mutation, managed_labels, storage_request, BackendContext,
    BackendReconciler, EnsureOutcome,
};
use crate::domain::capacity::Capacity;
use crate::domain::cluster::ClusterError;
use crate::domain::events::VolumeEvent;
use crate::domain::resources::{ObservedVolume, VolumePhase, VolumeSnapshot, VolumeSource};
use crate::domain::volume::{BackendType, VolumeLocator, VolumeSpec};

/// How a static backend points a PV at its storage
pub trait StaticVolumeSource: Send + Sync + 'static {
    const BACKEND: BackendType;

    /// Desired source for the locator, `None` if the locator belongs to another backend
    fn desired_source(locator: &VolumeLocator) -> Option<VolumeSource>;

    /// Set the backend-specific fields of the PV spec
    fn fill_spec(source: &VolumeSource, spec: &mut PersistentVolumeSpec);
}

/// Why an existing PV must be re-applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftReason {
    Released,
    LocatorChanged { from: VolumeSource, to: VolumeSource },
    CapacityChanged { from: Capacity, to: Capacity },
}

impl std::fmt::Display for DriftReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Released => write!(f, "volume released"),
            Self::LocatorChanged { from, to } => {
                write!(f, "locator changed ({} -> {})", describe(from), describe(to))
            }
            Self::CapacityChanged { from, to } => write!(f, "capacity changed ({} -> {})", from, to),
        }
    }
}

fn describe(source: &VolumeSource) -> String {
    match source {
        VolumeSource::Nfs { server, path } => format!("{}:{}", server, path),
        VolumeSource::HostPath { path } => path.clone(),
        VolumeSource::Other => "unmanaged".to_string(),
    }
}

/// Compare an existing PV with the desired source and capacity.
///
/// An empty result means the PV is left alone. A PV with no recorded capacity
/// is not considered drifted on size.
pub fn volume_drift(
    existing: &VolumeSnapshot,
    desired_source: &VolumeSource,
    desired_capacity: &Capacity,
) -> Vec<DriftReason> {
    let mut reasons = Vec::new();

    if existing.phase == VolumePhase::Released {
        reasons.push(DriftReason::Released);
    }

    if &existing.source != desired_source {
        reasons.push(DriftReason::LocatorChanged {
            from: existing.source.clone(),
            to: desired_source.clone(),
        });
    }

    if let Some(current) = existing.capacity.as_ref() {
        if !current.same_size(desired_capacity) {
            reasons.push(DriftReason::CapacityChanged {
                from: current.clone(),
                to: desired_capacity.clone(),
            });
        }
    }

    reasons
}

pub struct StaticBackend<S: StaticVolumeSource> {
    ctx: BackendContext,
    _source: PhantomData<S>,
}

impl<S: StaticVolumeSource> StaticBackend<S> {
    pub fn new(ctx: BackendContext) -> Self {
        Self {
            ctx,
            _source: PhantomData,
        }
    }

    fn desired_source(spec: &VolumeSpec) -> Result<VolumeSource, ClusterError> {
        S::desired_source(&spec.locator).ok_or_else(|| {
            ClusterError::Invalid(format!(
                "{} backend cannot provision a {} volume",
                S::BACKEND,
                spec.locator.backend()
            ))
        })
    }

    /// Full PV for the spec, with no claim reference
    pub fn build_volume(&self, spec: &VolumeSpec, source: &VolumeSource) -> PersistentVolume {
        let mut pv_spec = PersistentVolumeSpec {
            capacity: Some(storage_request(&spec.capacity)),
            access_modes: Some(vec![spec.access_mode.as_str().to_string()]),
            persistent_volume_reclaim_policy: Some("Retain".to_string()),
            claim_ref: None,
            ..Default::default()
        };
        S::fill_spec(source, &mut pv_spec);

        PersistentVolume {
            metadata: ObjectMeta {
                name: Some(self.ctx.names.volume_name.clone()),
                labels: Some(managed_labels()),
                ..Default::default()
            },
            spec: Some(pv_spec),
            status: None,
        }
    }
}

#[async_trait]
impl<S: StaticVolumeSource> BackendReconciler for StaticBackend<S> {
    fn backend(&self) -> BackendType {
        S::BACKEND
    }

    async fn ensure(
        &self,
        spec: &VolumeSpec,
        observed: &ObservedVolume,
    ) -> Result<EnsureOutcome, ClusterError> {
        let names = &self.ctx.names;
        let source = Self::desired_source(spec)?;

        if observed.volume.is_none() {
            info!(
                "Creating {} PV {} ({}, {})",
                S::BACKEND.volume_label(),
                names.volume_name,
                describe(&source),
                spec.capacity
            );
            self.ctx
                .cluster
                .apply_persistent_volume(&self.build_volume(spec, &source), false)
                .await?;
            count_mutation("apply_volume");
            self.ctx.event_bus.publish_volume_event(VolumeEvent::VolumeCreated {
                volume_name: names.volume_name.clone(),
                backend: S::BACKEND,
                created_at: Utc::now(),
            });
        }

        if observed.claim.is_none() {
            info!("Creating PVC {} bound to PV {}", names.claim_name, names.volume_name);
            let claim = build_claim(names, spec, "", Some(&names.volume_name));
            self.ctx.cluster.apply_persistent_volume_claim(&claim).await?;
            count_mutation("apply_claim");
            self.ctx.event_bus.publish_volume_event(VolumeEvent::ClaimCreated {
                claim_name: names.claim_name.clone(),
                backend: S::BACKEND,
                created_at: Utc::now(),
            });
        }

        self.reconcile_existing(spec, observed).await
    }

    async fn reconcile_existing(
        &self,
        spec: &VolumeSpec,
        observed: &ObservedVolume,
    ) -> Result<EnsureOutcome, ClusterError> {
        let names = &self.ctx.names;
        let mut outcome = EnsureOutcome::default();

        if let Some(existing) = observed.volume.as_ref() {
            let source = Self::desired_source(spec)?;
            let reasons = volume_drift(existing, &source, &spec.capacity);
            if !reasons.is_empty() {
                let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
                info!("Updating PV {} due to {}", names.volume_name, reasons.join(", "));

                self.ctx
                    .cluster
                    .apply_persistent_volume(&self.build_volume(spec, &source), true)
                    .await?;
                count_mutation("replace_volume");
                self.ctx.event_bus.publish_volume_event(VolumeEvent::VolumeReapplied {
                    volume_name: names.volume_name.clone(),
                    reasons,
                    reapplied_at: Utc::now(),
                });
            }
        }

        if let Some(claim) = observed.claim.as_ref() {
            if let Some(requested) = claim.requested.as_ref() {
                if !requested.same_size(&spec.capacity) {
                    info!(
                        "PVC {} shows {} but config is {}. For static PVs this is cosmetic, \
                         actual capacity is determined by the underlying storage",
                        names.claim_name, requested, spec.capacity
                    );
                    self.ctx.event_bus.publish_volume_event(VolumeEvent::StaticSizeMismatch {
                        claim_name: names.claim_name.clone(),
                        requested: requested.to_string(),
                        configured: spec.capacity.to_string(),
                        detected_at: Utc::now(),
                    });
                    outcome.static_size_mismatch = Some(format!(
                        "PVC {} requests {}, configured {}",
                        names.claim_name, requested, spec.capacity
                    ));
                }
            }
        }

        Ok(outcome)
    }
}
