// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage-class backend: a single dynamically provisioned claim.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::cmp::Ordering;
use tracing::{info, warn};

use super::{build_claim, count_mutation, BackendContext, BackendReconciler, EnsureOutcome};
use crate::domain::cluster::ClusterError;
use crate::domain::events::VolumeEvent;
use crate::domain::resources::ObservedVolume;
use crate::domain::volume::{BackendType, VolumeLocator, VolumeSpec};

pub struct StorageClassBackend {
    ctx: BackendContext,
}

impl StorageClassBackend {
    pub fn new(ctx: BackendContext) -> Self {
        Self { ctx }
    }

    fn class_name(spec: &VolumeSpec) -> Result<&str, ClusterError> {
        match &spec.locator {
            VolumeLocator::StorageClass { class_name } => Ok(class_name),
            other => Err(ClusterError::Invalid(format!(
                "storage-class backend cannot provision a {} volume",
                other.backend()
            ))),
        }
    }

    fn reject_resize(&self, reason: String) -> EnsureOutcome {
        warn!("PVC {} resize failed: {}", self.ctx.names.claim_name, reason);
        self.ctx
            .event_bus
            .publish_volume_event(VolumeEvent::ClaimResizeRejected {
                claim_name: self.ctx.names.claim_name.clone(),
                reason: reason.clone(),
                rejected_at: Utc::now(),
            });
        EnsureOutcome {
            resize_error: Some(reason),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BackendReconciler for StorageClassBackend {
    fn backend(&self) -> BackendType {
        BackendType::StorageClass
    }

    async fn ensure(
        &self,
        spec: &VolumeSpec,
        observed: &ObservedVolume,
    ) -> Result<EnsureOutcome, ClusterError> {
        if observed.claim.is_some() {
            return self.reconcile_existing(spec, observed).await;
        }

        let class_name = Self::class_name(spec)?;
        let names = &self.ctx.names;
        info!(
            "Creating PVC {} with storage class {} ({})",
            names.claim_name, class_name, spec.capacity
        );

        let claim = build_claim(names, spec, class_name, None);
        self.ctx.cluster.apply_persistent_volume_claim(&claim).await?;
        count_mutation("apply_claim");

        self.ctx.event_bus.publish_volume_event(VolumeEvent::ClaimCreated {
            claim_name: names.claim_name.clone(),
            backend: BackendType::StorageClass,
            created_at: Utc::now(),
        });
        Ok(EnsureOutcome::default())
    }

    async fn reconcile_existing(
        &self,
        spec: &VolumeSpec,
        observed: &ObservedVolume,
    ) -> Result<EnsureOutcome, ClusterError> {
        let Some(claim) = observed.claim.as_ref() else {
            return Ok(EnsureOutcome::default());
        };
        let names = &self.ctx.names;
        let desired = &spec.capacity;

        if let Some(current) = claim.requested.as_ref() {
            if current.same_size(desired) {
                return Ok(EnsureOutcome::default());
            }
            if desired.compare(current) == Some(Ordering::Less) {
                return Ok(self.reject_resize(format!(
                    "cannot shrink PVC from {} to {}",
                    current, desired
                )));
            }
        }

        let from = claim
            .requested
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default();
        info!("Resizing PVC {} from '{}' to {}", names.claim_name, from, desired);

        let patch = json!({
            "spec": { "resources": { "requests": { "storage": desired.as_str() } } }
        });
        match self
            .ctx
            .cluster
            .patch_persistent_volume_claim(&names.claim_name, &names.namespace, &patch)
            .await
        {
            Ok(()) => {
                count_mutation("patch_claim");
                self.ctx.event_bus.publish_volume_event(VolumeEvent::ClaimResized {
                    claim_name: names.claim_name.clone(),
                    from,
                    to: desired.to_string(),
                    resized_at: Utc::now(),
                });
                Ok(EnsureOutcome::default())
            }
            Err(e) => Ok(self.reject_resize(e.to_string())),
        }
    }
}
