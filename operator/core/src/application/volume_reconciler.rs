// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Reconciler Application Service
//!
//! Runs one level-triggered pass over the shared media volume:
//! observe → detect → guard → backend ensure → permission check →
//! status → descriptor. Every failure is folded into the returned status;
//! a pass never errors out.
//!
//! Also owns the opt-in teardown flow used when the whole deployment is
//! removed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::backends::{count_mutation, reconciler_for, BackendContext};
use crate::application::permission_verifier::PermissionVerifier;
use crate::domain::cluster::{tolerate_not_found, ClusterError, ClusterResourceManager};
use crate::domain::config::StorageConfig;
use crate::domain::descriptor::{DescriptorPublisher, MediaStorageDescriptor};
use crate::domain::detector::{detect_backend, DetectedBackend};
use crate::domain::events::VolumeEvent;
use crate::domain::guard::check_backend_change;
use crate::domain::permission::{
    PermissionCheckRequest, PermissionCheckResult, PermissionCheckStatus, PermissionChecker,
};
use crate::domain::resources::{ClaimSnapshot, ObservedVolume, VolumeSnapshot};
use crate::domain::status::{aggregate_status, StatusFacts, UnitStatus, STANDBY_MESSAGE};
use crate::domain::volume::{BackendType, VolumeNames};
use crate::infrastructure::event_bus::EventBus;

/// Whether this replica manages storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leadership {
    Leader,
    Standby,
}

/// What is being removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalScope {
    /// The whole deployment is going away
    Deployment,
    /// Only this replica (scale down); shared storage stays
    Replica,
}

#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub status: UnitStatus,
    pub detected: Option<DetectedBackend>,
    pub permission: Option<PermissionCheckResult>,
    /// Descriptor published by this pass, if any
    pub published: Option<MediaStorageDescriptor>,
}

impl ReconcileReport {
    fn status_only(status: UnitStatus) -> Self {
        Self {
            status,
            detected: None,
            permission: None,
            published: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub performed: bool,
    /// Deleted objects, in deletion order (`Kind/name`)
    pub deleted: Vec<String>,
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait VolumeReconciler: Send + Sync {
    /// Run one reconcile pass against the given configuration
    async fn reconcile(&self, config: &StorageConfig, leadership: Leadership) -> ReconcileReport;

    /// Delete the shared volume when cleanup-on-remove is set and the whole
    /// deployment is being removed by the leader
    async fn teardown(
        &self,
        config: &StorageConfig,
        scope: RemovalScope,
        leadership: Leadership,
    ) -> Result<TeardownReport>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardVolumeReconciler {
    cluster: Arc<dyn ClusterResourceManager>,
    verifier: PermissionVerifier,
    publisher: Arc<dyn DescriptorPublisher>,
    event_bus: Arc<EventBus>,
    names: VolumeNames,
}

impl StandardVolumeReconciler {
    pub fn new(
        cluster: Arc<dyn ClusterResourceManager>,
        checker: Arc<dyn PermissionChecker>,
        publisher: Arc<dyn DescriptorPublisher>,
        event_bus: Arc<EventBus>,
        names: VolumeNames,
    ) -> Self {
        Self {
            cluster,
            verifier: PermissionVerifier::new(checker),
            publisher,
            event_bus,
            names,
        }
    }

    pub fn names(&self) -> &VolumeNames {
        &self.names
    }

    /// Read the claim and, when it can matter, the well-known PV.
    ///
    /// The PV is needed to classify a statically bound claim and to report on
    /// a static configured backend.
    async fn observe(&self, configured: BackendType) -> Result<ObservedVolume, ClusterError> {
        let claim = self
            .cluster
            .get_persistent_volume_claim(&self.names.claim_name, &self.names.namespace)
            .await?
            .as_ref()
            .map(ClaimSnapshot::from);

        let needs_volume = configured.is_static()
            || claim.as_ref().map_or(false, ClaimSnapshot::is_statically_bound);

        let volume = if needs_volume {
            self.cluster
                .get_persistent_volume(&self.names.volume_name)
                .await?
                .as_ref()
                .map(VolumeSnapshot::from)
        } else {
            None
        };

        Ok(ObservedVolume { claim, volume })
    }

    async fn retract_descriptor(&self) {
        match self.publisher.retract().await {
            Ok(true) => self
                .event_bus
                .publish_volume_event(VolumeEvent::DescriptorRetracted {
                    retracted_at: Utc::now(),
                }),
            Ok(false) => debug!("No storage descriptor to retract"),
            Err(e) => error!("Failed to retract storage descriptor: {}", e),
        }
    }

    async fn run_pass(&self, config: &StorageConfig) -> ReconcileReport {
        let backend = match config.backend_type() {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Storage configuration invalid: {}", e);
                return ReconcileReport::status_only(aggregate_status(&StatusFacts {
                    backend_config: Some(e),
                    ..Default::default()
                }));
            }
        };

        let mut facts = StatusFacts {
            backend: Some(backend),
            ..Default::default()
        };

        let observed = match self.observe(backend).await {
            Ok(observed) => observed,
            Err(e) => {
                warn!("Failed to read {} volume state: {}", backend, e);
                facts.reconcile_error = Some(e.to_string());
                return ReconcileReport::status_only(aggregate_status(&facts));
            }
        };

        let detected = detect_backend(observed.claim.as_ref(), observed.volume.as_ref());
        debug!("Detected backend: {}, configured: {}", detected, backend);

        let mut report = ReconcileReport {
            status: UnitStatus::Maintenance(String::new()),
            detected: Some(detected.clone()),
            permission: None,
            published: None,
        };

        if let Err(e) = check_backend_change(&detected, backend) {
            warn!("{}", e);
            self.event_bus
                .publish_volume_event(VolumeEvent::BackendChangeBlocked {
                    existing: e.existing.clone(),
                    requested: e.requested,
                    blocked_at: Utc::now(),
                });
            facts.immutability = Some(e);
            report.status = aggregate_status(&facts);
            return report;
        }

        let spec = match config.volume_spec(backend) {
            Ok(spec) => spec,
            Err(e) => {
                warn!("Storage configuration invalid: {}", e);
                facts.field_config = Some(e);
                report.status = aggregate_status(&facts);
                return report;
            }
        };

        facts.volume_phase = observed.volume.as_ref().map(|v| v.phase);
        facts.claim_phase = observed.claim.as_ref().map(|c| c.phase);

        let reconciler = reconciler_for(
            backend,
            BackendContext {
                cluster: self.cluster.clone(),
                names: self.names.clone(),
                event_bus: self.event_bus.clone(),
            },
        );
        match reconciler.ensure(&spec, &observed).await {
            Ok(outcome) => facts.resize_error = outcome.resize_error,
            Err(e) => {
                warn!("Failed to reconcile {} volume: {}", backend, e);
                facts.reconcile_error = Some(e.to_string());
            }
        }

        if observed.claim.is_some() {
            let request = PermissionCheckRequest {
                claim_name: self.names.claim_name.clone(),
                owner: spec.owner,
                mount_path: self.names.mount_path.clone(),
            };
            let result = self.verifier.verify(&request).await;
            self.event_bus
                .publish_volume_event(VolumeEvent::PermissionChecked {
                    claim_name: request.claim_name.clone(),
                    status: result.status,
                    message: result.message.clone(),
                    checked_at: Utc::now(),
                });

            if result.status == PermissionCheckStatus::Failed {
                warn!("Storage permission check failed: {}", result.message);
                self.retract_descriptor().await;
            }
            facts.permission = Some(result.clone());
            report.permission = Some(result);
        }

        report.status = aggregate_status(&facts);

        if matches!(report.status, UnitStatus::Active(_)) {
            let descriptor = MediaStorageDescriptor::new(&self.names, spec.owner);
            match self.publisher.publish(&descriptor).await {
                Ok(()) => {
                    self.event_bus
                        .publish_volume_event(VolumeEvent::DescriptorPublished {
                            pvc_name: descriptor.pvc_name.clone(),
                            published_at: Utc::now(),
                        });
                    report.published = Some(descriptor);
                }
                Err(e) => {
                    error!("Failed to publish storage descriptor: {}", e);
                    report.status =
                        UnitStatus::Waiting(format!("Failed to publish storage descriptor: {}", e));
                }
            }
        }

        report
    }
}

#[async_trait]
impl VolumeReconciler for StandardVolumeReconciler {
    async fn reconcile(&self, config: &StorageConfig, leadership: Leadership) -> ReconcileReport {
        let report = match leadership {
            Leadership::Standby => {
                debug!("Not the leader, skipping storage reconcile");
                ReconcileReport::status_only(UnitStatus::Active(STANDBY_MESSAGE.to_string()))
            }
            Leadership::Leader => self.run_pass(config).await,
        };

        info!("Storage reconcile finished: {}", report.status);
        metrics::counter!(
            "charmarr_storage_reconcile_passes_total",
            "status" => report.status.name()
        )
        .increment(1);
        report
    }

    async fn teardown(
        &self,
        config: &StorageConfig,
        scope: RemovalScope,
        leadership: Leadership,
    ) -> Result<TeardownReport> {
        if !config.cleanup_on_remove {
            info!("cleanup-on-remove is disabled, keeping shared storage");
            return Ok(TeardownReport::default());
        }
        if scope == RemovalScope::Replica {
            info!("Only a replica is being removed, keeping shared storage");
            return Ok(TeardownReport::default());
        }
        if leadership == Leadership::Standby {
            debug!("Not the leader, leaving teardown to the leader");
            return Ok(TeardownReport::default());
        }

        let names = &self.names;
        let claim = self
            .cluster
            .get_persistent_volume_claim(&names.claim_name, &names.namespace)
            .await
            .context("Failed to read shared claim before teardown")?
            .as_ref()
            .map(ClaimSnapshot::from);
        let delete_volume = claim.as_ref().map_or(false, ClaimSnapshot::is_statically_bound)
            || config.backend_type().map_or(false, |b| b.is_static());

        info!("Tearing down shared storage {}", names.claim_name);
        let mut report = TeardownReport {
            performed: true,
            deleted: Vec::new(),
        };

        self.publisher
            .retract()
            .await
            .context("Failed to retract storage descriptor")?;

        self.verifier
            .cancel(&names.claim_name)
            .await
            .context("Failed to delete permission check job")?;
        count_mutation("delete_job");
        report.deleted.push(format!("PermissionCheck/{}", names.claim_name));

        info!("Deleting PVC {}", names.claim_name);
        tolerate_not_found(
            self.cluster
                .delete_persistent_volume_claim(&names.claim_name, &names.namespace)
                .await,
        )
        .context("Failed to delete shared claim")?;
        count_mutation("delete_claim");
        report
            .deleted
            .push(format!("PersistentVolumeClaim/{}", names.claim_name));

        if delete_volume {
            info!("Deleting PV {}", names.volume_name);
            tolerate_not_found(self.cluster.delete_persistent_volume(&names.volume_name).await)
                .context("Failed to delete shared volume")?;
            count_mutation("delete_volume");
            report
                .deleted
                .push(format!("PersistentVolume/{}", names.volume_name));
        }

        self.event_bus.publish_volume_event(VolumeEvent::VolumeTornDown {
            claim_name: names.claim_name.clone(),
            volume_name: delete_volume.then(|| names.volume_name.clone()),
            torn_down_at: Utc::now(),
        });
        Ok(report)
    }
}
