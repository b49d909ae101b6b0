// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end reconcile passes against the in-memory cluster.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    HostPathVolumeSource, LocalVolumeSource, NFSVolumeSource, ObjectReference, PersistentVolume,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeSpec,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

use charmarr_storage_core::application::backends::{reconciler_for, BackendContext};
use charmarr_storage_core::application::{
    Leadership, RemovalScope, StandardVolumeReconciler, VolumeReconciler,
};
use charmarr_storage_core::domain::cluster::ClusterError;
use charmarr_storage_core::domain::config::StorageConfig;
use charmarr_storage_core::domain::descriptor::{DescriptorPublisher, MediaStorageDescriptor};
use charmarr_storage_core::domain::events::VolumeEvent;
use charmarr_storage_core::domain::permission::{
    PermissionCheckError, PermissionCheckRequest, PermissionCheckResult, PermissionChecker,
};
use charmarr_storage_core::domain::resources::{ClaimSnapshot, ObservedVolume, VolumeSnapshot};
use charmarr_storage_core::domain::status::UnitStatus;
use charmarr_storage_core::domain::volume::{BackendType, VolumeNames};
use charmarr_storage_core::infrastructure::{
    ClusterOperation, DomainEvent, EventBus, EventReceiver, InMemoryClusterResourceManager,
    InMemoryDescriptorPublisher, JobPermissionChecker,
};

const NS: &str = "media";
const CLAIM: &str = "charmarr-shared-media";
const VOLUME: &str = "charmarr-shared-media-pv";
const JOB: &str = "charmarr-shared-media-permission-check";

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    cluster: Arc<InMemoryClusterResourceManager>,
    publisher: Arc<InMemoryDescriptorPublisher>,
    event_bus: Arc<EventBus>,
    reconciler: StandardVolumeReconciler,
}

fn harness() -> Harness {
    let cluster = Arc::new(InMemoryClusterResourceManager::new());
    let checker = Arc::new(JobPermissionChecker::new(cluster.clone(), NS, "busybox:1.36"));
    harness_with(cluster, checker)
}

fn harness_with(
    cluster: Arc<InMemoryClusterResourceManager>,
    checker: Arc<dyn PermissionChecker>,
) -> Harness {
    let publisher = Arc::new(InMemoryDescriptorPublisher::new());
    let event_bus = Arc::new(EventBus::new(64));
    let reconciler = StandardVolumeReconciler::new(
        cluster.clone(),
        checker,
        publisher.clone(),
        event_bus.clone(),
        VolumeNames::for_namespace(NS),
    );
    Harness {
        cluster,
        publisher,
        event_bus,
        reconciler,
    }
}

/// Checker that always answers with the same result
struct FixedChecker(PermissionCheckResult);

#[async_trait]
impl PermissionChecker for FixedChecker {
    async fn check_storage_permissions(
        &self,
        _request: &PermissionCheckRequest,
    ) -> Result<PermissionCheckResult, PermissionCheckError> {
        Ok(self.0.clone())
    }

    async fn delete_permission_check_job(&self, _claim_name: &str) -> Result<(), PermissionCheckError> {
        Ok(())
    }
}

fn config(backend: BackendType) -> StorageConfig {
    StorageConfig {
        backend_type: Some(backend.as_str().to_string()),
        storage_class: Some("local-path".to_string()),
        nfs_server: Some("5.6.7.8".to_string()),
        nfs_path: Some("/exports/media".to_string()),
        hostpath: Some("/srv/media".to_string()),
        ..Default::default()
    }
}

fn storage(size: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([("storage".to_string(), Quantity(size.to_string()))])
}

fn seed_claim(cluster: &InMemoryClusterResourceManager, storage_class: &str, size: &str, phase: &str) {
    let volume_name = storage_class.is_empty().then(|| VOLUME.to_string());
    cluster.insert_claim(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(CLAIM.to_string()),
            namespace: Some(NS.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: Some(storage_class.to_string()),
            volume_name,
            resources: Some(VolumeResourceRequirements {
                requests: Some(storage(size)),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    });
    cluster.set_claim_phase(CLAIM, NS, phase);
}

fn seed_nfs_volume(cluster: &InMemoryClusterResourceManager, server: &str, size: &str, phase: &str) {
    cluster.insert_volume(PersistentVolume {
        metadata: ObjectMeta {
            name: Some(VOLUME.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            capacity: Some(storage(size)),
            access_modes: Some(vec!["ReadWriteMany".to_string()]),
            persistent_volume_reclaim_policy: Some("Retain".to_string()),
            nfs: Some(NFSVolumeSource {
                server: server.to_string(),
                path: "/exports/media".to_string(),
                read_only: None,
            }),
            claim_ref: Some(ObjectReference {
                name: Some(CLAIM.to_string()),
                namespace: Some(NS.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    });
    cluster.set_volume_phase(VOLUME, phase);
}

fn seed_hostpath_volume(cluster: &InMemoryClusterResourceManager, size: &str, phase: &str) {
    cluster.insert_volume(PersistentVolume {
        metadata: ObjectMeta {
            name: Some(VOLUME.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            capacity: Some(storage(size)),
            host_path: Some(HostPathVolumeSource {
                path: "/srv/media".to_string(),
                type_: Some("Directory".to_string()),
            }),
            ..Default::default()
        }),
        status: None,
    });
    cluster.set_volume_phase(VOLUME, phase);
}

/// Materialize a healthy pair created by `backend`
fn seed_backend(cluster: &InMemoryClusterResourceManager, backend: BackendType) {
    match backend {
        BackendType::StorageClass => seed_claim(cluster, "local-path", "100Gi", "Bound"),
        BackendType::NativeNfs => {
            seed_nfs_volume(cluster, "5.6.7.8", "100Gi", "Bound");
            seed_claim(cluster, "", "100Gi", "Bound");
        }
        BackendType::HostPath => {
            seed_hostpath_volume(cluster, "100Gi", "Bound");
            seed_claim(cluster, "", "100Gi", "Bound");
        }
    }
}

fn retractions(events: &mut EventReceiver) -> usize {
    events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, DomainEvent::Volume(VolumeEvent::DescriptorRetracted { .. })))
        .count()
}

fn count(cluster: &InMemoryClusterResourceManager, operation: ClusterOperation) -> usize {
    cluster
        .operations()
        .into_iter()
        .filter(|op| *op == operation)
        .count()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn storage_class_first_pass_creates_claim() {
    let h = harness();
    let report = h
        .reconciler
        .reconcile(&config(BackendType::StorageClass), Leadership::Leader)
        .await;

    assert_eq!(report.status, UnitStatus::Maintenance("Creating PVC".to_string()));
    assert_eq!(
        h.cluster.mutating_calls().iter().map(|c| c.operation).collect::<Vec<_>>(),
        vec![ClusterOperation::ApplyClaim]
    );
    let claim = h.cluster.claim(CLAIM, NS).unwrap();
    assert_eq!(claim.spec.unwrap().storage_class_name.as_deref(), Some("local-path"));
    assert!(h.publisher.current().is_none());
}

#[tokio::test]
async fn static_first_pass_reports_volume_creation() {
    let h = harness();
    let report = h
        .reconciler
        .reconcile(&config(BackendType::HostPath), Leadership::Leader)
        .await;

    assert_eq!(report.status, UnitStatus::Maintenance("Creating hostPath PV".to_string()));
    assert!(h.cluster.volume(VOLUME).is_some());
    assert!(h.cluster.claim(CLAIM, NS).is_some());
}

#[tokio::test]
async fn nfs_locator_drift_reapplies_volume() {
    let h = harness();
    seed_nfs_volume(&h.cluster, "1.2.3.4", "100Gi", "Bound");
    seed_claim(&h.cluster, "", "100Gi", "Bound");

    h.reconciler
        .reconcile(&config(BackendType::NativeNfs), Leadership::Leader)
        .await;

    assert_eq!(count(&h.cluster, ClusterOperation::ReplaceVolume), 1);
    assert_eq!(count(&h.cluster, ClusterOperation::ApplyVolume), 0);
    let spec = h.cluster.volume(VOLUME).unwrap().spec.unwrap();
    assert_eq!(spec.nfs.unwrap().server, "5.6.7.8");
    assert!(spec.claim_ref.is_none());
}

#[tokio::test]
async fn backend_change_is_blocked_without_mutation() {
    let h = harness();
    seed_claim(&h.cluster, "local-path", "100Gi", "Bound");

    let report = h
        .reconciler
        .reconcile(&config(BackendType::HostPath), Leadership::Leader)
        .await;

    assert!(h.cluster.mutating_calls().is_empty());
    assert_eq!(
        report.status,
        UnitStatus::Blocked(
            "Cannot change backend from 'storage-class' to 'hostpath'. \
             Redeploy with required backend (WARNING: may cause data loss)."
                .to_string()
        )
    );
}

#[tokio::test]
async fn failed_permission_check_blocks_and_retracts() {
    let cluster = Arc::new(InMemoryClusterResourceManager::new());
    let h = harness_with(
        cluster.clone(),
        Arc::new(FixedChecker(PermissionCheckResult::failed("not writable"))),
    );
    seed_claim(&cluster, "local-path", "100Gi", "Bound");
    h.publisher
        .publish(&MediaStorageDescriptor {
            pvc_name: CLAIM.to_string(),
            mount_path: "/data".to_string(),
            puid: 1000,
            pgid: 1000,
        })
        .await
        .unwrap();

    let report = h
        .reconciler
        .reconcile(&config(BackendType::StorageClass), Leadership::Leader)
        .await;

    assert_eq!(report.status, UnitStatus::Blocked("not writable".to_string()));
    assert!(h.publisher.current().is_none());
    assert_eq!(h.publisher.retract_count(), 1);
    assert!(report.published.is_none());
}

#[tokio::test]
async fn teardown_without_opt_in_deletes_nothing() {
    let h = harness();
    seed_backend(&h.cluster, BackendType::NativeNfs);

    let report = h
        .reconciler
        .teardown(&config(BackendType::NativeNfs), RemovalScope::Deployment, Leadership::Leader)
        .await
        .unwrap();

    assert!(!report.performed);
    assert!(h.cluster.calls().is_empty());
    assert!(h.cluster.claim(CLAIM, NS).is_some());
}

// ============================================================================
// Properties
// ============================================================================

fn observe(cluster: &InMemoryClusterResourceManager) -> ObservedVolume {
    ObservedVolume {
        claim: cluster.claim(CLAIM, NS).as_ref().map(ClaimSnapshot::from),
        volume: cluster.volume(VOLUME).as_ref().map(VolumeSnapshot::from),
    }
}

#[tokio::test]
async fn ensure_is_idempotent_for_every_backend() {
    for backend in BackendType::ALL {
        let cluster = Arc::new(InMemoryClusterResourceManager::new());
        let reconciler = reconciler_for(
            backend,
            BackendContext {
                cluster: cluster.clone(),
                names: VolumeNames::for_namespace(NS),
                event_bus: Arc::new(EventBus::new(16)),
            },
        );
        let spec = config(backend).validate().unwrap();

        reconciler.ensure(&spec, &observe(&cluster)).await.unwrap();
        assert!(!cluster.mutating_calls().is_empty(), "{} created nothing", backend);

        cluster.clear_calls();
        reconciler.ensure(&spec, &observe(&cluster)).await.unwrap();
        assert!(
            cluster.mutating_calls().is_empty(),
            "{} mutated on second ensure: {:?}",
            backend,
            cluster.mutating_calls()
        );
    }
}

#[tokio::test]
async fn steady_state_pass_issues_no_mutations() {
    for backend in BackendType::ALL {
        let h = harness();
        let cfg = config(backend);
        h.reconciler.reconcile(&cfg, Leadership::Leader).await;
        // second pass sees the claim and starts the permission probe
        h.reconciler.reconcile(&cfg, Leadership::Leader).await;

        h.cluster.clear_calls();
        h.reconciler.reconcile(&cfg, Leadership::Leader).await;
        assert!(h.cluster.mutating_calls().is_empty(), "{} not idempotent", backend);
    }
}

#[tokio::test]
async fn every_backend_change_is_blocked() {
    for detected in BackendType::ALL {
        for configured in BackendType::ALL {
            if detected == configured {
                continue;
            }
            let h = harness();
            seed_backend(&h.cluster, detected);

            let report = h.reconciler.reconcile(&config(configured), Leadership::Leader).await;

            assert!(
                h.cluster.mutating_calls().is_empty(),
                "{} -> {} mutated the cluster",
                detected,
                configured
            );
            let expected = format!(
                "Cannot change backend from '{}' to '{}'. Redeploy with required backend \
                 (WARNING: may cause data loss).",
                detected, configured
            );
            assert_eq!(report.status, UnitStatus::Blocked(expected));
        }
    }
}

#[tokio::test]
async fn static_claim_with_missing_volume() {
    let h = harness();
    seed_claim(&h.cluster, "", "100Gi", "Bound");
    let report = h
        .reconciler
        .reconcile(&config(BackendType::StorageClass), Leadership::Leader)
        .await;
    assert!(report.status.message().contains("'static (volume missing)' to 'storage-class'"));
    assert!(h.cluster.mutating_calls().is_empty());

    let report = h
        .reconciler
        .reconcile(&config(BackendType::HostPath), Leadership::Leader)
        .await;
    assert_eq!(report.status, UnitStatus::Maintenance("Creating hostPath PV".to_string()));
    assert!(h.cluster.volume(VOLUME).unwrap().spec.unwrap().host_path.is_some());
}

fn seed_local_volume(cluster: &InMemoryClusterResourceManager) {
    cluster.insert_volume(PersistentVolume {
        metadata: ObjectMeta {
            name: Some(VOLUME.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            capacity: Some(storage("100Gi")),
            local: Some(LocalVolumeSource {
                path: "/mnt/disks/media".to_string(),
                fs_type: None,
            }),
            claim_ref: Some(ObjectReference {
                name: Some(CLAIM.to_string()),
                namespace: Some(NS.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    });
    cluster.set_volume_phase(VOLUME, "Bound");
}

#[tokio::test]
async fn claim_on_unrecognised_volume_is_never_touched() {
    for backend in BackendType::ALL {
        let h = harness();
        seed_local_volume(&h.cluster);
        seed_claim(&h.cluster, "", "100Gi", "Bound");

        let report = h.reconciler.reconcile(&config(backend), Leadership::Leader).await;

        assert!(h.cluster.mutating_calls().is_empty(), "{backend}");
        assert!(report.status.is_blocked());
        assert!(report.status.message().starts_with(&format!(
            "Cannot change backend from 'unrecognised volume {VOLUME}' to '{backend}'"
        )));
        let spec = h.cluster.volume(VOLUME).unwrap().spec.unwrap();
        assert!(spec.local.is_some());
        assert!(spec.nfs.is_none());
    }
}

#[tokio::test]
async fn released_volume_converges() {
    let h = harness();
    seed_nfs_volume(&h.cluster, "5.6.7.8", "100Gi", "Released");
    seed_claim(&h.cluster, "", "100Gi", "Bound");

    h.reconciler
        .reconcile(&config(BackendType::NativeNfs), Leadership::Leader)
        .await;
    assert_eq!(count(&h.cluster, ClusterOperation::ReplaceVolume), 1);
    assert!(h.cluster.volume(VOLUME).unwrap().spec.unwrap().claim_ref.is_none());

    h.cluster.clear_calls();
    h.reconciler
        .reconcile(&config(BackendType::NativeNfs), Leadership::Leader)
        .await;
    assert_eq!(count(&h.cluster, ClusterOperation::ReplaceVolume), 0);
}

#[tokio::test]
async fn storage_class_growth_patches_claim_once() {
    let h = harness();
    seed_claim(&h.cluster, "local-path", "100Gi", "Bound");
    let mut cfg = config(BackendType::StorageClass);
    cfg.size = "200Gi".to_string();

    h.reconciler.reconcile(&cfg, Leadership::Leader).await;

    let patches = h.cluster.claim_patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(
        patches[0].1["spec"]["resources"]["requests"]["storage"],
        serde_json::json!("200Gi")
    );
}

#[tokio::test]
async fn storage_class_shrink_is_reported_not_patched() {
    let h = harness();
    seed_claim(&h.cluster, "local-path", "200Gi", "Bound");
    let mut cfg = config(BackendType::StorageClass);
    cfg.size = "100Gi".to_string();

    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    h.cluster.finish_job(JOB, NS, true);
    let report = h.reconciler.reconcile(&cfg, Leadership::Leader).await;

    assert!(h.cluster.claim_patches().is_empty());
    assert_eq!(
        report.status,
        UnitStatus::Active("PVC resize failed: cannot shrink PVC from 200Gi to 100Gi".to_string())
    );
}

#[tokio::test]
async fn static_growth_reapplies_volume_only() {
    let h = harness();
    seed_backend(&h.cluster, BackendType::NativeNfs);
    let mut cfg = config(BackendType::NativeNfs);
    cfg.size = "200Gi".to_string();

    h.reconciler.reconcile(&cfg, Leadership::Leader).await;

    assert!(h.cluster.claim_patches().is_empty());
    assert_eq!(count(&h.cluster, ClusterOperation::PatchClaim), 0);
    assert_eq!(count(&h.cluster, ClusterOperation::ReplaceVolume), 1);
    let capacity = h.cluster.volume(VOLUME).unwrap().spec.unwrap().capacity.unwrap();
    assert_eq!(capacity["storage"].0, "200Gi");
}

#[tokio::test]
async fn failed_volume_outranks_pending_permission() {
    let h = harness();
    seed_nfs_volume(&h.cluster, "5.6.7.8", "100Gi", "Failed");
    seed_claim(&h.cluster, "", "100Gi", "Bound");

    let report = h
        .reconciler
        .reconcile(&config(BackendType::NativeNfs), Leadership::Leader)
        .await;

    assert_eq!(
        report.permission.unwrap().status,
        charmarr_storage_core::domain::permission::PermissionCheckStatus::Pending
    );
    assert_eq!(
        report.status,
        UnitStatus::Blocked("NFS PV failed. Check storage backend".to_string())
    );
}

#[tokio::test]
async fn verified_volume_is_published() {
    let h = harness();
    let cfg = config(BackendType::StorageClass);

    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    h.cluster.set_claim_phase(CLAIM, NS, "Bound");

    let report = h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert_eq!(
        report.status,
        UnitStatus::Maintenance("Checking storage permissions".to_string())
    );
    assert!(h.publisher.current().is_none());

    h.cluster.finish_job(JOB, NS, true);
    let report = h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert_eq!(report.status, UnitStatus::Active(String::new()));

    let descriptor = h.publisher.current().unwrap();
    assert_eq!(descriptor.pvc_name, CLAIM);
    assert_eq!(descriptor.mount_path, "/data");
    assert_eq!((descriptor.puid, descriptor.pgid), (1000, 1000));
}

#[tokio::test]
async fn failed_permission_check_recovers_after_rerun() {
    let h = harness();
    seed_backend(&h.cluster, BackendType::StorageClass);
    let cfg = config(BackendType::StorageClass);

    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    h.cluster.finish_job(JOB, NS, false);

    let report = h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert!(report.status.is_blocked());
    assert!(report.status.message().starts_with("Storage permission check failed"));
    assert!(h.cluster.job(JOB, NS).is_none());

    let report = h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert_eq!(
        report.status,
        UnitStatus::Maintenance("Checking storage permissions".to_string())
    );

    h.cluster.finish_job(JOB, NS, true);
    let report = h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert_eq!(report.status, UnitStatus::Active(String::new()));
    assert!(h.publisher.current().is_some());
}

#[tokio::test]
async fn retraction_is_announced_only_when_something_was_published() {
    let cluster = Arc::new(InMemoryClusterResourceManager::new());
    let h = harness_with(
        cluster.clone(),
        Arc::new(FixedChecker(PermissionCheckResult::failed("not writable"))),
    );
    seed_claim(&cluster, "local-path", "100Gi", "Bound");
    let mut events = h.event_bus.subscribe();
    let cfg = config(BackendType::StorageClass);

    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert_eq!(retractions(&mut events), 0);

    h.publisher
        .publish(&MediaStorageDescriptor {
            pvc_name: CLAIM.to_string(),
            mount_path: "/data".to_string(),
            puid: 1000,
            pgid: 1000,
        })
        .await
        .unwrap();
    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert_eq!(retractions(&mut events), 1);
}

#[tokio::test]
async fn lost_claim_is_blocked() {
    let h = harness();
    seed_backend(&h.cluster, BackendType::HostPath);
    h.cluster.set_claim_phase(CLAIM, NS, "Lost");
    h.reconciler
        .reconcile(&config(BackendType::HostPath), Leadership::Leader)
        .await;
    h.cluster.finish_job(JOB, NS, true);

    let report = h
        .reconciler
        .reconcile(&config(BackendType::HostPath), Leadership::Leader)
        .await;
    assert_eq!(
        report.status,
        UnitStatus::Blocked("PVC lost. Check hostPath backend".to_string())
    );
}

#[tokio::test]
async fn changed_owner_ids_supersede_probe() {
    let h = harness();
    seed_backend(&h.cluster, BackendType::StorageClass);
    let mut cfg = config(BackendType::StorageClass);

    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    h.cluster.finish_job(JOB, NS, true);
    cfg.puid = 2000;

    let report = h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert_eq!(
        report.status,
        UnitStatus::Maintenance("Checking storage permissions".to_string())
    );
    assert!(h.cluster.job(JOB, NS).is_none());

    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    let job = h.cluster.job(JOB, NS).unwrap();
    assert_eq!(job.metadata.annotations.unwrap()["charmarr.io/puid"], "2000");
}

#[tokio::test]
async fn transient_failure_is_waiting() {
    let h = harness();
    h.cluster.fail_operation(
        ClusterOperation::ApplyClaim,
        ClusterError::Transport("connection refused".to_string()),
    );

    let report = h
        .reconciler
        .reconcile(&config(BackendType::StorageClass), Leadership::Leader)
        .await;
    assert_eq!(
        report.status,
        UnitStatus::Waiting(
            "Failed to reconcile storage-class volume: transport error: connection refused"
                .to_string()
        )
    );

    h.cluster.clear_failures();
    let report = h
        .reconciler
        .reconcile(&config(BackendType::StorageClass), Leadership::Leader)
        .await;
    assert_eq!(report.status, UnitStatus::Maintenance("Creating PVC".to_string()));
}

#[tokio::test]
async fn configuration_errors_block_before_any_call() {
    let h = harness();
    let report = h
        .reconciler
        .reconcile(&StorageConfig::default(), Leadership::Leader)
        .await;
    assert_eq!(report.status, UnitStatus::Blocked("backend-type not configured".to_string()));
    assert!(h.cluster.calls().is_empty());

    let mut cfg = config(BackendType::NativeNfs);
    cfg.nfs_path = None;
    let report = h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    assert_eq!(report.status, UnitStatus::Blocked("nfs-path not configured".to_string()));
    assert!(h.cluster.mutating_calls().is_empty());
}

#[tokio::test]
async fn standby_replica_does_nothing() {
    let h = harness();
    let report = h
        .reconciler
        .reconcile(&config(BackendType::StorageClass), Leadership::Standby)
        .await;
    assert_eq!(
        report.status,
        UnitStatus::Active("Standby (leader manages storage)".to_string())
    );
    assert!(h.cluster.calls().is_empty());
}

#[tokio::test]
async fn teardown_deletes_in_order() {
    let h = harness();
    seed_backend(&h.cluster, BackendType::HostPath);
    let mut cfg = config(BackendType::HostPath);
    cfg.cleanup_on_remove = true;
    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    h.reconciler.reconcile(&cfg, Leadership::Leader).await;
    h.cluster.clear_calls();

    let report = h
        .reconciler
        .teardown(&cfg, RemovalScope::Deployment, Leadership::Leader)
        .await
        .unwrap();

    assert!(report.performed);
    assert_eq!(
        h.cluster.mutating_calls().iter().map(|c| c.operation).collect::<Vec<_>>(),
        vec![
            ClusterOperation::DeleteJob,
            ClusterOperation::DeleteClaim,
            ClusterOperation::DeleteVolume,
        ]
    );
    assert!(h.publisher.retract_count() >= 1);
    assert!(h.cluster.volume(VOLUME).is_none());
}

#[tokio::test]
async fn storage_class_teardown_keeps_provisioned_volume() {
    let h = harness();
    seed_backend(&h.cluster, BackendType::StorageClass);
    let mut cfg = config(BackendType::StorageClass);
    cfg.cleanup_on_remove = true;

    h.reconciler
        .teardown(&cfg, RemovalScope::Deployment, Leadership::Leader)
        .await
        .unwrap();

    assert_eq!(count(&h.cluster, ClusterOperation::DeleteVolume), 0);
    assert_eq!(count(&h.cluster, ClusterOperation::DeleteClaim), 1);
}

#[tokio::test]
async fn replica_removal_keeps_storage() {
    let h = harness();
    seed_backend(&h.cluster, BackendType::NativeNfs);
    let mut cfg = config(BackendType::NativeNfs);
    cfg.cleanup_on_remove = true;

    let report = h
        .reconciler
        .teardown(&cfg, RemovalScope::Replica, Leadership::Leader)
        .await
        .unwrap();

    assert!(!report.performed);
    assert!(h.cluster.calls().is_empty());
}
