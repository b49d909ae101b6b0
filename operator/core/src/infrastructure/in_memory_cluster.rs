// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Memory Cluster Resource Manager
//!
//! A fake API server for tests and dry runs. Stores PV, PVC and Job objects,
//! records every call in order, and lets tests inject failures and move
//! objects through their lifecycle phases the way the platform would.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job, JobCondition, JobStatus};
use k8s_openapi::api::core::v1::{
    PersistentVolume, PersistentVolumeClaim, PersistentVolumeClaimStatus, PersistentVolumeStatus,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use crate::domain::cluster::{ClusterError, ClusterResourceManager};

/// Cluster operation kinds, used for the call log and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterOperation {
    GetVolume,
    GetClaim,
    ApplyVolume,
    ReplaceVolume,
    ApplyClaim,
    PatchClaim,
    DeleteVolume,
    DeleteClaim,
    GetJob,
    ApplyJob,
    DeleteJob,
}

impl ClusterOperation {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::GetVolume | Self::GetClaim | Self::GetJob)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCall {
    pub operation: ClusterOperation,
    pub name: String,
}

type Key = (String, String);

#[derive(Default)]
struct ClusterState {
    volumes: BTreeMap<String, PersistentVolume>,
    claims: BTreeMap<Key, PersistentVolumeClaim>,
    jobs: BTreeMap<Key, Job>,
    calls: Vec<ClusterCall>,
    patches: Vec<(String, serde_json::Value)>,
    failures: HashMap<ClusterOperation, ClusterError>,
}

#[derive(Default)]
pub struct InMemoryClusterResourceManager {
    state: Mutex<ClusterState>,
}

fn key(name: &str, namespace: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn not_found(kind: &'static str, name: &str) -> ClusterError {
    ClusterError::NotFound {
        kind,
        name: name.to_string(),
    }
}

impl InMemoryClusterResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Call log
    // ========================================================================

    fn record(&self, operation: ClusterOperation, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.calls.push(ClusterCall {
            operation,
            name: name.to_string(),
        });
        match state.failures.get(&operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.state.lock().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<ClusterCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation.is_mutating())
            .collect()
    }

    pub fn operations(&self) -> Vec<ClusterOperation> {
        self.calls().into_iter().map(|call| call.operation).collect()
    }

    pub fn clear_calls(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.patches.clear();
    }

    /// Merge patches sent to claims, in order
    pub fn claim_patches(&self) -> Vec<(String, serde_json::Value)> {
        self.state.lock().patches.clone()
    }

    /// Fail every call of this kind until cleared
    pub fn fail_operation(&self, operation: ClusterOperation, error: ClusterError) {
        self.state.lock().failures.insert(operation, error);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    // ========================================================================
    // Object access and platform simulation
    // ========================================================================

    pub fn volume(&self, name: &str) -> Option<PersistentVolume> {
        self.state.lock().volumes.get(name).cloned()
    }

    pub fn claim(&self, name: &str, namespace: &str) -> Option<PersistentVolumeClaim> {
        self.state.lock().claims.get(&key(name, namespace)).cloned()
    }

    pub fn job(&self, name: &str, namespace: &str) -> Option<Job> {
        self.state.lock().jobs.get(&key(name, namespace)).cloned()
    }

    pub fn insert_volume(&self, volume: PersistentVolume) {
        let name = volume.metadata.name.clone().unwrap_or_default();
        self.state.lock().volumes.insert(name, volume);
    }

    pub fn insert_claim(&self, claim: PersistentVolumeClaim) {
        let k = key(
            claim.metadata.name.as_deref().unwrap_or_default(),
            claim.metadata.namespace.as_deref().unwrap_or_default(),
        );
        self.state.lock().claims.insert(k, claim);
    }

    pub fn set_volume_phase(&self, name: &str, phase: &str) {
        if let Some(volume) = self.state.lock().volumes.get_mut(name) {
            volume.status = Some(PersistentVolumeStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            });
        }
    }

    pub fn set_claim_phase(&self, name: &str, namespace: &str, phase: &str) {
        if let Some(claim) = self.state.lock().claims.get_mut(&key(name, namespace)) {
            claim.status = Some(PersistentVolumeClaimStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            });
        }
    }

    /// Mark a job as finished, successfully or with a `Failed` condition
    pub fn finish_job(&self, name: &str, namespace: &str, succeeded: bool) {
        if let Some(job) = self.state.lock().jobs.get_mut(&key(name, namespace)) {
            job.status = Some(if succeeded {
                JobStatus {
                    succeeded: Some(1),
                    ..Default::default()
                }
            } else {
                JobStatus {
                    failed: Some(1),
                    conditions: Some(vec![JobCondition {
                        type_: "Failed".to_string(),
                        status: "True".to_string(),
                        reason: Some("BackoffLimitExceeded".to_string()),
                        message: Some("Job has reached the specified backoff limit".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }
            });
        }
    }
}

// RFC 7386 merge patch
fn merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    let serde_json::Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = serde_json::Value::Object(serde_json::Map::new());
    }
    if let serde_json::Value::Object(target_map) = target {
        for (k, v) in patch_map {
            if v.is_null() {
                target_map.remove(k);
            } else {
                merge_patch(target_map.entry(k.clone()).or_insert(serde_json::Value::Null), v);
            }
        }
    }
}

#[async_trait]
impl ClusterResourceManager for InMemoryClusterResourceManager {
    async fn get_persistent_volume(
        &self,
        name: &str,
    ) -> Result<Option<PersistentVolume>, ClusterError> {
        self.record(ClusterOperation::GetVolume, name)?;
        Ok(self.volume(name))
    }

    async fn get_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<PersistentVolumeClaim>, ClusterError> {
        self.record(ClusterOperation::GetClaim, name)?;
        Ok(self.claim(name, namespace))
    }

    async fn apply_persistent_volume(
        &self,
        volume: &PersistentVolume,
        force: bool,
    ) -> Result<(), ClusterError> {
        let name = volume.metadata.name.clone().unwrap_or_default();
        let operation = if force {
            ClusterOperation::ReplaceVolume
        } else {
            ClusterOperation::ApplyVolume
        };
        self.record(operation, &name)?;

        let mut state = self.state.lock();
        let mut stored = volume.clone();
        match state.volumes.get(&name) {
            // Replacing drops the claim reference; the volume becomes bindable again
            Some(_) if force => {
                stored.status = Some(PersistentVolumeStatus {
                    phase: Some("Available".to_string()),
                    ..Default::default()
                });
            }
            Some(existing) => {
                stored.status = existing.status.clone();
                if let (Some(spec), Some(existing_spec)) = (stored.spec.as_mut(), existing.spec.as_ref()) {
                    if spec.claim_ref.is_none() {
                        spec.claim_ref = existing_spec.claim_ref.clone();
                    }
                }
            }
            None => {
                stored.status = Some(PersistentVolumeStatus {
                    phase: Some("Available".to_string()),
                    ..Default::default()
                });
            }
        }
        state.volumes.insert(name, stored);
        Ok(())
    }

    async fn apply_persistent_volume_claim(
        &self,
        claim: &PersistentVolumeClaim,
    ) -> Result<(), ClusterError> {
        let name = claim.metadata.name.clone().unwrap_or_default();
        let namespace = claim.metadata.namespace.clone().unwrap_or_default();
        self.record(ClusterOperation::ApplyClaim, &name)?;

        let mut state = self.state.lock();
        let k = key(&name, &namespace);
        let mut stored = claim.clone();
        stored.status = match state.claims.get(&k) {
            Some(existing) => existing.status.clone(),
            None => Some(PersistentVolumeClaimStatus {
                phase: Some("Pending".to_string()),
                ..Default::default()
            }),
        };
        state.claims.insert(k, stored);
        Ok(())
    }

    async fn patch_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ClusterError> {
        self.record(ClusterOperation::PatchClaim, name)?;

        let mut state = self.state.lock();
        state.patches.push((name.to_string(), patch.clone()));
        let k = key(name, namespace);
        let claim = state
            .claims
            .get(&k)
            .ok_or_else(|| not_found("PersistentVolumeClaim", name))?;

        let mut value = serde_json::to_value(claim)
            .map_err(|e| ClusterError::Invalid(e.to_string()))?;
        merge_patch(&mut value, patch);
        let patched: PersistentVolumeClaim = serde_json::from_value(value)
            .map_err(|e| ClusterError::Invalid(e.to_string()))?;
        state.claims.insert(k, patched);
        Ok(())
    }

    async fn delete_persistent_volume(&self, name: &str) -> Result<(), ClusterError> {
        self.record(ClusterOperation::DeleteVolume, name)?;
        self.state
            .lock()
            .volumes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found("PersistentVolume", name))
    }

    async fn delete_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<(), ClusterError> {
        self.record(ClusterOperation::DeleteClaim, name)?;
        self.state
            .lock()
            .claims
            .remove(&key(name, namespace))
            .map(|_| ())
            .ok_or_else(|| not_found("PersistentVolumeClaim", name))
    }

    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>, ClusterError> {
        self.record(ClusterOperation::GetJob, name)?;
        Ok(self.job(name, namespace))
    }

    async fn apply_job(&self, job: &Job) -> Result<(), ClusterError> {
        let name = job.metadata.name.clone().unwrap_or_default();
        let namespace = job.metadata.namespace.clone().unwrap_or_default();
        self.record(ClusterOperation::ApplyJob, &name)?;
        self.state.lock().jobs.insert(key(&name, &namespace), job.clone());
        Ok(())
    }

    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        self.record(ClusterOperation::DeleteJob, name)?;
        self.state
            .lock()
            .jobs
            .remove(&key(name, namespace))
            .map(|_| ())
            .ok_or_else(|| not_found("Job", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    fn claim(name: &str) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("media".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_new_claim_starts_pending() {
        let cluster = InMemoryClusterResourceManager::new();
        cluster.apply_persistent_volume_claim(&claim("data")).await.unwrap();

        let stored = cluster.claim("data", "media").unwrap();
        assert_eq!(stored.status.unwrap().phase.as_deref(), Some("Pending"));
        assert_eq!(cluster.mutating_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_patch_updates_requests() {
        let cluster = InMemoryClusterResourceManager::new();
        cluster.insert_claim(claim("data"));

        let patch = json!({"spec": {"resources": {"requests": {"storage": "200Gi"}}}});
        cluster
            .patch_persistent_volume_claim("data", "media", &patch)
            .await
            .unwrap();

        let stored = cluster.claim("data", "media").unwrap();
        let requests = stored.spec.unwrap().resources.unwrap().requests.unwrap();
        assert_eq!(requests["storage"].0, "200Gi");
        assert_eq!(cluster.claim_patches().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let cluster = InMemoryClusterResourceManager::new();
        cluster.fail_operation(
            ClusterOperation::GetClaim,
            ClusterError::Transport("timeout".to_string()),
        );

        let result = cluster.get_persistent_volume_claim("data", "media").await;
        assert!(matches!(result, Err(ClusterError::Transport(_))));
        assert_eq!(cluster.operations(), vec![ClusterOperation::GetClaim]);
        assert!(cluster.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let cluster = InMemoryClusterResourceManager::new();
        let err = cluster.delete_job("probe", "media").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_merge_patch_null_removes_key() {
        let mut target = json!({"a": 1, "b": {"c": 2}});
        merge_patch(&mut target, &json!({"a": null, "b": {"d": 3}}));
        assert_eq!(target, json!({"b": {"c": 2, "d": 3}}));
    }
}
