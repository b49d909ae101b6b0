// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Job-based Permission Checker
//!
//! Runs a short-lived Job that mounts the shared claim as the configured
//! owner ids, creates a file, checks its ownership and removes it.
//!
//! The Job's annotations record which (uid, gid, mount path) it was created
//! for. A Job whose annotations no longer match the request is deleted and a
//! fresh one is created on the following pass. A failed Job is reported once
//! and deleted the same way, so the check reruns after the share is fixed.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{Job, JobSpec, JobStatus};
use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaimVolumeSource, PodSecurityContext, PodSpec, PodTemplateSpec,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::cluster::{
    tolerate_not_found, ClusterResourceManager, MANAGED_BY_LABEL, MANAGED_BY_VALUE,
};
use crate::domain::permission::{
    PermissionCheckError, PermissionCheckRequest, PermissionCheckResult, PermissionCheckStatus,
    PermissionChecker,
};

pub const PUID_ANNOTATION: &str = "charmarr.io/puid";
pub const PGID_ANNOTATION: &str = "charmarr.io/pgid";
pub const MOUNT_PATH_ANNOTATION: &str = "charmarr.io/mount-path";
pub const CLAIM_LABEL: &str = "charmarr.io/claim";

const PROBE_FILE: &str = ".charmarr-permission-check";

pub fn permission_job_name(claim_name: &str) -> String {
    format!("{}-permission-check", claim_name)
}

pub struct JobPermissionChecker {
    cluster: Arc<dyn ClusterResourceManager>,
    namespace: String,
    image: String,
}

impl JobPermissionChecker {
    pub fn new(
        cluster: Arc<dyn ClusterResourceManager>,
        namespace: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            image: image.into(),
        }
    }

    fn build_job(&self, request: &PermissionCheckRequest) -> Job {
        let name = permission_job_name(&request.claim_name);
        let labels = BTreeMap::from([
            (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
            (CLAIM_LABEL.to_string(), request.claim_name.clone()),
        ]);
        let annotations = BTreeMap::from([
            (PUID_ANNOTATION.to_string(), request.owner.puid.to_string()),
            (PGID_ANNOTATION.to_string(), request.owner.pgid.to_string()),
            (MOUNT_PATH_ANNOTATION.to_string(), request.mount_path.clone()),
        ]);

        let probe = probe_script(request);

        Job {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels.clone()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(JobSpec {
                backoff_limit: Some(0),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        restart_policy: Some("Never".to_string()),
                        security_context: Some(PodSecurityContext {
                            run_as_user: Some(i64::from(request.owner.puid)),
                            run_as_group: Some(i64::from(request.owner.pgid)),
                            ..Default::default()
                        }),
                        containers: vec![Container {
                            name: "permission-check".to_string(),
                            image: Some(self.image.clone()),
                            command: Some(vec!["sh".to_string(), "-c".to_string(), probe]),
                            volume_mounts: Some(vec![VolumeMount {
                                name: "media".to_string(),
                                mount_path: request.mount_path.clone(),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        volumes: Some(vec![Volume {
                            name: "media".to_string(),
                            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                                claim_name: request.claim_name.clone(),
                                read_only: None,
                            }),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }
    }
}

fn probe_script(request: &PermissionCheckRequest) -> String {
    let file = format!("{}/{}", request.mount_path.trim_end_matches('/'), PROBE_FILE);
    format!(
        "set -e; touch '{file}'; owner=$(stat -c '%u:%g' '{file}'); rm -f '{file}'; \
         [ \"$owner\" = '{owner}' ] || {{ echo \"owner is $owner, expected {owner}\"; exit 1; }}",
        file = file,
        owner = request.owner,
    )
}

/// True when the Job was created for exactly this request
fn matches_request(job: &Job, request: &PermissionCheckRequest) -> bool {
    let Some(annotations) = job.metadata.annotations.as_ref() else {
        return false;
    };
    let get = |key: &str| annotations.get(key).map(String::as_str);

    get(PUID_ANNOTATION) == Some(request.owner.puid.to_string().as_str())
        && get(PGID_ANNOTATION) == Some(request.owner.pgid.to_string().as_str())
        && get(MOUNT_PATH_ANNOTATION) == Some(request.mount_path.as_str())
}

fn failure_condition(status: &JobStatus) -> Option<String> {
    status
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == "Failed" && c.status == "True")
        .map(|c| {
            c.message
                .clone()
                .or_else(|| c.reason.clone())
                .unwrap_or_else(|| "Failed".to_string())
        })
}

fn evaluate(job: &Job, request: &PermissionCheckRequest) -> PermissionCheckResult {
    let Some(status) = job.status.as_ref() else {
        return PermissionCheckResult::pending("Permission check job has not started");
    };

    if status.succeeded.unwrap_or(0) > 0 {
        return PermissionCheckResult::passed();
    }

    let condition = failure_condition(status);
    if status.failed.unwrap_or(0) > 0 || condition.is_some() {
        let mut message = format!(
            "Storage permission check failed: {} cannot write to {}",
            request.owner, request.mount_path
        );
        if let Some(condition) = condition {
            message.push_str(&format!(" ({})", condition));
        }
        return PermissionCheckResult::failed(message);
    }

    PermissionCheckResult::pending("Permission check job running")
}

#[async_trait]
impl PermissionChecker for JobPermissionChecker {
    async fn check_storage_permissions(
        &self,
        request: &PermissionCheckRequest,
    ) -> Result<PermissionCheckResult, PermissionCheckError> {
        let name = permission_job_name(&request.claim_name);

        match self.cluster.get_job(&name, &self.namespace).await? {
            None => {
                info!(
                    "Creating permission check job {} for {} at {}",
                    name, request.owner, request.mount_path
                );
                self.cluster.apply_job(&self.build_job(request)).await?;
                Ok(PermissionCheckResult::pending("Permission check job created"))
            }
            Some(job) if !matches_request(&job, request) => {
                warn!(
                    "Permission check job {} is stale (requested {}), deleting",
                    name, request.owner
                );
                tolerate_not_found(self.cluster.delete_job(&name, &self.namespace).await)?;
                Ok(PermissionCheckResult::pending("Permission check job superseded"))
            }
            Some(job) => {
                let result = evaluate(&job, request);
                debug!("Permission check job {}: {:?}", name, result.status);
                if result.status == PermissionCheckStatus::Failed {
                    info!("Deleting failed permission check job {} so it reruns", name);
                    tolerate_not_found(self.cluster.delete_job(&name, &self.namespace).await)?;
                }
                Ok(result)
            }
        }
    }

    async fn delete_permission_check_job(
        &self,
        claim_name: &str,
    ) -> Result<(), PermissionCheckError> {
        let name = permission_job_name(claim_name);
        tolerate_not_found(self.cluster.delete_job(&name, &self.namespace).await)?;
        Ok(())
    }
}
