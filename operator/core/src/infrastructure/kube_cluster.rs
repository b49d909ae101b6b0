// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kubernetes Resource Manager
//!
//! Implements `ClusterResourceManager` against a live API server with `kube`.
//!
//! - Regular applies use server-side apply under the `charmarr-storage` field
//!   manager without forcing, so a field owned by another manager surfaces as
//!   a conflict instead of being taken over.
//! - Forced PV applies replace the object unconditionally (no resourceVersion)
//!   and fall back to create when it has disappeared in the meantime. The
//!   replacement keeps finalizers, labels and annotations set by other writers.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

use crate::domain::cluster::{ClusterError, ClusterResourceManager, FIELD_MANAGER};

pub struct KubeResourceManager {
    client: Client,
}

impl KubeResourceManager {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster service account or the local kubeconfig
    pub async fn try_default() -> anyhow::Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn volumes(&self) -> Api<PersistentVolume> {
        Api::all(self.client.clone())
    }

    fn claims(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn map_error(kind: &'static str, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(ae) => match ae.code {
            404 => ClusterError::NotFound {
                kind,
                name: name.to_string(),
            },
            409 => ClusterError::Conflict(ae.message),
            403 => ClusterError::Forbidden(ae.message),
            400 | 422 => ClusterError::Invalid(ae.message),
            code => ClusterError::Transport(format!("{} ({})", ae.message, code)),
        },
        other => ClusterError::Transport(other.to_string()),
    }
}

/// Server-side apply is never forced; the forced PV path is a replace.
fn apply_params() -> PatchParams {
    PatchParams::apply(FIELD_MANAGER)
}

/// Desired PV carrying over the metadata other writers own on the live object
fn replacement_volume(
    desired: &PersistentVolume,
    existing: Option<&PersistentVolume>,
) -> PersistentVolume {
    let mut replacement = desired.clone();
    replacement.metadata.resource_version = None;

    let Some(existing) = existing else {
        return replacement;
    };

    if replacement.metadata.finalizers.is_none() {
        replacement.metadata.finalizers = existing.metadata.finalizers.clone();
    }
    for (current, live) in [
        (&mut replacement.metadata.labels, &existing.metadata.labels),
        (&mut replacement.metadata.annotations, &existing.metadata.annotations),
    ] {
        if let Some(live) = live {
            let mut merged = live.clone();
            merged.extend(current.take().unwrap_or_default());
            *current = Some(merged);
        }
    }
    replacement
}

async fn server_side_apply<K>(
    api: &Api<K>,
    kind: &'static str,
    object: &K,
) -> Result<(), ClusterError>
where
    K: Resource + Clone + Debug + Serialize + DeserializeOwned,
{
    let name = object.name_any();
    debug!("Applying {} {}", kind, name);
    api.patch(&name, &apply_params(), &Patch::Apply(object))
        .await
        .map(|_| ())
        .map_err(|e| map_error(kind, &name, e))
}

async fn delete_background<K>(api: &Api<K>, kind: &'static str, name: &str) -> Result<(), ClusterError>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    debug!("Deleting {} {}", kind, name);
    api.delete(name, &DeleteParams::background())
        .await
        .map(|_| ())
        .map_err(|e| map_error(kind, name, e))
}

#[async_trait]
impl ClusterResourceManager for KubeResourceManager {
    async fn get_persistent_volume(
        &self,
        name: &str,
    ) -> Result<Option<PersistentVolume>, ClusterError> {
        self.volumes()
            .get_opt(name)
            .await
            .map_err(|e| map_error("PersistentVolume", name, e))
    }

    async fn get_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<PersistentVolumeClaim>, ClusterError> {
        self.claims(namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_error("PersistentVolumeClaim", name, e))
    }

    async fn apply_persistent_volume(
        &self,
        volume: &PersistentVolume,
        force: bool,
    ) -> Result<(), ClusterError> {
        let api = self.volumes();
        if !force {
            return server_side_apply(&api, "PersistentVolume", volume).await;
        }

        let name = volume.name_any();
        let existing = api
            .get_opt(&name)
            .await
            .map_err(|e| map_error("PersistentVolume", &name, e))?;
        let replacement = replacement_volume(volume, existing.as_ref());

        if existing.is_none() {
            debug!("Creating PersistentVolume {}", name);
            return api
                .create(&PostParams::default(), &replacement)
                .await
                .map(|_| ())
                .map_err(|e| map_error("PersistentVolume", &name, e));
        }

        debug!("Replacing PersistentVolume {}", name);
        match api.replace(&name, &PostParams::default(), &replacement).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => api
                .create(&PostParams::default(), &replacement)
                .await
                .map(|_| ())
                .map_err(|e| map_error("PersistentVolume", &name, e)),
            Err(e) => Err(map_error("PersistentVolume", &name, e)),
        }
    }

    async fn apply_persistent_volume_claim(
        &self,
        claim: &PersistentVolumeClaim,
    ) -> Result<(), ClusterError> {
        let namespace = claim.namespace().unwrap_or_default();
        server_side_apply(&self.claims(&namespace), "PersistentVolumeClaim", claim).await
    }

    async fn patch_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
        patch: &serde_json::Value,
    ) -> Result<(), ClusterError> {
        self.claims(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map(|_| ())
            .map_err(|e| map_error("PersistentVolumeClaim", name, e))
    }

    async fn delete_persistent_volume(&self, name: &str) -> Result<(), ClusterError> {
        delete_background(&self.volumes(), "PersistentVolume", name).await
    }

    async fn delete_persistent_volume_claim(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<(), ClusterError> {
        delete_background(&self.claims(namespace), "PersistentVolumeClaim", name).await
    }

    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>, ClusterError> {
        self.jobs(namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_error("Job", name, e))
    }

    async fn apply_job(&self, job: &Job) -> Result<(), ClusterError> {
        let namespace = job.namespace().unwrap_or_default();
        server_side_apply(&self.jobs(&namespace), "Job", job).await
    }

    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        delete_background(&self.jobs(namespace), "Job", name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NFSVolumeSource, PersistentVolumeSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::core::ErrorResponse;
    use std::collections::BTreeMap;

    fn volume(server: &str, labels: &[(&str, &str)]) -> PersistentVolume {
        PersistentVolume {
            metadata: ObjectMeta {
                name: Some("charmarr-shared-media-pv".to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            spec: Some(PersistentVolumeSpec {
                nfs: Some(NFSVolumeSource {
                    server: server.to_string(),
                    path: "/exports/media".to_string(),
                    read_only: None,
                }),
                ..Default::default()
            }),
            status: None,
        }
    }

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("code {}", code),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn test_error_mapping() {
        assert!(map_error("Job", "probe", api_error(404)).is_not_found());
        assert!(matches!(map_error("Job", "probe", api_error(409)), ClusterError::Conflict(_)));
        assert!(matches!(map_error("Job", "probe", api_error(403)), ClusterError::Forbidden(_)));
        assert!(matches!(map_error("Job", "probe", api_error(422)), ClusterError::Invalid(_)));
        assert!(matches!(map_error("Job", "probe", api_error(500)), ClusterError::Transport(_)));
    }

    #[test]
    fn test_server_side_apply_does_not_take_ownership() {
        let params = apply_params();
        assert!(!params.force);
        assert_eq!(params.field_manager.as_deref(), Some(FIELD_MANAGER));
    }

    #[test]
    fn test_replacement_keeps_foreign_metadata() {
        let mut live = volume("1.2.3.4", &[("app.kubernetes.io/managed-by", "old"), ("team", "media")]);
        live.metadata.resource_version = Some("42".to_string());
        live.metadata.finalizers = Some(vec!["kubernetes.io/pv-protection".to_string()]);
        live.metadata.annotations = Some(BTreeMap::from([(
            "pv.kubernetes.io/bound-by-controller".to_string(),
            "yes".to_string(),
        )]));
        let desired = volume("5.6.7.8", &[("app.kubernetes.io/managed-by", "charmarr-storage")]);

        let replacement = replacement_volume(&desired, Some(&live));

        assert!(replacement.metadata.resource_version.is_none());
        assert_eq!(
            replacement.metadata.finalizers,
            Some(vec!["kubernetes.io/pv-protection".to_string()])
        );
        let labels = replacement.metadata.labels.unwrap();
        assert_eq!(labels["app.kubernetes.io/managed-by"], "charmarr-storage");
        assert_eq!(labels["team"], "media");
        assert_eq!(
            replacement.metadata.annotations.unwrap()["pv.kubernetes.io/bound-by-controller"],
            "yes"
        );
        assert_eq!(replacement.spec.unwrap().nfs.unwrap().server, "5.6.7.8");
    }

    #[test]
    fn test_replacement_without_live_volume_is_desired() {
        let desired = volume("5.6.7.8", &[]);
        let replacement = replacement_volume(&desired, None);
        assert_eq!(replacement, desired);
    }
}
