// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Native NFS backend: a static PV pointing at a remote NFS export.

use k8s_openapi::api::core::v1::{NFSVolumeSource, PersistentVolumeSpec};

use super::static_volume::{StaticBackend, StaticVolumeSource};
use crate::domain::resources::VolumeSource;
use crate::domain::volume::{BackendType, VolumeLocator};

pub struct NfsSource;

impl StaticVolumeSource for NfsSource {
    const BACKEND: BackendType = BackendType::NativeNfs;

    fn desired_source(locator: &VolumeLocator) -> Option<VolumeSource> {
        match locator {
            VolumeLocator::NativeNfs { server, path } => Some(VolumeSource::Nfs {
                server: server.clone(),
                path: path.clone(),
            }),
            _ => None,
        }
    }

    fn fill_spec(source: &VolumeSource, spec: &mut PersistentVolumeSpec) {
        if let VolumeSource::Nfs { server, path } = source {
            spec.nfs = Some(NFSVolumeSource {
                server: server.clone(),
                path: path.clone(),
                read_only: None,
            });
        }
    }
}

pub type NativeNfsBackend = StaticBackend<NfsSource>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::backends::{BackendContext, BackendReconciler};
    use crate::domain::capacity::Capacity;
    use crate::domain::resources::ObservedVolume;
    use crate::domain::volume::{AccessMode, OwnerIds, VolumeNames, VolumeSpec};
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::in_memory_cluster::InMemoryClusterResourceManager;
    use std::sync::Arc;

    fn spec() -> VolumeSpec {
        VolumeSpec {
            locator: VolumeLocator::NativeNfs {
                server: "5.6.7.8".to_string(),
                path: "/exports/media".to_string(),
            },
            capacity: Capacity::parse("1Ti").unwrap(),
            access_mode: AccessMode::ReadWriteMany,
            owner: OwnerIds { puid: 1000, pgid: 1000 },
        }
    }

    #[tokio::test]
    async fn test_creates_volume_and_bound_claim() {
        let cluster = Arc::new(InMemoryClusterResourceManager::new());
        let backend = NativeNfsBackend::new(BackendContext {
            cluster: cluster.clone(),
            names: VolumeNames::for_namespace("media"),
            event_bus: Arc::new(EventBus::new(16)),
        });

        backend.ensure(&spec(), &ObservedVolume::default()).await.unwrap();

        let pv = cluster.volume("charmarr-shared-media-pv").unwrap();
        let pv_spec = pv.spec.unwrap();
        let nfs = pv_spec.nfs.unwrap();
        assert_eq!(nfs.server, "5.6.7.8");
        assert_eq!(nfs.path, "/exports/media");
        assert_eq!(pv_spec.persistent_volume_reclaim_policy.as_deref(), Some("Retain"));
        assert_eq!(pv_spec.capacity.unwrap()["storage"].0, "1Ti");

        let claim_spec = cluster.claim("charmarr-shared-media", "media").unwrap().spec.unwrap();
        assert_eq!(claim_spec.storage_class_name.as_deref(), Some(""));
        assert_eq!(claim_spec.volume_name.as_deref(), Some("charmarr-shared-media-pv"));
    }
}
