// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host-path backend: a static PV pointing at an existing directory on the node.

use k8s_openapi::api::core::v1::{HostPathVolumeSource, PersistentVolumeSpec};

use super::static_volume::{StaticBackend, StaticVolumeSource};
use crate::domain::resources::VolumeSource;
use crate::domain::volume::{BackendType, VolumeLocator};

pub struct HostPathSource;

impl StaticVolumeSource for HostPathSource {
    const BACKEND: BackendType = BackendType::HostPath;

    fn desired_source(locator: &VolumeLocator) -> Option<VolumeSource> {
        match locator {
            VolumeLocator::HostPath { path } => Some(VolumeSource::HostPath { path: path.clone() }),
            _ => None,
        }
    }

    fn fill_spec(source: &VolumeSource, spec: &mut PersistentVolumeSpec) {
        if let VolumeSource::HostPath { path } = source {
            spec.host_path = Some(HostPathVolumeSource {
                path: path.clone(),
                type_: Some("Directory".to_string()),
            });
        }
    }
}

pub type HostPathBackend = StaticBackend<HostPathSource>;
