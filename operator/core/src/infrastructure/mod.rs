// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure adapters for the cluster, permission and descriptor ports.

pub mod descriptor_file;
pub mod event_bus;
pub mod in_memory_cluster;
pub mod kube_cluster;
pub mod permission_job;

pub use descriptor_file::{FileDescriptorPublisher, InMemoryDescriptorPublisher};
pub use event_bus::{DomainEvent, EventBus, EventBusError, EventReceiver};
pub use in_memory_cluster::{ClusterCall, ClusterOperation, InMemoryClusterResourceManager};
pub use kube_cluster::KubeResourceManager;
pub use permission_job::JobPermissionChecker;

use std::sync::Arc;

use crate::domain::cluster::ClusterResourceManager;

/// Which cluster the reconciler talks to
pub enum ClusterBackend {
    /// Live API server
    Kubernetes(kube::Client),
    /// Fake cluster, for dry runs and tests
    InMemory,
}

pub fn create_cluster_manager(backend: ClusterBackend) -> Arc<dyn ClusterResourceManager> {
    match backend {
        ClusterBackend::Kubernetes(client) => Arc::new(KubeResourceManager::new(client)),
        ClusterBackend::InMemory => Arc::new(InMemoryClusterResourceManager::new()),
    }
}
