// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Charmarr storage CLI

pub mod config;
pub mod reconcile;
pub mod run;
pub mod teardown;

pub use self::config::ConfigCommand;
pub use self::run::RunArgs;
pub use self::teardown::TeardownArgs;

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use charmarr_storage_core::application::{Leadership, StandardVolumeReconciler};
use charmarr_storage_core::domain::cluster::ClusterResourceManager;
use charmarr_storage_core::domain::config::StorageConfig;
use charmarr_storage_core::domain::status::UnitStatus;
use charmarr_storage_core::domain::volume::VolumeNames;
use charmarr_storage_core::infrastructure::{
    create_cluster_manager, ClusterBackend, DomainEvent, EventBus, EventBusError,
    EventReceiver, FileDescriptorPublisher, JobPermissionChecker,
};

/// Options shared by every command
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub namespace: String,
    pub descriptor_path: PathBuf,
    pub dry_run: bool,
}

impl GlobalArgs {
    pub fn load_config(&self) -> Result<StorageConfig> {
        StorageConfig::load_or_default(self.config.clone()).context("Failed to load configuration")
    }
}

/// Long-lived collaborators; a reconciler is assembled per pass from the
/// current configuration.
pub struct Runtime {
    cluster: Arc<dyn ClusterResourceManager>,
    publisher: Arc<FileDescriptorPublisher>,
    event_bus: Arc<EventBus>,
    names: VolumeNames,
}

impl Runtime {
    pub async fn connect(global: &GlobalArgs) -> Result<Self> {
        let backend = if global.dry_run {
            info!("Dry run: using an in-memory cluster");
            ClusterBackend::InMemory
        } else {
            let client = kube::Client::try_default()
                .await
                .context("Failed to create Kubernetes client")?;
            ClusterBackend::Kubernetes(client)
        };

        Ok(Self {
            cluster: create_cluster_manager(backend),
            publisher: Arc::new(FileDescriptorPublisher::new(&global.descriptor_path)),
            event_bus: Arc::new(EventBus::with_default_capacity()),
            names: VolumeNames::for_namespace(&global.namespace),
        })
    }

    pub fn reconciler(&self, config: &StorageConfig) -> StandardVolumeReconciler {
        let checker = Arc::new(JobPermissionChecker::new(
            self.cluster.clone(),
            self.names.namespace.clone(),
            config.permission_check_image.clone(),
        ));
        StandardVolumeReconciler::new(
            self.cluster.clone(),
            checker,
            self.publisher.clone(),
            self.event_bus.clone(),
            self.names.clone(),
        )
    }

    /// Log every volume event until the bus closes
    pub fn spawn_event_logger(&self) -> tokio::task::JoinHandle<()> {
        let receiver = self.event_bus.subscribe();
        tokio::spawn(async move {
            log_events(receiver).await;
        })
    }
}

/// Log events until the bus closes, skipping over dropped ones.
/// Returns how many events were logged.
async fn log_events(mut receiver: EventReceiver) -> usize {
    let mut logged = 0;
    loop {
        let event = match receiver.recv().await {
            Ok(event) => event,
            Err(EventBusError::Lagged(_)) => continue,
            Err(_) => break,
        };
        let DomainEvent::Volume(event) = &event;
        match serde_json::to_string(event) {
            Ok(json) => info!("volume event: {}", json),
            Err(_) => info!("volume event: {:?}", event),
        }
        logged += 1;
    }
    logged
}

pub fn leadership(standby: bool) -> Leadership {
    if standby {
        Leadership::Standby
    } else {
        Leadership::Leader
    }
}

pub fn print_status(status: &UnitStatus) {
    let name = match status {
        UnitStatus::Active(_) => status.name().green().bold(),
        UnitStatus::Maintenance(_) => status.name().cyan().bold(),
        UnitStatus::Waiting(_) => status.name().yellow().bold(),
        UnitStatus::Blocked(_) => status.name().red().bold(),
    };
    if status.message().is_empty() {
        println!("{}", name);
    } else {
        println!("{}: {}", name, status.message());
    }
}
