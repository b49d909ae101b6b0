// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File-backed descriptor publisher.
//!
//! Consumers watch a JSON file instead of a relation databag. The file is only
//! rewritten when its content changes.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::domain::descriptor::{DescriptorPublisher, MediaStorageDescriptor, PublishError};

pub struct FileDescriptorPublisher {
    path: PathBuf,
}

impl FileDescriptorPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl DescriptorPublisher for FileDescriptorPublisher {
    async fn publish(&self, descriptor: &MediaStorageDescriptor) -> Result<(), PublishError> {
        let content = serde_json::to_string_pretty(descriptor)?;

        match tokio::fs::read_to_string(&self.path).await {
            Ok(existing) if existing == content => {
                debug!("Descriptor at {:?} unchanged", self.path);
                return Ok(());
            }
            _ => {}
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        info!("Published storage descriptor to {:?}", self.path);
        Ok(())
    }

    async fn retract(&self) -> Result<bool, PublishError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Retracted storage descriptor at {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Publisher that only remembers the last descriptor, for tests and dry runs
#[derive(Default)]
pub struct InMemoryDescriptorPublisher {
    current: parking_lot::Mutex<Option<MediaStorageDescriptor>>,
    publishes: std::sync::atomic::AtomicUsize,
    retracts: std::sync::atomic::AtomicUsize,
}

impl InMemoryDescriptorPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<MediaStorageDescriptor> {
        self.current.lock().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.publishes.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn retract_count(&self) -> usize {
        self.retracts.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl DescriptorPublisher for InMemoryDescriptorPublisher {
    async fn publish(&self, descriptor: &MediaStorageDescriptor) -> Result<(), PublishError> {
        self.publishes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.current.lock() = Some(descriptor.clone());
        Ok(())
    }

    async fn retract(&self) -> Result<bool, PublishError> {
        self.retracts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.current.lock().take().is_some())
    }
}
