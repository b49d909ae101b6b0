// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume descriptor handed to downstream media applications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::volume::{OwnerIds, VolumeNames};

/// What a consumer needs to mount the shared volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStorageDescriptor {
    pub pvc_name: String,
    pub mount_path: String,
    pub puid: u32,
    pub pgid: u32,
}

impl MediaStorageDescriptor {
    pub fn new(names: &VolumeNames, owner: OwnerIds) -> Self {
        Self {
            pvc_name: names.claim_name.clone(),
            mount_path: names.mount_path.clone(),
            puid: owner.puid,
            pgid: owner.pgid,
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("descriptor transport failed: {0}")]
    Transport(String),

    #[error("descriptor serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        PublishError::Transport(err.to_string())
    }
}

/// Transport towards every related consumer
#[async_trait]
pub trait DescriptorPublisher: Send + Sync {
    /// Publish (or re-publish) the descriptor. Must be idempotent.
    async fn publish(&self, descriptor: &MediaStorageDescriptor) -> Result<(), PublishError>;

    /// Withdraw any previously published descriptor. Must be idempotent.
    ///
    /// Returns `true` when a descriptor was actually withdrawn.
    async fn retract(&self) -> Result<bool, PublishError>;
}
