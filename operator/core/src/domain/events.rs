// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::permission::PermissionCheckStatus;
use crate::domain::volume::BackendType;

/// Things that happened to the shared volume during a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VolumeEvent {
    VolumeCreated {
        volume_name: String,
        backend: BackendType,
        created_at: DateTime<Utc>,
    },
    VolumeReapplied {
        volume_name: String,
        reasons: Vec<String>,
        reapplied_at: DateTime<Utc>,
    },
    ClaimCreated {
        claim_name: String,
        backend: BackendType,
        created_at: DateTime<Utc>,
    },
    ClaimResized {
        claim_name: String,
        from: String,
        to: String,
        resized_at: DateTime<Utc>,
    },
    ClaimResizeRejected {
        claim_name: String,
        reason: String,
        rejected_at: DateTime<Utc>,
    },
    /// Static claims are never resized; the mismatch is only reported
    StaticSizeMismatch {
        claim_name: String,
        requested: String,
        configured: String,
        detected_at: DateTime<Utc>,
    },
    BackendChangeBlocked {
        existing: String,
        requested: BackendType,
        blocked_at: DateTime<Utc>,
    },
    PermissionChecked {
        claim_name: String,
        status: PermissionCheckStatus,
        message: String,
        checked_at: DateTime<Utc>,
    },
    DescriptorPublished {
        pvc_name: String,
        published_at: DateTime<Utc>,
    },
    DescriptorRetracted {
        retracted_at: DateTime<Utc>,
    },
    VolumeTornDown {
        claim_name: String,
        volume_name: Option<String>,
        torn_down_at: DateTime<Utc>,
    },
}
