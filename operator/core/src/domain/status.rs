// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Status Aggregator
//!
//! Collapses everything a reconcile pass learned into the single unit status
//! shown to the operator. Rules are evaluated in priority order and the first
//! match wins.

use serde::{Deserialize, Serialize};

use crate::domain::config::ConfigError;
use crate::domain::guard::BackendImmutabilityError;
use crate::domain::permission::{PermissionCheckResult, PermissionCheckStatus};
use crate::domain::resources::{ClaimPhase, VolumePhase};
use crate::domain::volume::BackendType;

/// Shown by every non-leader replica
pub const STANDBY_MESSAGE: &str = "Standby (leader manages storage)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    Active(String),
    Maintenance(String),
    Waiting(String),
    Blocked(String),
}

impl UnitStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active(_) => "active",
            Self::Maintenance(_) => "maintenance",
            Self::Waiting(_) => "waiting",
            Self::Blocked(_) => "blocked",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Active(m) | Self::Maintenance(m) | Self::Waiting(m) | Self::Blocked(m) => m,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message().is_empty() {
            f.write_str(self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}

/// Inputs to the aggregator.
///
/// `volume_phase` and `claim_phase` describe the resources as observed at the
/// start of the pass (`None` means absent). `volume_phase` is only meaningful
/// for static backends.
#[derive(Debug, Clone, Default)]
pub struct StatusFacts {
    pub backend_config: Option<ConfigError>,
    pub immutability: Option<BackendImmutabilityError>,
    pub field_config: Option<ConfigError>,
    pub reconcile_error: Option<String>,
    pub backend: Option<BackendType>,
    pub volume_phase: Option<VolumePhase>,
    pub claim_phase: Option<ClaimPhase>,
    pub permission: Option<PermissionCheckResult>,
    pub resize_error: Option<String>,
}

pub fn aggregate_status(facts: &StatusFacts) -> UnitStatus {
    if let Some(err) = &facts.backend_config {
        return UnitStatus::Blocked(err.to_string());
    }
    if let Some(err) = &facts.immutability {
        return UnitStatus::Blocked(err.to_string());
    }
    if let Some(err) = &facts.field_config {
        return UnitStatus::Blocked(err.to_string());
    }

    let Some(backend) = facts.backend else {
        // Unreachable with a valid backend-type; keep the unit visibly stuck.
        return UnitStatus::Blocked(ConfigError::BackendTypeMissing.to_string());
    };
    let label = backend.volume_label();

    if let Some(err) = &facts.reconcile_error {
        return UnitStatus::Waiting(format!(
            "Failed to reconcile {} volume: {}",
            backend.as_str(),
            err
        ));
    }

    if backend.is_static() {
        match facts.volume_phase {
            None => return UnitStatus::Maintenance(format!("Creating {} PV", label)),
            Some(VolumePhase::Failed) => {
                return UnitStatus::Blocked(format!("{} PV failed. Check storage backend", label))
            }
            Some(_) => {}
        }
    }

    let Some(claim_phase) = facts.claim_phase else {
        return UnitStatus::Maintenance("Creating PVC".to_string());
    };

    if let Some(permission) = &facts.permission {
        match permission.status {
            PermissionCheckStatus::Failed => {
                return UnitStatus::Blocked(permission.message.clone())
            }
            PermissionCheckStatus::Pending => {
                return UnitStatus::Maintenance("Checking storage permissions".to_string())
            }
            PermissionCheckStatus::Passed => {}
        }
    }

    match claim_phase {
        ClaimPhase::Pending | ClaimPhase::Bound => UnitStatus::Active(
            facts
                .resize_error
                .as_ref()
                .map(|reason| format!("PVC resize failed: {}", reason))
                .unwrap_or_default(),
        ),
        ClaimPhase::Lost => UnitStatus::Blocked(format!("PVC lost. Check {} backend", label)),
    }
}
