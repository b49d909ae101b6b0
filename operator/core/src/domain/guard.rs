// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Immutability Guard
//!
//! Once a claim exists its backend is fixed. Switching would orphan the data
//! on the old storage, so a mismatch blocks every mutating call for the rest
//! of the pass until the operator redeploys.

use thiserror::Error;

use crate::domain::detector::DetectedBackend;
use crate::domain::volume::BackendType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot change backend from '{existing}' to '{requested}'. Redeploy with required backend (WARNING: may cause data loss).")]
pub struct BackendImmutabilityError {
    pub existing: String,
    pub requested: BackendType,
}

/// `Ok` when the configured backend may be reconciled.
///
/// A static claim whose volume has vanished may be rebuilt by either static
/// backend, but never re-provisioned through a storage class. A claim bound to
/// a volume no backend recognises is never touched.
pub fn check_backend_change(
    detected: &DetectedBackend,
    configured: BackendType,
) -> Result<(), BackendImmutabilityError> {
    let allowed = match detected {
        DetectedBackend::Absent => true,
        DetectedBackend::Known(existing) => *existing == configured,
        DetectedBackend::MissingVolume => configured.is_static(),
        DetectedBackend::Unrecognised { .. } => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(BackendImmutabilityError {
            existing: detected.label(),
            requested: configured,
        })
    }
}
