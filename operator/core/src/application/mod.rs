// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod backends;
pub mod permission_verifier;
pub mod volume_reconciler;

// Re-export use cases for convenience
pub use permission_verifier::PermissionVerifier;
pub use volume_reconciler::{
    Leadership, ReconcileReport, RemovalScope, StandardVolumeReconciler, TeardownReport,
    VolumeReconciler,
};
