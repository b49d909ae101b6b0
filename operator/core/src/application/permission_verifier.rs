// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Permission Verifier
//!
//! Wraps the permission checker so that every failure mode, including a
//! panic inside the checker, comes back as a `Failed` result. The reconcile
//! pass never sees an error from here.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

use crate::domain::permission::{
    PermissionCheckError, PermissionCheckRequest, PermissionCheckResult, PermissionChecker,
};

pub struct PermissionVerifier {
    checker: Arc<dyn PermissionChecker>,
}

impl PermissionVerifier {
    pub fn new(checker: Arc<dyn PermissionChecker>) -> Self {
        Self { checker }
    }

    pub async fn verify(&self, request: &PermissionCheckRequest) -> PermissionCheckResult {
        let check = self.checker.check_storage_permissions(request);
        match AssertUnwindSafe(check).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Permission check for {} failed to run: {}", request.claim_name, e);
                PermissionCheckResult::failed(format!("Storage permission check failed: {}", e))
            }
            Err(_) => {
                error!("Permission checker panicked while checking {}", request.claim_name);
                PermissionCheckResult::failed(
                    "Storage permission check failed: unexpected error in permission checker",
                )
            }
        }
    }

    /// Remove any outstanding probe for the claim
    pub async fn cancel(&self, claim_name: &str) -> Result<(), PermissionCheckError> {
        self.checker.delete_permission_check_job(claim_name).await
    }
}
