// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Charmarr Storage Core
//!
//! Reconciles the single shared media volume (one PersistentVolume +
//! PersistentVolumeClaim pair) that backs a Charmarr media deployment.
//!
//! # Architecture
//!
//! - **Domain:** pure types, ports (`ClusterResourceManager`, `PermissionChecker`,
//!   `DescriptorPublisher`), backend detection, the immutability guard and the
//!   status aggregator.
//! - **Application:** backend reconcilers, permission verification and the
//!   reconcile pass / teardown service.
//! - **Infrastructure:** kube-rs and in-memory cluster adapters, the Job based
//!   permission checker, descriptor publishing and the event bus.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
