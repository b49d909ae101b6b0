// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod capacity;
pub mod volume;
pub mod resources;
pub mod config;
pub mod detector;
pub mod guard;
pub mod status;
pub mod permission;
pub mod descriptor;
pub mod cluster;
pub mod events;
