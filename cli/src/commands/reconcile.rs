// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;

use charmarr_storage_core::application::VolumeReconciler;

use super::{leadership, print_status, GlobalArgs, Runtime};

pub async fn execute(global: &GlobalArgs, standby: bool) -> Result<()> {
    let config = global.load_config()?;
    let runtime = Runtime::connect(global).await?;
    let events = runtime.spawn_event_logger();

    let report = runtime
        .reconciler(&config)
        .reconcile(&config, leadership(standby))
        .await;

    print_status(&report.status);
    if let Some(descriptor) = &report.published {
        println!("  Descriptor: {} mounted at {}", descriptor.pvc_name, descriptor.mount_path);
    }

    // Dropping the last sender lets the logger drain and exit
    drop(runtime);
    let _ = events.await;
    Ok(())
}
