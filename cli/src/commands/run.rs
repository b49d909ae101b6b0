// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Periodic reconcile loop.
//!
//! Passes run strictly one after another. The configuration is re-read
//! before each pass so edits take effect on the next tick.

use anyhow::Result;
use clap::Args;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use charmarr_storage_core::application::VolumeReconciler;

use super::{leadership, GlobalArgs, Runtime};

#[derive(Args)]
pub struct RunArgs {
    /// Seconds between reconcile passes
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Act as a non-leader replica
    #[arg(long)]
    pub standby: bool,
}

pub async fn execute(global: &GlobalArgs, args: RunArgs) -> Result<()> {
    let runtime = Runtime::connect(global).await?;
    let events = runtime.spawn_event_logger();

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Reconciling shared storage in namespace {} every {}s",
        global.namespace, args.interval
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping reconcile loop");
                break;
            }
        }

        let config = match global.load_config() {
            Ok(config) => config,
            Err(e) => {
                error!("Skipping pass: {:#}", e);
                continue;
            }
        };

        let report = runtime
            .reconciler(&config)
            .reconcile(&config, leadership(args.standby))
            .await;
        info!("Status: {}", report.status);
    }

    drop(runtime);
    let _ = events.await;
    Ok(())
}
