// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

use charmarr_storage_core::application::{RemovalScope, VolumeReconciler};

use super::{leadership, GlobalArgs, Runtime};

#[derive(Clone, Copy, ValueEnum)]
pub enum Scope {
    /// The whole deployment is being removed
    Deployment,
    /// Only this replica is going away
    Replica,
}

impl From<Scope> for RemovalScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Deployment => RemovalScope::Deployment,
            Scope::Replica => RemovalScope::Replica,
        }
    }
}

#[derive(Args)]
pub struct TeardownArgs {
    #[arg(long, value_enum, default_value_t = Scope::Deployment)]
    pub scope: Scope,

    /// Act as a non-leader replica
    #[arg(long)]
    pub standby: bool,
}

pub async fn execute(global: &GlobalArgs, args: TeardownArgs) -> Result<()> {
    let config = global.load_config()?;
    let runtime = Runtime::connect(global).await?;

    let report = runtime
        .reconciler(&config)
        .teardown(&config, args.scope.into(), leadership(args.standby))
        .await?;

    if !report.performed {
        println!("{}", "Shared storage kept".yellow());
        return Ok(());
    }

    println!("{}", "✓ Shared storage removed".green());
    for object in &report.deleted {
        println!("  - {}", object);
    }
    Ok(())
}
