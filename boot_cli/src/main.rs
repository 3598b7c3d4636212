/*
 * Copyright (c) Huawei Technologies Co., Ltd. 2025. All rights reserved.
 * Global Trust Authority is licensed under the Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *     http://license.coscl.org.cn/MulanPSL2
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND, EITHER EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR
 * PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

mod actions;
mod commands;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use boot_config::{BootTrustConfig, ConfigManager};
use clap::Parser;
use secureboot::{OperationContext, Platform, ProcessExecutor};

use crate::commands::Commands;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Measured boot trust engine", long_about = None)]
struct Cli {
    /// Configuration file; ./boot_trust.yaml and /etc/boot_trust/boot_trust.yaml are tried otherwise
    #[clap(short, long, default_value = "")]
    config: String,

    /// Log debug output to stderr
    #[clap(short, long)]
    verbose: bool,

    /// Seconds each external tool may run, overrides the configuration
    #[clap(long)]
    timeout: Option<u64>,

    #[clap(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("ERROR: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let manager = ConfigManager::new(&cli.config).map_err(anyhow::Error::msg)?;
    let config = manager.config();
    init_logging(config, cli.verbose)?;
    if let Some(path) = manager.get_config_path() {
        log::debug!("Loaded configuration from {}", path.display());
    }

    let timeout = match cli.timeout {
        Some(0) => return Err(anyhow!("Invalid tool timeout: cannot be 0")),
        Some(secs) => secs,
        None => config.tools.timeout_secs,
    };
    let ctx = OperationContext::with_timeout(Duration::from_secs(timeout));
    let platform = Platform::new(config.paths.clone(), Arc::new(ProcessExecutor))?;

    actions::dispatch(&cli.command, &platform, config, &ctx)
}

/// Silent unless asked to be verbose or a log file is configured
fn init_logging(config: &BootTrustConfig, verbose: bool) -> Result<()> {
    if !verbose && config.logging.file.is_none() {
        return Ok(());
    }
    let mut logging = config.logging.clone();
    if verbose {
        logging.level = "debug".to_string();
    }
    common_log::init_with_config(&logging, verbose).map_err(|e| anyhow!("Failed to initialize logger: {}", e))
}
