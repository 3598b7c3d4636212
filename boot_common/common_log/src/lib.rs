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

pub mod config;
pub mod logger;

use std::sync::OnceLock;

pub use crate::config::LogConfig;

static LOGGER: OnceLock<logger::Logger> = OnceLock::new();

/// Initialize logging system with config
///
/// # Arguments
/// * `config` - Logging section of the configuration file
/// * `console` - Also write records to stderr
///
/// # Example
/// ```no_run
/// use common_log::{init_with_config, LogConfig};
///
/// let config = LogConfig { level: "info".to_string(), ..LogConfig::default() };
/// init_with_config(&config, true).expect("Failed to initialize logger");
/// log::info!("Logger initialized");
/// ```
pub fn init_with_config(config: &LogConfig, console: bool) -> Result<(), Box<dyn std::error::Error>> {
    if LOGGER.get().is_some() {
        return Err("Logger already initialized".into());
    }
    config.validate()?;
    let logger = logger::Logger::new_from_config(config, console)?;
    if LOGGER.set(logger).is_err() {
        return Err("Logger already initialized".into());
    }
    Ok(())
}

/// Initialize logging from a standalone YAML file holding a `LogConfig`
pub fn init_with_yaml(config_path: impl Into<std::path::PathBuf>, console: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = LogConfig::from_yaml(config_path)?;
    init_with_config(&config, console)
}

// Re-export log macros for convenient use in other modules
pub use log::{debug, error, info, trace, warn};
