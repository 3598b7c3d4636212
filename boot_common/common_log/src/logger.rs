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

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Handle;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::config::LogConfig;

const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3f)} {P} [{l}] {t} - {m}{n}";

pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

pub struct Logger {
    _handle: Handle,
}

impl Logger {
    /// Build and install the log4rs configuration
    ///
    /// # Arguments
    /// * `config` - Level and optional rolling log file
    /// * `console` - Also log to stderr, which the command line tools keep silent by default
    pub fn new_from_config(config: &LogConfig, console: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let log4rs_config = Self::build_config(config, console)?;
        let handle = log4rs::init_config(log4rs_config)?;
        Ok(Self { _handle: handle })
    }

    pub(crate) fn build_config(config: &LogConfig, console: bool) -> Result<Config, Box<dyn std::error::Error>> {
        let mut builder = Config::builder();
        let mut appenders: Vec<&str> = Vec::new();

        if let Some(file) = &config.file {
            let appender = Self::create_file_appender(file, config)?;
            builder = builder.appender(Appender::builder().build("file", Box::new(appender)));
            appenders.push("file");
        }

        if console {
            let stderr = ConsoleAppender::builder()
                .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
                .target(Target::Stderr)
                .build();
            builder = builder.appender(Appender::builder().build("console", Box::new(stderr)));
            appenders.push("console");
        }

        let root = Root::builder().appenders(appenders).build(parse_level(&config.level));
        Ok(builder.build(root)?)
    }

    fn create_file_appender(file: &Path, config: &LogConfig) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
        if let Some(log_dir) = file.parent() {
            fs::create_dir_all(log_dir)?;
            fs::set_permissions(log_dir, fs::Permissions::from_mode(0o750))?;
        }

        let archive_pattern = format!("{}.{{}}.gz", file.display());
        let roller = FixedWindowRoller::builder()
            .build(&archive_pattern, config.max_zip_count)?;
        let policy = CompoundPolicy::new(
            Box::new(SizeTrigger::new(config.max_file_size)),
            Box::new(roller),
        );

        let appender = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build(file, Box::new(policy))?;
        fs::set_permissions(file, fs::Permissions::from_mode(0o640))?;
        Ok(appender)
    }
}
