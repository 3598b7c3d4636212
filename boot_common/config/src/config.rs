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

use common_log::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "boot_trust.yaml";
const SYSTEM_CONFIG_PATH: &str = "/etc/boot_trust/boot_trust.yaml";

// Filesystem locations read or written by the trust engine
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub event_log: PathBuf,      // Kernel-exported TCG event log
    pub efivars_dir: PathBuf,    // efivarfs mount
    pub pcr_dir: PathBuf,        // One hex file per SHA-256 PCR
    pub boot_dir: PathBuf,       // ESP mount holding EFI/Linux and swtpm/
    pub pcr_public_key: PathBuf, // PEM consumed by systemd-cryptenroll
    pub trusted_fuse: PathBuf,   // Marker blown when measured boot can no longer be trusted
    pub partlabel_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            event_log: PathBuf::from("/sys/kernel/security/tpm0/binary_bios_measurements"),
            efivars_dir: PathBuf::from("/sys/firmware/efi/efivars"),
            pcr_dir: PathBuf::from("/sys/class/tpm/tpm0/pcr-sha256"),
            boot_dir: PathBuf::from("/boot"),
            pcr_public_key: PathBuf::from("/run/systemd/tpm2-pcr-public-key.pem"),
            trusted_fuse: PathBuf::from("/etc/boot-trust-fuse-blown"),
            partlabel_dir: PathBuf::from("/dev/disk/by-partlabel"),
        }
    }
}

impl PathsConfig {
    /// All paths rooted under `root`, for running against a fixture tree
    pub fn rooted_at(root: &Path) -> Self {
        let defaults = Self::default();
        let rebase = |path: &Path| root.join(path.strip_prefix("/").unwrap_or(path));
        Self {
            event_log: rebase(&defaults.event_log),
            efivars_dir: rebase(&defaults.efivars_dir),
            pcr_dir: rebase(&defaults.pcr_dir),
            boot_dir: rebase(&defaults.boot_dir),
            pcr_public_key: rebase(&defaults.pcr_public_key),
            trusted_fuse: rebase(&defaults.trusted_fuse),
            partlabel_dir: rebase(&defaults.partlabel_dir),
        }
    }

    fn entries(&self) -> [(&'static str, &Path); 7] {
        [
            ("event_log", &self.event_log),
            ("efivars_dir", &self.efivars_dir),
            ("pcr_dir", &self.pcr_dir),
            ("boot_dir", &self.boot_dir),
            ("pcr_public_key", &self.pcr_public_key),
            ("trusted_fuse", &self.trusted_fuse),
            ("partlabel_dir", &self.partlabel_dir),
        ]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TpmConfig {
    pub tcti: String, // TCTI configuration string
}

impl Default for TpmConfig {
    fn default() -> Self {
        Self { tcti: "device:/dev/tpm0".to_string() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub timeout_secs: u64, // Upper bound for each external tool invocation
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BootTrustConfig {
    pub paths: PathsConfig,
    pub tpm: TpmConfig,
    pub tools: ToolsConfig,
    pub logging: LogConfig,
}

impl BootTrustConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, String> {
        serde_yaml::from_str(content).map_err(|e| format!("Failed to parse configuration: {}", e))
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read configuration file {}: {}", path.display(), e))?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), String> {
        // 1. Validate logging configuration
        self.logging.validate()?;

        // 2. Validate paths
        for (name, path) in self.paths.entries() {
            if path.as_os_str().is_empty() {
                return Err(format!("Path '{}' cannot be empty", name));
            }
            if path.is_relative() {
                return Err(format!("Path '{}' must be absolute: {}", name, path.display()));
            }
        }

        // 3. Validate TPM configuration
        let valid_tcti = ["device", "mssim", "swtpm", "tabrmd", "libtpm"];
        let tcti_kind = self.tpm.tcti.split(':').next().unwrap_or_default();
        if !valid_tcti.contains(&tcti_kind) {
            return Err(format!(
                "Invalid TCTI configuration: {}. Valid values: {:?}",
                self.tpm.tcti, valid_tcti
            ));
        }

        // 4. Validate tool timeouts
        if self.tools.timeout_secs == 0 {
            return Err("Invalid tool timeout: cannot be 0".to_string());
        }

        Ok(())
    }
}

/// Configuration manager that handles loading and accessing configuration settings
///
/// The configuration file is loaded using the following priority order:
/// 1. Command line specified path (if provided and the file exists)
/// 2. Current working directory: ./boot_trust.yaml
/// 3. System-wide configuration: /etc/boot_trust/boot_trust.yaml
///
/// If no configuration file is found, built-in defaults (the production paths) are used.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: BootTrustConfig,
    config_path: Option<PathBuf>, // Records the actual configuration file path used
}

impl ConfigManager {
    pub fn new(cli_path: &str) -> Result<Self, String> {
        let config_path = Self::find_config_path(cli_path);
        let config = match &config_path {
            Some(path) => BootTrustConfig::from_file(path)?,
            None => BootTrustConfig::default(),
        };

        config.validate().map_err(|e| format!("Configuration validation failed: {}", e))?;

        Ok(Self { config, config_path })
    }

    fn find_config_path(cli_path: &str) -> Option<PathBuf> {
        // 1. Check command line specified path
        if !cli_path.is_empty() {
            let path = PathBuf::from(cli_path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("Configuration file {} not found, falling back to default locations", cli_path);
        }

        // 2. Check current working directory
        let current_dir_config = PathBuf::from(CONFIG_FILE_NAME);
        if current_dir_config.exists() {
            return Some(current_dir_config);
        }

        // 3. Check system-wide configuration directory
        let etc_config = PathBuf::from(SYSTEM_CONFIG_PATH);
        if etc_config.exists() {
            return Some(etc_config);
        }

        None
    }

    pub fn config(&self) -> &BootTrustConfig {
        &self.config
    }

    /// Get the actual path of the configuration file, `None` when running on defaults
    pub fn get_config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
