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

use boot_config::{BootTrustConfig, ConfigManager, PathsConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn create_temp_config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write config");
    file
}

#[test]
fn test_partial_config_keeps_defaults() {
    // Test Objective: sections and fields missing from the file fall back to production defaults
    // Expected Result: overridden values applied, everything else default
    let yaml = r#"
paths:
  boot_dir: "/efi"
tools:
  timeout_secs: 30
logging:
  level: "debug"
  file: "/var/log/boot-trust/boot-trust.log"
"#;
    let file = create_temp_config_file(yaml);
    let manager = ConfigManager::new(file.path().to_str().unwrap()).unwrap();
    let config = manager.config();

    assert_eq!(manager.get_config_path(), Some(file.path()));
    assert_eq!(config.paths.boot_dir, PathBuf::from("/efi"));
    assert_eq!(config.paths.pcr_dir, PathBuf::from("/sys/class/tpm/tpm0/pcr-sha256"));
    assert_eq!(config.tpm.tcti, "device:/dev/tpm0");
    assert_eq!(config.tools.timeout_secs, 30);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.max_zip_count, 6);
}

#[test]
fn test_defaults_validate() {
    let config = BootTrustConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.paths.trusted_fuse, PathBuf::from("/etc/boot-trust-fuse-blown"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let zero_timeout = BootTrustConfig::from_yaml_str("tools:\n  timeout_secs: 0\n").unwrap();
    assert!(zero_timeout.validate().unwrap_err().contains("timeout"));

    let relative = BootTrustConfig::from_yaml_str("paths:\n  boot_dir: boot\n").unwrap();
    assert!(relative.validate().unwrap_err().contains("boot_dir"));

    let bad_tcti = BootTrustConfig::from_yaml_str("tpm:\n  tcti: \"serial:/dev/ttyS0\"\n").unwrap();
    assert!(bad_tcti.validate().unwrap_err().contains("TCTI"));

    let bad_level = create_temp_config_file("logging:\n  level: chatty\n");
    let err = ConfigManager::new(bad_level.path().to_str().unwrap()).unwrap_err();
    assert!(err.contains("Invalid log level"));
}

#[test]
fn test_malformed_yaml_is_an_error() {
    assert!(BootTrustConfig::from_yaml_str("paths: [").is_err());
}

#[test]
fn test_rooted_paths() {
    let paths = PathsConfig::rooted_at(Path::new("/tmp/fixture"));
    assert_eq!(paths.efivars_dir, PathBuf::from("/tmp/fixture/sys/firmware/efi/efivars"));
    assert_eq!(paths.boot_dir, PathBuf::from("/tmp/fixture/boot"));
}
