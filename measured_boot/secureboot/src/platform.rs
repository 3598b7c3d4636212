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

//! Access to the running machine: efivarfs, the PCR sysfs files, the boot partition, LUKS
//! volumes and the external tools that change them.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use boot_config::PathsConfig;
use boot_measurement::EfiVariable;
use regex::Regex;

use crate::command::{run_command, CommandExecutor, OperationContext};
use crate::error::SecureBootError;

/// efivarfs prefixes every variable with its 4-byte attribute mask
const EFIVARFS_ATTRIBUTE_SIZE: usize = 4;
/// Hex characters of one SHA-256 PCR value
const PCR_HEX_LENGTH: usize = 64;
const SWTPM_STATE_DIR: &str = "swtpm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X86_64,
    Aarch64,
}

struct ArchitectureEntry {
    arch: Architecture,
    name: &'static str,
    boot_efi: &'static str,
    systemd_boot_efi: &'static str,
    measures_ucode: bool,
}

static ARCHITECTURE_TABLE: [ArchitectureEntry; 2] = [
    ArchitectureEntry {
        arch: Architecture::X86_64,
        name: "x86_64",
        boot_efi: "EFI/BOOT/BOOTX64.EFI",
        systemd_boot_efi: "EFI/systemd/systemd-bootx64.efi",
        measures_ucode: true,
    },
    ArchitectureEntry {
        arch: Architecture::Aarch64,
        name: "aarch64",
        boot_efi: "EFI/BOOT/BOOTAA64.EFI",
        systemd_boot_efi: "EFI/systemd/systemd-bootaa64.efi",
        measures_ucode: false,
    },
];

impl Architecture {
    fn entry(self) -> &'static ArchitectureEntry {
        match self {
            Architecture::X86_64 => &ARCHITECTURE_TABLE[0],
            Architecture::Aarch64 => &ARCHITECTURE_TABLE[1],
        }
    }

    pub fn from_name(name: &str) -> Result<Self, SecureBootError> {
        ARCHITECTURE_TABLE.iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.arch)
            .ok_or_else(|| SecureBootError::Internal(format!("unsupported architecture '{}'", name)))
    }

    /// Architecture this binary was built for
    pub fn current() -> Result<Self, SecureBootError> {
        Self::from_name(std::env::consts::ARCH)
    }

    /// Removable-media boot loader path relative to the boot partition
    pub fn boot_efi(self) -> &'static str {
        self.entry().boot_efi
    }

    pub fn systemd_boot_efi(self) -> &'static str {
        self.entry().systemd_boot_efi
    }

    /// Whether the UKI stub measures a `.ucode` section on this architecture
    pub fn measures_ucode(self) -> bool {
        self.entry().measures_ucode
    }
}

/// The machine the trust engine operates on
///
/// Paths come from configuration so the whole engine can run against a fixture tree; every tool
/// invocation goes through the executor.
pub struct Platform {
    paths: PathsConfig,
    arch: Architecture,
    executor: Arc<dyn CommandExecutor + Send + Sync>,
}

impl Platform {
    pub fn new(paths: PathsConfig, executor: Arc<dyn CommandExecutor + Send + Sync>) -> Result<Self, SecureBootError> {
        Ok(Self::for_architecture(paths, Architecture::current()?, executor))
    }

    pub fn for_architecture(
        paths: PathsConfig,
        arch: Architecture,
        executor: Arc<dyn CommandExecutor + Send + Sync>,
    ) -> Self {
        Self { paths, arch, executor }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.paths
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    pub fn efi_variable_path(&self, variable: EfiVariable) -> PathBuf {
        self.paths.efivars_dir.join(variable.file_name())
    }

    /// Current payload of an EFI variable without its attribute bytes; a missing variable is empty
    pub fn read_efi_variable(&self, variable: EfiVariable) -> Result<Vec<u8>, SecureBootError> {
        let path = self.efi_variable_path(variable);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SecureBootError::io(&path, e)),
        };
        if content.len() < EFIVARFS_ATTRIBUTE_SIZE {
            return Err(SecureBootError::Format(
                format!("only read {} bytes from {}", content.len(), path.display())
            ));
        }
        Ok(content[EFIVARFS_ATTRIBUTE_SIZE..].to_vec())
    }

    pub fn secure_boot_enabled(&self) -> Result<bool, SecureBootError> {
        let value = self.read_efi_variable(EfiVariable::SecureBoot)?;
        Ok(value.first() == Some(&1))
    }

    /// Live SHA-256 value of a PCR as exported by the kernel
    pub fn read_pcr(&self, index: u32) -> Result<Vec<u8>, SecureBootError> {
        let path = self.paths.pcr_dir.join(index.to_string());
        let content = fs::read(&path).map_err(|e| SecureBootError::io(&path, e))?;
        if content.len() < PCR_HEX_LENGTH {
            return Err(SecureBootError::Format(
                format!("only read {} bytes from {}", content.len(), path.display())
            ));
        }
        hex::decode(&content[..PCR_HEX_LENGTH])
            .map_err(|e| SecureBootError::Format(format!("invalid PCR value in {}: {}", path.display(), e)))
    }

    /// Directory holding the installed UKIs
    pub fn uki_dir(&self) -> PathBuf {
        self.paths.boot_dir.join("EFI/Linux")
    }

    pub fn boot_efi_path(&self) -> PathBuf {
        self.paths.boot_dir.join(self.arch.boot_efi())
    }

    pub fn systemd_boot_efi_path(&self) -> PathBuf {
        self.paths.boot_dir.join(self.arch.systemd_boot_efi())
    }

    /// Installed UKIs in file name order
    pub fn installed_ukis(&self) -> Result<Vec<PathBuf>, SecureBootError> {
        let dir = self.uki_dir();
        let mut ukis: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| SecureBootError::io(&dir, e))? {
            let entry = entry.map_err(|e| SecureBootError::io(&dir, e))?;
            if entry.file_type().map(|t| !t.is_dir()).unwrap_or(false) {
                ukis.push(entry.path());
            }
        }
        ukis.sort();
        Ok(ukis)
    }

    /// A kernel event log means a physical TPM; otherwise swtpm is in use when its state exists
    pub fn swtpm_in_use(&self) -> bool {
        if self.paths.event_log.exists() {
            return false;
        }
        self.paths.boot_dir.join(SWTPM_STATE_DIR).exists()
    }

    pub fn run(&self, ctx: &OperationContext, command: &str, args: &[&str]) -> Result<String, SecureBootError> {
        run_command(self.executor.as_ref(), ctx, command, args, &HashMap::new())
    }

    pub fn run_with_env(
        &self,
        ctx: &OperationContext,
        command: &str,
        args: &[&str],
        envs: &HashMap<OsString, OsString>,
    ) -> Result<String, SecureBootError> {
        run_command(self.executor.as_ref(), ctx, command, args, envs)
    }

    /// Partitions backing the root and swap LUKS volumes, keyed `root` and `swap`
    ///
    /// The swap partition label always points at the real device; the root partition is the
    /// partition following it.
    pub fn luks_volumes(&self, ctx: &OperationContext) -> Result<BTreeMap<String, String>, SecureBootError> {
        let swap_link = self.paths.partlabel_dir.join("swap");
        let target = fs::read_link(&swap_link).map_err(|e| SecureBootError::io(&swap_link, e))?;
        let mut swap_dev = clean_path(&self.paths.partlabel_dir.join(target)).display().to_string();

        let is_mapped = Path::new(&swap_dev)
            .file_name()
            .map(|name| name.to_string_lossy().starts_with("dm-"))
            .unwrap_or(false);
        if is_mapped {
            swap_dev = self.resolve_mapper_device(ctx, &swap_dev)?;
        }

        let root_dev = swap_dev.strip_suffix('9')
            .map(|prefix| format!("{}10", prefix))
            .ok_or_else(|| SecureBootError::Format(format!("unexpected swap device: '{}'", swap_dev)))?;

        let mut volumes = BTreeMap::new();
        volumes.insert("root".to_string(), root_dev);
        volumes.insert("swap".to_string(), swap_dev);
        Ok(volumes)
    }

    /// Stable `/dev/mapper` name of a device-mapper node
    fn resolve_mapper_device(&self, ctx: &OperationContext, device: &str) -> Result<String, SecureBootError> {
        let output = self.run(ctx, "dmsetup", &["info", device])?;
        let name_regex = Regex::new(r"Name:\s+(.+)")
            .map_err(|e| SecureBootError::Internal(format!("invalid regex: {}", e)))?;
        let name = name_regex.captures(&output)
            .and_then(|captures| captures.get(1))
            .map(|name| name.as_str().trim().to_string())
            .ok_or_else(|| SecureBootError::Format(format!("dmsetup reported no name for '{}'", device)))?;
        Ok(format!("/dev/mapper/{}", name))
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}
