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

//! Synthetic event log for machines without a physical TPM.
//!
//! The log is rebuilt in user space from the current EFI variables and the booted UKI, so it is
//! only as trustworthy as the running system. It must never be used when a kernel event log
//! exists; using it implies the trusted fuse is blown.

use std::fs;
use std::path::PathBuf;

use boot_measurement::utf16::utf16_to_string;
use boot_measurement::{
    parse_signature_list, section_data, EfiVariable, EventLogWriter, EventType, UefiVariableData,
};
use regex::Regex;

use crate::certificates::parse_public_key_pem;
use crate::error::SecureBootError;
use crate::platform::Platform;
use crate::predict::PCR_SECURE_BOOT_POLICY;

const PCR_KERNEL_IMAGE: u32 = 11;

/// Variables measured into PCR7 before the separator, in firmware order
const DRIVER_CONFIG_VARIABLES: [EfiVariable; 5] = [
    EfiVariable::SecureBoot,
    EfiVariable::Pk,
    EfiVariable::Kek,
    EfiVariable::Db,
    EfiVariable::Dbx,
];

/// UKI sections the stub measures into PCR11, in measurement order
const UKI_SECTIONS: [&str; 8] = [".linux", ".osrel", ".cmdline", ".initrd", ".ucode", ".uname", ".sbat", ".pcrpkey"];

const UCODE_SECTION: &str = ".ucode";
const SEPARATOR: [u8; 4] = [0u8; 4];

/// Build the event log a physical TPM would have recorded for the current boot
///
/// # Errors
/// * `SecureBootError::Trust` when no db certificate matches the PCR public key
/// * `SecureBootError::Format` when the booted UKI lacks a measured section
pub fn synthesize_tpm_event_log(platform: &Platform) -> Result<Vec<u8>, SecureBootError> {
    let uki_path = booted_uki(platform)?;
    let uki = fs::read(&uki_path).map_err(|e| SecureBootError::io(&uki_path, e))?;
    let mut writer = EventLogWriter::new()?;

    for variable in DRIVER_CONFIG_VARIABLES {
        let record = UefiVariableData::new(variable, platform.read_efi_variable(variable)?);
        writer.write_event(PCR_SECURE_BOOT_POLICY, EventType::EvEfiVariableDriverConfig, &record.encode()?)?;
    }
    writer.write_event(PCR_SECURE_BOOT_POLICY, EventType::EvSeparator, &SEPARATOR)?;

    let authority = UefiVariableData::new(EfiVariable::Db, signing_certificate_data(platform)?);
    writer.write_event(PCR_SECURE_BOOT_POLICY, EventType::EvEfiVariableAuthority, &authority.encode()?)?;

    for section in UKI_SECTIONS {
        if section == UCODE_SECTION && !platform.arch().measures_ucode() {
            continue;
        }
        let mut name = section.as_bytes().to_vec();
        name.push(0);
        writer.write_event(PCR_KERNEL_IMAGE, EventType::EvIpl, &name)?;

        let content = section_data(&uki, section)?
            .ok_or_else(|| SecureBootError::Format(format!("failed to read PE section '{}'", section)))?;
        writer.write_event(PCR_KERNEL_IMAGE, EventType::EvIpl, &content)?;
    }

    log::info!("Synthesized TPM event log from {}", uki_path.display());
    Ok(writer.into_bytes())
}

/// Owner GUID and certificate of the db entry whose key signs the running kernel's PCR policy
fn signing_certificate_data(platform: &Platform) -> Result<Vec<u8>, SecureBootError> {
    let key_path = &platform.paths().pcr_public_key;
    let pem = fs::read(key_path).map_err(|e| SecureBootError::io(key_path, e))?;
    let key = parse_public_key_pem(&pem)?;

    let db = platform.read_efi_variable(EfiVariable::Db)?;
    for entry in parse_signature_list(&db)? {
        let cert = entry.certificate.as_ref().ok_or_else(|| SecureBootError::Format(
            format!("invalid certificate in db: {}", entry.parse_error.clone().unwrap_or_default())
        ))?;
        if cert.public_key()?.public_eq(&key) {
            return Ok(entry.signature_data());
        }
    }

    Err(SecureBootError::Trust("no cert found in db matching the PCR public key".to_string()))
}

/// The UKI systemd-boot selected for this boot
///
/// UKIs are renamed during upgrades, so the 12-digit version in `LoaderEntrySelected` is used to
/// find the image rather than the full name.
pub fn booted_uki(platform: &Platform) -> Result<PathBuf, SecureBootError> {
    let raw = platform.read_efi_variable(EfiVariable::LoaderEntrySelected)?;
    let entry = utf16_to_string(&raw)?;

    let version_regex = Regex::new(r"^.+_(\d{12}).+efi$")
        .map_err(|e| SecureBootError::Internal(format!("invalid regex: {}", e)))?;
    let version = version_regex.captures(&entry)
        .and_then(|captures| captures.get(1))
        .map(|version| version.as_str().to_string())
        .ok_or_else(|| SecureBootError::Format(
            format!("unable to determine version from EFI variable LoaderEntrySelected ('{}')", entry)
        ))?;

    platform.installed_ukis()?
        .into_iter()
        .find(|uki| uki.file_name().is_some_and(|name| name.to_string_lossy().contains(&version)))
        .ok_or_else(|| SecureBootError::Format(format!("unable to find UKI image for version {}", version)))
}
