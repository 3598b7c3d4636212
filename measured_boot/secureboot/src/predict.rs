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

//! Predictive PCR computation.
//!
//! Replays a validated event log but substitutes what will be measured on the next boot: the
//! current content of each EFI variable for PCR7, and a candidate UKI for PCR4. Callers must
//! only pass logs that passed [`crate::tpm::validate_event_log`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use boot_measurement::efi::device_path::{MEDIA_FILE_PATH_SUBTYPE, MEDIA_VENDOR_SUBTYPE};
use boot_measurement::pcr::initial_value;
use boot_measurement::utf16::utf16_to_string;
use boot_measurement::{
    authenticode_digest, compute_authenticode_digest, extend, extract_authenticode_certificate,
    parse_image_load_event, parse_uefi_variable_data, EfiVariable, EventType, MeasurementEvent,
};
use openssl::x509::X509;
use uuid::Uuid;

use crate::certificates::{get_certificates_from_var, same_certificate, subject_prefix, subject_string};
use crate::error::SecureBootError;
use crate::platform::Platform;

pub const PCR_BOOT_APPLICATIONS: u32 = 4;
pub const PCR_SECURE_BOOT_POLICY: u32 = 7;

/// Vendor media node the systemd stub uses when it measures the kernel of a UKI
pub const STUB_PAYLOAD_GUID: Uuid = Uuid::from_u128(0x55c5d1f8_04cd_46b5_8a20_e56cbb3052d0);

/// Signature owner GUID in front of the certificate of a VariableAuthority payload
const SIGNATURE_OWNER_SIZE: usize = 16;

const UKI_KERNEL_SECTION: &str = ".linux";

/// PCR7 value expected on the next boot given the current EFI variables and boot stub
pub fn predict_pcr7(platform: &Platform, events: &[MeasurementEvent]) -> Result<Vec<u8>, SecureBootError> {
    let mut pcr = initial_value();
    for event in events.iter().filter(|event| event.pcr_index == PCR_SECURE_BOOT_POLICY) {
        pcr = match event.event_type {
            EventType::EvEfiVariableDriverConfig => {
                let expected = expected_variable_driver_config(platform, &event.data)?;
                extend(&pcr, &expected, false)?
            }
            EventType::EvEfiVariableAuthority => {
                let expected = expected_variable_authority(platform, &event.data)?;
                extend(&pcr, &expected, false)?
            }
            _ => extend(&pcr, &event.digest, true)?,
        };
    }
    Ok(pcr)
}

/// Re-encode a driver config measurement with the variable's current content
fn expected_variable_driver_config(platform: &Platform, data: &[u8]) -> Result<Vec<u8>, SecureBootError> {
    let mut record = parse_uefi_variable_data(data)?;
    let variable = record.variable()
        .ok_or_else(|| SecureBootError::Format(format!("unsupported EFI variable '{}'", record.name())))?;

    record.variable_data = platform.read_efi_variable(variable)?;
    log::debug!("Substituting current content of {} ({} bytes) into PCR7", variable, record.variable_data.len());
    Ok(record.encode()?)
}

/// Measurement the signing authority of the boot stub will produce on the next boot
///
/// When the logged certificate differs from the one the boot stub is now signed with, and the
/// logged one belongs to the same signing party (same subject prefix), the stub has been re-signed
/// with a new key. The new certificate must then be found in db. Third-party authorities (option
/// ROM drivers and similar) are passed through unchanged.
fn expected_variable_authority(platform: &Platform, data: &[u8]) -> Result<Vec<u8>, SecureBootError> {
    let mut record = parse_uefi_variable_data(data)?;
    if record.variable_data.len() <= SIGNATURE_OWNER_SIZE {
        return Err(SecureBootError::Format(
            format!("VariableAuthority data of {} bytes holds no certificate", record.variable_data.len())
        ));
    }
    let logged_cert = X509::from_der(&record.variable_data[SIGNATURE_OWNER_SIZE..])
        .map_err(|e| SecureBootError::Format(format!("expected exactly one certificate in VariableAuthority: {}", e)))?;

    let stub_path = platform.boot_efi_path();
    let stub_image = fs::read(&stub_path).map_err(|e| SecureBootError::io(&stub_path, e))?;
    let stub_cert = extract_authenticode_certificate(&stub_image)?;

    if same_certificate(&logged_cert, &stub_cert) {
        return Ok(data.to_vec());
    }

    let stub_subject = subject_string(&stub_cert);
    if !subject_string(&logged_cert).starts_with(&subject_prefix(&stub_subject)) {
        log::debug!("Keeping third-party VariableAuthority '{}'", subject_string(&logged_cert));
        return Ok(data.to_vec());
    }

    let db_cert = get_certificates_from_var(platform, EfiVariable::Db)?
        .into_iter()
        .find(|cert| same_certificate(cert, &stub_cert))
        .ok_or_else(|| SecureBootError::Trust(format!(
            "failed to find matching certificate '{}' used by systemd-boot stub in EFI db variable", stub_subject
        )))?;

    log::info!("Boot stub is signed by a new certificate '{}', predicting PCR7 with it", stub_subject);
    let mut signature_data = record.variable_data[..SIGNATURE_OWNER_SIZE].to_vec();
    signature_data.extend_from_slice(&db_cert.to_der()?);
    record.variable_data = signature_data;
    Ok(record.encode()?)
}

/// PCR4 value expected after booting `candidate_uki` in place of the current UKI
///
/// Boot applications that cannot be found on the boot partition (firmware or BMC applications)
/// keep their logged digest.
pub fn predict_pcr4(
    platform: &Platform,
    events: &[MeasurementEvent],
    candidate_uki: &Path,
) -> Result<Vec<u8>, SecureBootError> {
    let mut pcr = initial_value();
    for event in events.iter().filter(|event| event.pcr_index == PCR_BOOT_APPLICATIONS) {
        let digest = match event.event_type {
            EventType::EvEfiBootServicesApplication => {
                boot_application_digest(platform, &event.data, candidate_uki)?
            }
            _ => None,
        };
        pcr = extend(&pcr, digest.as_deref().unwrap_or(&event.digest), true)?;
    }
    Ok(pcr)
}

/// Authenticode digest of the image an application load event refers to, `None` when the image
/// is not on the boot partition
fn boot_application_digest(
    platform: &Platform,
    data: &[u8],
    candidate_uki: &Path,
) -> Result<Option<Vec<u8>>, SecureBootError> {
    let load_event = parse_image_load_event(data)?;
    let stub_payload = STUB_PAYLOAD_GUID.to_bytes_le();

    for node in &load_event.device_path {
        if node.is_media(MEDIA_VENDOR_SUBTYPE) && node.data == stub_payload {
            let uki = read_image(candidate_uki)?
                .ok_or_else(|| SecureBootError::io(candidate_uki, io::ErrorKind::NotFound.into()))?;
            return Ok(Some(compute_authenticode_digest(&uki, UKI_KERNEL_SECTION)?));
        }

        if node.is_media(MEDIA_FILE_PATH_SUBTYPE) {
            let path = resolve_boot_path(platform, &utf16_to_string(&node.data)?, candidate_uki);
            return match read_image(&path)? {
                Some(image) => {
                    log::debug!("Measuring boot application {} into PCR4", path.display());
                    Ok(Some(authenticode_digest(&image)?))
                }
                None => Ok(None),
            };
        }
    }

    Ok(None)
}

/// Map an EFI file path onto the boot partition; any UKI resolves to the candidate
fn resolve_boot_path(platform: &Platform, efi_path: &str, candidate_uki: &Path) -> PathBuf {
    let relative = efi_path.replace('\\', "/");
    let path = platform.paths().boot_dir.join(relative.trim_start_matches('/'));
    if path.starts_with(platform.uki_dir()) {
        return candidate_uki.to_path_buf();
    }
    path
}

fn read_image(path: &Path) -> Result<Option<Vec<u8>>, SecureBootError> {
    match fs::read(path) {
        Ok(image) => Ok(Some(image)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SecureBootError::io(path, e)),
    }
}
