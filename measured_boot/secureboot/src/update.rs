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

//! Signed EFI variable updates and re-binding of the LUKS volumes to the predicted PCR7.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use boot_measurement::{parse_signature_list, EfiVariable};
use openssl::sha::sha256;

use crate::certificates::{get_certificates_from_var, parse_public_key_pem, read_uki_public_key};
use crate::command::OperationContext;
use crate::error::SecureBootError;
use crate::platform::Platform;
use crate::predict::predict_pcr7;
use crate::tpm::get_validated_tpm_event_log;

/// Size of the EFI_TIME in front of the WIN_CERTIFICATE of an authenticated variable update
const EFI_TIME_SIZE: usize = 16;
/// Signed updates larger than this are rejected without being read
const MAX_UPDATE_SIZE: u64 = 8192;
const UPDATE_SUFFIX: &str = ".auth";
/// Message efi-updatevar reports when firmware rejects the update's signature
const PERMISSION_FAILURE: &str = "wrong filesystem permissions";

/// Refuse a dbx update that would revoke the key an installed UKI is signed with
///
/// An authenticated update is an EFI_TIME, a WIN_CERTIFICATE whose first field is its total
/// length, then the signature list to append.
pub fn check_dbx_update_would_brick_uki(platform: &Platform, dbx_update: &Path) -> Result<(), SecureBootError> {
    let content = fs::read(dbx_update).map_err(|e| SecureBootError::io(dbx_update, e))?;
    if content.len() < EFI_TIME_SIZE + 4 {
        return Err(SecureBootError::Format(format!("dbx update of {} bytes is truncated", content.len())));
    }
    let mut length = [0u8; 4];
    length.copy_from_slice(&content[EFI_TIME_SIZE..EFI_TIME_SIZE + 4]);
    let offset = EFI_TIME_SIZE + u32::from_le_bytes(length) as usize;
    let list = content.get(offset..).ok_or_else(|| SecureBootError::Format(
        format!("dbx update authentication header ends at {} past its {} bytes", offset, content.len())
    ))?;

    let entries = parse_signature_list(list)?;
    if entries.len() != 1 {
        return Err(SecureBootError::Format(
            format!("expected exactly one certificate in dbx update, got {}", entries.len())
        ));
    }
    let revoked = entries[0].certificate.as_ref().ok_or_else(|| SecureBootError::Format(
        format!("Failed to parse dbx certificate: {}", entries[0].parse_error.clone().unwrap_or_default())
    ))?;
    let revoked_key = revoked.public_key()?;

    for uki in platform.installed_ukis()? {
        let uki_key = parse_public_key_pem(&read_uki_public_key(&uki)?)?;
        if revoked_key.public_eq(&uki_key) {
            return Err(SecureBootError::BrickRisk { uki: uki.display().to_string() });
        }
    }
    Ok(())
}

/// Append a signed update to a Secure Boot database and re-bind the LUKS volumes
///
/// Nothing is changed until the update file, the dbx safety check and the event log have all
/// been validated. Once efi-updatevar has run there is no rollback: a failure while re-binding
/// leaves the device needing [`crate::recovery::force_update_pcr_bindings`].
pub fn apply_signed_efi_variable_update(
    platform: &Platform,
    ctx: &OperationContext,
    update_file: &Path,
    variable: EfiVariable,
) -> Result<(), SecureBootError> {
    fs::metadata(update_file).map_err(|e| SecureBootError::io(update_file, e))?;
    if !variable.is_signature_database() {
        return Err(SecureBootError::Refused(format!("EFI variable {} does not accept signed updates", variable)));
    }

    if variable == EfiVariable::Dbx {
        check_dbx_update_would_brick_uki(platform, update_file)?;
    }

    let events = get_validated_tpm_event_log(platform)?;

    // efivarfs sets the immutable attribute on variables by default
    let efivar = platform.efi_variable_path(variable);
    let efivar_arg = efivar.display().to_string();
    if efivar.exists() {
        platform.run(ctx, "chattr", &["-i", &efivar_arg])?;
    }

    let update_arg = update_file.display().to_string();
    platform.run(ctx, "efi-updatevar", &["-a", "-f", &update_arg, variable.name()])
        .map_err(|e| match e {
            SecureBootError::ToolFailure { ref message, .. } if message.contains(PERMISSION_FAILURE) => {
                SecureBootError::UntrustedSignature { variable: variable.name().to_string() }
            }
            other => other,
        })?;
    log::info!("Applied signed update to EFI variable {}", variable);

    let pcr7 = predict_pcr7(platform, &events)?;
    let pcrs_arg = format!("--tpm2-pcrs=7:sha256={}", hex::encode(&pcr7));
    for (name, device) in platform.luks_volumes(ctx)? {
        log::info!("Re-binding {} volume {} to the new PCR7 value", name, device);
        platform.run(ctx, "systemd-cryptenroll", &[
            "--unlock-tpm2-device=auto",
            "--tpm2-device=auto",
            "--wipe-slot=tpm2",
            "--tpm2-pcrlock=",
            &pcrs_arg,
            &device,
        ]).map_err(|e| {
            log::error!("Failed to re-bind {} after updating {}, TPM bindings need recovery: {}", device, variable, e);
            e
        })?;
    }

    Ok(())
}

/// Apply the KEK, db and dbx updates from a tar archive that are not yet installed
///
/// Members are named `<KEK|db|dbx>_<sha256 of the certificate>.auth`. Only one update is applied
/// per call because firmware must be rebooted between updates; the return value says whether a
/// reboot is needed.
pub fn update_secure_boot_certs(
    platform: &Platform,
    ctx: &OperationContext,
    tar_archive: &Path,
) -> Result<bool, SecureBootError> {
    if !platform.secure_boot_enabled()? {
        return Err(SecureBootError::Refused(
            "Secure Boot is disabled, refusing to attempt a certificate update".to_string()
        ));
    }

    let updates = read_update_archive(tar_archive)?;
    for variable in [EfiVariable::Kek, EfiVariable::Db, EfiVariable::Dbx] {
        let Some(pending) = updates.get(&variable.name()) else {
            continue;
        };
        if apply_secure_boot_updates(platform, ctx, variable, pending)? {
            return Ok(true);
        }
    }
    Ok(false)
}

type PendingUpdates = BTreeMap<&'static str, BTreeMap<String, Vec<u8>>>;

fn read_update_archive(tar_archive: &Path) -> Result<PendingUpdates, SecureBootError> {
    let file = File::open(tar_archive).map_err(|e| SecureBootError::io(tar_archive, e))?;
    let mut archive = tar::Archive::new(file);
    let mut updates: PendingUpdates = BTreeMap::new();

    for entry in archive.entries().map_err(|e| SecureBootError::io(tar_archive, e))? {
        let mut entry = entry.map_err(|e| SecureBootError::io(tar_archive, e))?;
        let name = entry.path()
            .map_err(|e| SecureBootError::io(tar_archive, e))?
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !name.ends_with(UPDATE_SUFFIX) {
            continue;
        }

        let size = entry.header().size().map_err(|e| SecureBootError::io(tar_archive, e))?;
        if size > MAX_UPDATE_SIZE {
            return Err(SecureBootError::Format(
                format!("file '{}' is greater than {} bytes, rejecting update", name, MAX_UPDATE_SIZE)
            ));
        }

        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() != 2 {
            return Err(SecureBootError::Format(format!("invalid filename '{}', rejecting update", name)));
        }
        let variable = match parts[0] {
            "KEK" => EfiVariable::Kek,
            "db" => EfiVariable::Db,
            "dbx" => EfiVariable::Dbx,
            other => return Err(SecureBootError::Format(
                format!("unsupported Secure Boot variable update type '{}'", other)
            )),
        };
        let fingerprint = parts[1].trim_end_matches(UPDATE_SUFFIX).to_string();

        let mut content = Vec::with_capacity(size as usize);
        entry.read_to_end(&mut content).map_err(|e| SecureBootError::io(tar_archive, e))?;
        updates.entry(variable.name()).or_default().insert(fingerprint, content);
    }

    Ok(updates)
}

fn apply_secure_boot_updates(
    platform: &Platform,
    ctx: &OperationContext,
    variable: EfiVariable,
    pending: &BTreeMap<String, Vec<u8>>,
) -> Result<bool, SecureBootError> {
    let existing: Vec<[u8; 32]> = get_certificates_from_var(platform, variable)?
        .iter()
        .map(|cert| cert.to_der().map(|der| sha256(&der)))
        .collect::<Result<_, _>>()?;

    for (fingerprint, content) in pending {
        let fingerprint_bytes = hex::decode(fingerprint)
            .map_err(|e| SecureBootError::Format(format!("invalid certificate fingerprint '{}': {}", fingerprint, e)))?;
        if existing.iter().any(|present| present[..] == fingerprint_bytes[..]) {
            log::debug!("Certificate SHA256:{} already present in EFI variable {}", fingerprint, variable);
            continue;
        }

        log::info!("Appending certificate SHA256:{} to EFI variable {}", fingerprint, variable);
        let mut staged = tempfile::NamedTempFile::new()
            .map_err(|e| SecureBootError::io(&std::env::temp_dir(), e))?;
        staged.write_all(content).map_err(|e| SecureBootError::io(staged.path(), e))?;
        staged.flush().map_err(|e| SecureBootError::io(staged.path(), e))?;

        match apply_signed_efi_variable_update(platform, ctx, staged.path(), variable) {
            Ok(()) => {
                log::info!("Successfully updated EFI variable {}", variable);
                return Ok(true);
            }
            Err(e) if variable == EfiVariable::Kek && !matches!(e, SecureBootError::Cancelled(_)) => {
                log::warn!("Failed to automatically apply KEK update, likely because a custom PK is configured: {}", e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(false)
}
