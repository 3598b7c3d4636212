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

//! Pre-boot check that every installed EFI binary can be parsed and is trusted by firmware.

use std::fs;
use std::path::Path;

use boot_measurement::{extract_authenticode_certificate, uki_public_key, EfiVariable};
use openssl::x509::X509;

use crate::certificates::{certificate_has_key, get_certificates_from_var, parse_public_key_pem, same_certificate};
use crate::error::SecureBootError;
use crate::platform::Platform;

/// Validate the boot EFI, systemd-boot and every installed UKI
///
/// Only parses; no PCR is touched. With Secure Boot disabled the signing certificates are still
/// extracted but not checked against db/dbx.
pub fn validate_pe_binaries(platform: &Platform) -> Result<(), SecureBootError> {
    let trust = if platform.secure_boot_enabled()? {
        Some((
            get_certificates_from_var(platform, EfiVariable::Db)?,
            get_certificates_from_var(platform, EfiVariable::Dbx)?,
        ))
    } else {
        None
    };

    let mut binaries = vec![platform.boot_efi_path(), platform.systemd_boot_efi_path()];
    let ukis = platform.installed_ukis()?;
    binaries.extend(ukis.iter().cloned());

    for binary in &binaries {
        let image = fs::read(binary).map_err(|e| SecureBootError::io(binary, e))?;
        let cert = extract_authenticode_certificate(&image)
            .map_err(|e| SecureBootError::Format(format!("{} ('{}')", e, binary.display())))?;
        if let Some((db, dbx)) = &trust {
            check_trusted(binary, &cert, db, dbx)?;
        }
    }

    for uki in &ukis {
        let image = fs::read(uki).map_err(|e| SecureBootError::io(uki, e))?;
        let pem = uki_public_key(&image)
            .map_err(|e| SecureBootError::Format(format!("{} ('{}')", e, uki.display())))?;
        parse_public_key_pem(&pem)?;
    }

    log::info!("Validated {} EFI binaries", binaries.len());
    Ok(())
}

fn check_trusted(binary: &Path, cert: &X509, db: &[X509], dbx: &[X509]) -> Result<(), SecureBootError> {
    if !db.iter().any(|trusted| same_certificate(trusted, cert)) {
        return Err(SecureBootError::Trust(
            format!("'{}' is signed by a certificate not present in Secure Boot db", binary.display())
        ));
    }

    let key = cert.public_key()?;
    if dbx.iter().any(|revoked| certificate_has_key(revoked, &key)) {
        return Err(SecureBootError::Trust(
            format!("'{}' is signed by a revoked Secure Boot certificate", binary.display())
        ));
    }
    Ok(())
}
