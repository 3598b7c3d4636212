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

//! Certificates held in the Secure Boot trust databases and the keys UKIs are signed with.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use boot_measurement::{parse_signature_list, uki_public_key, EfiVariable};
use openssl::asn1::Asn1Time;
use openssl::pkey::{Id, PKey, PKeyRef, Public};
use openssl::x509::{X509, X509Ref};

use crate::error::SecureBootError;
use crate::platform::Platform;

/// Largest RSA key firmware is required to support
const MAX_FIRMWARE_RSA_BITS: u32 = 2048;
/// Leading space-separated words of a subject that identify the signing party
const SUBJECT_PREFIX_WORDS: usize = 4;

/// Parsed certificates currently stored in a signature database variable
///
/// Entries that fail to parse are dropped with a warning. Some vendors ship certificates that
/// violate the UEFI requirements but are still needed to boot option ROMs, so those are kept and
/// only warned about.
pub fn get_certificates_from_var(platform: &Platform, variable: EfiVariable) -> Result<Vec<X509>, SecureBootError> {
    if !variable.is_signature_database() {
        return Err(SecureBootError::Internal(
            format!("unable to get Secure Boot certificates for variable {}", variable)
        ));
    }

    let value = platform.read_efi_variable(variable)?;
    let mut certs: Vec<X509> = Vec::new();
    for (index, entry) in parse_signature_list(&value)?.into_iter().enumerate() {
        match (entry.certificate, entry.parse_error) {
            (Some(cert), _) => certs.push(cert),
            (None, error) => log::warn!(
                "Failed to parse Secure Boot variable '{}' certificate at index {}: {}",
                variable, index, error.unwrap_or_default()
            ),
        }
    }

    for cert in &certs {
        warn_on_invalid_certificate(variable, cert);
    }
    Ok(certs)
}

fn warn_on_invalid_certificate(variable: EfiVariable, cert: &X509Ref) {
    let subject = subject_string(cert);
    if cert.serial_number().to_bn().map(|serial| serial.is_negative()).unwrap_or(false) {
        log::warn!("Secure Boot variable '{}' contains invalid certificate '{}': serial number is negative", variable, subject);
    }

    let key = match cert.public_key() {
        Ok(key) => key,
        Err(e) => {
            log::warn!("Secure Boot variable '{}' contains invalid certificate '{}': unreadable public key: {}", variable, subject, e);
            return;
        }
    };
    if key.id() == Id::RSA {
        if key.bits() > MAX_FIRMWARE_RSA_BITS {
            log::warn!(
                "Secure Boot variable '{}' contains invalid certificate '{}': RSA key length {} is greater than {} bits",
                variable, subject, key.bits(), MAX_FIRMWARE_RSA_BITS
            );
        }
    } else {
        log::warn!(
            "Secure Boot variable '{}' contains invalid certificate '{}': expected a RSA key, got {:?}",
            variable, subject, key.id()
        );
    }
}

/// Subject in RFC 2253 order (most specific first), e.g. `CN=Boot Signing,O=Example,C=US`
pub fn subject_string(cert: &X509Ref) -> String {
    let mut parts: Vec<String> = cert.subject_name()
        .entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("UNKNOWN");
            let value = String::from_utf8_lossy(entry.data().as_slice());
            format!("{}={}", key, value)
        })
        .collect();
    parts.reverse();
    parts.join(",")
}

/// First words of a subject, used to tell our signing certificates from third-party ones
pub fn subject_prefix(subject: &str) -> String {
    subject.split(' ').take(SUBJECT_PREFIX_WORDS).collect::<Vec<_>>().join(" ")
}

/// Parse a PEM public key, ignoring the NUL padding UKI sections carry
pub fn parse_public_key_pem(pem: &[u8]) -> Result<PKey<Public>, SecureBootError> {
    let end = pem.iter().rposition(|byte| *byte != 0).map(|pos| pos + 1).unwrap_or(0);
    PKey::public_key_from_pem(&pem[..end])
        .map_err(|e| SecureBootError::Format(format!("invalid PEM public key: {}", e)))
}

/// Whether a certificate carries the given public key
pub fn certificate_has_key(cert: &X509Ref, key: &PKeyRef<Public>) -> bool {
    cert.public_key().map(|cert_key| cert_key.public_eq(key)).unwrap_or(false)
}

pub fn same_certificate(a: &X509Ref, b: &X509Ref) -> bool {
    match (a.to_der(), b.to_der()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Public key PEM embedded in a UKI image on disk
pub fn read_uki_public_key(uki: &Path) -> Result<Vec<u8>, SecureBootError> {
    let image = fs::read(uki).map_err(|e| SecureBootError::io(uki, e))?;
    uki_public_key(&image).map_err(|e| SecureBootError::Format(format!("{} ('{}')", e, uki.display())))
}

/// Verify that a key a new UKI is signed with will be accepted by firmware
///
/// The key must belong to a db certificate that is currently time valid and must not belong to
/// any dbx certificate. Firmware cannot rely on wall-clock time but a running system can, so the
/// validity window is checked here as an extra guard.
pub fn validate_pki_certificate(platform: &Platform, public_key_pem: &[u8]) -> Result<(), SecureBootError> {
    let key = parse_public_key_pem(public_key_pem)?;

    let db_certs = get_certificates_from_var(platform, EfiVariable::Db)?;
    let cert = db_certs.iter()
        .find(|cert| certificate_has_key(cert, &key))
        .ok_or_else(|| SecureBootError::Trust(
            "new UKI signed with certificate not present in Secure Boot db, refusing to continue".to_string()
        ))?;

    let now = Asn1Time::days_from_now(0)?;
    if cert.not_before().compare(&now)? == Ordering::Greater {
        return Err(SecureBootError::Trust(
            "new UKI signed with certificate that is not yet valid, refusing to continue".to_string()
        ));
    }
    if cert.not_after().compare(&now)? == Ordering::Less {
        return Err(SecureBootError::Trust(
            "new UKI signed with certificate that has expired, refusing to continue".to_string()
        ));
    }

    let dbx_certs = get_certificates_from_var(platform, EfiVariable::Dbx)?;
    if dbx_certs.iter().any(|cert| certificate_has_key(cert, &key)) {
        return Err(SecureBootError::Trust(
            "new UKI signed with revoked Secure Boot certificate, refusing to continue".to_string()
        ));
    }

    Ok(())
}

/// Whether a UKI is signed with a different key than the running system expects
pub fn uki_has_different_secure_boot_certificate(platform: &Platform, uki: &Path) -> Result<bool, SecureBootError> {
    let current_path = &platform.paths().pcr_public_key;
    let current = fs::read(current_path).map_err(|e| SecureBootError::io(current_path, e))?;
    let candidate = read_uki_public_key(uki)?;
    Ok(trim_nul(&current) != trim_nul(&candidate))
}

fn trim_nul(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|byte| *byte != 0).map(|pos| pos + 1).unwrap_or(0);
    &data[..end]
}
