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

//! PE/COFF helpers for signed EFI binaries and unified kernel images.
//!
//! Images are parsed as PE32+ only; every boot binary this engine measures is 64-bit.

use object::pe::IMAGE_DIRECTORY_ENTRY_SECURITY;
use object::read::pe::PeFile64;
use object::{LittleEndian, Object, ObjectSection};
use openssl::pkcs7::Pkcs7;
use openssl::x509::X509;
use sha2::{Digest, Sha256};

use crate::error::MeasurementError;

/// Size of the WIN_CERTIFICATE header preceding the PKCS#7 blob
const WIN_CERTIFICATE_HEADER_SIZE: usize = 8;

/// Section of a UKI holding the PEM public key the PCR policy is signed with
pub const PCRPKEY_SECTION: &str = ".pcrpkey";

fn parse_pe(pe_bytes: &[u8]) -> Result<PeFile64<'_>, MeasurementError> {
    PeFile64::parse(pe_bytes)
        .map_err(|e| MeasurementError::Format(format!("Could not parse 64-bit PE file: {}", e)))
}

/// Return the single signing certificate from the image's security directory
///
/// # Errors
/// * `MeasurementError::Format` when the image is unsigned or its directory is out of range
/// * `MeasurementError::Certificate` unless the signature carries exactly one certificate
pub fn extract_authenticode_certificate(pe_bytes: &[u8]) -> Result<X509, MeasurementError> {
    let pe = parse_pe(pe_bytes)?;
    let directory = pe.data_directory(IMAGE_DIRECTORY_ENTRY_SECURITY)
        .ok_or_else(|| MeasurementError::Format("PE image has no security directory".to_string()))?;

    // The security directory address is a file offset, not an RVA.
    let offset = directory.virtual_address.get(LittleEndian) as usize;
    let size = directory.size.get(LittleEndian) as usize;
    if offset == 0 || size <= WIN_CERTIFICATE_HEADER_SIZE {
        return Err(MeasurementError::Format("PE image does not appear to be signed".to_string()));
    }
    let end = offset.checked_add(size)
        .filter(|end| *end <= pe_bytes.len())
        .ok_or_else(|| MeasurementError::Format(
            format!("security directory {}+{} exceeds image size {}", offset, size, pe_bytes.len())
        ))?;

    let pkcs7 = Pkcs7::from_der(&pe_bytes[offset + WIN_CERTIFICATE_HEADER_SIZE..end])
        .map_err(|e| MeasurementError::Certificate(format!("Failed to parse PKCS#7 signature: {}", e)))?;
    let certificates = pkcs7.signed()
        .and_then(|signed| signed.certificates())
        .ok_or_else(|| MeasurementError::Certificate("PKCS#7 signature carries no certificates".to_string()))?;
    if certificates.len() != 1 {
        return Err(MeasurementError::Certificate(
            format!("got {} certificates from PE image, expected exactly one", certificates.len())
        ));
    }

    certificates.iter()
        .next()
        .map(|cert| cert.to_owned())
        .ok_or_else(|| MeasurementError::Certificate("PKCS#7 certificate stack is empty".to_string()))
}

/// SHA-256 Authenticode digest of a whole PE image
pub fn authenticode_digest(pe_bytes: &[u8]) -> Result<Vec<u8>, MeasurementError> {
    let pe = parse_pe(pe_bytes)?;
    let mut hasher = Sha256::new();
    authenticode::authenticode_digest(&pe, &mut hasher)
        .map_err(|e| MeasurementError::Format(format!("Failed to compute Authenticode digest: {:?}", e)))?;
    Ok(hasher.finalize().to_vec())
}

/// Bytes of a named section trimmed to its virtual size, or `None` when absent
///
/// Raw section data is padded to the file alignment; the padding is never measured.
pub fn section_data(pe_bytes: &[u8], section_name: &str) -> Result<Option<Vec<u8>>, MeasurementError> {
    let pe = parse_pe(pe_bytes)?;
    let Some(section) = pe.section_by_name(section_name) else {
        return Ok(None);
    };
    let virtual_size = section.pe_section().virtual_size.get(LittleEndian) as usize;
    let data = section.data()
        .map_err(|e| MeasurementError::Format(format!("Failed to read section {}: {}", section_name, e)))?;
    Ok(Some(data[..virtual_size.min(data.len())].to_vec()))
}

/// Authenticode digest of the PE image embedded in a named section, such as `.linux` of a UKI
pub fn compute_authenticode_digest(pe_bytes: &[u8], section_name: &str) -> Result<Vec<u8>, MeasurementError> {
    let section = section_data(pe_bytes, section_name)?
        .ok_or_else(|| MeasurementError::Format(format!("failed to read {} section from PE image", section_name)))?;
    authenticode_digest(&section)
}

/// PEM public key embedded in a UKI's `.pcrpkey` section
pub fn uki_public_key(pe_bytes: &[u8]) -> Result<Vec<u8>, MeasurementError> {
    section_data(pe_bytes, PCRPKEY_SECTION)?
        .ok_or_else(|| MeasurementError::Format(format!("UKI has no {} section", PCRPKEY_SECTION)))
}
