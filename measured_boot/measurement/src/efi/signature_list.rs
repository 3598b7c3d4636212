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

//! EFI_SIGNATURE_LIST decoding for the PK, KEK, db and dbx variables.
//!
//! A single certificate that fails to parse does not fail the list: firmware vendors ship
//! malformed certificates often enough that callers need to see the rest of the database.

use openssl::x509::X509;
use uuid::Uuid;

use crate::byte_reader::{ByteReader, MAX_FIELD_SIZE};
use crate::error::MeasurementError;

/// EFI_CERT_X509_GUID
pub const EFI_CERT_X509_GUID: Uuid = Uuid::from_u128(0xa5c059a1_94e4_4aa7_87b5_ab155c2bf072);

/// Fixed EFI_SIGNATURE_LIST header: type GUID, list size, header size, signature size
pub const SIGNATURE_LIST_HEADER_SIZE: usize = 28;

/// Size of the owner GUID in front of each EFI_SIGNATURE_DATA
const SIGNATURE_OWNER_SIZE: u32 = 16;

/// One EFI_SIGNATURE_DATA entry of an X.509 signature list
#[derive(Debug, Clone)]
pub struct SignatureListEntry {
    pub owner: Uuid,
    /// DER bytes exactly as stored in the variable
    pub raw: Vec<u8>,
    pub certificate: Option<X509>,
    pub parse_error: Option<String>,
}

impl SignatureListEntry {
    fn from_der(owner: Uuid, raw: Vec<u8>) -> Self {
        match X509::from_der(&raw) {
            Ok(cert) => Self { owner, raw, certificate: Some(cert), parse_error: None },
            Err(e) => Self { owner, raw, certificate: None, parse_error: Some(e.to_string()) },
        }
    }

    /// Owner GUID in on-disk byte order followed by the certificate, as measured for an
    /// EV_EFI_VARIABLE_AUTHORITY event
    pub fn signature_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.raw.len() + SIGNATURE_OWNER_SIZE as usize);
        data.extend_from_slice(&self.owner.to_bytes_le());
        data.extend_from_slice(&self.raw);
        data
    }
}

/// Decode every signature list in a signature database variable
///
/// # Errors
/// * `MeasurementError::Format` for a truncated or oversized list, or a list whose type is not
///   EFI_CERT_X509_GUID
pub fn parse_signature_list(data: &[u8]) -> Result<Vec<SignatureListEntry>, MeasurementError> {
    if data.len() < SIGNATURE_LIST_HEADER_SIZE {
        return Ok(Vec::new());
    }

    let mut parser = ByteReader::new(data);
    let mut entries: Vec<SignatureListEntry> = Vec::new();
    while !parser.is_end() {
        let signature_type: Uuid = parser.read_guid()?;
        let list_size: u32 = parser.read_u32()?;
        let header_size: u32 = parser.read_u32()?;
        let signature_size: u32 = parser.read_u32()?;

        if u64::from(header_size) > MAX_FIELD_SIZE {
            return Err(MeasurementError::Format(
                format!("signature header too large: {} > {}", header_size, MAX_FIELD_SIZE)
            ));
        }
        if u64::from(list_size) > MAX_FIELD_SIZE {
            return Err(MeasurementError::Format(
                format!("signature list too large: {} > {}", list_size, MAX_FIELD_SIZE)
            ));
        }
        if signature_type != EFI_CERT_X509_GUID {
            return Err(MeasurementError::Format(format!("unhandled signature type {}", signature_type)));
        }
        let body_size = list_size
            .checked_sub(SIGNATURE_LIST_HEADER_SIZE as u32)
            .and_then(|size| size.checked_sub(header_size))
            .ok_or_else(|| MeasurementError::Format(
                format!("signature list size {} smaller than its headers", list_size)
            ))?;
        if signature_size <= SIGNATURE_OWNER_SIZE {
            return Err(MeasurementError::Format(format!("invalid signature size {}", signature_size)));
        }

        parser.read_bounded(u64::from(header_size), "signature header")?;

        let mut offset: u32 = 0;
        while offset < body_size {
            let owner: Uuid = parser.read_guid()?;
            let raw: Vec<u8> = parser.read_bounded(
                u64::from(signature_size - SIGNATURE_OWNER_SIZE), "signature data"
            )?;
            entries.push(SignatureListEntry::from_der(owner, raw));
            offset = offset.saturating_add(signature_size);
        }
    }

    Ok(entries)
}
