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

//! Event Parsing Module
//!
//! Digest parsing for TCG 1.2 and crypto-agile records and the Spec ID header event.

use crate::byte_reader::{ByteParseable, ByteReader, MAX_FIELD_SIZE};
use crate::error::MeasurementError;
use crate::event::model::{
    AlgorithmDigestSize, SpecIdEvent, SHA1_DIGEST_SIZE, SHA256_DIGEST_SIZE, SPEC_ID_EVENT_SIGNATURE_03,
    TCG_DIGEST_ALGORITHM_COUNT, TPM_ALG_SHA256,
};

/// TCG Digest Parsing Trait
///
/// Different TCG specification versions have different digest formats; the header record uses
/// the TCG 1.2 layout and every following record uses the crypto-agile layout.
pub trait TcgDigestParse {
    /// Parses digest data from a byte stream and returns the SHA-256 digest, if the record
    /// carries one
    ///
    /// # Errors
    /// * `MeasurementError::Format` - If the digest area is truncated or malformed
    fn parse_digest(&self, cursor: &mut ByteReader) -> Result<Option<Vec<u8>>, MeasurementError>;
}

/// TCG 1.2 version digest parser
pub struct TcgDigestParseV1;

/// Crypto-agile digest parser, sized by the algorithms announced in the Spec ID event
pub struct TcgDigestParseV2<'a> {
    pub spec_id: &'a SpecIdEvent,
}

/// TCG 1.2 digest contains only a single SHA-1 digest field
impl TcgDigestParse for TcgDigestParseV1 {
    fn parse_digest(&self, cursor: &mut ByteReader) -> Result<Option<Vec<u8>>, MeasurementError> {
        cursor.read_bytes(SHA1_DIGEST_SIZE)?;
        Ok(None)
    }
}

/// Crypto-agile digests: a count followed by (algorithm ID, digest) pairs
impl TcgDigestParse for TcgDigestParseV2<'_> {
    fn parse_digest(&self, cursor: &mut ByteReader) -> Result<Option<Vec<u8>>, MeasurementError> {
        let digest_count: u32 = cursor.read_u32()
            .map_err(|e| MeasurementError::Format(format!("Failed to read digest count: {}", e)))?;

        if digest_count as usize > self.spec_id.algorithms.len() {
            return Err(MeasurementError::Format(format!("Invalid digest count: {}", digest_count)));
        }

        let mut sha256: Option<Vec<u8>> = None;
        for _ in 0..digest_count {
            let algorithm_id: u16 = cursor.read_u16()
                .map_err(|e| MeasurementError::Format(format!("Failed to read algorithm ID: {}", e)))?;
            let digest_size = self.spec_id.digest_size(algorithm_id)
                .ok_or_else(|| MeasurementError::Format(
                    format!("Algorithm 0x{:04x} not announced in the log header", algorithm_id)
                ))?;
            let digest: Vec<u8> = cursor.read_bytes(digest_size)?;
            if algorithm_id == TPM_ALG_SHA256 {
                sha256 = Some(digest);
            }
        }
        Ok(sha256)
    }
}

impl ByteParseable for SpecIdEvent {
    /// Parses the TCG_EfiSpecIDEvent structure
    ///
    /// Only the "Spec ID Event03" signature is accepted; a TCG 1.2 log has no SHA-256 bank.
    fn parse_from(parser: &mut ByteReader) -> Result<Self, MeasurementError> {
        let signature: Vec<u8> = parser.read_bytes(SPEC_ID_EVENT_SIGNATURE_03.len())?;
        if signature != SPEC_ID_EVENT_SIGNATURE_03 {
            return Err(MeasurementError::Format(
                "Event log does not start with a Spec ID Event03 header".to_string()
            ));
        }
        let platform_class: u32 = parser.read_u32()?;
        let spec_version_minor: u8 = parser.read_u8()?;
        let spec_version_major: u8 = parser.read_u8()?;
        let spec_errata: u8 = parser.read_u8()?;
        let uintn_size: u8 = parser.read_u8()?;
        let number_of_algorithms: u32 = parser.read_u32()?;
        if number_of_algorithms == 0 || number_of_algorithms as usize > TCG_DIGEST_ALGORITHM_COUNT {
            return Err(MeasurementError::Format(
                format!("Invalid number of algorithms: {}", number_of_algorithms)
            ));
        }

        let mut algorithms: Vec<AlgorithmDigestSize> = Vec::with_capacity(number_of_algorithms as usize);
        for _ in 0..number_of_algorithms {
            let algorithm_id: u16 = parser.read_u16()?;
            let digest_size: u16 = parser.read_u16()?;
            if algorithm_id == TPM_ALG_SHA256 && digest_size as usize != SHA256_DIGEST_SIZE {
                return Err(MeasurementError::Format(
                    format!("Invalid SHA-256 digest size in log header: {}", digest_size)
                ));
            }
            algorithms.push(AlgorithmDigestSize { algorithm_id, digest_size });
        }

        let vendor_info_size: u8 = parser.read_u8()?;
        let vendor_info: Vec<u8> = parser.read_bytes(vendor_info_size as usize)?;

        Ok(SpecIdEvent {
            platform_class,
            spec_version_minor,
            spec_version_major,
            spec_errata,
            uintn_size,
            algorithms,
            vendor_info,
        })
    }
}

/// Read a u32 length followed by that many bytes, bounded by `MAX_FIELD_SIZE`
pub(crate) fn read_sized_field(parser: &mut ByteReader, field: &str) -> Result<Vec<u8>, MeasurementError> {
    let size: u32 = parser.read_u32()
        .map_err(|e| MeasurementError::Format(format!("Failed to read {} size: {}", field, e)))?;
    if u64::from(size) > MAX_FIELD_SIZE {
        return Err(MeasurementError::Format(
            format!("{} too large: {} > {}", field, size, MAX_FIELD_SIZE)
        ));
    }
    if u64::from(size) > parser.remaining() {
        return Err(MeasurementError::Format(
            format!("{} size {} exceeds remaining data {}", field, size, parser.remaining())
        ));
    }
    parser.read_bytes(size as usize)
}
