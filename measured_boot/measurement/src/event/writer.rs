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

//! Event log serialization for logs reconstructed in user space.

use byteorder::{LittleEndian, WriteBytesExt};
use openssl::sha::sha256;

use crate::error::MeasurementError;
use crate::event::model::{EventType, SpecIdEvent, SHA1_DIGEST_SIZE, SPEC_ID_EVENT_SIGNATURE_03, TPM_ALG_SHA256};

/// Builds a crypto-agile log whose only bank is SHA-256.
///
/// The header record is written on construction; every event's digest is SHA-256 of the content
/// handed to [`EventLogWriter::write_event`].
pub struct EventLogWriter {
    buffer: Vec<u8>,
}

impl EventLogWriter {
    pub fn new() -> Result<Self, MeasurementError> {
        let mut writer = Self { buffer: Vec::new() };
        writer.write_header(&SpecIdEvent::sha256_only())?;
        Ok(writer)
    }

    fn write_header(&mut self, spec_id: &SpecIdEvent) -> Result<(), MeasurementError> {
        let mut body: Vec<u8> = Vec::new();
        body.extend_from_slice(SPEC_ID_EVENT_SIGNATURE_03);
        body.write_u32::<LittleEndian>(spec_id.platform_class).map_err(write_error)?;
        body.push(spec_id.spec_version_minor);
        body.push(spec_id.spec_version_major);
        body.push(spec_id.spec_errata);
        body.push(spec_id.uintn_size);
        body.write_u32::<LittleEndian>(spec_id.algorithms.len() as u32).map_err(write_error)?;
        for alg in &spec_id.algorithms {
            body.write_u16::<LittleEndian>(alg.algorithm_id).map_err(write_error)?;
            body.write_u16::<LittleEndian>(alg.digest_size).map_err(write_error)?;
        }
        body.push(spec_id.vendor_info.len() as u8);
        body.extend_from_slice(&spec_id.vendor_info);

        self.buffer.write_u32::<LittleEndian>(0).map_err(write_error)?;
        self.buffer.write_u32::<LittleEndian>(EventType::EvNoAction.as_u32()).map_err(write_error)?;
        self.buffer.extend_from_slice(&[0u8; SHA1_DIGEST_SIZE]);
        self.buffer.write_u32::<LittleEndian>(body.len() as u32).map_err(write_error)?;
        self.buffer.extend_from_slice(&body);
        Ok(())
    }

    /// Append one event measuring `contents` into `pcr_index`
    pub fn write_event(&mut self, pcr_index: u32, event_type: EventType, contents: &[u8]) -> Result<(), MeasurementError> {
        let size = u32::try_from(contents.len())
            .map_err(|_| MeasurementError::Format(format!("Event content of {} bytes is too large", contents.len())))?;
        self.buffer.write_u32::<LittleEndian>(pcr_index).map_err(write_error)?;
        self.buffer.write_u32::<LittleEndian>(event_type.as_u32()).map_err(write_error)?;
        self.buffer.write_u32::<LittleEndian>(1).map_err(write_error)?;
        self.buffer.write_u16::<LittleEndian>(TPM_ALG_SHA256).map_err(write_error)?;
        self.buffer.extend_from_slice(&sha256(contents));
        self.buffer.write_u32::<LittleEndian>(size).map_err(write_error)?;
        self.buffer.extend_from_slice(contents);
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

fn write_error(e: std::io::Error) -> MeasurementError {
    MeasurementError::Internal(format!("Failed to write event log: {}", e))
}
