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

//! UEFI_VARIABLE_DATA, the payload of EV_EFI_VARIABLE_DRIVER_CONFIG and
//! EV_EFI_VARIABLE_AUTHORITY events.

use byteorder::{LittleEndian, WriteBytesExt};
use uuid::Uuid;

use crate::byte_reader::{ByteParseable, ByteReader, MAX_FIELD_SIZE, UEFI_GUID_SIZE};
use crate::efi::variable::EfiVariable;
use crate::error::MeasurementError;

/// Decoded UEFI_VARIABLE_DATA record
///
/// The name is kept as raw UTF-16 code units so that [`UefiVariableData::encode`] reproduces the
/// measured bytes exactly when only `variable_data` is substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UefiVariableData {
    pub variable_name: Uuid,
    pub unicode_name: Vec<u16>,
    pub variable_data: Vec<u8>,
}

impl UefiVariableData {
    pub fn new(variable: EfiVariable, variable_data: Vec<u8>) -> Self {
        Self {
            variable_name: variable.vendor_guid(),
            unicode_name: variable.name().encode_utf16().collect(),
            variable_data,
        }
    }

    /// Variable name decoded from UTF-16, with trailing NULs removed
    pub fn name(&self) -> String {
        String::from_utf16_lossy(&self.unicode_name).trim_end_matches('\0').to_string()
    }

    /// The known variable this record measures, if any
    pub fn variable(&self) -> Option<EfiVariable> {
        EfiVariable::from_name_and_vendor(&self.name(), &self.variable_name)
    }

    /// Serialize back to the measured byte layout
    pub fn encode(&self) -> Result<Vec<u8>, MeasurementError> {
        let mut buf: Vec<u8> = Vec::with_capacity(
            UEFI_GUID_SIZE + 16 + self.unicode_name.len() * 2 + self.variable_data.len()
        );
        buf.extend_from_slice(&self.variable_name.to_bytes_le());
        buf.write_u64::<LittleEndian>(self.unicode_name.len() as u64).map_err(encode_error)?;
        buf.write_u64::<LittleEndian>(self.variable_data.len() as u64).map_err(encode_error)?;
        for unit in &self.unicode_name {
            buf.write_u16::<LittleEndian>(*unit).map_err(encode_error)?;
        }
        buf.extend_from_slice(&self.variable_data);
        Ok(buf)
    }
}

impl ByteParseable for UefiVariableData {
    /// Parses GUID, name length, data length, name and data
    fn parse_from(parser: &mut ByteReader) -> Result<Self, MeasurementError> {
        let variable_name: Uuid = parser.read_guid()?;
        let unicode_name_length: u64 = parser.read_u64()?;
        let variable_data_length: u64 = parser.read_u64()?;
        if unicode_name_length > MAX_FIELD_SIZE {
            return Err(MeasurementError::Format(
                format!("unicode name too large: {} > {}", unicode_name_length, MAX_FIELD_SIZE)
            ));
        }
        let unicode_name: Vec<u16> = parser.read_utf16_units(unicode_name_length)?;
        let variable_data: Vec<u8> = parser.read_bounded(variable_data_length, "variable data")?;
        Ok(Self { variable_name, unicode_name, variable_data })
    }
}

/// Interpret a variable event's payload
pub fn parse_uefi_variable_data(data: &[u8]) -> Result<UefiVariableData, MeasurementError> {
    let mut parser = ByteReader::new(data);
    UefiVariableData::parse_from(&mut parser)
        .map_err(|e| MeasurementError::Format(format!("Failed to parse UEFI variable data: {}", e)))
}

fn encode_error(e: std::io::Error) -> MeasurementError {
    MeasurementError::Internal(format!("Failed to encode UEFI variable data: {}", e))
}
