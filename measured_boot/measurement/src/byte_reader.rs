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

//! Byte Reader Module
//!
//! Little-endian reader used by every binary parser in this crate: TCG event log records,
//! UEFI variable data, signature lists and device paths.
//!
//! The module contains two main components:
//! - `ByteReader`: a bounds-checked reader over a borrowed byte slice
//! - `ByteParseable`: types implementing this trait can be parsed directly from a `ByteReader`

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use uuid::Uuid;

use crate::error::MeasurementError;

/// UEFI GUID size
pub const UEFI_GUID_SIZE: usize = 16;

/// Upper bound for any length-prefixed field read from firmware-provided data.
pub const MAX_FIELD_SIZE: u64 = 1024 * 1024;

/// Binary data parsing helper structure
///
/// Internally uses a Cursor for reading and position tracking. Every read checks the remaining
/// length first, so a truncated input turns into a `MeasurementError::Format` instead of a panic.
pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

/// Trait for types that can be parsed from a byte stream
///
/// # Example
///
/// ```rust ignore
/// use boot_measurement::byte_reader::{ByteReader, ByteParseable};
/// use boot_measurement::MeasurementError;
///
/// struct Header {
///     size: u32,
/// }
///
/// impl ByteParseable for Header {
///     fn parse_from(parser: &mut ByteReader) -> Result<Self, MeasurementError> {
///         Ok(Self { size: parser.read_u32()? })
///     }
/// }
/// ```
pub trait ByteParseable: Sized {
    /// Parse an instance of the current type from a byte reader
    ///
    /// # Errors
    ///
    /// Returns `MeasurementError::Format` when the stream is truncated or malformed
    fn parse_from(parser: &mut ByteReader<'_>) -> Result<Self, MeasurementError>;
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Current reading position (byte offset)
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Number of unread bytes remaining
    pub fn remaining(&self) -> u64 {
        let total: u64 = self.cursor.get_ref().len() as u64;
        total.saturating_sub(self.cursor.position())
    }

    pub fn read_u8(&mut self) -> Result<u8, MeasurementError> {
        self.cursor.read_u8()
            .map_err(|e| MeasurementError::Format(format!("Failed to read u8: {}", e)))
    }

    pub fn read_u16(&mut self) -> Result<u16, MeasurementError> {
        self.cursor.read_u16::<LittleEndian>()
            .map_err(|e| MeasurementError::Format(format!("Failed to read u16: {}", e)))
    }

    pub fn read_u32(&mut self) -> Result<u32, MeasurementError> {
        self.cursor.read_u32::<LittleEndian>()
            .map_err(|e| MeasurementError::Format(format!("Failed to read u32: {}", e)))
    }

    pub fn read_u64(&mut self) -> Result<u64, MeasurementError> {
        self.cursor.read_u64::<LittleEndian>()
            .map_err(|e| MeasurementError::Format(format!("Failed to read u64: {}", e)))
    }

    /// Read bytes of specified length
    ///
    /// # Errors
    /// * Returns an error when the requested number of bytes exceeds the remaining bytes
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, MeasurementError> {
        if length as u64 > self.remaining() {
            return Err(MeasurementError::Format(
                format!("Read exceeds data range: requested {} bytes but only {} bytes remain",
                        length, self.remaining())
            ));
        }

        let mut buffer: Vec<u8> = vec![0u8; length];
        self.cursor.read_exact(&mut buffer)
            .map_err(|e| MeasurementError::Format(format!("Failed to read bytes: {}", e)))?;
        Ok(buffer)
    }

    /// Read a length-prefixed field body, refusing lengths above `MAX_FIELD_SIZE`
    ///
    /// # Parameters
    /// * `length` - Declared length taken from the input
    /// * `field` - Field name used in the error message
    pub fn read_bounded(&mut self, length: u64, field: &str) -> Result<Vec<u8>, MeasurementError> {
        if length > MAX_FIELD_SIZE {
            return Err(MeasurementError::Format(
                format!("{} too large: {} > {}", field, length, MAX_FIELD_SIZE)
            ));
        }
        self.read_bytes(length as usize)
    }

    /// Read GUID (16 bytes, mixed-endian UEFI layout)
    pub fn read_guid(&mut self) -> Result<Uuid, MeasurementError> {
        let mut guid_bytes: [u8; UEFI_GUID_SIZE] = [0; UEFI_GUID_SIZE];
        self.cursor.read_exact(&mut guid_bytes)
            .map_err(|e| MeasurementError::Format(format!("Failed to read guid: {}", e)))?;
        Ok(Uuid::from_bytes_le(guid_bytes))
    }

    /// Read `count` UTF-16LE code units without interpreting them
    ///
    /// The raw units are kept so a structure can be encoded back bit-exactly.
    pub fn read_utf16_units(&mut self, count: u64) -> Result<Vec<u16>, MeasurementError> {
        if count.saturating_mul(2) > self.remaining() {
            return Err(MeasurementError::Format(
                format!("Unicode name of {} characters exceeds remaining data {}", count, self.remaining())
            ));
        }
        let mut units: Vec<u16> = Vec::with_capacity(count as usize);
        for _ in 0..count {
            units.push(self.read_u16()?);
        }
        Ok(units)
    }

    /// Check if the end of data has been reached
    pub fn is_end(&self) -> bool {
        self.cursor.position() >= self.cursor.get_ref().len() as u64
    }

    /// Get the total data length
    pub fn get_length(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }
}
