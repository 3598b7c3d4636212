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

//! UTF-16LE helpers for firmware strings.

use crate::error::MeasurementError;

/// Decode raw UTF-16LE bytes, trimming trailing NUL characters
pub fn utf16_to_string(buf: &[u8]) -> Result<String, MeasurementError> {
    if buf.len() % 2 != 0 {
        return Err(MeasurementError::Format(
            "UTF-16 buffer must contain an even number of bytes".to_string()
        ));
    }

    let units: Vec<u16> = buf.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let decoded = String::from_utf16(&units)
        .map_err(|e| MeasurementError::Format(format!("Invalid UTF-16 string: {}", e)))?;
    Ok(decoded.trim_end_matches('\0').to_string())
}

/// Encode a string as UTF-16LE without a terminator
pub fn string_to_utf16(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}
