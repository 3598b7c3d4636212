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

//! PCR replay: fold measurement events into a register value with TPM extend semantics.

use openssl::hash::{Hasher, MessageDigest};

use crate::error::MeasurementError;
use crate::event::model::{MeasurementEvent, SHA256_DIGEST_SIZE};

/// All-zero SHA-256 bank value every register starts from at reset
pub fn initial_value() -> Vec<u8> {
    vec![0u8; SHA256_DIGEST_SIZE]
}

/// Extend `current` with `content`
///
/// # Arguments
/// * `current` - Register value before the extend
/// * `content` - Digest to extend with when `pre_hashed`, otherwise the data to measure
/// * `pre_hashed` - Whether `content` is already a SHA-256 digest
///
/// # Returns
/// * `SHA256(current || content)` or `SHA256(current || SHA256(content))`
pub fn extend(current: &[u8], content: &[u8], pre_hashed: bool) -> Result<Vec<u8>, MeasurementError> {
    let mut hasher = Hasher::new(MessageDigest::sha256())
        .map_err(|e| MeasurementError::Internal(format!("Failed to create hasher: {}", e)))?;

    hasher.update(current)
        .map_err(|e| MeasurementError::Internal(format!("Failed to update hash with current value: {}", e)))?;

    if pre_hashed {
        hasher.update(content)
            .map_err(|e| MeasurementError::Internal(format!("Failed to update hash with digest: {}", e)))?;
    } else {
        hasher.update(&openssl::sha::sha256(content))
            .map_err(|e| MeasurementError::Internal(format!("Failed to update hash with content: {}", e)))?;
    }

    Ok(hasher.finish()
        .map_err(|e| MeasurementError::Internal(format!("Failed to finalize hash: {}", e)))?
        .to_vec())
}

/// Replay every event measured into `pcr_index`, in log order, from the all-zero seed
pub fn replay_register(events: &[MeasurementEvent], pcr_index: u32) -> Result<Vec<u8>, MeasurementError> {
    events.iter()
        .filter(|event| event.pcr_index == pcr_index)
        .try_fold(initial_value(), |current, event| extend(&current, &event.digest, true))
}
