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

use thiserror::Error;

/// Errors produced while decoding measurement structures.
///
/// Every binary input handled by this crate (event logs, EFI variables, PE images) is treated as
/// hostile, so malformed input is always a `Format` error and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeasurementError {
    #[error("Format error: {0}")]
    Format(String),
    #[error("Certificate error: {0}")]
    Certificate(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<openssl::error::ErrorStack> for MeasurementError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        MeasurementError::Internal(format!("openssl: {}", e))
    }
}
