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

use std::io;
use std::path::Path;

use boot_measurement::MeasurementError;
use thiserror::Error;

/// Errors raised by the Secure Boot trust engine.
///
/// `Format` and `Trust` are never retried: the first means an input is corrupt or hostile, the
/// second that the current state must not be trusted. `BrickRisk` and `Refused` are raised before
/// anything on the device is changed.
#[derive(Debug, Error)]
pub enum SecureBootError {
    #[error("Format error: {0}")]
    Format(String),
    #[error("Trust error: {0}")]
    Trust(String),
    #[error("unable to apply dbx update, since UKI image '{uki}' is signed by the key which would be revoked")]
    BrickRisk { uki: String },
    #[error("command '{command}' failed: {message}")]
    ToolFailure { command: String, message: String },
    #[error("failed to apply {variable} update, likely due to a bad/untrusted signature")]
    UntrustedSignature { variable: String },
    #[error("{0}")]
    Refused(String),
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
    #[error("TPM error: {0}")]
    Tpm(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SecureBootError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        SecureBootError::Io { path: path.display().to_string(), source }
    }

    /// Whether the error came from a missing file
    pub fn is_not_found(&self) -> bool {
        matches!(self, SecureBootError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl From<MeasurementError> for SecureBootError {
    fn from(e: MeasurementError) -> Self {
        match e {
            MeasurementError::Format(msg) | MeasurementError::Certificate(msg) => SecureBootError::Format(msg),
            MeasurementError::Internal(msg) => SecureBootError::Internal(msg),
        }
    }
}

impl From<openssl::error::ErrorStack> for SecureBootError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        SecureBootError::Internal(format!("openssl: {}", e))
    }
}
