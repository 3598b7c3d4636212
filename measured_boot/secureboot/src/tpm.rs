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

//! Event log acquisition, validation against the live registers, and TPM status.

use std::fmt;
use std::fs;
use std::io;

use boot_measurement::{parse_event_log, replay_register, MeasurementEvent};

use crate::error::SecureBootError;
use crate::platform::Platform;
use crate::predict::{predict_pcr7, PCR_BOOT_APPLICATIONS, PCR_SECURE_BOOT_POLICY};
use crate::synthetic::synthesize_tpm_event_log;

/// Health of the TPM-backed trust chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmState {
    /// Physical TPM, log validated and PCR7 prediction matches
    Ok,
    /// Software TPM in a consistent state
    Swtpm,
    /// A Secure Boot update was applied; PCR7 will change on the next boot
    PendingUpdate,
}

impl fmt::Display for TpmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            TpmState::Ok => "ok",
            TpmState::Swtpm => "swtpm",
            TpmState::PendingUpdate => "pending PCR7 update",
        };
        write!(f, "{}", status)
    }
}

/// Read and decode the event log without validating it
///
/// Without a kernel log (no physical TPM) the log is synthesized from current state.
pub fn read_tpm_event_log(platform: &Platform) -> Result<Vec<MeasurementEvent>, SecureBootError> {
    let path = &platform.paths().event_log;
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("No kernel event log at {}, synthesizing one", path.display());
            synthesize_tpm_event_log(platform)?
        }
        Err(e) => return Err(SecureBootError::io(path, e)),
    };
    Ok(parse_event_log(&raw)?)
}

/// Check that replaying the log reproduces the live PCR4 and PCR7 values
///
/// The log comes from an unprotected kernel interface; only a replay match makes it usable for
/// prediction.
pub fn validate_event_log(platform: &Platform, events: &[MeasurementEvent]) -> Result<(), SecureBootError> {
    for index in [PCR_BOOT_APPLICATIONS, PCR_SECURE_BOOT_POLICY] {
        let computed = replay_register(events, index)?;
        let actual = platform.read_pcr(index)?;
        if computed != actual {
            return Err(SecureBootError::Trust(format!(
                "computed PCR{} ({}) doesn't match actual value ({})",
                index, hex::encode(&computed), hex::encode(&actual)
            )));
        }
    }
    Ok(())
}

pub fn get_validated_tpm_event_log(platform: &Platform) -> Result<Vec<MeasurementEvent>, SecureBootError> {
    let events = read_tpm_event_log(platform)?;
    validate_event_log(platform, &events)?;
    Ok(events)
}

/// Compare the PCR7 predicted from current state with the live register
///
/// A mismatch on a validated log means an update was applied and the device has not rebooted
/// yet; it is reported as `PendingUpdate`, not as an error.
pub fn tpm_status(platform: &Platform) -> Result<TpmState, SecureBootError> {
    let events = get_validated_tpm_event_log(platform)?;
    let predicted = predict_pcr7(platform, &events)?;
    let actual = platform.read_pcr(PCR_SECURE_BOOT_POLICY)?;

    if predicted != actual {
        return Ok(TpmState::PendingUpdate);
    }
    if platform.swtpm_in_use() {
        return Ok(TpmState::Swtpm);
    }
    Ok(TpmState::Ok)
}
