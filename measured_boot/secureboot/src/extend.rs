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

//! Extending measurements into a TPM at boot when no firmware measured them (swtpm).

use std::io::Error as IoError;
use std::str::FromStr;

use boot_measurement::parse_event_log;
use openssl::sha::sha256;
use tss_esapi::constants::response_code::Tss2ResponseCode;
use tss_esapi::handles::PcrHandle;
use tss_esapi::interface_types::algorithm::HashingAlgorithm;
use tss_esapi::structures::{Digest, DigestValues};
use tss_esapi::tcti_ldr::TctiNameConf;
use tss_esapi::Context;

use crate::error::SecureBootError;
use crate::platform::Platform;
use crate::synthetic::synthesize_tpm_event_log;

const PCR_KERNEL_IMAGE: u32 = 11;
/// Measured by systemd when the initrd is entered
const ENTER_INITRD: &[u8] = b"enter-initrd";

/// A bank of SHA-256 PCRs that can be extended
pub trait PcrBank {
    fn extend(&mut self, pcr_index: u32, digest: &[u8]) -> Result<(), SecureBootError>;
}

/// PCR bank of a TPM reached through a TCTI
///
/// A context is opened for each extend and dropped right after, so the device is never held
/// across unrelated operations.
pub struct TssPcrBank {
    tcti: TctiNameConf,
}

impl TssPcrBank {
    pub fn new(tcti: &str) -> Result<Self, SecureBootError> {
        let tcti = TctiNameConf::from_str(tcti)
            .map_err(|e| SecureBootError::Tpm(format!("Invalid TCTI configuration '{}': {}", tcti, e)))?;
        Ok(Self { tcti })
    }

    fn context_new(&self) -> Result<Context, SecureBootError> {
        Context::new(self.tcti.clone()).map_err(|e| match e {
            tss_esapi::Error::Tss2Error(Tss2ResponseCode::FormatZero(response_code)) => {
                let err = IoError::last_os_error();
                SecureBootError::Tpm(
                    format!("TPM error details: response code {:x}, system error: {}", response_code.0, err)
                )
            }
            _ => SecureBootError::Tpm(format!("Failed to create TPM context: {}", e)),
        })
    }

    fn pcr_handle(index: u32) -> Result<PcrHandle, SecureBootError> {
        let handle = match index {
            0 => PcrHandle::Pcr0,
            1 => PcrHandle::Pcr1,
            2 => PcrHandle::Pcr2,
            3 => PcrHandle::Pcr3,
            4 => PcrHandle::Pcr4,
            5 => PcrHandle::Pcr5,
            6 => PcrHandle::Pcr6,
            7 => PcrHandle::Pcr7,
            8 => PcrHandle::Pcr8,
            9 => PcrHandle::Pcr9,
            10 => PcrHandle::Pcr10,
            11 => PcrHandle::Pcr11,
            12 => PcrHandle::Pcr12,
            13 => PcrHandle::Pcr13,
            14 => PcrHandle::Pcr14,
            15 => PcrHandle::Pcr15,
            16 => PcrHandle::Pcr16,
            17 => PcrHandle::Pcr17,
            18 => PcrHandle::Pcr18,
            19 => PcrHandle::Pcr19,
            20 => PcrHandle::Pcr20,
            21 => PcrHandle::Pcr21,
            22 => PcrHandle::Pcr22,
            23 => PcrHandle::Pcr23,
            _ => return Err(SecureBootError::Tpm(format!("PCR index {} out of range", index))),
        };
        Ok(handle)
    }
}

impl PcrBank for TssPcrBank {
    fn extend(&mut self, pcr_index: u32, digest: &[u8]) -> Result<(), SecureBootError> {
        let handle = Self::pcr_handle(pcr_index)?;
        let digest = Digest::try_from(digest.to_vec())
            .map_err(|e| SecureBootError::Tpm(format!("Invalid digest for PCR{}: {}", pcr_index, e)))?;
        let mut values = DigestValues::new();
        values.set(HashingAlgorithm::Sha256, digest);

        let mut context = self.context_new()?;
        context.execute_with_nullauth_session(|ctx| ctx.pcr_extend(handle, values))
            .map_err(|e: tss_esapi::Error| SecureBootError::Tpm(format!("Failed to extend PCR{}: {}", pcr_index, e)))
    }
}

/// Populate PCR7 and PCR11 from the synthesized event log, then mark initrd entry in PCR11
///
/// Only valid with swtpm: with a physical TPM the firmware already measured the boot.
pub fn measure_pcrs(platform: &Platform, bank: &mut dyn PcrBank) -> Result<(), SecureBootError> {
    if !platform.swtpm_in_use() {
        return Err(SecureBootError::Refused(
            "refusing to measure synthesized events without swtpm in use".to_string()
        ));
    }
    let raw = synthesize_tpm_event_log(platform)?;
    let events = parse_event_log(&raw)?;

    for event in &events {
        bank.extend(event.pcr_index, &event.digest)?;
    }
    bank.extend(PCR_KERNEL_IMAGE, &sha256(ENTER_INITRD))?;

    log::info!("Measured {} synthesized events into the TPM", events.len() + 1);
    Ok(())
}
