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

//! Recovery of LUKS TPM bindings that no longer unlock.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;

use crate::certificates::read_uki_public_key;
use crate::command::OperationContext;
use crate::error::SecureBootError;
use crate::platform::Platform;
use crate::predict::{PCR_BOOT_APPLICATIONS, PCR_SECURE_BOOT_POLICY};

const PASSWORD_ENV: &str = "PASSWORD";

/// Re-bind every LUKS volume to the live PCR values and reboot
///
/// This trusts the current registers and the running UKI without replaying the event log, so it
/// is only allowed when at least one volume can no longer be unlocked by the TPM. The caller must
/// have booted with the recovery passphrase. On success the device reboots immediately.
///
/// # Errors
/// * `SecureBootError::Refused` when every volume still unlocks
/// * `SecureBootError::ToolFailure` when enrollment or the reboot fails
pub fn force_update_pcr_bindings(
    platform: &Platform,
    ctx: &OperationContext,
    os_name: &str,
    os_version: &str,
    password: &str,
) -> Result<(), SecureBootError> {
    let secure_boot = platform.secure_boot_enabled()?;
    let volumes = platform.luks_volumes(ctx)?;

    let mut needs_fixing = false;
    for (name, device) in &volumes {
        match platform.run(ctx, "cryptsetup", &["luksOpen", "--test-passphrase", device, name]) {
            Ok(_) => {}
            Err(e @ SecureBootError::Cancelled(_)) => return Err(e),
            Err(e) => {
                log::info!("Volume {} ({}) can no longer be unlocked: {}", name, device, e);
                needs_fixing = true;
                break;
            }
        }
    }
    if !needs_fixing {
        return Err(SecureBootError::Refused(
            "refusing to reset TPM encryption bindings because current state can unlock all volumes".to_string()
        ));
    }

    let pcr4 = hex::encode(platform.read_pcr(PCR_BOOT_APPLICATIONS)?);
    let pcr7 = hex::encode(platform.read_pcr(PCR_SECURE_BOOT_POLICY)?);

    let uki = platform.uki_dir().join(format!("{}_{}.efi", os_name, os_version));
    let public_key = read_uki_public_key(&uki)?;
    write_public_key(platform, &public_key)?;

    let binding = if secure_boot {
        format!("--tpm2-pcrs=7:sha256={}", pcr7)
    } else {
        format!("--tpm2-pcrs=4:sha256={}+7:sha256={}", pcr4, pcr7)
    };

    let mut envs = HashMap::new();
    envs.insert(OsString::from(PASSWORD_ENV), OsString::from(password));
    for (name, device) in &volumes {
        log::warn!("Forcing TPM binding of {} volume {} to the live PCR values", name, device);
        platform.run_with_env(ctx, "systemd-cryptenroll", &[
            "--tpm2-device=auto",
            "--wipe-slot=tpm2",
            "--tpm2-pcrlock=",
            &binding,
            device,
        ], &envs)?;
    }

    platform.run(ctx, "systemctl", &["reboot"])?;
    Ok(())
}

/// Install the expected-signer key where systemd-cryptenroll reads it
fn write_public_key(platform: &Platform, pem: &[u8]) -> Result<(), SecureBootError> {
    let path = &platform.paths().pcr_public_key;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SecureBootError::io(parent, e))?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| SecureBootError::io(path, e))?;
    file.write_all(pem).map_err(|e| SecureBootError::io(path, e))
}
