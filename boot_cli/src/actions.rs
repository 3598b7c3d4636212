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

use std::env;

use anyhow::{Context, Result};
use boot_config::BootTrustConfig;
use boot_measurement::EfiVariable;
use secureboot::certificates::read_uki_public_key;
use secureboot::{
    apply_signed_efi_variable_update, force_update_pcr_bindings, get_validated_tpm_event_log, measure_pcrs,
    predict_pcr4, tpm_status, uki_has_different_secure_boot_certificate, update_secure_boot_certs,
    validate_pe_binaries, validate_pki_certificate, OperationContext, Platform, TrustedFuse, TssPcrBank,
};

use crate::commands::Commands;

/// Environment variable carrying the LUKS recovery passphrase
pub const PASSWORD_ENV: &str = "BOOT_TRUST_LUKS_PASSWORD";

pub fn dispatch(
    command: &Commands,
    platform: &Platform,
    config: &BootTrustConfig,
    ctx: &OperationContext,
) -> Result<()> {
    match command {
        Commands::MeasurePcrs => {
            let mut bank = TssPcrBank::new(&config.tpm.tcti)?;
            measure_pcrs(platform, &mut bank)?;
        },
        Commands::ValidatePeBinaries => validate_pe_binaries(platform)?,
        Commands::TpmStatus => {
            let state = tpm_status(platform)?;
            println!("{}", state);
            if TrustedFuse::new(&config.paths.trusted_fuse).is_blown() {
                println!("trusted fuse blown");
            }
        },
        Commands::ApplyEfiUpdate { file, variable } => {
            let variable: EfiVariable = variable.parse()?;
            apply_signed_efi_variable_update(platform, ctx, file, variable)?;
        },
        Commands::UpdateSecurebootCerts { archive } => {
            if update_secure_boot_certs(platform, ctx, archive)? {
                println!("reboot required");
            }
        },
        Commands::CheckUki { uki } => {
            let public_key = read_uki_public_key(uki)?;
            validate_pki_certificate(platform, &public_key)?;
            if uki_has_different_secure_boot_certificate(platform, uki)? {
                println!("signing certificate changed");
            }
            let events = get_validated_tpm_event_log(platform)?;
            println!("pcr4: {}", hex::encode(predict_pcr4(platform, &events, uki)?));
        },
        Commands::ForceUpdatePcrBindings { os_name, os_version } => {
            let password = env::var(PASSWORD_ENV)
                .with_context(|| format!("{} must hold the LUKS recovery passphrase", PASSWORD_ENV))?;
            force_update_pcr_bindings(platform, ctx, os_name, os_version, &password)?;
        },
    }
    Ok(())
}
