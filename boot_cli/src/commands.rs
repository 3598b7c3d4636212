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

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extend the synthesized boot measurements into the TPM (swtpm boot only)
    MeasurePcrs,

    /// Check that the boot loader, systemd-boot and every UKI are parseable and trusted
    ValidatePeBinaries,

    /// Report whether the TPM state matches the current Secure Boot configuration
    TpmStatus,

    /// Apply a signed update to a Secure Boot database and re-bind the encrypted volumes
    ApplyEfiUpdate {
        /// Signed .auth update file
        file: PathBuf,

        /// Target variable: PK, KEK, db or dbx
        variable: String,
    },

    /// Apply pending KEK, db and dbx updates from a tar archive
    UpdateSecurebootCerts {
        /// Tar archive of <KEK|db|dbx>_<sha256>.auth files
        archive: PathBuf,
    },

    /// Check a new UKI against Secure Boot and predict the PCR4 value it will produce
    CheckUki {
        /// UKI image to check
        uki: PathBuf,
    },

    /// Re-bind the encrypted volumes to the live PCR values and reboot (recovery only)
    ForceUpdatePcrBindings {
        /// OS image name of the running UKI
        #[clap(long)]
        os_name: String,

        /// OS version of the running UKI
        #[clap(long)]
        os_version: String,
    },
}
