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

//! Secure Boot trust decisions for measured boot.
//!
//! Validates the firmware event log against the live TPM registers, predicts the PCR4 and PCR7
//! values the next boot will produce, and applies Secure Boot database updates while keeping the
//! LUKS TPM bindings in step with them.

pub mod certificates;
pub mod command;
pub mod error;
pub mod extend;
pub mod fuse;
pub mod platform;
pub mod predict;
pub mod recovery;
pub mod synthetic;
pub mod tpm;
pub mod update;
pub mod validate_pe;

pub use certificates::{
    get_certificates_from_var, uki_has_different_secure_boot_certificate, validate_pki_certificate,
};
pub use command::{CommandExecutor, OperationContext, ProcessExecutor};
pub use error::SecureBootError;
pub use extend::{measure_pcrs, PcrBank, TssPcrBank};
pub use fuse::TrustedFuse;
pub use platform::{Architecture, Platform};
pub use predict::{predict_pcr4, predict_pcr7};
pub use recovery::force_update_pcr_bindings;
pub use synthetic::synthesize_tpm_event_log;
pub use tpm::{get_validated_tpm_event_log, read_tpm_event_log, tpm_status, validate_event_log, TpmState};
pub use update::{apply_signed_efi_variable_update, check_dbx_update_would_brick_uki, update_secure_boot_certs};
pub use validate_pe::validate_pe_binaries;
