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

//! Binary parsers and PCR replay for measured boot.
//!
//! Everything in this crate is pure: inputs are byte slices, outputs are decoded structures or
//! register values. Reading files, EFI variables and TPM registers is left to callers.

pub mod byte_reader;
pub mod efi;
pub mod error;
pub mod event;
pub mod pcr;
pub mod pe;
pub mod utf16;

pub use efi::device_path::{parse_image_load_event, DevicePathNode, UefiImageLoadEvent};
pub use efi::signature_list::{parse_signature_list, SignatureListEntry};
pub use efi::variable::EfiVariable;
pub use efi::variable_data::{parse_uefi_variable_data, UefiVariableData};
pub use error::MeasurementError;
pub use event::log::{parse_event_log, EventLog};
pub use event::model::{EventType, MeasurementEvent};
pub use event::writer::EventLogWriter;
pub use pcr::{extend, replay_register};
pub use pe::{authenticode_digest, compute_authenticode_digest, extract_authenticode_certificate, section_data, uki_public_key};
