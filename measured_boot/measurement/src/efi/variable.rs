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

//! The closed set of UEFI variables the trust engine reads or updates.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::MeasurementError;

/// EFI_GLOBAL_VARIABLE
pub const EFI_GLOBAL_VARIABLE_GUID: Uuid = Uuid::from_u128(0x8be4df61_93ca_11d2_aa0d_00e098032b8c);
/// EFI_IMAGE_SECURITY_DATABASE_GUID
pub const EFI_IMAGE_SECURITY_DATABASE_GUID: Uuid = Uuid::from_u128(0xd719b2cb_3d3a_4596_a3bc_dad00e67656f);
/// systemd-boot loader interface vendor GUID
pub const LOADER_VARIABLE_GUID: Uuid = Uuid::from_u128(0x4a67b082_0a4c_41cf_b6c7_440b29bb8c4f);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EfiVariable {
    SecureBoot,
    SetupMode,
    DeployedMode,
    AuditMode,
    Pk,
    Kek,
    Db,
    Dbx,
    LoaderEntrySelected,
}

struct VariableEntry {
    variable: EfiVariable,
    name: &'static str,
    vendor: Uuid,
}

static VARIABLE_TABLE: [VariableEntry; 9] = [
    VariableEntry { variable: EfiVariable::SecureBoot, name: "SecureBoot", vendor: EFI_GLOBAL_VARIABLE_GUID },
    VariableEntry { variable: EfiVariable::SetupMode, name: "SetupMode", vendor: EFI_GLOBAL_VARIABLE_GUID },
    VariableEntry { variable: EfiVariable::DeployedMode, name: "DeployedMode", vendor: EFI_GLOBAL_VARIABLE_GUID },
    VariableEntry { variable: EfiVariable::AuditMode, name: "AuditMode", vendor: EFI_GLOBAL_VARIABLE_GUID },
    VariableEntry { variable: EfiVariable::Pk, name: "PK", vendor: EFI_GLOBAL_VARIABLE_GUID },
    VariableEntry { variable: EfiVariable::Kek, name: "KEK", vendor: EFI_GLOBAL_VARIABLE_GUID },
    VariableEntry { variable: EfiVariable::Db, name: "db", vendor: EFI_IMAGE_SECURITY_DATABASE_GUID },
    VariableEntry { variable: EfiVariable::Dbx, name: "dbx", vendor: EFI_IMAGE_SECURITY_DATABASE_GUID },
    VariableEntry { variable: EfiVariable::LoaderEntrySelected, name: "LoaderEntrySelected", vendor: LOADER_VARIABLE_GUID },
];

impl EfiVariable {
    fn entry(self) -> &'static VariableEntry {
        let index = match self {
            EfiVariable::SecureBoot => 0,
            EfiVariable::SetupMode => 1,
            EfiVariable::DeployedMode => 2,
            EfiVariable::AuditMode => 3,
            EfiVariable::Pk => 4,
            EfiVariable::Kek => 5,
            EfiVariable::Db => 6,
            EfiVariable::Dbx => 7,
            EfiVariable::LoaderEntrySelected => 8,
        };
        &VARIABLE_TABLE[index]
    }

    /// Variable name as firmware and efi-updatevar spell it
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn vendor_guid(self) -> Uuid {
        self.entry().vendor
    }

    /// efivarfs file name, `<Name>-<vendor guid>`
    pub fn file_name(self) -> String {
        format!("{}-{}", self.name(), self.vendor_guid())
    }

    /// Whether the variable holds a signature database that accepts signed appends
    pub fn is_signature_database(self) -> bool {
        matches!(self, EfiVariable::Pk | EfiVariable::Kek | EfiVariable::Db | EfiVariable::Dbx)
    }

    /// Look a variable up by its UEFI name and vendor GUID, as found in a measurement
    pub fn from_name_and_vendor(name: &str, vendor: &Uuid) -> Option<Self> {
        VARIABLE_TABLE.iter()
            .find(|entry| entry.name == name && entry.vendor == *vendor)
            .map(|entry| entry.variable)
    }
}

impl fmt::Display for EfiVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EfiVariable {
    type Err = MeasurementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VARIABLE_TABLE.iter()
            .find(|entry| entry.name == s)
            .map(|entry| entry.variable)
            .ok_or_else(|| MeasurementError::Format(format!("unsupported EFI variable '{}'", s)))
    }
}
