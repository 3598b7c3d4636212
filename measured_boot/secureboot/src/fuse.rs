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

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::SecureBootError;

/// One-way marker recording that this device can no longer provide measured-boot guarantees.
///
/// There is no way to unblow the fuse short of reinstalling the system.
#[derive(Debug, Clone)]
pub struct TrustedFuse {
    path: PathBuf,
}

impl TrustedFuse {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    pub fn is_blown(&self) -> bool {
        self.path.exists()
    }

    pub fn blow(&self) -> Result<(), SecureBootError> {
        log::warn!("Blowing trusted fuse at {}", self.path.display());
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map(|_| ())
            .map_err(|e| SecureBootError::io(&self.path, e))
    }
}
