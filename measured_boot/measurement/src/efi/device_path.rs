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

//! UEFI_IMAGE_LOAD_EVENT and the device path it carries.

use crate::byte_reader::{ByteParseable, ByteReader};
use crate::error::MeasurementError;

/// Device path node type for media device paths
pub const MEDIA_DEVICE_PATH: u8 = 0x04;
/// Media subtype for vendor-defined data
pub const MEDIA_VENDOR_SUBTYPE: u8 = 0x03;
/// Media subtype for a file path
pub const MEDIA_FILE_PATH_SUBTYPE: u8 = 0x04;
/// End of hardware device path
pub const END_DEVICE_PATH_TYPE: u8 = 0x7f;

const DEVICE_PATH_NODE_HEADER_SIZE: u16 = 4;

/// One EFI_DEVICE_PATH_PROTOCOL node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePathNode {
    pub node_type: u8,
    pub sub_type: u8,
    pub data: Vec<u8>,
}

impl DevicePathNode {
    pub fn is_media(&self, sub_type: u8) -> bool {
        self.node_type == MEDIA_DEVICE_PATH && self.sub_type == sub_type
    }
}

impl ByteParseable for DevicePathNode {
    fn parse_from(parser: &mut ByteReader) -> Result<Self, MeasurementError> {
        let node_type: u8 = parser.read_u8()?;
        let sub_type: u8 = parser.read_u8()?;
        let length: u16 = parser.read_u16()?;
        if length < DEVICE_PATH_NODE_HEADER_SIZE {
            return Err(MeasurementError::Format(
                format!("device path node length {} is shorter than its header", length)
            ));
        }
        let data: Vec<u8> = parser.read_bytes(usize::from(length - DEVICE_PATH_NODE_HEADER_SIZE))?;
        Ok(Self { node_type, sub_type, data })
    }
}

/// Payload of an EV_EFI_BOOT_SERVICES_APPLICATION event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UefiImageLoadEvent {
    pub image_location_in_memory: u64,
    pub image_length_in_memory: u64,
    pub image_link_time_address: u64,
    pub device_path: Vec<DevicePathNode>,
}

impl ByteParseable for UefiImageLoadEvent {
    fn parse_from(parser: &mut ByteReader) -> Result<Self, MeasurementError> {
        let image_location_in_memory: u64 = parser.read_u64()?;
        let image_length_in_memory: u64 = parser.read_u64()?;
        let image_link_time_address: u64 = parser.read_u64()?;
        let device_path_length: u64 = parser.read_u64()?;
        let path_bytes: Vec<u8> = parser.read_bounded(device_path_length, "device path")?;

        let mut path_reader = ByteReader::new(&path_bytes);
        let mut device_path: Vec<DevicePathNode> = Vec::new();
        while !path_reader.is_end() {
            let node = DevicePathNode::parse_from(&mut path_reader)?;
            if node.node_type == END_DEVICE_PATH_TYPE {
                break;
            }
            device_path.push(node);
        }

        Ok(Self { image_location_in_memory, image_length_in_memory, image_link_time_address, device_path })
    }
}

/// Interpret an image load event's payload
pub fn parse_image_load_event(data: &[u8]) -> Result<UefiImageLoadEvent, MeasurementError> {
    let mut parser = ByteReader::new(data);
    UefiImageLoadEvent::parse_from(&mut parser)
        .map_err(|e| MeasurementError::Format(format!("Failed to parse image load event: {}", e)))
}
