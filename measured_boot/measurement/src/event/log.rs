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

//! Event Log Parsing
//!
//! Parses a crypto-agile TCG event log into SHA-256 measurement events.
//!
//! The log is read from an unprotected kernel interface (or synthesized in user space), so it is
//! treated as hostile input: every field is bounds-checked and the first malformed record aborts
//! parsing with a `MeasurementError::Format` naming the record number.

use log::debug;

use crate::byte_reader::{ByteParseable, ByteReader};
use crate::error::MeasurementError;
use crate::event::model::{EventType, MeasurementEvent, SpecIdEvent};
use crate::event::parser::{read_sized_field, TcgDigestParse, TcgDigestParseV1, TcgDigestParseV2};

/// TPM Event Log
///
/// # Fields
/// * `event_number` - Number of records consumed, including the header and skipped records
/// * `spec_id` - The Spec ID header announcing digest sizes
/// * `events` - SHA-256 events in log order
#[derive(Debug, Clone)]
pub struct EventLog {
    pub event_number: u32,
    pub spec_id: SpecIdEvent,
    pub events: Vec<MeasurementEvent>,
}

impl EventLog {
    /// Parse event log
    ///
    /// Records without a SHA-256 digest are skipped; they are not an error.
    ///
    /// # Errors
    /// * `MeasurementError::Format` when the header is not a Spec ID Event03 record, or any record
    ///   is truncated, oversized, or uses an algorithm the header did not announce
    pub fn parse(data: &[u8]) -> Result<Self, MeasurementError> {
        if data.is_empty() {
            return Err(MeasurementError::Format("Event log is empty".to_string()));
        }

        let mut parser = ByteReader::new(data);
        let spec_id = Self::parse_header(&mut parser)?;
        let mut log = EventLog { event_number: 1, spec_id, events: Vec::new() };

        let spec_id = log.spec_id.clone();
        let digest_parser = TcgDigestParseV2 { spec_id: &spec_id };
        while !parser.is_end() {
            let entry = log.parse_event_entry(&mut parser, &digest_parser)?;
            match entry {
                Some(event) => log.events.push(event),
                None => debug!("Skipping event {} without a SHA-256 digest", log.event_number),
            }
            log.event_number += 1;
        }

        Ok(log)
    }

    /// Parse the header record
    ///
    /// The first record uses the TCG 1.2 layout and carries the Spec ID event as its data.
    fn parse_header(parser: &mut ByteReader) -> Result<SpecIdEvent, MeasurementError> {
        let _pcr_index: u32 = parser.read_u32()
            .map_err(|e| MeasurementError::Format(format!("Failed to read header PCR index: {}", e)))?;
        let event_type_raw: u32 = parser.read_u32()
            .map_err(|e| MeasurementError::Format(format!("Failed to read header event type: {}", e)))?;
        if EventType::from_u32(event_type_raw) != Some(EventType::EvNoAction) {
            return Err(MeasurementError::Format(
                format!("Header event type 0x{:08x} is not EV_NO_ACTION", event_type_raw)
            ));
        }
        TcgDigestParseV1.parse_digest(parser)?;
        let event_data: Vec<u8> = read_sized_field(parser, "header event data")?;

        let mut header_reader = ByteReader::new(&event_data);
        SpecIdEvent::parse_from(&mut header_reader)
    }

    /// Parse a single crypto-agile event entry
    ///
    /// # Returns
    /// * `Ok(None)` - The record is well formed but has no SHA-256 digest
    fn parse_event_entry(
        &self,
        parser: &mut ByteReader,
        digest_parser: &dyn TcgDigestParse,
    ) -> Result<Option<MeasurementEvent>, MeasurementError> {
        // 1. Read PCR index
        let pcr_index: u32 = parser.read_u32()
            .map_err(|e| MeasurementError::Format(
                format!("Failed to read PCR index: {}, event_number: {}", e, self.event_number)
            ))?;

        // 2. Read event type; unknown types still replay through their digest
        let event_type_raw: u32 = parser.read_u32()
            .map_err(|e| MeasurementError::Format(
                format!("Failed to read event type: {}, event_number: {}", e, self.event_number)
            ))?;
        let event_type: EventType = EventType::from_u32(event_type_raw)
            .unwrap_or(EventType::Unknown);

        // 3. Read digests
        let digest: Option<Vec<u8>> = digest_parser.parse_digest(parser)
            .map_err(|e| MeasurementError::Format(
                format!("Failed to parse digest: {}, event_number: {}, event_type: {}",
                    e, self.event_number, event_type)
            ))?;

        // 4. Read event data
        let data: Vec<u8> = read_sized_field(parser, "event data")
            .map_err(|e| MeasurementError::Format(
                format!("{}, event_number: {}, event_type: {}", e, self.event_number, event_type)
            ))?;

        Ok(digest.map(|digest| MeasurementEvent {
            sequence: self.event_number,
            pcr_index,
            event_type,
            digest,
            data,
        }))
    }
}

/// Decode a raw log into its SHA-256 measurement events
pub fn parse_event_log(data: &[u8]) -> Result<Vec<MeasurementEvent>, MeasurementError> {
    EventLog::parse(data).map(|log| log.events)
}
