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

mod common;

use boot_measurement::event::model::{EventType, SHA256_DIGEST_SIZE, TPM_ALG_SHA256};
use boot_measurement::{
    compute_authenticode_digest, authenticode_digest, extend, extract_authenticode_certificate,
    parse_event_log, parse_signature_list, replay_register, section_data, uki_public_key,
    EventLogWriter, MeasurementError, MeasurementEvent,
};
use common::{kernel_image, x509_signature_list, PeBuilder, TestSigner};
use openssl::sha::sha256;
use uuid::Uuid;

const TPM_ALG_SHA1: u16 = 0x0004;

/// Header record announcing SHA-1 and SHA-256, as real firmware logs do
fn dual_bank_header() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"Spec ID Event03\0");
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&[0, 2, 0, 2]);
    body.extend_from_slice(&2u32.to_le_bytes());
    body.extend_from_slice(&TPM_ALG_SHA1.to_le_bytes());
    body.extend_from_slice(&20u16.to_le_bytes());
    body.extend_from_slice(&TPM_ALG_SHA256.to_le_bytes());
    body.extend_from_slice(&32u16.to_le_bytes());
    body.push(0);

    let mut log = Vec::new();
    log.extend_from_slice(&0u32.to_le_bytes());
    log.extend_from_slice(&EventType::EvNoAction.as_u32().to_le_bytes());
    log.extend_from_slice(&[0u8; 20]);
    log.extend_from_slice(&(body.len() as u32).to_le_bytes());
    log.extend_from_slice(&body);
    log
}

fn raw_record(pcr: u32, event_type: EventType, digests: &[(u16, Vec<u8>)], data: &[u8]) -> Vec<u8> {
    let mut record = Vec::new();
    record.extend_from_slice(&pcr.to_le_bytes());
    record.extend_from_slice(&event_type.as_u32().to_le_bytes());
    record.extend_from_slice(&(digests.len() as u32).to_le_bytes());
    for (alg, digest) in digests {
        record.extend_from_slice(&alg.to_le_bytes());
        record.extend_from_slice(digest);
    }
    record.extend_from_slice(&(data.len() as u32).to_le_bytes());
    record.extend_from_slice(data);
    record
}

fn event(pcr_index: u32, content: &[u8]) -> MeasurementEvent {
    MeasurementEvent {
        sequence: 0,
        pcr_index,
        event_type: EventType::EvIpl,
        digest: sha256(content).to_vec(),
        data: content.to_vec(),
    }
}

#[test]
fn test_written_log_parses_back() {
    // Test Objective: a log produced by EventLogWriter decodes into the same events
    // Expected Result: three events, in order, each digest the SHA-256 of its content
    let mut writer = EventLogWriter::new().unwrap();
    writer.write_event(7, EventType::EvEfiVariableDriverConfig, b"secureboot").unwrap();
    writer.write_event(7, EventType::EvSeparator, &[0u8; 4]).unwrap();
    writer.write_event(11, EventType::EvIpl, b".linux\0").unwrap();

    let events = parse_event_log(&writer.into_bytes()).unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].pcr_index, 7);
    assert_eq!(events[0].event_type, EventType::EvEfiVariableDriverConfig);
    assert_eq!(events[1].digest, sha256(&[0u8; 4]).to_vec());
    assert_eq!(events[2].data, b".linux\0".to_vec());
    assert_eq!(events[2].sequence, 3);
}

#[test]
fn test_empty_log_is_rejected() {
    assert!(matches!(parse_event_log(&[]), Err(MeasurementError::Format(_))));
}

#[test]
fn test_header_must_be_no_action() {
    let mut log = dual_bank_header();
    log[4..8].copy_from_slice(&EventType::EvSeparator.as_u32().to_le_bytes());
    let err = parse_event_log(&log).unwrap_err();
    assert!(err.to_string().contains("EV_NO_ACTION"));
}

#[test]
fn test_sha1_only_records_are_skipped() {
    // Test Objective: records without a SHA-256 digest are dropped without failing the log
    // Expected Result: only the dual-bank record survives, carrying its SHA-256 digest
    let mut log = dual_bank_header();
    log.extend(raw_record(0, EventType::EvPostCode, &[(TPM_ALG_SHA1, vec![1u8; 20])], b"sha1"));
    log.extend(raw_record(
        0,
        EventType::EvPostCode,
        &[(TPM_ALG_SHA1, vec![2u8; 20]), (TPM_ALG_SHA256, vec![3u8; 32])],
        b"both",
    ));

    let events = parse_event_log(&log).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].digest, vec![3u8; 32]);
    assert_eq!(events[0].data, b"both".to_vec());
}

#[test]
fn test_header_with_wrong_sha256_size_is_rejected() {
    // Test Objective: a header announcing SHA-256 with a 20-byte digest cannot be parsed
    // Expected Result: Format error instead of events with short digests
    let mut log = dual_bank_header();
    // record header (32) + signature, class, version, count (28) + SHA-1 entry (4) + SHA-256 id (2)
    let size_offset = 32 + 28 + 4 + 2;
    assert_eq!(&log[size_offset..size_offset + 2], &32u16.to_le_bytes());
    log[size_offset..size_offset + 2].copy_from_slice(&20u16.to_le_bytes());
    log.extend(raw_record(0, EventType::EvPostCode, &[(TPM_ALG_SHA256, vec![0u8; 20])], b""));

    assert!(matches!(parse_event_log(&log), Err(MeasurementError::Format(_))));
}

#[test]
fn test_unannounced_algorithm_is_rejected() {
    let mut log = dual_bank_header();
    log.extend(raw_record(0, EventType::EvPostCode, &[(0x000C, vec![0u8; 48])], b""));
    let err = parse_event_log(&log).unwrap_err();
    assert!(err.to_string().contains("not announced"));
}

#[test]
fn test_oversized_event_data_is_rejected() {
    // Test Objective: a record whose data size exceeds the field bound fails parsing
    // Expected Result: Format error naming the oversized field
    let mut log = dual_bank_header();
    let mut record = raw_record(4, EventType::EvIpl, &[(TPM_ALG_SHA256, vec![0u8; 32])], b"");
    let size_offset = record.len() - 4;
    record[size_offset..].copy_from_slice(&(2u32 * 1024 * 1024).to_le_bytes());
    log.extend(record);

    let err = parse_event_log(&log).unwrap_err();
    assert!(matches!(err, MeasurementError::Format(_)));
    assert!(err.to_string().contains("too large"));
}

#[test]
fn test_truncated_record_is_rejected() {
    let mut writer = EventLogWriter::new().unwrap();
    writer.write_event(7, EventType::EvSeparator, &[0u8; 4]).unwrap();
    let mut log = writer.into_bytes();
    log.truncate(log.len() - 2);
    assert!(parse_event_log(&log).is_err());
}

#[test]
fn test_replay_is_order_dependent() {
    // Test Objective: extend is non-commutative and replay only folds the requested register
    // Expected Result: swapping two events changes the value; other registers are ignored
    let a = event(7, b"first");
    let b = event(7, b"second");
    let other = event(4, b"unrelated");

    let forward = replay_register(&[a.clone(), other.clone(), b.clone()], 7).unwrap();
    let reversed = replay_register(&[b.clone(), a.clone()], 7).unwrap();
    assert_ne!(forward, reversed);
    assert_eq!(forward.len(), SHA256_DIGEST_SIZE);

    let manual = extend(&extend(&[0u8; 32], b"first", false).unwrap(), b"second", false).unwrap();
    assert_eq!(forward, manual);
    assert_eq!(replay_register(&[a, b], 7).unwrap(), forward);
}

#[test]
fn test_signature_list_shorter_than_header_is_empty() {
    assert!(parse_signature_list(&[]).unwrap().is_empty());
    assert!(parse_signature_list(&[0u8; 27]).unwrap().is_empty());
}

#[test]
fn test_signature_list_keeps_entries_after_bad_certificate() {
    // Test Objective: a corrupted certificate is recorded per entry, not fatal to the list
    // Expected Result: two entries; the first parses, the second carries a parse error
    let signer = TestSigner::new("Example Corp", "Example Secure Boot CA");
    let good = signer.cert.to_der().unwrap();
    let mut bad = good.clone();
    bad[..8].copy_from_slice(&[0xffu8; 8]);
    let owner = Uuid::from_u128(0x77fa9abd_0359_4d32_bd60_28f4e78f784b);

    let entries = parse_signature_list(&x509_signature_list(owner, &[good.clone(), bad])).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].owner, owner);
    assert!(entries[0].parse_error.is_none());
    assert_eq!(entries[0].certificate.as_ref().unwrap().to_der().unwrap(), good);
    assert!(entries[1].certificate.is_none());
    assert!(entries[1].parse_error.is_some());

    let mut expected_data = owner.to_bytes_le().to_vec();
    expected_data.extend_from_slice(&good);
    assert_eq!(entries[0].signature_data(), expected_data);
}

#[test]
fn test_signature_list_truncated_entry_is_format_error() {
    let signer = TestSigner::new("Example Corp", "Example Secure Boot CA");
    let mut list = x509_signature_list(Uuid::nil(), &[signer.cert.to_der().unwrap()]);
    list.truncate(list.len() - 10);
    assert!(matches!(parse_signature_list(&list), Err(MeasurementError::Format(_))));
}

#[test]
fn test_extract_single_signing_certificate() {
    let signer = TestSigner::new("Example Corp", "Example Boot Signing");
    let image = PeBuilder::new().section(".text", b"stub").signed_by(&signer).build();

    let cert = extract_authenticode_certificate(&image).unwrap();
    assert_eq!(cert.to_der().unwrap(), signer.cert.to_der().unwrap());
}

#[test]
fn test_extract_certificate_rejects_unsigned_and_multi_cert_images() {
    // Test Objective: only images carrying exactly one certificate are accepted
    // Expected Result: unsigned image is a Format error, two certificates a Certificate error
    let unsigned = PeBuilder::new().section(".text", b"stub").build();
    assert!(matches!(extract_authenticode_certificate(&unsigned), Err(MeasurementError::Format(_))));

    let signer = TestSigner::new("Example Corp", "Example Boot Signing");
    let other = TestSigner::new("Other Corp", "Other Signing");
    let image = PeBuilder::new()
        .section(".text", b"stub")
        .signature(signer.pkcs7(b"authenticode", &[&other.cert]))
        .build();
    assert!(matches!(extract_authenticode_certificate(&image), Err(MeasurementError::Certificate(_))));
}

#[test]
fn test_section_data_is_trimmed_to_virtual_size() {
    let image = PeBuilder::new().section(".osrel", b"ID=appliance\n").build();
    assert_eq!(section_data(&image, ".osrel").unwrap(), Some(b"ID=appliance\n".to_vec()));
    assert_eq!(section_data(&image, ".cmdline").unwrap(), None);
}

#[test]
fn test_embedded_kernel_digest() {
    // Test Objective: the .linux digest is the Authenticode digest of the embedded kernel image
    // Expected Result: equal to hashing the kernel image directly; differs for another kernel
    let kernel = kernel_image(b"kernel-a");
    let uki = PeBuilder::new()
        .section(".osrel", b"ID=appliance\n")
        .section(".linux", &kernel)
        .build();

    let digest = compute_authenticode_digest(&uki, ".linux").unwrap();
    assert_eq!(digest, authenticode_digest(&kernel).unwrap());
    assert_eq!(digest.len(), 32);

    let other = PeBuilder::new().section(".linux", &kernel_image(b"kernel-b")).build();
    assert_ne!(compute_authenticode_digest(&other, ".linux").unwrap(), digest);
    assert!(compute_authenticode_digest(&other, ".initrd").is_err());
}

#[test]
fn test_authenticode_digest_ignores_signature() {
    let signer = TestSigner::new("Example Corp", "Example Boot Signing");
    let unsigned = PeBuilder::new().section(".text", b"stub").build();
    let signed = PeBuilder::new().section(".text", b"stub").signed_by(&signer).build();
    assert_eq!(authenticode_digest(&unsigned).unwrap(), authenticode_digest(&signed).unwrap());
}

#[test]
fn test_uki_public_key() {
    let signer = TestSigner::new("Example Corp", "Example PCR Signing");
    let pem = signer.public_key_pem();
    let uki = PeBuilder::new().section(".pcrpkey", &pem).build();
    assert_eq!(uki_public_key(&uki).unwrap(), pem);

    let bare = PeBuilder::new().section(".linux", b"x").build();
    assert!(uki_public_key(&bare).is_err());
}
