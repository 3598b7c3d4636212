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

#![allow(dead_code)]

//! Fixture builders shared by the measured boot test suites: minimal PE32+ images, self-signed
//! certificates and EFI signature lists.

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::{X509, X509NameBuilder};
use uuid::Uuid;

const DOS_HEADER_SIZE: usize = 0x40;
const OPTIONAL_HEADER_SIZE: usize = 240;
const SECTION_HEADER_SIZE: usize = 40;
const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: usize = 0x1000;
const SECURITY_DIRECTORY_OFFSET: usize = 144;

pub const EFI_CERT_X509_GUID: Uuid = Uuid::from_u128(0xa5c059a1_94e4_4aa7_87b5_ab155c2bf072);

fn align(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

/// A signer: certificate plus private key
pub struct TestSigner {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl TestSigner {
    /// Self-signed RSA-2048 certificate with subject `O=<org>, CN=<common_name>`
    pub fn new(org: &str, common_name: &str) -> Self {
        Self::with_validity(org, common_name, 0, 3650)
    }

    pub fn with_validity(org: &str, common_name: &str, not_before_days: u32, not_after_days: u32) -> Self {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("C", "US").unwrap();
        name.append_entry_by_text("O", org).unwrap();
        name.append_entry_by_text("CN", common_name).unwrap();
        let name = name.build();

        let mut serial = BigNum::new().unwrap();
        serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&serial.to_asn1_integer().unwrap()).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&Asn1Time::days_from_now(not_before_days).unwrap()).unwrap();
        builder.set_not_after(&Asn1Time::days_from_now(not_after_days).unwrap()).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        Self { cert: builder.build(), key }
    }

    pub fn public_key_pem(&self) -> Vec<u8> {
        self.key.public_key_to_pem().unwrap()
    }

    /// Detached PKCS#7 signature over `content`, carrying the signer and any `extra` certificates
    pub fn pkcs7(&self, content: &[u8], extra: &[&X509]) -> Vec<u8> {
        let mut certs = Stack::new().unwrap();
        for cert in extra {
            certs.push((*cert).clone()).unwrap();
        }
        Pkcs7::sign(&self.cert, &self.key, &certs, content, Pkcs7Flags::BINARY | Pkcs7Flags::DETACHED)
            .unwrap()
            .to_der()
            .unwrap()
    }
}

/// Builder for minimal PE32+ EFI images
#[derive(Default)]
pub struct PeBuilder {
    sections: Vec<(String, Vec<u8>)>,
    signature: Option<Vec<u8>>,
}

impl PeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(mut self, name: &str, data: &[u8]) -> Self {
        self.sections.push((name.to_string(), data.to_vec()));
        self
    }

    /// Attach a PKCS#7 blob as the image's only WIN_CERTIFICATE
    pub fn signature(mut self, pkcs7_der: Vec<u8>) -> Self {
        self.signature = Some(pkcs7_der);
        self
    }

    pub fn signed_by(self, signer: &TestSigner) -> Self {
        let pkcs7 = signer.pkcs7(b"authenticode", &[]);
        self.signature(pkcs7)
    }

    pub fn build(&self) -> Vec<u8> {
        let nt_offset = DOS_HEADER_SIZE;
        let optional_offset = nt_offset + 4 + 20;
        let section_table_offset = optional_offset + OPTIONAL_HEADER_SIZE;
        let size_of_headers = align(section_table_offset + self.sections.len() * SECTION_HEADER_SIZE, FILE_ALIGNMENT);

        let mut image = vec![0u8; size_of_headers];
        image[0..2].copy_from_slice(b"MZ");
        image[0x3c..0x40].copy_from_slice(&(nt_offset as u32).to_le_bytes());

        image[nt_offset..nt_offset + 4].copy_from_slice(b"PE\0\0");
        let coff = nt_offset + 4;
        image[coff..coff + 2].copy_from_slice(&0x8664u16.to_le_bytes());
        image[coff + 2..coff + 4].copy_from_slice(&(self.sections.len() as u16).to_le_bytes());
        image[coff + 16..coff + 18].copy_from_slice(&(OPTIONAL_HEADER_SIZE as u16).to_le_bytes());
        image[coff + 18..coff + 20].copy_from_slice(&0x0022u16.to_le_bytes());

        let opt = optional_offset;
        image[opt..opt + 2].copy_from_slice(&0x20bu16.to_le_bytes());
        image[opt + 24..opt + 32].copy_from_slice(&0x1_0000_0000u64.to_le_bytes());
        image[opt + 32..opt + 36].copy_from_slice(&(SECTION_ALIGNMENT as u32).to_le_bytes());
        image[opt + 36..opt + 40].copy_from_slice(&(FILE_ALIGNMENT as u32).to_le_bytes());
        image[opt + 60..opt + 64].copy_from_slice(&(size_of_headers as u32).to_le_bytes());
        image[opt + 68..opt + 70].copy_from_slice(&10u16.to_le_bytes());
        image[opt + 108..opt + 112].copy_from_slice(&16u32.to_le_bytes());

        let mut virtual_address = SECTION_ALIGNMENT;
        for (index, (name, data)) in self.sections.iter().enumerate() {
            let raw_size = align(data.len().max(1), FILE_ALIGNMENT);
            let header = section_table_offset + index * SECTION_HEADER_SIZE;
            let name_bytes = name.as_bytes();
            image[header..header + name_bytes.len().min(8)].copy_from_slice(&name_bytes[..name_bytes.len().min(8)]);
            image[header + 8..header + 12].copy_from_slice(&(data.len() as u32).to_le_bytes());
            image[header + 12..header + 16].copy_from_slice(&(virtual_address as u32).to_le_bytes());
            image[header + 16..header + 20].copy_from_slice(&(raw_size as u32).to_le_bytes());
            let raw_offset = image.len() as u32;
            image[header + 20..header + 24].copy_from_slice(&raw_offset.to_le_bytes());
            image[header + 36..header + 40].copy_from_slice(&0x4000_0040u32.to_le_bytes());

            let start = image.len();
            image.extend_from_slice(data);
            image.resize(start + raw_size, 0);
            virtual_address += align(data.len().max(1), SECTION_ALIGNMENT);
        }
        image[opt + 56..opt + 60].copy_from_slice(&(virtual_address as u32).to_le_bytes());

        if let Some(pkcs7) = &self.signature {
            let length = align(8 + pkcs7.len(), 8);
            let table_offset = image.len();
            image.extend_from_slice(&(length as u32).to_le_bytes());
            image.extend_from_slice(&0x0200u16.to_le_bytes());
            image.extend_from_slice(&0x0002u16.to_le_bytes());
            image.extend_from_slice(pkcs7);
            image.resize(table_offset + length, 0);

            let dir = opt + SECURITY_DIRECTORY_OFFSET;
            image[dir..dir + 4].copy_from_slice(&(table_offset as u32).to_le_bytes());
            image[dir + 4..dir + 8].copy_from_slice(&(length as u32).to_le_bytes());
        }

        image
    }
}

/// Minimal unsigned kernel image, used as the `.linux` payload of a UKI
pub fn kernel_image(marker: &[u8]) -> Vec<u8> {
    PeBuilder::new().section(".text", marker).build()
}

/// One EFI_SIGNATURE_LIST holding X.509 entries of equal size
pub fn x509_signature_list(owner: Uuid, entries: &[Vec<u8>]) -> Vec<u8> {
    let entry_size = entries.first().map(|e| e.len()).unwrap_or(0);
    assert!(entries.iter().all(|e| e.len() == entry_size), "entries must share one size");
    let signature_size = 16 + entry_size;
    let list_size = 28 + signature_size * entries.len();

    let mut list = Vec::with_capacity(list_size);
    list.extend_from_slice(&EFI_CERT_X509_GUID.to_bytes_le());
    list.extend_from_slice(&(list_size as u32).to_le_bytes());
    list.extend_from_slice(&0u32.to_le_bytes());
    list.extend_from_slice(&(signature_size as u32).to_le_bytes());
    for entry in entries {
        list.extend_from_slice(&owner.to_bytes_le());
        list.extend_from_slice(entry);
    }
    list
}

/// Concatenation of one signature list per certificate, as firmware stores a database
pub fn signature_database(owner: Uuid, certs: &[&X509]) -> Vec<u8> {
    certs.iter()
        .flat_map(|cert| x509_signature_list(owner, &[cert.to_der().unwrap()]))
        .collect()
}

/// efivarfs file content: 4 attribute bytes followed by the variable payload
pub fn efivarfs_content(payload: &[u8]) -> Vec<u8> {
    let mut content = 0x27u32.to_le_bytes().to_vec();
    content.extend_from_slice(payload);
    content
}
