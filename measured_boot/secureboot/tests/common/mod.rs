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

//! Fixture machine for the Secure Boot suites: an efivarfs, PCR sysfs and boot partition laid
//! out under a temporary directory, plus a recording stand-in for the external tools.

#[path = "../../../measurement/tests/common/mod.rs"]
pub mod fixtures;

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

use boot_config::PathsConfig;
use boot_measurement::pcr::initial_value;
use boot_measurement::utf16::string_to_utf16;
use boot_measurement::{
    authenticode_digest, compute_authenticode_digest, extend, parse_event_log, replay_register, EfiVariable,
    EventLogWriter, EventType, UefiVariableData,
};
use openssl::sha::sha256;
use openssl::x509::X509;
use secureboot::command::MockCommandExecutor;
use secureboot::predict::STUB_PAYLOAD_GUID;
use secureboot::{Architecture, Platform};
use tempfile::TempDir;
use uuid::Uuid;

use fixtures::{kernel_image, signature_database, x509_signature_list, PeBuilder, TestSigner};

pub const OWNER: Uuid = Uuid::from_u128(0x11111111_2222_3333_4444_555555555555);
pub const OS_NAME: &str = "BootOS";
pub const OS_VERSION: &str = "202501010000";

pub const TPM_ALG_SHA256: u16 = 0x000B;

/// One recorded tool invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
    pub envs: HashMap<OsString, OsString>,
}

pub type InvocationLog = Arc<Mutex<Vec<Invocation>>>;

pub fn success(stdout: &str) -> Output {
    Output { status: ExitStatus::from_raw(0), stdout: stdout.as_bytes().to_vec(), stderr: Vec::new() }
}

pub fn failure(stderr: &str) -> Output {
    Output { status: ExitStatus::from_raw(256), stdout: Vec::new(), stderr: stderr.as_bytes().to_vec() }
}

/// Mock executor that records every call and answers through `handler`
pub fn recording_executor<F>(handler: F) -> (MockCommandExecutor, InvocationLog)
where
    F: Fn(&str, &[String]) -> Output + Send + 'static,
{
    let calls: InvocationLog = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    let mut executor = MockCommandExecutor::new();
    executor.expect_execute().returning(move |command, args, envs, _ctx| {
        recorded.lock().unwrap().push(Invocation {
            command: command.to_string(),
            args: args.clone(),
            envs: envs.clone(),
        });
        Ok(handler(command, args))
    });
    (executor, calls)
}

/// Executor that fails the test if any tool is started
pub fn forbidden_executor() -> MockCommandExecutor {
    let mut executor = MockCommandExecutor::new();
    executor.expect_execute().never();
    executor
}

pub fn commands(calls: &InvocationLog) -> Vec<String> {
    calls.lock().unwrap().iter().map(|call| call.command.clone()).collect()
}

/// Event log built record by record, with digests either measured or given
pub struct LogBuilder {
    buffer: Vec<u8>,
}

impl LogBuilder {
    pub fn new() -> Self {
        Self { buffer: EventLogWriter::new().unwrap().into_bytes() }
    }

    pub fn measured(self, pcr: u32, event_type: EventType, content: &[u8]) -> Self {
        let digest = sha256(content);
        self.with_digest(pcr, event_type, &digest, content)
    }

    pub fn with_digest(mut self, pcr: u32, event_type: EventType, digest: &[u8], data: &[u8]) -> Self {
        self.buffer.extend_from_slice(&pcr.to_le_bytes());
        self.buffer.extend_from_slice(&event_type.as_u32().to_le_bytes());
        self.buffer.extend_from_slice(&1u32.to_le_bytes());
        self.buffer.extend_from_slice(&TPM_ALG_SHA256.to_le_bytes());
        self.buffer.extend_from_slice(digest);
        self.buffer.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.buffer.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}

/// UEFI_IMAGE_LOAD_EVENT whose device path is a single media file path node
pub fn file_path_load_event(efi_path: &str) -> Vec<u8> {
    let mut name = string_to_utf16(efi_path);
    name.extend_from_slice(&[0, 0]);
    load_event(&device_path_node(0x04, 0x04, &name))
}

/// UEFI_IMAGE_LOAD_EVENT for the kernel the systemd stub loads out of a UKI
pub fn stub_payload_load_event() -> Vec<u8> {
    load_event(&device_path_node(0x04, 0x03, &STUB_PAYLOAD_GUID.to_bytes_le()))
}

fn device_path_node(node_type: u8, sub_type: u8, data: &[u8]) -> Vec<u8> {
    let mut node = vec![node_type, sub_type];
    node.extend_from_slice(&((data.len() + 4) as u16).to_le_bytes());
    node.extend_from_slice(data);
    node
}

fn load_event(path: &[u8]) -> Vec<u8> {
    let mut device_path = path.to_vec();
    device_path.extend_from_slice(&[0x7f, 0xff, 0x04, 0x00]);

    let mut event = Vec::new();
    event.extend_from_slice(&0x1000u64.to_le_bytes());
    event.extend_from_slice(&0x2000u64.to_le_bytes());
    event.extend_from_slice(&0u64.to_le_bytes());
    event.extend_from_slice(&(device_path.len() as u64).to_le_bytes());
    event.extend_from_slice(&device_path);
    event
}

/// UKI with every section the stub measures, signed by `signer`
pub fn uki_image(signer: &TestSigner, marker: &[u8]) -> Vec<u8> {
    PeBuilder::new()
        .section(".linux", &kernel_image(marker))
        .section(".osrel", b"NAME=BootOS\n")
        .section(".cmdline", b"console=ttyS0")
        .section(".initrd", b"initrd")
        .section(".ucode", b"ucode")
        .section(".uname", b"6.12.0")
        .section(".sbat", b"sbat,1\n")
        .section(".pcrpkey", &signer.public_key_pem())
        .signed_by(signer)
        .build()
}

/// Owner GUID followed by the certificate, as measured for a VariableAuthority event
pub fn signature_data(cert: &X509) -> Vec<u8> {
    let mut data = OWNER.to_bytes_le().to_vec();
    data.extend_from_slice(&cert.to_der().unwrap());
    data
}

pub fn authority_event(cert: &X509) -> Vec<u8> {
    UefiVariableData::new(EfiVariable::Db, signature_data(cert)).encode().unwrap()
}

/// A machine with Secure Boot enabled whose boot stub, systemd-boot and UKI are signed by `signer`
pub struct FixtureSystem {
    pub dir: TempDir,
    pub paths: PathsConfig,
    pub signer: TestSigner,
    pub platform_key: TestSigner,
    pub kek: TestSigner,
}

impl FixtureSystem {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let paths = PathsConfig::rooted_at(dir.path());
        fs::create_dir_all(&paths.efivars_dir).unwrap();
        fs::create_dir_all(&paths.pcr_dir).unwrap();
        fs::create_dir_all(paths.boot_dir.join("EFI/Linux")).unwrap();
        fs::create_dir_all(paths.boot_dir.join("EFI/BOOT")).unwrap();
        fs::create_dir_all(paths.boot_dir.join("EFI/systemd")).unwrap();
        fs::create_dir_all(paths.pcr_public_key.parent().unwrap()).unwrap();

        let system = Self {
            dir,
            paths,
            signer: TestSigner::new("BootOS", "BootOS - Secure Boot E1"),
            platform_key: TestSigner::new("BootOS", "BootOS - Platform Key"),
            kek: TestSigner::new("BootOS", "BootOS - KEK"),
        };

        system.set_variable(EfiVariable::SecureBoot, &[1]);
        system.set_variable(EfiVariable::Pk, &signature_database(OWNER, &[&system.platform_key.cert]));
        system.set_variable(EfiVariable::Kek, &signature_database(OWNER, &[&system.kek.cert]));
        system.set_variable(EfiVariable::Db, &signature_database(OWNER, &[&system.signer.cert]));

        let stub = PeBuilder::new().section(".text", b"stub").signed_by(&system.signer).build();
        system.write_boot_file("EFI/BOOT/BOOTX64.EFI", &stub);
        let systemd_boot = PeBuilder::new().section(".text", b"systemd-boot").signed_by(&system.signer).build();
        system.write_boot_file("EFI/systemd/systemd-bootx64.efi", &systemd_boot);

        let uki = uki_image(&system.signer, b"kernel");
        system.write_boot_file(&format!("EFI/Linux/{}_{}.efi", OS_NAME, OS_VERSION), &uki);
        fs::write(&system.paths.pcr_public_key, system.signer.public_key_pem()).unwrap();

        let entry = format!("{}_{}.efi", OS_NAME, OS_VERSION);
        let mut loader_entry = string_to_utf16(&entry);
        loader_entry.extend_from_slice(&[0, 0]);
        system.set_variable(EfiVariable::LoaderEntrySelected, &loader_entry);

        system
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn platform(&self, executor: MockCommandExecutor) -> Platform {
        Platform::for_architecture(self.paths.clone(), Architecture::X86_64, Arc::new(executor))
    }

    pub fn set_variable(&self, variable: EfiVariable, payload: &[u8]) {
        let path = self.paths.efivars_dir.join(variable.file_name());
        fs::write(path, fixtures::efivarfs_content(payload)).unwrap();
    }

    pub fn variable(&self, variable: EfiVariable) -> Vec<u8> {
        let path = self.paths.efivars_dir.join(variable.file_name());
        match fs::read(path) {
            Ok(content) => content[4..].to_vec(),
            Err(_) => Vec::new(),
        }
    }

    pub fn append_variable(&self, variable: EfiVariable, payload: &[u8]) {
        let mut current = self.variable(variable);
        current.extend_from_slice(payload);
        self.set_variable(variable, &current);
    }

    pub fn write_boot_file(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.paths.boot_dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn uki_path(&self) -> PathBuf {
        self.paths.boot_dir.join(format!("EFI/Linux/{}_{}.efi", OS_NAME, OS_VERSION))
    }

    pub fn set_pcr(&self, index: u32, value: &[u8]) {
        fs::write(self.paths.pcr_dir.join(index.to_string()), format!("{}\n", hex::encode_upper(value))).unwrap();
    }

    pub fn write_event_log(&self, raw: &[u8]) {
        fs::create_dir_all(self.paths.event_log.parent().unwrap()).unwrap();
        fs::write(&self.paths.event_log, raw).unwrap();
    }

    /// Swap partition label pointing at `<root>/dev/<device>`
    pub fn link_swap(&self, device: &str) {
        fs::create_dir_all(&self.paths.partlabel_dir).unwrap();
        fs::create_dir_all(self.root().join("dev")).unwrap();
        std::os::unix::fs::symlink(format!("../../{}", device), self.paths.partlabel_dir.join("swap")).unwrap();
    }

    pub fn device(&self, name: &str) -> String {
        self.root().join("dev").join(name).display().to_string()
    }

    /// PCR7 events a firmware would log for the current variables and boot stub signer
    pub fn pcr7_events(&self, log: LogBuilder) -> LogBuilder {
        let mut log = log;
        for variable in [EfiVariable::SecureBoot, EfiVariable::Pk, EfiVariable::Kek, EfiVariable::Db, EfiVariable::Dbx] {
            let record = UefiVariableData::new(variable, self.variable(variable)).encode().unwrap();
            log = log.measured(7, EventType::EvEfiVariableDriverConfig, &record);
        }
        log.measured(7, EventType::EvSeparator, &[0u8; 4])
            .measured(7, EventType::EvEfiVariableAuthority, &authority_event(&self.signer.cert))
    }

    /// PCR4 events for the boot stub and the kernel inside the installed UKI
    pub fn pcr4_events(&self, log: LogBuilder) -> LogBuilder {
        let stub = fs::read(self.paths.boot_dir.join("EFI/BOOT/BOOTX64.EFI")).unwrap();
        let uki = fs::read(self.uki_path()).unwrap();
        log.measured(4, EventType::EvEfiAction, b"Calling EFI Application from Boot Option")
            .measured(4, EventType::EvSeparator, &[0u8; 4])
            .with_digest(
                4,
                EventType::EvEfiBootServicesApplication,
                &authenticode_digest(&stub).unwrap(),
                &file_path_load_event("\\EFI\\BOOT\\BOOTX64.EFI"),
            )
            .with_digest(
                4,
                EventType::EvEfiBootServicesApplication,
                &compute_authenticode_digest(&uki, ".linux").unwrap(),
                &stub_payload_load_event(),
            )
    }

    /// Install a firmware log of the current state and set the live PCRs it replays to
    pub fn boot(&self) -> Vec<u8> {
        let raw = self.pcr4_events(self.pcr7_events(LogBuilder::new())).build();
        self.install_log(&raw);
        raw
    }

    pub fn install_log(&self, raw: &[u8]) {
        let events = parse_event_log(raw).unwrap();
        self.set_pcr(4, &replay_register(&events, 4).unwrap());
        self.set_pcr(7, &replay_register(&events, 7).unwrap());
        self.write_event_log(raw);
    }
}

/// PCR7 firmware would compute from the given variable contents and boot stub signer
pub fn expected_pcr7(variables: &[(EfiVariable, Vec<u8>)], signer: &X509) -> Vec<u8> {
    let mut pcr = initial_value();
    for (variable, data) in variables {
        let record = UefiVariableData::new(*variable, data.clone()).encode().unwrap();
        pcr = extend(&pcr, &record, false).unwrap();
    }
    pcr = extend(&pcr, &[0u8; 4], false).unwrap();
    extend(&pcr, &authority_event(signer), false).unwrap()
}

/// Signed update payload: EFI_TIME, a WIN_CERTIFICATE, then the signature list to append
pub fn auth_update(signer: &TestSigner, list: &[u8]) -> Vec<u8> {
    let pkcs7 = signer.pkcs7(list, &[]);
    let length = 24 + pkcs7.len();

    let mut update = vec![0u8; 16];
    update[0..2].copy_from_slice(&2025u16.to_le_bytes());
    update.extend_from_slice(&(length as u32).to_le_bytes());
    update.extend_from_slice(&0x0200u16.to_le_bytes());
    update.extend_from_slice(&0x0ef1u16.to_le_bytes());
    update.extend_from_slice(&[0u8; 16]);
    update.extend_from_slice(&pkcs7);
    update.extend_from_slice(list);
    update
}

pub fn certificate_list(cert: &X509) -> Vec<u8> {
    x509_signature_list(OWNER, &[cert.to_der().unwrap()])
}
