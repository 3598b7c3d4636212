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

//! External tool execution.
//!
//! Every firmware, LUKS and device-mapper change goes through a [`CommandExecutor`], so the trust
//! decisions can be exercised without the tools installed.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{self, Read};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mockall::automock;

use crate::error::SecureBootError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Deadline and cancellation flag shared by every step of one operation
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Instant::now().checked_add(timeout), cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Request cancellation; clones of this context observe it too
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fail with `Cancelled` if the operation must not continue past `step`
    pub fn check(&self, step: &str) -> Result<(), SecureBootError> {
        if self.is_cancelled() {
            return Err(SecureBootError::Cancelled(format!("cancelled before {}", step)));
        }
        if self.is_expired() {
            return Err(SecureBootError::Cancelled(format!("deadline exceeded before {}", step)));
        }
        Ok(())
    }
}

#[automock]
pub trait CommandExecutor {
    fn execute(
        &self,
        command: &str,
        args: &Vec<String>,
        envs: &HashMap<OsString, OsString>,
        ctx: &OperationContext,
    ) -> io::Result<Output>;
}

/// Runs tools as child processes, killing them when the context expires or is cancelled
pub struct ProcessExecutor;

impl CommandExecutor for ProcessExecutor {
    fn execute(
        &self,
        command: &str,
        args: &Vec<String>,
        envs: &HashMap<OsString, OsString>,
        ctx: &OperationContext,
    ) -> io::Result<Output> {
        log::debug!("start execute command {}", command);
        let mut child = Command::new(command)
            .args(args)
            .envs(envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || read_pipe(stdout));
        let stderr_reader = thread::spawn(move || read_pipe(stderr));

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            let interrupted = if ctx.is_cancelled() {
                Some(io::Error::new(io::ErrorKind::Interrupted, format!("{} was cancelled", command)))
            } else if ctx.is_expired() {
                Some(io::Error::new(io::ErrorKind::TimedOut, format!("{} exceeded its deadline", command)))
            } else {
                None
            };
            if let Some(err) = interrupted {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = join_reader(stdout_reader)?;
        let stderr = join_reader(stderr_reader)?;
        log::debug!("execute command {} end: {}", command, status);
        Ok(Output { status, stdout, stderr })
    }
}

fn read_pipe<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn join_reader(reader: thread::JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    reader.join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader thread panicked"))?
}

/// Run a tool to completion and return its stdout
///
/// # Errors
/// * `SecureBootError::Cancelled` when the context is done before or while the tool runs
/// * `SecureBootError::ToolFailure` when the tool cannot be started or exits non-zero; the
///   message carries the tool's stderr
pub fn run_command(
    executor: &dyn CommandExecutor,
    ctx: &OperationContext,
    command: &str,
    args: &[&str],
    envs: &HashMap<OsString, OsString>,
) -> Result<String, SecureBootError> {
    ctx.check(command)?;

    let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    let command_line = format!("{} {}", command, args.join(" "));
    let output = executor.execute(command, &args, envs, ctx).map_err(|e| match e.kind() {
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut => SecureBootError::Cancelled(e.to_string()),
        _ => SecureBootError::ToolFailure { command: command_line.clone(), message: e.to_string() },
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(SecureBootError::ToolFailure {
            command: command_line,
            message: if stderr.is_empty() { output.status.to_string() } else { stderr },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
