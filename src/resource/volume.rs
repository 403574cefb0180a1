// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Block-device resource kinds.
//!
//! Two desired-state assertions over block devices:
//!
//! - [`FilesystemFormatted`]: the device already carries a recognized
//!   filesystem signature. The corrective action formats it, generalizing the
//!   provisioning idiom `blkid "$dev" || mkfs.ext4 "$dev"`.
//! - [`Mounted`]: a directory is already a mount point. The corrective action
//!   creates the directory if absent and mounts the device at it, generalizing
//!   `mountpoint -q "$dir" || mount "$dev" "$dir"`.
//!
//! # Destructive Action Safety
//!
//! Formatting destroys data, which makes [`FilesystemFormatted`] the
//! highest-risk resource kind in this crate. Its action therefore refuses to
//! run unless its own probe was called immediately beforehand and came back
//! unsatisfied. The probe arms a shared token, and the action consumes it.
//! Calling the action directly, or twice in a row, yields
//! [`ApplyError::Refused`] instead of a second format.
//!
//! # Mount Table Transport
//!
//! The mount probe reads `/proc/self/mounts` rather than shelling out, so
//! probing stays free of subprocess spawns. Mount targets with whitespace
//! appear octal-escaped in the table (`\040` for space), and the probe decodes
//! those escapes before comparing paths.

use crate::resource::{Action, ApplyError, Criticality, Probe, ProbeError, Resource, Verdict};

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, info, warn};

const MOUNT_TABLE: &str = "/proc/self/mounts";

/// Assert that a block device carries a filesystem signature.
#[derive(Clone, Debug)]
pub struct FilesystemFormatted {
    device: PathBuf,
    fs_type: String,
    armed: Arc<AtomicBool>,
}

impl FilesystemFormatted {
    /// Construct new filesystem-signature assertion.
    ///
    /// # Errors
    ///
    /// - Return [`InvalidFsType`] if `fs_type` contains anything beyond
    ///   lowercase alphanumerics, '.', or '-', since it becomes part of the
    ///   `mkfs.<fs_type>` command name.
    pub fn new(
        device: impl Into<PathBuf>,
        fs_type: impl Into<String>,
    ) -> Result<Self, InvalidFsType> {
        let fs_type = fs_type.into();
        let valid = !fs_type.is_empty()
            && fs_type
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-');
        if !valid {
            return Err(InvalidFsType(fs_type));
        }

        Ok(Self {
            device: device.into(),
            fs_type,
            armed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Package this assertion as a named [`Resource`].
    ///
    /// The probe and action halves share one armed token, so the refusal
    /// guard keeps working across the clone.
    pub fn resource(self, name: impl Into<String>, criticality: Criticality) -> Resource {
        Resource::new(name, criticality, self.clone(), self)
    }
}

impl Probe for FilesystemFormatted {
    fn check(&self) -> Result<Verdict, ProbeError> {
        let output = Command::new("blkid")
            .args(["-o", "value", "-s", "TYPE"])
            .arg(&self.device)
            .output()?;
        let signature = String::from_utf8_lossy(&output.stdout).trim().to_owned();

        if output.status.success() && !signature.is_empty() {
            debug!(
                "device {:?} carries {signature} signature",
                self.device.display()
            );
            self.armed.store(false, Ordering::SeqCst);
            return Ok(Verdict::Satisfied);
        }

        self.armed.store(true, Ordering::SeqCst);
        Ok(Verdict::unsatisfied(format!(
            "no filesystem signature on {:?}",
            self.device.display()
        )))
    }
}

impl Action for FilesystemFormatted {
    fn apply(&self) -> Result<(), ApplyError> {
        // INVARIANT: Formatting only runs on the heels of an unsatisfied
        // probe, and each probe arms at most one format.
        if !self.armed.swap(false, Ordering::SeqCst) {
            return Err(ApplyError::Refused {
                reason: format!(
                    "probe did not report {:?} unformatted immediately beforehand",
                    self.device.display()
                ),
            });
        }

        warn!(
            "formatting {:?} as {}, destroying existing data",
            self.device.display(),
            self.fs_type
        );
        syscall_non_interactive(format!("mkfs.{}", self.fs_type), [&self.device])?;

        Ok(())
    }
}

/// Assert that a device is mounted at a target directory.
#[derive(Clone, Debug)]
pub struct Mounted {
    device: PathBuf,
    target: PathBuf,
    options: String,
}

impl Mounted {
    /// Construct new mount-point assertion.
    ///
    /// Empty `options` means mount with system defaults.
    pub fn new(
        device: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        options: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            target: target.into(),
            options: options.into(),
        }
    }

    /// Package this assertion as a named [`Resource`].
    pub fn resource(self, name: impl Into<String>, criticality: Criticality) -> Resource {
        Resource::new(name, criticality, self.clone(), self)
    }

    /// Assemble the argument list for the mount command.
    ///
    /// Empty options mean no `-o` flag, deferring to system defaults.
    fn mount_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if !self.options.is_empty() {
            args.push("-o".into());
            args.push(self.options.clone().into());
        }
        args.push(self.device.clone().into());
        args.push(self.target.clone().into());

        args
    }
}

impl Probe for Mounted {
    fn check(&self) -> Result<Verdict, ProbeError> {
        let table = std::fs::read_to_string(MOUNT_TABLE)?;
        if mount_table_contains(&table, &self.target) {
            Ok(Verdict::Satisfied)
        } else {
            Ok(Verdict::unsatisfied(format!(
                "{:?} is not a mount point",
                self.target.display()
            )))
        }
    }
}

impl Action for Mounted {
    fn apply(&self) -> Result<(), ApplyError> {
        mkdirp::mkdirp(&self.target)?;

        info!(
            "mount {:?} at {:?}",
            self.device.display(),
            self.target.display()
        );
        syscall_non_interactive("mount", self.mount_args())?;

        Ok(())
    }
}

/// Check whether a path appears as a mount target in a mount table.
///
/// Table format is one mount per line: `source target fstype options 0 0`.
/// Targets are compared after decoding octal escapes.
fn mount_table_contains(table: &str, target: &Path) -> bool {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|entry| Path::new(&decode_octal_escapes(entry)) == target)
}

/// Decode `\040` style octal escapes used by the kernel mount table.
fn decode_octal_escapes(field: &str) -> String {
    let mut decoded = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            decoded.push(c);
            continue;
        }

        let digits: String = chars.clone().take(3).collect();
        if digits.len() == 3 && digits.chars().all(|d| ('0'..='7').contains(&d)) {
            let code = u32::from_str_radix(&digits, 8).unwrap_or(u32::from('\\'));
            decoded.push(char::from_u32(code).unwrap_or('\\'));
            for _ in 0..3 {
                chars.next();
            }
        } else {
            decoded.push('\\');
        }
    }

    decoded
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String, ApplyError> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(ApplyError::Syscall {
            command: cmd.as_ref().to_string_lossy().into_owned(),
            detail: message,
        });
    }

    Ok(message)
}

/// Filesystem type cannot safely form a `mkfs.<fs_type>` command name.
#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid filesystem type {0:?}")]
pub struct InvalidFsType(pub String);
