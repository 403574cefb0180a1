// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Command-availability resource kind.
//!
//! Asserts that a binary resolves on the execution search path, generalizing
//! the provisioning idiom `command -v tool >/dev/null || install_tool`. The
//! corrective action is caller-supplied, e.g., a package-manager invocation
//! or a download-and-unpack procedure, and must leave the binary discoverable
//! on completion or verification will flag it.

use crate::resource::{Action, ApplyError, Criticality, Probe, ProbeError, Resource, Verdict};

use std::process::Command;
use tracing::info;

/// Assert that a binary resolves on the search path.
#[derive(Clone, Debug)]
pub struct CommandAvailable {
    binary: String,
}

impl CommandAvailable {
    /// Construct new command-availability assertion.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Package this assertion as a named [`Resource`].
    ///
    /// The `install` action must leave [`Self::binary`] discoverable on the
    /// search path when it completes.
    pub fn resource(
        self,
        name: impl Into<String>,
        criticality: Criticality,
        install: impl Action + 'static,
    ) -> Resource {
        Resource::new(name, criticality, self, install)
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Probe for CommandAvailable {
    fn check(&self) -> Result<Verdict, ProbeError> {
        match which::which(&self.binary) {
            Ok(_) => Ok(Verdict::Satisfied),
            Err(err) => Ok(Verdict::unsatisfied(format!(
                "{:?} does not resolve on the search path: {err}",
                self.binary
            ))),
        }
    }
}

/// Install procedure that runs a shell command line.
///
/// Backs the manifest form of [`CommandAvailable`], where the install
/// procedure arrives as a command string rather than as code.
#[derive(Clone, Debug)]
pub struct ShellInstall {
    command: String,
}

impl ShellInstall {
    /// Construct new shell-backed install procedure.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Action for ShellInstall {
    fn apply(&self) -> Result<(), ApplyError> {
        info!("run install command: {}", self.command);
        let output = Command::new("sh").args(["-c", &self.command]).output()?;
        if !output.status.success() {
            return Err(ApplyError::Syscall {
                command: self.command.clone(),
                detail: String::from_utf8_lossy(&output.stderr).trim_end().to_owned(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_resolves_present_binary() {
        // `sh` exists on any unix host this crate's volume kinds target.
        let assertion = CommandAvailable::new("sh");
        assert!(assertion.check().unwrap().is_satisfied());
    }

    #[test]
    fn probe_reports_missing_binary_unsatisfied() {
        let assertion = CommandAvailable::new("converge-test-no-such-binary");
        let verdict = assertion.check().unwrap();
        assert!(!verdict.is_satisfied());
    }

    #[test]
    fn shell_install_surfaces_nonzero_exit() {
        let install = ShellInstall::new("echo broken >&2; exit 3");
        let result = install.apply();
        assert!(matches!(result, Err(ApplyError::Syscall { .. })));
    }

    #[test]
    fn shell_install_runs_successful_command() {
        let install = ShellInstall::new("true");
        assert!(install.apply().is_ok());
    }
}
