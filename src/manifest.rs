// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manifest layout.
//!
//! Specify the layout of the declarative manifest that drives the `converge`
//! binary, to simplify the process of serialization and deserialization.
//! File I/O is left to the caller to figure out.
//!
//! # General Layout
//!
//! A manifest is an ordered array of `[[resource]]` tables. Each entry names
//! one desired-state assertion, marks whether its failure should abort the
//! rest of the run, and carries a tagged `kind` table selecting one of the
//! built-in resource kinds:
//!
//! ```toml
//! [[resource]]
//! name = "data volume formatted"
//! critical = true
//!
//! [resource.kind]
//! type = "filesystem_formatted"
//! device = "/dev/sdb1"
//! fs_type = "ext4"
//! ```
//!
//! Declaration order is execution order. Path fields undergo full shell
//! expansion at parse time, so `~/.config/app.conf` and `$HOME/bin` mean what
//! the user expects.

use crate::resource::{
    command::{CommandAvailable, ShellInstall},
    file::{FilePresent, LineInFile},
    volume::{FilesystemFormatted, InvalidFsType, Mounted},
    Criticality, Resource,
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Declarative manifest of desired-state assertions.
#[derive(Debug, Default, PartialEq, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Ordered resource declarations.
    #[serde(rename = "resource")]
    pub resources: Vec<ResourceEntry>,
}

impl Manifest {
    /// Build runnable resources from the declarations, in declared order.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::InvalidFsType`] if a `filesystem_formatted`
    ///   entry declares an unusable filesystem type.
    pub fn resources(&self) -> Result<Vec<Resource>> {
        self.resources
            .iter()
            .map(ResourceEntry::to_resource)
            .collect()
    }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut manifest: Manifest = toml::de::from_str(data).map_err(ManifestError::Deserialize)?;

        // INVARIANT: Perform shell expansion on all path fields.
        for entry in &mut manifest.resources {
            entry.kind.expand_paths()?;
        }

        Ok(manifest)
    }
}

impl Display for Manifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ManifestError::Serialize)?
                .as_str(),
        )
    }
}

/// One named resource declaration.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    /// Human-readable name, unique within the manifest.
    pub name: String,

    /// Whether failure aborts the remainder of the run.
    #[serde(default = "default_critical")]
    pub critical: bool,

    /// Which built-in assertion this entry declares.
    pub kind: ResourceKind,
}

impl ResourceEntry {
    fn to_resource(&self) -> Result<Resource> {
        let criticality = if self.critical {
            Criticality::Required
        } else {
            Criticality::Optional
        };

        let resource = match &self.kind {
            ResourceKind::FilePresent {
                path,
                contents,
                mode,
            } => FilePresent::new(path, contents, *mode).resource(&self.name, criticality),
            ResourceKind::LineInFile { path, marker, line } => {
                LineInFile::new(path, marker, line).resource(&self.name, criticality)
            }
            ResourceKind::FilesystemFormatted { device, fs_type } => {
                FilesystemFormatted::new(device, fs_type)?.resource(&self.name, criticality)
            }
            ResourceKind::Mounted {
                device,
                target,
                options,
            } => Mounted::new(device, target, options).resource(&self.name, criticality),
            ResourceKind::CommandAvailable { binary, install } => CommandAvailable::new(binary)
                .resource(&self.name, criticality, ShellInstall::new(install)),
        };

        Ok(resource)
    }
}

fn default_critical() -> bool {
    true
}

/// Built-in resource kind selected by a manifest entry.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    /// File exists with exact contents, and optionally a unix mode.
    FilePresent {
        path: String,
        contents: String,
        #[serde(default)]
        mode: Option<u32>,
    },

    /// Some line of a file contains a marker substring.
    LineInFile {
        path: String,
        marker: String,
        line: String,
    },

    /// Block device carries a filesystem signature.
    FilesystemFormatted {
        device: String,
        fs_type: String,
    },

    /// Device is mounted at a target directory.
    Mounted {
        device: String,
        target: String,
        #[serde(default)]
        options: String,
    },

    /// Binary resolves on the search path; install via shell command.
    CommandAvailable {
        binary: String,
        install: String,
    },
}

impl ResourceKind {
    /// Shell-expand every field that names a filesystem path.
    fn expand_paths(&mut self) -> Result<()> {
        match self {
            ResourceKind::FilePresent { path, .. } => expand(path)?,
            ResourceKind::LineInFile { path, .. } => expand(path)?,
            ResourceKind::FilesystemFormatted { device, .. } => expand(device)?,
            ResourceKind::Mounted { device, target, .. } => {
                expand(device)?;
                expand(target)?;
            }
            ResourceKind::CommandAvailable { .. } => {}
        }

        Ok(())
    }
}

fn expand(field: &mut String) -> Result<()> {
    *field = shellexpand::full(field.as_str())
        .map_err(ManifestError::ShellExpansion)?
        .into_owned();

    Ok(())
}

/// Manifest error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Failed to deserialize manifest.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize manifest.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on manifest.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Declared filesystem type cannot be used.
    #[error(transparent)]
    InvalidFsType(#[from] InvalidFsType),
}

impl From<ManifestError> for FmtError {
    fn from(_: ManifestError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ManifestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("DATA_MOUNT", "/mnt/data")])]
    fn deserialize_manifest() -> anyhow::Result<()> {
        let result: Manifest = r#"
            [[resource]]
            name = "fstab entry for data volume"

            [resource.kind]
            type = "line_in_file"
            path = "/etc/fstab"
            marker = "$DATA_MOUNT"
            line = "/dev/sdb1 /mnt/data ext4 defaults 0 0"

            [[resource]]
            name = "ripgrep available"
            critical = false

            [resource.kind]
            type = "command_available"
            binary = "rg"
            install = "apt-get install -y ripgrep"
        "#
        .parse()?;

        let expect = Manifest {
            resources: vec![
                ResourceEntry {
                    name: "fstab entry for data volume".into(),
                    critical: true,
                    kind: ResourceKind::LineInFile {
                        path: "/etc/fstab".into(),
                        marker: "$DATA_MOUNT".into(),
                        line: "/dev/sdb1 /mnt/data ext4 defaults 0 0".into(),
                    },
                },
                ResourceEntry {
                    name: "ripgrep available".into(),
                    critical: false,
                    kind: ResourceKind::CommandAvailable {
                        binary: "rg".into(),
                        install: "apt-get install -y ripgrep".into(),
                    },
                },
            ],
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("DEVICE", "/dev/sdb1")])]
    fn deserialize_expands_path_fields() -> anyhow::Result<()> {
        let result: Manifest = r#"
            [[resource]]
            name = "data volume mounted"

            [resource.kind]
            type = "mounted"
            device = "$DEVICE"
            target = "/mnt/data"
            options = "noatime"
        "#
        .parse()?;

        assert_eq!(
            result.resources[0].kind,
            ResourceKind::Mounted {
                device: "/dev/sdb1".into(),
                target: "/mnt/data".into(),
                options: "noatime".into(),
            }
        );

        Ok(())
    }

    #[test]
    fn serialize_manifest() {
        let result = Manifest {
            resources: vec![ResourceEntry {
                name: "login banner".into(),
                critical: true,
                kind: ResourceKind::FilePresent {
                    path: "/etc/motd".into(),
                    contents: "welcome".into(),
                    mode: None,
                },
            }],
        }
        .to_string();

        let expect = indoc! {r#"
            [[resource]]
            name = "login banner"
            critical = true

            [resource.kind]
            type = "file_present"
            path = "/etc/motd"
            contents = "welcome"
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn unknown_entry_field_rejected() {
        let result = r#"
            [[resource]]
            name = "typo"
            critcal = false

            [resource.kind]
            type = "line_in_file"
            path = "/etc/fstab"
            marker = "x"
            line = "y"
        "#
        .parse::<Manifest>();

        assert!(result.is_err(), "typo in field name should be rejected");
    }

    #[test]
    fn invalid_fs_type_surfaces_before_run() {
        let manifest: Manifest = r#"
            [[resource]]
            name = "bad format"

            [resource.kind]
            type = "filesystem_formatted"
            device = "/dev/sdb1"
            fs_type = "ext4; rm -rf /"
        "#
        .parse()
        .unwrap();

        let result = manifest.resources();
        assert!(matches!(result, Err(ManifestError::InvalidFsType(_))));
    }

    #[test]
    fn manifest_builds_resources_in_declared_order() -> anyhow::Result<()> {
        let manifest: Manifest = r#"
            [[resource]]
            name = "second"

            [resource.kind]
            type = "line_in_file"
            path = "fstab"
            marker = "b"
            line = "b"

            [[resource]]
            name = "first"

            [resource.kind]
            type = "line_in_file"
            path = "fstab"
            marker = "a"
            line = "a"
        "#
        .parse()?;

        let resources = manifest.resources()?;
        let names: Vec<_> = resources.iter().map(Resource::name).collect();
        assert_eq!(names, vec!["second", "first"]);

        Ok(())
    }
}
