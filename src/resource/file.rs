// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File-content resource kinds.
//!
//! Two desired-state assertions over regular files:
//!
//! - [`FilePresent`]: the file exists with exactly the desired contents, and
//!   optionally a desired unix mode. The corrective action materializes the
//!   whole file, the way a provisioning script would write out a config file
//!   from a heredoc.
//! - [`LineInFile`]: some line of the file contains a marker substring. The
//!   corrective action appends one full line. This is the general form of the
//!   classic fstab idiom `grep -q marker file || echo line >> file`.
//!
//! # Marker Versus Full Line
//!
//! [`LineInFile`] deliberately separates the marker it probes for from the
//! full line its action appends. The appended text may embed values that
//! should not be repeated identically on re-run, e.g., a timestamp in a
//! trailing comment, while the marker identifies intent uniquely. Probing for
//! the marker instead of the whole line is what keeps re-runs from stacking
//! duplicate entries.

use crate::resource::{Action, ApplyError, Criticality, Probe, ProbeError, Resource, Verdict};

use std::{
    fs::{read_to_string, write},
    io::ErrorKind,
    path::PathBuf,
};
use tracing::{debug, info};

/// Assert that a file exists with exact desired contents.
#[derive(Clone, Debug)]
pub struct FilePresent {
    path: PathBuf,
    contents: String,
    mode: Option<u32>,
}

impl FilePresent {
    /// Construct new file-presence assertion.
    ///
    /// A `mode` of `None` leaves permissions alone on unix, and is the only
    /// meaningful choice off unix.
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>, mode: Option<u32>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            mode,
        }
    }

    /// Package this assertion as a named [`Resource`].
    pub fn resource(self, name: impl Into<String>, criticality: Criticality) -> Resource {
        Resource::new(name, criticality, self.clone(), self)
    }
}

impl Probe for FilePresent {
    fn check(&self) -> Result<Verdict, ProbeError> {
        match read_to_string(&self.path) {
            Ok(found) if found == self.contents => Ok(Verdict::Satisfied),
            Ok(_) => Ok(Verdict::unsatisfied(format!(
                "{:?} exists with differing contents",
                self.path.display()
            ))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Verdict::unsatisfied(format!(
                "{:?} does not exist",
                self.path.display()
            ))),
            Err(err) => Err(err.into()),
        }
    }
}

impl Action for FilePresent {
    fn apply(&self) -> Result<(), ApplyError> {
        info!("materialize file {:?}", self.path.display());
        write(&self.path, self.contents.as_bytes())?;

        #[cfg(unix)]
        if let Some(mode) = self.mode {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(mode))?;
        }

        Ok(())
    }
}

/// Assert that some line of a file contains a marker substring.
#[derive(Clone, Debug)]
pub struct LineInFile {
    path: PathBuf,
    marker: String,
    line: String,
}

impl LineInFile {
    /// Construct new marker-line assertion.
    ///
    /// The `marker` is matched verbatim as a substring of individual lines.
    /// The `line` is what gets appended when no line carries the marker; it
    /// should itself contain the marker or every run will re-append it.
    pub fn new(
        path: impl Into<PathBuf>,
        marker: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            marker: marker.into(),
            line: line.into(),
        }
    }

    /// Package this assertion as a named [`Resource`].
    pub fn resource(self, name: impl Into<String>, criticality: Criticality) -> Resource {
        Resource::new(name, criticality, self.clone(), self)
    }
}

impl Probe for LineInFile {
    fn check(&self) -> Result<Verdict, ProbeError> {
        let content = match read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(Verdict::unsatisfied(format!(
                    "{:?} does not exist",
                    self.path.display()
                )))
            }
            Err(err) => return Err(err.into()),
        };

        if content.lines().any(|line| line.contains(&self.marker)) {
            Ok(Verdict::Satisfied)
        } else {
            Ok(Verdict::unsatisfied(format!(
                "no line of {:?} contains {:?}",
                self.path.display(),
                self.marker
            )))
        }
    }
}

impl Action for LineInFile {
    fn apply(&self) -> Result<(), ApplyError> {
        let mut content = match read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        // INVARIANT: Appended line always starts at column zero.
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&self.line);
        content.push('\n');

        debug!("append {:?} to {:?}", self.line, self.path.display());
        write(&self.path, content.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test]
    fn file_present_probe_distinguishes_missing_and_differing() -> anyhow::Result<()> {
        let assertion = FilePresent::new("motd", "welcome\n", None);
        assert!(!assertion.check()?.is_satisfied());

        std::fs::write("motd", "goodbye\n")?;
        assert!(!assertion.check()?.is_satisfied());

        std::fs::write("motd", "welcome\n")?;
        assert!(assertion.check()?.is_satisfied());

        Ok(())
    }

    #[sealed_test]
    fn file_present_apply_materializes_contents() -> anyhow::Result<()> {
        let assertion = FilePresent::new("motd", "welcome\n", None);
        assertion.apply()?;

        assert_eq!(std::fs::read_to_string("motd")?, "welcome\n");
        assert!(assertion.check()?.is_satisfied());

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn file_present_apply_sets_mode() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let assertion = FilePresent::new("secret", "hunter2\n", Some(0o600));
        assertion.apply()?;

        let mode = std::fs::metadata("secret")?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        Ok(())
    }

    #[sealed_test]
    fn line_in_file_probe_matches_marker_substring() -> anyhow::Result<()> {
        std::fs::write(
            "fstab",
            indoc! {r#"
                /dev/sda1 / ext4 defaults 0 1
                /dev/sdb1 /mnt/data ext4 defaults 0 0
            "#},
        )?;

        let present = LineInFile::new("fstab", "/mnt/data", "unused");
        assert!(present.check()?.is_satisfied());

        let absent = LineInFile::new("fstab", "/mnt/other", "unused");
        assert!(!absent.check()?.is_satisfied());

        Ok(())
    }

    #[sealed_test]
    fn line_in_file_probe_treats_missing_file_as_unsatisfied() -> anyhow::Result<()> {
        let assertion = LineInFile::new("fstab", "/mnt/data", "unused");
        assert!(!assertion.check()?.is_satisfied());

        Ok(())
    }

    #[sealed_test]
    fn line_in_file_apply_appends_on_fresh_line() -> anyhow::Result<()> {
        std::fs::write("fstab", "/dev/sda1 / ext4 defaults 0 1")?;

        let assertion = LineInFile::new(
            "fstab",
            "/mnt/data",
            "/dev/sdb1 /mnt/data ext4 defaults 0 0",
        );
        assertion.apply()?;

        let expect = indoc! {r#"
            /dev/sda1 / ext4 defaults 0 1
            /dev/sdb1 /mnt/data ext4 defaults 0 0
        "#};
        assert_eq!(std::fs::read_to_string("fstab")?, expect);
        assert!(assertion.check()?.is_satisfied());

        Ok(())
    }

    #[sealed_test]
    fn line_in_file_apply_creates_missing_file() -> anyhow::Result<()> {
        let assertion = LineInFile::new("hosts", "10.0.0.2", "10.0.0.2 backup");
        assertion.apply()?;

        assert_eq!(std::fs::read_to_string("hosts")?, "10.0.0.2 backup\n");

        Ok(())
    }
}
