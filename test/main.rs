// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use std::path::{Path, PathBuf};

/// Fixture file living in the sealed test's working directory.
pub(crate) struct FileFixture {
    path: PathBuf,
}

impl FileFixture {
    pub(crate) fn new(path: impl Into<PathBuf>, contents: impl AsRef<str>) -> Result<Self> {
        let path = path.into();
        std::fs::write(&path, contents.as_ref())?;

        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn contents(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}
