//! Saved output helper type.
//!
//! A replay has various outputs, each of which is saved in a separate file.
//! This module provides a type handling all the output file management.

use std::{
    env::current_dir,
    fmt::Display,
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use serde::Serialize;
use time::{macros::format_description, OffsetDateTime};

use crate::cli::Cli;

fn make_unique_result_dir_path<P: AsRef<Path>>(path: Option<P>) -> Result<Option<PathBuf>> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());

    let date_format = format_description!("[year]-[month]-[day]-[hour][minute][second]");
    let formatted_date = now.format(&date_format)?;

    let candidates = std::iter::once(format!("replay-{}", formatted_date))
        .chain(('a'..='z').map(|c| format!("replay-{}-{}", formatted_date, c)));

    for name in candidates {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().join(&name))
            .unwrap_or_else(|| PathBuf::from(&name));

        if !Path::exists(&p) {
            return Ok(Some(p));
        }
    }

    Ok(None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFile {
    Histograms,
    Frames,
    Traces,
    Ukm,
    Jank,
}

impl Display for OutputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputFile::Histograms => "histograms",
            OutputFile::Frames => "frames",
            OutputFile::Traces => "traces",
            OutputFile::Ukm => "ukm",
            OutputFile::Jank => "jank",
        };
        write!(f, "{}.json", name)
    }
}

/// A replay output directory.
#[derive(Debug, Clone)]
pub struct ReplayOutputDirectory {
    path: String,
}

impl ReplayOutputDirectory {
    pub fn new(path: String) -> Self {
        Self { path }
    }

    /// Constructs a `ReplayOutputDirectory` pointing to a directory in `root`
    /// with a unique name. This method merely constructs the struct and does
    /// not create the directory in itself. One must invoke the `create_dir()`
    /// method before any other operations.
    pub fn with_default_name(root: String) -> Result<Self> {
        if let Some(p) = make_unique_result_dir_path(Some(root.clone()))? {
            return Ok(Self::new(p.to_string_lossy().to_string()));
        }

        bail!("Could not create a default output directory in {}", root);
    }

    pub fn file_path(&self, f: OutputFile) -> PathBuf {
        PathBuf::from(self.path.as_str()).join(f.to_string())
    }

    /// Create and open `f` with write permission.
    pub fn create_file(&self, f: OutputFile) -> Result<File> {
        Ok(File::create(self.file_path(f))?)
    }

    /// Serializes `value` as pretty JSON into `f`.
    pub fn save<T: Serialize>(&self, f: OutputFile, value: &T) -> Result<()> {
        let file = self.create_file(f)?;
        serde_json::to_writer_pretty(BufWriter::new(file), value)?;

        Ok(())
    }

    /// Create the directory pointed by `self.path()` if it does not already
    /// exists.
    pub fn create_dir(&self) -> Result<()> {
        if !Path::new(self.path()).exists() {
            std::fs::create_dir_all(self.path())?;
        }

        Ok(())
    }

    /// Returns a reference to the path of the represented output directory.
    pub fn path(&self) -> &str {
        self.path.as_str()
    }
}

impl TryFrom<&Cli> for ReplayOutputDirectory {
    type Error = anyhow::Error;

    fn try_from(cli: &Cli) -> Result<Self> {
        match cli.output_dir() {
            Some(p) => Ok(ReplayOutputDirectory::new(p)),
            None => {
                let cwd = current_dir()?.to_string_lossy().to_string();

                ReplayOutputDirectory::with_default_name(cwd)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_names() {
        let dir = ReplayOutputDirectory::new("out".to_owned());

        assert_eq!(dir.file_path(OutputFile::Histograms), Path::new("out/histograms.json"));
        assert_eq!(OutputFile::Jank.to_string(), "jank.json");
    }

    #[test]
    fn test_default_name_is_unique() {
        let root = std::env::temp_dir().to_string_lossy().to_string();
        let dir = ReplayOutputDirectory::with_default_name(root).unwrap();

        assert!(!Path::new(dir.path()).exists());
        assert!(dir.path().contains("replay-"));
    }
}
