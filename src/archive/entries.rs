//! Zip archive introspection

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open archive {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Read access to the entries of an archive
pub trait ArchiveEntries {
    /// Names of all entries in the archive
    fn entry_names(&self) -> Vec<String>;

    /// Contents of the named entry as text (lossy UTF-8), or `None` if absent
    fn entry_text(&mut self, name: &str) -> Option<String>;

    /// First entry whose name ends with `suffix`
    fn find_entry_by_suffix(&self, suffix: &str) -> Option<String> {
        self.entry_names()
            .into_iter()
            .find(|name| name.ends_with(suffix))
    }
}

/// A jar (zip) archive
pub struct JarArchive<R: Read + Seek = File> {
    archive: ZipArchive<R>,
}

impl JarArchive<File> {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> JarArchive<R> {
    pub fn from_reader(reader: R) -> Result<Self, ArchiveError> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }
}

impl<R: Read + Seek> ArchiveEntries for JarArchive<R> {
    fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    fn entry_text(&mut self, name: &str) -> Option<String> {
        let mut entry = self.archive.by_name(name).ok()?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// In-memory entries for parser tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryArchive {
    entries: std::collections::BTreeMap<String, String>,
}

#[cfg(test)]
impl MemoryArchive {
    pub(crate) fn with_entry(mut self, name: &str, content: &str) -> Self {
        self.entries.insert(name.to_string(), content.to_string());
        self
    }
}

#[cfg(test)]
impl ArchiveEntries for MemoryArchive {
    fn entry_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn entry_text(&mut self, name: &str) -> Option<String> {
        self.entries.get(name).cloned()
    }
}
