//! Reading of the zipped personal data export.

use crate::naming::normalize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

const JSON_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot read export archive {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path:?} is not a zip archive: {message}")]
    InvalidZip { path: PathBuf, message: String },

    #[error("Cannot read archive entry {name}: {message}")]
    Entry { name: String, message: String },
}

/// An opened export archive.
pub struct ExportArchive {
    path: PathBuf,
    zip: ZipArchive<BufReader<File>>,
}

impl ExportArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ArchiveError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let zip = ZipArchive::new(BufReader::new(file)).map_err(|e| ArchiveError::InvalidZip {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { path, zip })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of the JSON file entries, in archive order.
    pub fn json_entries(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        for i in 0..self.zip.len() {
            let Ok(file) = self.zip.by_index_raw(i) else {
                continue;
            };
            if file.is_dir() {
                continue;
            }
            let is_json = Path::new(file.name())
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(JSON_EXTENSION))
                .unwrap_or(false);
            if is_json {
                names.push(file.name().to_string());
            }
        }
        names
    }

    pub fn read(&mut self, name: &str) -> Result<ArchiveEntry, ArchiveError> {
        let entry_error = |message: String| ArchiveError::Entry {
            name: name.to_string(),
            message,
        };
        let mut file = self.zip.by_name(name).map_err(|e| entry_error(e.to_string()))?;
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| entry_error(e.to_string()))?;
        Ok(ArchiveEntry {
            path: name.to_string(),
            bytes,
        })
    }
}

/// The raw content of one archive entry.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    /// File name without the directories leading to it.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn table_name(&self) -> String {
        normalize(self.file_name())
    }

    /// Parses the content, keeping object keys in document order.
    pub fn parse(&self) -> serde_json::Result<Value> {
        // Exports are written with a UTF-8 BOM now and then.
        let bytes = self
            .bytes
            .strip_prefix(b"\xEF\xBB\xBF".as_slice())
            .unwrap_or(&self.bytes);
        serde_json::from_slice(bytes)
    }

    pub fn sha256(&self) -> String {
        format!("{:x}", Sha256::digest(&self.bytes))
    }
}
