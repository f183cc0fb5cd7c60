//! Metadata index persistence.
//!
//! The source of truth is an append-only JSON-lines log in the metadata
//! directory. Every line holds one [`ArchivedFragment`] and the SHA-256 of
//! its serialized form:
//!
//! ```text
//! {"checksum":"9f2c…","entry":{"id":1,"title":"…",…}}
//! ```
//!
//! The current index is a fold over the log. After each append the full
//! `index.json` document (`{"fragments": [...]}`, ids ascending) is
//! re-materialized with an atomic replace, so readers of the document never
//! observe a half-written file and earlier entries survive a crash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};
use crate::layout::{write_atomic, ArchiveLayout};
use crate::models::{ArchivedFragment, MetadataIndex};

/// Persistent catalog of archived fragments.
pub trait IndexStore {
    /// Read the current index, initializing an empty one if none exists.
    fn load(&self) -> Result<MetadataIndex>;

    /// Add one entry and persist. Returns the index including the entry.
    fn append(&self, entry: ArchivedFragment) -> Result<MetadataIndex>;

    /// Files that make up the persisted index, for staging into history.
    fn persisted_paths(&self) -> Vec<PathBuf>;
}

#[derive(Debug, Serialize, Deserialize)]
struct LogRecord {
    checksum: String,
    entry: ArchivedFragment,
}

impl LogRecord {
    fn new(entry: ArchivedFragment) -> Result<Self> {
        let checksum = entry_checksum(&entry)?;
        Ok(Self { checksum, entry })
    }

    fn verify(&self) -> Result<()> {
        if entry_checksum(&self.entry)? == self.checksum {
            Ok(())
        } else {
            Err(ArchiveError::index(format!(
                "checksum mismatch for fragment {}",
                self.entry.id
            )))
        }
    }
}

fn entry_checksum(entry: &ArchivedFragment) -> Result<String> {
    let bytes = serde_json::to_vec(entry)
        .map_err(|e| ArchiveError::index(format!("cannot encode entry {}: {}", entry.id, e)))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn index_io(path: &Path, err: std::io::Error) -> ArchiveError {
    ArchiveError::index(format!("{}: {}", path.display(), err))
}

/// Log-backed index store with a materialized JSON document.
pub struct LogIndexStore {
    log_path: PathBuf,
    document_path: PathBuf,
    metadata_dir: PathBuf,
}

impl LogIndexStore {
    pub fn new(layout: &ArchiveLayout) -> Self {
        Self {
            log_path: layout.index_log(),
            document_path: layout.index_document(),
            metadata_dir: layout.metadata_dir().to_path_buf(),
        }
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn ensure_metadata_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.metadata_dir).map_err(|e| index_io(&self.metadata_dir, e))
    }

    /// Fold the log into an index. A torn final line is dropped.
    fn replay(&self) -> Result<MetadataIndex> {
        let raw = std::fs::read(&self.log_path).map_err(|e| index_io(&self.log_path, e))?;
        let (complete, torn) = split_torn_tail(&raw);
        if let Some(tail) = torn {
            tracing::warn!(
                path = %self.log_path.display(),
                bytes = tail.len(),
                "ignoring incomplete trailing record in index log"
            );
        }

        // Only the terminated prefix is decoded; a torn tail may end mid-character.
        let complete = std::str::from_utf8(complete).map_err(|e| {
            ArchiveError::index(format!("{}: {}", self.log_path.display(), e))
        })?;

        let mut index = MetadataIndex::default();
        for (lineno, line) in complete.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: LogRecord = serde_json::from_str(line).map_err(|e| {
                ArchiveError::index(format!(
                    "corrupt record at {}:{}: {}",
                    self.log_path.display(),
                    lineno + 1,
                    e
                ))
            })?;
            record.verify()?;
            index.insert(record.entry)?;
        }
        Ok(index)
    }

    fn parse_document(&self) -> Result<MetadataIndex> {
        let raw = std::fs::read_to_string(&self.document_path)
            .map_err(|e| index_io(&self.document_path, e))?;
        serde_json::from_str(&raw).map_err(|e| {
            ArchiveError::index(format!(
                "corrupt index document {}: {}",
                self.document_path.display(),
                e
            ))
        })
    }

    /// Read the current index without creating or rewriting any file.
    ///
    /// Folds the log when there is one, otherwise parses the document,
    /// otherwise returns an empty index.
    pub fn read(&self) -> Result<MetadataIndex> {
        if self.log_path.exists() {
            return self.replay();
        }
        if self.document_path.exists() {
            let mut index = MetadataIndex::default();
            for entry in self.parse_document()?.fragments {
                index.insert(entry)?;
            }
            return Ok(index);
        }
        Ok(MetadataIndex::default())
    }

    /// Seed the log from an index document that predates it.
    fn import_document(&self) -> Result<MetadataIndex> {
        let legacy = self.parse_document()?;

        let mut index = MetadataIndex::default();
        let mut lines = String::new();
        for entry in legacy.fragments {
            lines.push_str(&encode_record(&entry)?);
            index.insert(entry)?;
        }
        write_atomic(&self.log_path, lines.as_bytes()).map_err(|e| index_io(&self.log_path, e))?;
        tracing::info!(
            entries = index.len(),
            path = %self.document_path.display(),
            "seeded index log from existing document"
        );
        Ok(index)
    }

    fn write_document(&self, index: &MetadataIndex) -> Result<()> {
        let mut json = serde_json::to_string_pretty(index)
            .map_err(|e| ArchiveError::index(format!("cannot encode index: {}", e)))?;
        json.push('\n');
        write_atomic(&self.document_path, json.as_bytes())
            .map_err(|e| index_io(&self.document_path, e))
    }

    fn append_record(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| index_io(&self.log_path, e))?;

        // Drop a torn tail left by an interrupted append before writing after it.
        let raw = std::fs::read(&self.log_path).map_err(|e| index_io(&self.log_path, e))?;
        if let (complete, Some(_)) = split_torn_tail(&raw) {
            file.set_len(complete.len() as u64)
                .map_err(|e| index_io(&self.log_path, e))?;
        }

        file.write_all(line.as_bytes())
            .map_err(|e| index_io(&self.log_path, e))?;
        file.sync_data().map_err(|e| index_io(&self.log_path, e))
    }
}

/// One log line, newline-terminated.
fn encode_record(entry: &ArchivedFragment) -> Result<String> {
    let record = LogRecord::new(entry.clone())?;
    let mut line = serde_json::to_string(&record)
        .map_err(|e| ArchiveError::index(format!("cannot encode entry {}: {}", entry.id, e)))?;
    line.push('\n');
    Ok(line)
}

/// Split a log into its newline-terminated prefix and an unterminated tail.
fn split_torn_tail(raw: &[u8]) -> (&[u8], Option<&[u8]>) {
    match raw.iter().rposition(|&b| b == b'\n') {
        Some(pos) if pos + 1 == raw.len() => (raw, None),
        Some(pos) => (&raw[..pos + 1], Some(&raw[pos + 1..])),
        None if raw.is_empty() => (raw, None),
        None => (&raw[..0], Some(raw)),
    }
}

impl IndexStore for LogIndexStore {
    fn load(&self) -> Result<MetadataIndex> {
        if self.log_path.exists() {
            let index = self.replay()?;
            if !self.document_path.exists() {
                self.write_document(&index)?;
            }
            return Ok(index);
        }

        self.ensure_metadata_dir()?;
        if self.document_path.exists() {
            return self.import_document();
        }

        let index = MetadataIndex::default();
        self.write_document(&index)?;
        tracing::debug!(path = %self.document_path.display(), "initialized empty index");
        Ok(index)
    }

    fn append(&self, entry: ArchivedFragment) -> Result<MetadataIndex> {
        let mut index = self.load()?;
        let line = encode_record(&entry)?;
        let id = entry.id;
        index.insert(entry)?;

        self.append_record(&line)?;
        self.write_document(&index)?;
        tracing::debug!(id, entries = index.len(), "index updated");
        Ok(index)
    }

    fn persisted_paths(&self) -> Vec<PathBuf> {
        vec![self.document_path.clone(), self.log_path.clone()]
    }
}
