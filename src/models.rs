//! Core data models used throughout the archival stage.
//!
//! A [`FragmentRecord`] is what the upstream collaborators hand over; an
//! [`ArchivedFragment`] is what the archive owns once the record has been
//! written, and the [`MetadataIndex`] is the catalog of all of them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ArchiveError, Result};

/// Extension that marks a source file as a notebook.
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Extension used for every non-notebook fragment.
pub const SCRIPT_EXTENSION: &str = "py";

/// Keyword recorded when the search collaborator did not report one.
pub const UNKNOWN_KEYWORD: &str = "unknown";

/// A labeled snippet ready for archival. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRecord {
    pub content: String,
    pub source_repo_url: String,
    pub source_file_path: String,
    pub timestamp: String,
    pub search_keyword: Option<String>,
    pub generated_title: String,
}

impl FragmentRecord {
    pub fn file_kind(&self) -> FileKind {
        FileKind::from_source_path(&self.source_file_path)
    }

    pub fn keyword_or_unknown(&self) -> &str {
        self.search_keyword.as_deref().unwrap_or(UNKNOWN_KEYWORD)
    }

    /// Byte length of the original content, header excluded.
    pub fn byte_size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Content kind of a fragment; decides its directory and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Older index documents record the file suffix instead.
    #[serde(alias = "py")]
    Script,
    #[serde(alias = "ipynb")]
    Notebook,
}

impl FileKind {
    pub const ALL: [FileKind; 2] = [FileKind::Script, FileKind::Notebook];

    /// Classify a source path by its extension.
    pub fn from_source_path(path: &str) -> Self {
        let is_notebook = Path::new(path)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(NOTEBOOK_EXTENSION))
            .unwrap_or(false);
        if is_notebook {
            FileKind::Notebook
        } else {
            FileKind::Script
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Script => SCRIPT_EXTENSION,
            FileKind::Notebook => NOTEBOOK_EXTENSION,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Script => "script",
            FileKind::Notebook => "notebook",
        }
    }
}

/// Provenance block of an index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSource {
    pub repo: String,
    pub path: String,
    pub keyword: String,
}

/// One archived fragment as recorded in the metadata index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedFragment {
    pub id: u32,
    pub title: String,
    pub timestamp: String,
    pub source: FragmentSource,
    pub archived_path: String,
    pub file_type: FileKind,
    pub size: u64,
}

impl ArchivedFragment {
    pub fn from_record(id: u32, record: &FragmentRecord, archived_path: String) -> Self {
        Self {
            id,
            title: record.generated_title.clone(),
            timestamp: record.timestamp.clone(),
            source: FragmentSource {
                repo: record.source_repo_url.clone(),
                path: record.source_file_path.clone(),
                keyword: record.keyword_or_unknown().to_string(),
            },
            archived_path,
            file_type: record.file_kind(),
            size: record.byte_size(),
        }
    }
}

/// The catalog document: entries ascending by id, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataIndex {
    pub fragments: Vec<ArchivedFragment>,
}

impl MetadataIndex {
    /// Insert an entry at its sorted position. Duplicate ids are rejected.
    pub fn insert(&mut self, entry: ArchivedFragment) -> Result<()> {
        match self.fragments.binary_search_by_key(&entry.id, |f| f.id) {
            Ok(_) => Err(ArchiveError::index(format!(
                "fragment id {} is already indexed",
                entry.id
            ))),
            Err(pos) => {
                self.fragments.insert(pos, entry);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&ArchivedFragment> {
        self.fragments
            .binary_search_by_key(&id, |f| f.id)
            .ok()
            .map(|pos| &self.fragments[pos])
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn max_id(&self) -> Option<u32> {
        self.fragments.last().map(|f| f.id)
    }
}
