//! On-disk layout of the archive.
//!
//! ```text
//! <repo>/<root>/<script_dir>/fragment_0001.py
//! <repo>/<root>/<notebook_dir>/fragment_0002.ipynb
//! <repo>/<root>/<metadata_dir>/index.json
//! <repo>/<root>/<metadata_dir>/index.log
//! <repo>/<root>/<metadata_dir>/counter.json
//! ```

use atomic_write_file::AtomicWriteFile;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};
use crate::models::FileKind;

pub const FRAGMENT_PREFIX: &str = "fragment_";
pub const INDEX_DOCUMENT: &str = "index.json";
pub const INDEX_LOG: &str = "index.log";
pub const COUNTER_RECORD: &str = "counter.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    repo_root: PathBuf,
    root: PathBuf,
    script_dir: PathBuf,
    notebook_dir: PathBuf,
    metadata_dir: PathBuf,
}

impl ArchiveLayout {
    pub fn new(
        repo_root: &Path,
        archive_root: &Path,
        script_dir: &str,
        notebook_dir: &str,
        metadata_dir: &str,
    ) -> Self {
        let root = repo_root.join(archive_root);
        Self {
            repo_root: repo_root.to_path_buf(),
            script_dir: root.join(script_dir),
            notebook_dir: root.join(notebook_dir),
            metadata_dir: root.join(metadata_dir),
            root,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: FileKind) -> &Path {
        match kind {
            FileKind::Script => &self.script_dir,
            FileKind::Notebook => &self.notebook_dir,
        }
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    pub fn index_document(&self) -> PathBuf {
        self.metadata_dir.join(INDEX_DOCUMENT)
    }

    pub fn index_log(&self) -> PathBuf {
        self.metadata_dir.join(INDEX_LOG)
    }

    pub fn counter_record(&self) -> PathBuf {
        self.metadata_dir.join(COUNTER_RECORD)
    }

    pub fn fragment_file_name(id: u32, kind: FileKind) -> String {
        format!("{}{:04}.{}", FRAGMENT_PREFIX, id, kind.extension())
    }

    pub fn fragment_path(&self, id: u32, kind: FileKind) -> PathBuf {
        self.kind_dir(kind).join(Self::fragment_file_name(id, kind))
    }

    /// Path relative to the repository root with `/` separators, as stored
    /// in the index and handed to the repository client.
    pub fn repo_relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.repo_root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Create the kind and metadata directories if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.script_dir, &self.notebook_dir, &self.metadata_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ArchiveError::io(dir.clone(), e))?;
        }
        Ok(())
    }
}

/// Replace `path` with `bytes` so readers see either the old or the new
/// content, never a truncated file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = AtomicWriteFile::open(path)?;
    file.write_all(bytes)?;
    file.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ArchiveLayout {
        ArchiveLayout::new(
            Path::new("/repo"),
            Path::new("memorie"),
            "python",
            "jupyter",
            "_metadata",
        )
    }

    #[test]
    fn fragment_names_are_zero_padded() {
        assert_eq!(
            ArchiveLayout::fragment_file_name(1, FileKind::Script),
            "fragment_0001.py"
        );
        assert_eq!(
            ArchiveLayout::fragment_file_name(42, FileKind::Notebook),
            "fragment_0042.ipynb"
        );
        assert_eq!(
            ArchiveLayout::fragment_file_name(12345, FileKind::Script),
            "fragment_12345.py"
        );
    }

    #[test]
    fn paths_per_kind() {
        let layout = layout();
        assert_eq!(
            layout.fragment_path(3, FileKind::Notebook),
            PathBuf::from("/repo/memorie/jupyter/fragment_0003.ipynb")
        );
        assert_eq!(
            layout.index_document(),
            PathBuf::from("/repo/memorie/_metadata/index.json")
        );
    }

    #[test]
    fn repo_relative_uses_forward_slashes() {
        let layout = layout();
        let path = layout.fragment_path(1, FileKind::Script);
        assert_eq!(layout.repo_relative(&path), "memorie/python/fragment_0001.py");
    }

    #[test]
    fn write_atomic_replaces_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
