//! Archive health report.
//!
//! Compares the fragment files on disk with the metadata index and reports
//! any disagreement. Nothing is repaired: a fragment written by a run whose
//! index update failed shows up here as unindexed and stays that way until
//! someone intervenes.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::allocator::scan_kind_dir;
use crate::archivist::Archivist;
use crate::config::Config;
use crate::index_store::LogIndexStore;
use crate::models::FileKind;
use crate::repository::GitCli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryHealth {
    Disabled,
    Ok,
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct ArchiveStatus {
    pub archive_root: PathBuf,
    pub scripts: usize,
    pub notebooks: usize,
    pub indexed: usize,
    pub next_id: u32,
    /// Ids with a fragment file but no index entry.
    pub unindexed: Vec<u32>,
    /// Ids with an index entry whose archived file is gone.
    pub missing_files: Vec<u32>,
    /// Ids present in both kind directories.
    pub duplicate_ids: Vec<u32>,
    pub repository: RepositoryHealth,
}

impl ArchiveStatus {
    pub fn is_consistent(&self) -> bool {
        self.unindexed.is_empty() && self.missing_files.is_empty() && self.duplicate_ids.is_empty()
    }
}

pub fn archive_status(config: &Config) -> Result<ArchiveStatus> {
    let layout = config.layout();

    let scripts = scan_kind_dir(layout.kind_dir(FileKind::Script), FileKind::Script)?;
    let notebooks = scan_kind_dir(layout.kind_dir(FileKind::Notebook), FileKind::Notebook)?;

    let index = LogIndexStore::new(&layout).read()?;

    let script_ids: BTreeSet<u32> = scripts.iter().copied().collect();
    let notebook_ids: BTreeSet<u32> = notebooks.iter().copied().collect();
    let on_disk: BTreeSet<u32> = script_ids.union(&notebook_ids).copied().collect();
    let indexed: BTreeSet<u32> = index.fragments.iter().map(|f| f.id).collect();

    let missing_files = index
        .fragments
        .iter()
        .filter(|f| !layout.repo_root().join(&f.archived_path).exists())
        .map(|f| f.id)
        .collect();

    let repository = if config.repository.commit {
        match GitCli::from_config(&config.repository).health() {
            Ok(()) => RepositoryHealth::Ok,
            Err(e) => RepositoryHealth::Unavailable(format!("{:#}", e)),
        }
    } else {
        RepositoryHealth::Disabled
    };

    Ok(ArchiveStatus {
        archive_root: layout.root().to_path_buf(),
        scripts: scripts.len(),
        notebooks: notebooks.len(),
        indexed: index.len(),
        next_id: Archivist::from_config(config).peek_next_id()?,
        unindexed: on_disk.difference(&indexed).copied().collect(),
        missing_files,
        duplicate_ids: script_ids.intersection(&notebook_ids).copied().collect(),
        repository,
    })
}

pub fn print_status(status: &ArchiveStatus) {
    println!("{:<16} {}", "ARCHIVE", status.archive_root.display());
    println!("{:<16} {}", "scripts", status.scripts);
    println!("{:<16} {}", "notebooks", status.notebooks);
    println!("{:<16} {}", "indexed", status.indexed);
    println!("{:<16} {}", "next id", status.next_id);

    let repo = match &status.repository {
        RepositoryHealth::Disabled => "disabled".to_string(),
        RepositoryHealth::Ok => "ok".to_string(),
        RepositoryHealth::Unavailable(reason) => format!("unavailable ({})", reason),
    };
    println!("{:<16} {}", "repository", repo);

    if status.is_consistent() {
        println!("{:<16} ok", "consistency");
        return;
    }
    println!("{:<16} DISCREPANCIES", "consistency");
    print_ids("unindexed", &status.unindexed);
    print_ids("missing file", &status.missing_files);
    print_ids("duplicate id", &status.duplicate_ids);
}

fn print_ids(label: &str, ids: &[u32]) {
    if ids.is_empty() {
        return;
    }
    let list: Vec<String> = ids.iter().map(|id| format!("{:04}", id)).collect();
    println!("  {:<14} {}", label, list.join(", "));
}
