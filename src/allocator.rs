//! Fragment identifier allocation.
//!
//! Two strategies sit behind [`IdAllocator`]:
//!
//! - [`ScanAllocator`] derives the next id from the fragment files on disk
//!   (`max + 1`, or `1` for an empty archive).
//! - [`CounterAllocator`] keeps an authoritative counter record and advances
//!   it with compare-and-swap under an exclusive lock. The directory scan
//!   still acts as a floor so that files placed by hand are never shadowed.
//!
//! Neither makes concurrent archival runs safe end to end: the write, index
//! and commit steps that follow allocation are not locked. Schedule one
//! archival run at a time per archive.

use fs2::FileExt;
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ArchiveError, Result};
use crate::layout::{write_atomic, ArchiveLayout, FRAGMENT_PREFIX};
use crate::models::FileKind;

/// Source of fresh fragment ids.
pub trait IdAllocator {
    /// The id the next `allocate` would return, without reserving it.
    fn peek(&self) -> Result<u32>;

    /// Reserve and return the next id.
    fn allocate(&self) -> Result<u32>;

    /// Files holding allocator state that belong in version history.
    fn persisted_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Directory-scan allocator.
pub struct ScanAllocator {
    layout: ArchiveLayout,
}

impl ScanAllocator {
    pub fn new(layout: ArchiveLayout) -> Self {
        Self { layout }
    }

    /// Highest fragment id present on disk across both kind directories.
    pub fn max_existing_id(&self) -> Result<Option<u32>> {
        let mut max: Option<u32> = None;
        for kind in FileKind::ALL {
            for id in scan_kind_dir(self.layout.kind_dir(kind), kind)? {
                max = Some(max.map_or(id, |m| m.max(id)));
            }
        }
        Ok(max)
    }
}

impl IdAllocator for ScanAllocator {
    fn peek(&self) -> Result<u32> {
        next_after(self.max_existing_id()?.unwrap_or(0))
    }

    fn allocate(&self) -> Result<u32> {
        let id = self.peek()?;
        tracing::debug!(id, "allocated fragment id from directory scan");
        Ok(id)
    }
}

/// List the ids of well-formed fragment files in one kind directory.
///
/// Names that do not look like `fragment_<digits>.<ext>` are skipped. A
/// missing directory is an empty archive.
pub fn scan_kind_dir(dir: &Path, kind: FileKind) -> Result<Vec<u32>> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(ArchiveError::Allocation(format!(
                "cannot read {}: not a directory",
                dir.display()
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ArchiveError::Allocation(format!(
                "cannot read {}: {}",
                dir.display(),
                e
            )))
        }
    }

    let matcher = fragment_matcher(kind)?;
    let mut ids = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            ArchiveError::Allocation(format!("cannot read {}: {}", dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !matcher.is_match(name.as_ref()) {
            continue;
        }

        match parse_fragment_id(&name, kind)? {
            Some(id) => ids.push(id),
            None => tracing::debug!(file = %name, "ignoring non-fragment file"),
        }
    }

    ids.sort_unstable();
    Ok(ids)
}

fn fragment_matcher(kind: FileKind) -> Result<GlobMatcher> {
    let pattern = format!("{}*.{}", FRAGMENT_PREFIX, kind.extension());
    Glob::new(&pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| ArchiveError::Allocation(format!("bad fragment pattern: {}", e)))
}

/// Parse `fragment_0042.py` into `42`.
///
/// Returns `Ok(None)` for names that are not fragment files and an error for
/// names that are fragment files but carry an id too large to represent.
pub fn parse_fragment_id(file_name: &str, kind: FileKind) -> Result<Option<u32>> {
    let digits = file_name
        .strip_prefix(FRAGMENT_PREFIX)
        .and_then(|rest| rest.strip_suffix(kind.extension()))
        .and_then(|rest| rest.strip_suffix('.'));

    let digits = match digits {
        Some(d) if !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()) => d,
        _ => return Ok(None),
    };

    digits.parse::<u32>().map(Some).map_err(|_| {
        ArchiveError::Allocation(format!("fragment id out of range in '{}'", file_name))
    })
}

fn next_after(last: u32) -> Result<u32> {
    last.checked_add(1)
        .ok_or_else(|| ArchiveError::Allocation("fragment id space exhausted".to_string()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CounterRecord {
    last_id: u32,
}

/// Counter-record allocator with compare-and-swap semantics.
pub struct CounterAllocator {
    layout: ArchiveLayout,
    scan: ScanAllocator,
}

impl CounterAllocator {
    pub fn new(layout: ArchiveLayout) -> Self {
        Self {
            scan: ScanAllocator::new(layout.clone()),
            layout,
        }
    }

    /// The last id recorded in the counter, `0` when there is no record yet.
    pub fn last_id(&self) -> Result<u32> {
        read_counter(&self.layout.counter_record()).map(|r| r.map_or(0, |r| r.last_id))
    }

    /// Move the counter from `expected` to `new`.
    ///
    /// The record is re-read under an exclusive lock; if it no longer holds
    /// `expected` another writer got there first and the swap is refused.
    pub fn compare_and_swap(&self, expected: u32, new: u32) -> Result<()> {
        let path = self.layout.counter_record();
        let metadata_dir = self.layout.metadata_dir();
        std::fs::create_dir_all(metadata_dir)
            .map_err(|e| ArchiveError::io(metadata_dir, e))?;

        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| ArchiveError::io(&lock_path, e))?;
        lock.lock_exclusive()
            .map_err(|e| ArchiveError::io(&lock_path, e))?;

        let result = swap_counter(&path, expected, new);

        if let Err(e) = FileExt::unlock(&lock) {
            tracing::warn!(path = %lock_path.display(), error = %e, "failed to release counter lock");
        }
        result
    }
}

impl IdAllocator for CounterAllocator {
    fn peek(&self) -> Result<u32> {
        let floor = self.scan.max_existing_id()?.unwrap_or(0);
        next_after(self.last_id()?.max(floor))
    }

    fn allocate(&self) -> Result<u32> {
        let observed = self.last_id()?;
        let floor = self.scan.max_existing_id()?.unwrap_or(0);
        if floor > observed {
            tracing::warn!(
                counter = observed,
                on_disk = floor,
                "counter record is behind the fragment files; advancing past them"
            );
        }
        let id = next_after(observed.max(floor))?;
        self.compare_and_swap(observed, id)?;
        tracing::debug!(id, "allocated fragment id from counter record");
        Ok(id)
    }

    fn persisted_paths(&self) -> Vec<PathBuf> {
        vec![self.layout.counter_record()]
    }
}

fn swap_counter(path: &Path, expected: u32, new: u32) -> Result<()> {
    let found = read_counter(path)?.map_or(0, |r| r.last_id);
    if found != expected {
        return Err(ArchiveError::AllocationConflict { expected, found });
    }
    let bytes = serde_json::to_vec(&CounterRecord { last_id: new })
        .map_err(|e| ArchiveError::Allocation(format!("cannot encode counter: {}", e)))?;
    write_atomic(path, &bytes).map_err(|e| ArchiveError::io(path, e))
}

fn read_counter(path: &Path) -> Result<Option<CounterRecord>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ArchiveError::io(path, e)),
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        ArchiveError::Allocation(format!("corrupt counter record {}: {}", path.display(), e))
    })
}
