//! The archival orchestrator.
//!
//! One call to [`Archivist::store`] takes a labeled snippet through
//! validate → allocate → write → index → stage & commit. Each step either
//! succeeds or ends the run with an [`ArchiveError`]; nothing is retried
//! and nothing already on disk is rolled back:
//!
//! - an index failure leaves the fragment file without an index entry;
//! - a repository failure leaves the file and index entry uncommitted.
//!
//! Both cases are logged with the affected paths and surfaced to the
//! caller. `archivist status` lists such discrepancies afterwards.

use std::path::{Path, PathBuf};
use tracing::{error, info, info_span};

use crate::allocator::{CounterAllocator, IdAllocator, ScanAllocator};
use crate::commit_message::describe;
use crate::config::{AllocatorKind, Config};
use crate::envelope::InputEnvelope;
use crate::error::{ArchiveError, Result};
use crate::index_store::{IndexStore, LogIndexStore};
use crate::layout::ArchiveLayout;
use crate::models::{ArchivedFragment, FragmentRecord, MetadataIndex};
use crate::repository::GitCli;
use crate::traits::RepositoryClient;
use crate::writer::FragmentWriter;

/// Result of a committed archival run.
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    pub id: u32,
    pub archived_path: PathBuf,
    pub entry: ArchivedFragment,
    /// Revision created by the repository client; `None` when committing is disabled.
    pub revision: Option<String>,
}

pub struct Archivist {
    layout: ArchiveLayout,
    allocator: Box<dyn IdAllocator>,
    writer: FragmentWriter,
    index: Box<dyn IndexStore>,
    repository: Option<Box<dyn RepositoryClient>>,
}

impl Archivist {
    pub fn new(
        layout: ArchiveLayout,
        allocator: Box<dyn IdAllocator>,
        index: Box<dyn IndexStore>,
        repository: Option<Box<dyn RepositoryClient>>,
    ) -> Self {
        Self {
            writer: FragmentWriter::new(layout.clone()),
            layout,
            allocator,
            index,
            repository,
        }
    }

    /// Wire the default components described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let layout = config.layout();
        let allocator: Box<dyn IdAllocator> = match config.identifiers.allocator {
            AllocatorKind::Counter => Box::new(CounterAllocator::new(layout.clone())),
            AllocatorKind::Scan => Box::new(ScanAllocator::new(layout.clone())),
        };
        let index = Box::new(LogIndexStore::new(&layout));
        let repository: Option<Box<dyn RepositoryClient>> = if config.repository.commit {
            Some(Box::new(GitCli::from_config(&config.repository)))
        } else {
            None
        };
        Self::new(layout, allocator, index, repository)
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// The id the next successful store would receive.
    pub fn peek_next_id(&self) -> Result<u32> {
        self.allocator.peek()
    }

    pub fn load_index(&self) -> Result<MetadataIndex> {
        self.index.load()
    }

    /// Validate an input envelope and archive it.
    pub fn store(&self, envelope: InputEnvelope) -> Result<StoreOutcome> {
        let record = envelope.validate().map_err(|e| {
            error!(stage = e.stage(), error = %e, "rejected input");
            e
        })?;
        self.store_record(&record)
    }

    /// Archive an already validated record.
    pub fn store_record(&self, record: &FragmentRecord) -> Result<StoreOutcome> {
        let span = info_span!("store", id = tracing::field::Empty);
        let _guard = span.enter();

        let id = self.allocator.allocate().map_err(|e| {
            error!(stage = e.stage(), error = %e, "could not allocate fragment id");
            e
        })?;
        span.record("id", id);

        let path = self.writer.write(id, record).map_err(|e| {
            error!(stage = e.stage(), error = %e, "could not write fragment");
            e
        })?;
        let archived_path = self.layout.repo_relative(&path);

        let entry = ArchivedFragment::from_record(id, record, archived_path);
        if let Err(e) = self.index.append(entry.clone()) {
            error!(
                stage = e.stage(),
                error = %e,
                orphan = %path.display(),
                "fragment written but not indexed; leaving file in place"
            );
            return Err(e);
        }

        let revision = match &self.repository {
            Some(repository) => Some(self.commit(repository.as_ref(), id, record, &path)?),
            None => None,
        };

        info!(
            title = %record.generated_title,
            path = %path.display(),
            revision = revision.as_deref().unwrap_or("-"),
            "fragment archived"
        );

        Ok(StoreOutcome {
            id,
            archived_path: path,
            entry,
            revision,
        })
    }

    fn commit(
        &self,
        repository: &dyn RepositoryClient,
        id: u32,
        record: &FragmentRecord,
        fragment_path: &Path,
    ) -> Result<String> {
        let mut paths = vec![fragment_path.to_path_buf()];
        paths.extend(self.index.persisted_paths());
        paths.extend(self.allocator.persisted_paths());
        paths.retain(|p| p.exists());

        let message = describe(id, record);
        let result = repository
            .stage(&paths)
            .and_then(|_| repository.commit(&message));

        result.map_err(|e| {
            let err = ArchiveError::repository(format!("{:#}", e));
            error!(
                stage = err.stage(),
                error = %err,
                fragment = %fragment_path.display(),
                "fragment archived and indexed but not committed"
            );
            err
        })
    }
}
