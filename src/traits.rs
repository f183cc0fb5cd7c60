//! Seams to the external collaborators of the archival stage.
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌───────────┐   ┌──────────────────┐
//! │ SearchClient │──▶│ LabelingClient │──▶│ Archivist │──▶│ RepositoryClient │
//! └──────────────┘   └────────────────┘   └───────────┘   └──────────────────┘
//! ```
//!
//! Only [`RepositoryClient`] has an implementation in this crate
//! ([`GitCli`](crate::repository::GitCli)). Search and labeling live in
//! other stages of the pipeline; the traits let them be plugged into
//! [`run_pipeline`](crate::pipeline::run_pipeline) or replaced by fakes in
//! tests.

use anyhow::Result;
use std::path::PathBuf;

use crate::envelope::InputEnvelope;

/// A candidate file picked by the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub content: String,
    pub repo_url: String,
    pub file_path: String,
    pub keyword: String,
    /// ISO-8601 acquisition time.
    pub timestamp: String,
}

impl Discovery {
    /// Combine with a generated title into the envelope the archivist reads.
    pub fn into_envelope(self, generated_title: String) -> InputEnvelope {
        InputEnvelope {
            file_content: Some(self.content),
            repo_url: Some(self.repo_url),
            file_path: Some(self.file_path),
            timestamp: Some(self.timestamp),
            generated_title: Some(generated_title),
            search_keyword: Some(self.keyword),
        }
    }
}

/// Finds zero or one candidate file for a keyword.
pub trait SearchClient {
    fn search(&self, keyword: &str) -> Result<Option<Discovery>>;
}

/// Produces a short descriptive title for a piece of code.
pub trait LabelingClient {
    fn label(&self, content: &str, keyword: &str) -> Result<String>;
}

/// Stages files and records them in version history.
pub trait RepositoryClient {
    /// Stage the given paths for the next commit.
    fn stage(&self, paths: &[PathBuf]) -> Result<()>;

    /// Commit everything staged. Returns the new revision id.
    fn commit(&self, message: &str) -> Result<String>;
}
