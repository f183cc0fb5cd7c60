//! Search → labeling → archival composition.

use anyhow::{Context, Result};

use crate::archivist::{Archivist, StoreOutcome};
use crate::traits::{LabelingClient, SearchClient};

/// Run one pipeline pass for `keyword`.
///
/// Returns `Ok(None)` when the search collaborator finds no candidate.
/// Collaborator failures and archival failures are returned as errors; there
/// is no retry at this level.
pub fn run_pipeline(
    search: &dyn SearchClient,
    labeler: &dyn LabelingClient,
    archivist: &Archivist,
    keyword: &str,
) -> Result<Option<StoreOutcome>> {
    let discovery = match search
        .search(keyword)
        .with_context(|| format!("search for '{}' failed", keyword))?
    {
        Some(d) => d,
        None => {
            tracing::info!(keyword, "no candidate found");
            return Ok(None);
        }
    };

    tracing::info!(
        keyword,
        repo = %discovery.repo_url,
        path = %discovery.file_path,
        "candidate found"
    );

    let title = labeler
        .label(&discovery.content, &discovery.keyword)
        .with_context(|| format!("labeling {} failed", discovery.file_path))?;

    let outcome = archivist.store(discovery.into_envelope(title))?;
    Ok(Some(outcome))
}
