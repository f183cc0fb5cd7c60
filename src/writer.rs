//! Fragment file rendering and persistence.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::error::{ArchiveError, Result};
use crate::layout::ArchiveLayout;
use crate::models::FragmentRecord;

/// Delimiter that opens and closes the header block.
const HEADER_FENCE: &str = "\"\"\"";

/// Render the persisted form of a fragment: header block, blank line, then
/// the original content verbatim.
pub fn render_fragment(id: u32, record: &FragmentRecord) -> String {
    format!(
        "{fence}\n# Fragment {id:04}\n# Title: {title}\n# Origin: {origin}\n# Date: {date}\n{fence}\n\n{content}",
        fence = HEADER_FENCE,
        id = id,
        title = record.generated_title,
        origin = record.source_repo_url,
        date = record.timestamp,
        content = record.content,
    )
}

/// Strip the header block from a persisted fragment, returning the body.
///
/// Text without a recognizable header is returned unchanged.
pub fn strip_header(rendered: &str) -> &str {
    let Some(rest) = rendered.strip_prefix(HEADER_FENCE) else {
        return rendered;
    };
    let closing = format!("\n{}\n", HEADER_FENCE);
    match rest.find(&closing) {
        Some(pos) => {
            let body = &rest[pos + closing.len()..];
            body.strip_prefix('\n').unwrap_or(body)
        }
        None => rendered,
    }
}

/// Writes fragments into the kind directory matching their source path.
pub struct FragmentWriter {
    layout: ArchiveLayout,
}

impl FragmentWriter {
    pub fn new(layout: ArchiveLayout) -> Self {
        Self { layout }
    }

    pub fn target_path(&self, id: u32, record: &FragmentRecord) -> PathBuf {
        self.layout.fragment_path(id, record.file_kind())
    }

    /// Persist the fragment. Never overwrites: an existing file at the target
    /// path is a collision error.
    pub fn write(&self, id: u32, record: &FragmentRecord) -> Result<PathBuf> {
        let kind = record.file_kind();
        let dir = self.layout.kind_dir(kind);
        std::fs::create_dir_all(dir).map_err(|source| ArchiveError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = self.layout.fragment_path(id, kind);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ArchiveError::Collision(path));
            }
            Err(source) => return Err(ArchiveError::Write { path, source }),
        };

        let rendered = render_fragment(id, record);
        file.write_all(rendered.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|source| ArchiveError::Write {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(id, kind = kind.as_str(), path = %path.display(), "fragment written");
        Ok(path)
    }
}
