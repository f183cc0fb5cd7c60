//! Export the archive as data for the static fragment gallery.
//!
//! Produces either a plain JSON document or a JavaScript file that assigns
//! the same document to `FRAGMENTS_DATA`, which the gallery page loads
//! without a server. Fragments are listed newest first, with their archived
//! body (header removed) and inferred pattern tags.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::commit_message::infer_tags;
use crate::config::Config;
use crate::index_store::LogIndexStore;
use crate::models::{FileKind, FragmentSource};
use crate::writer::strip_header;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Js,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "js" => Ok(Self::Js),
            other => bail!("Unknown export format: '{}'. Must be json or js.", other),
        }
    }
}

#[derive(Serialize)]
struct ExportData {
    fragments: Vec<ExportFragment>,
}

#[derive(Serialize)]
struct ExportFragment {
    id: u32,
    title: String,
    timestamp: String,
    source: FragmentSource,
    content: String,
    file_type: FileKind,
    patterns: String,
    size: u64,
}

fn collect(config: &Config) -> Result<ExportData> {
    let layout = config.layout();
    let index = LogIndexStore::new(&layout).read()?;

    let mut fragments = Vec::with_capacity(index.len());
    for entry in index.fragments.into_iter().rev() {
        let path = layout.repo_root().join(&entry.archived_path);
        let rendered = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(id = entry.id, path = %path.display(), error = %e, "skipping fragment with unreadable file");
                continue;
            }
        };
        let content = strip_header(&rendered).to_string();
        let patterns = infer_tags(&content).join(",");

        fragments.push(ExportFragment {
            id: entry.id,
            title: entry.title,
            timestamp: entry.timestamp,
            source: entry.source,
            content,
            file_type: entry.file_type,
            patterns,
            size: entry.size,
        });
    }

    Ok(ExportData { fragments })
}

/// Render the export document in the requested format.
pub fn render_export(config: &Config, format: ExportFormat) -> Result<(String, usize)> {
    let data = collect(config)?;
    let count = data.fragments.len();
    let json = serde_json::to_string_pretty(&data)?;
    let text = match format {
        ExportFormat::Json => json,
        ExportFormat::Js => format!(
            "// Fragment data embedded directly in JavaScript\nconst FRAGMENTS_DATA = {};\n",
            json
        ),
    };
    Ok((text, count))
}

/// Export the archive.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub fn run_export(config: &Config, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let (text, count) = render_export(config, format)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write export: {}", path.display()))?;
            eprintln!("Exported {} fragments to {}", count, path.display());
        }
        None => {
            println!("{}", text);
        }
    }

    Ok(())
}
