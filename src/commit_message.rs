//! Commit message rendering.
//!
//! [`describe`] is a pure function of the fragment id and record: the same
//! input always produces byte-identical text. Characteristic tags come from
//! a fixed, ordered marker table scanned against the lower-cased content.

use crate::models::FragmentRecord;

/// Most tags a single message carries.
pub const MAX_TAGS: usize = 3;

/// Tag emitted when no marker matches.
pub const UNCLASSIFIED_TAG: &str = "undetermined nature";

/// `(marker substring, tag)` pairs, in scan order.
pub const MARKERS: &[(&str, &str)] = &[
    ("class", "object structure"),
    ("def", "computational function"),
    ("import torch", "neural tensor"),
    ("model", "cognitive model"),
    ("train", "machine learning"),
];

/// Tags for `content`: up to [`MAX_TAGS`] matches in table order, or the
/// single placeholder tag when nothing matches.
pub fn infer_tags(content: &str) -> Vec<&'static str> {
    let normalized = content.to_lowercase();
    let tags: Vec<&'static str> = MARKERS
        .iter()
        .filter(|(marker, _)| normalized.contains(marker))
        .map(|(_, tag)| *tag)
        .take(MAX_TAGS)
        .collect();

    if tags.is_empty() {
        vec![UNCLASSIFIED_TAG]
    } else {
        tags
    }
}

/// Build the commit message for fragment `id`.
pub fn describe(id: u32, record: &FragmentRecord) -> String {
    let patterns = infer_tags(&record.content).join(", ");
    format!(
        "Fragment #{id}: {title}\n\
         \n\
         - Fragment ID: {id}\n\
         - Acquired: {timestamp}\n\
         - Source Repository: {repo}\n\
         - Original Path: {path}\n\
         - Patterns: {patterns}\n\
         \n\
         - Preliminary Analysis:\n\
         This fragment is a digital echo captured during a routine expedition \
         through the computational substrate. Its shape suggests {patterns}, \
         though its actual significance awaits further study by the curators.",
        id = id,
        title = record.generated_title,
        timestamp = record.timestamp,
        repo = record.source_repo_url,
        path = record.source_file_path,
        patterns = patterns,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> FragmentRecord {
        FragmentRecord {
            content: content.to_string(),
            source_repo_url: "https://x/y".to_string(),
            source_file_path: "a.py".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            search_keyword: Some("pytorch".to_string()),
            generated_title: "A Study".to_string(),
        }
    }

    #[test]
    fn first_line_is_title() {
        let msg = describe(1, &record("def f(): pass"));
        assert!(msg.starts_with("Fragment #1: A Study\n\n"));
        assert!(msg.contains("- Fragment ID: 1\n"));
        assert!(msg.contains("- Acquired: 2024-01-01T00:00:00Z\n"));
        assert!(msg.contains("- Source Repository: https://x/y\n"));
        assert!(msg.contains("- Original Path: a.py\n"));
        assert!(msg.contains("- Patterns: computational function\n"));
    }

    #[test]
    fn describe_is_deterministic() {
        let r = record("class Net: pass\nimport torch");
        assert_eq!(describe(9, &r), describe(9, &r.clone()));
    }

    #[test]
    fn class_and_torch_import_give_exactly_two_tags() {
        let tags = infer_tags("import torch\nx = torch.zeros(3)\n\nclass Layer:\n    pass\n");
        assert_eq!(tags, vec!["object structure", "neural tensor"]);
    }

    #[test]
    fn at_most_three_tags() {
        let tags = infer_tags("import torch\nclass Model:\n    def train(self): ...\n");
        assert_eq!(
            tags,
            vec!["object structure", "computational function", "neural tensor"]
        );
    }

    #[test]
    fn scan_is_case_insensitive() {
        assert_eq!(infer_tags("IMPORT TORCH"), vec!["neural tensor"]);
    }

    #[test]
    fn no_marker_gives_placeholder() {
        assert_eq!(infer_tags("x = 1\nprint(x)\n"), vec![UNCLASSIFIED_TAG]);
        let msg = describe(2, &record("x = 1"));
        assert!(msg.contains("- Patterns: undetermined nature\n"));
    }
}
