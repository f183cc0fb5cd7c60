//! Integration tests for the collaborator traits.
//!
//! These drive the archivist and the full pipeline through fake search,
//! labeling and repository clients, so the archive on disk can be checked
//! after every outcome without a git binary.

use anyhow::Result;
use memoria::allocator::{CounterAllocator, IdAllocator, ScanAllocator};
use memoria::archivist::Archivist;
use memoria::envelope::InputEnvelope;
use memoria::index_store::{IndexStore, LogIndexStore};
use memoria::layout::ArchiveLayout;
use memoria::models::{ArchivedFragment, FileKind, FragmentSource};
use memoria::pipeline::run_pipeline;
use memoria::traits::{Discovery, LabelingClient, RepositoryClient, SearchClient};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

// ─── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct RepoLog {
    staged: Vec<PathBuf>,
    commits: Vec<String>,
}

/// Records staging and commits; optionally refuses to commit.
#[derive(Clone, Default)]
struct FakeRepository {
    log: Rc<RefCell<RepoLog>>,
    fail_commit: bool,
}

impl RepositoryClient for FakeRepository {
    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        self.log.borrow_mut().staged.extend_from_slice(paths);
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        if self.fail_commit {
            anyhow::bail!("index.lock exists");
        }
        let mut log = self.log.borrow_mut();
        log.commits.push(message.to_string());
        Ok(format!("{:040x}", log.commits.len()))
    }
}

/// Always hands out the same id, like a counter that fell behind.
struct StuckAllocator(u32);

impl IdAllocator for StuckAllocator {
    fn peek(&self) -> memoria::error::Result<u32> {
        Ok(self.0)
    }

    fn allocate(&self) -> memoria::error::Result<u32> {
        Ok(self.0)
    }
}

struct QueueSearch {
    hits: RefCell<Vec<Discovery>>,
}

impl SearchClient for QueueSearch {
    fn search(&self, _keyword: &str) -> Result<Option<Discovery>> {
        Ok(self.hits.borrow_mut().pop())
    }
}

struct KeywordTitle;

impl LabelingClient for KeywordTitle {
    fn label(&self, _content: &str, keyword: &str) -> Result<String> {
        Ok(format!("Residual Patterns of {}", keyword))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn layout(tmp: &TempDir) -> ArchiveLayout {
    ArchiveLayout::new(tmp.path(), Path::new("memorie"), "python", "jupyter", "_metadata")
}

fn archivist_with(tmp: &TempDir, repo: &FakeRepository) -> Archivist {
    let layout = layout(tmp);
    Archivist::new(
        layout.clone(),
        Box::new(CounterAllocator::new(layout.clone())),
        Box::new(LogIndexStore::new(&layout)),
        Some(Box::new(repo.clone())),
    )
}

fn study() -> InputEnvelope {
    InputEnvelope {
        file_content: Some("def f(): pass".to_string()),
        repo_url: Some("https://x/y".to_string()),
        file_path: Some("a.py".to_string()),
        timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        generated_title: Some("A Study".to_string()),
        search_keyword: None,
    }
}

fn summary(id: u32) -> ArchivedFragment {
    ArchivedFragment {
        id,
        title: format!("Fragment {}", id),
        timestamp: "2024-01-01T00:00:00Z".to_string(),
        source: FragmentSource {
            repo: "https://x/y".to_string(),
            path: "a.py".to_string(),
            keyword: "unknown".to_string(),
        },
        archived_path: format!("memorie/python/fragment_{:04}.py", id),
        file_type: FileKind::Script,
        size: 1,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[test]
fn next_id_is_max_plus_one_for_any_id_set() {
    let sets: &[&[u32]] = &[&[], &[1], &[3, 1, 2], &[10, 250], &[7, 7_000, 42]];
    for ids in sets {
        let tmp = TempDir::new().unwrap();
        let layout = layout(&tmp);
        for (i, id) in ids.iter().enumerate() {
            let kind = if i % 2 == 0 {
                FileKind::Script
            } else {
                FileKind::Notebook
            };
            let path = layout.fragment_path(*id, kind);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "x").unwrap();
        }
        let expected = ids.iter().max().map_or(1, |m| m + 1);
        assert_eq!(ScanAllocator::new(layout.clone()).peek().unwrap(), expected, "ids {:?}", ids);
        assert_eq!(CounterAllocator::new(layout).peek().unwrap(), expected, "ids {:?}", ids);
    }
}

#[test]
fn index_round_trip_returns_sorted_entries() {
    let tmp = TempDir::new().unwrap();
    let layout = layout(&tmp);
    let store = LogIndexStore::new(&layout);
    let ids = [5u32, 2, 9, 1, 7, 3];
    for id in ids {
        store.append(summary(id)).unwrap();
    }

    let reopened = LogIndexStore::new(&layout);
    let index = reopened.load().unwrap();
    let loaded: Vec<u32> = index.fragments.iter().map(|f| f.id).collect();
    assert_eq!(loaded, vec![1, 2, 3, 5, 7, 9]);
    assert_eq!(index.fragments[0], summary(1));
}

#[test]
fn end_to_end_scenario() {
    let tmp = TempDir::new().unwrap();
    let repo = FakeRepository::default();
    let archivist = archivist_with(&tmp, &repo);

    let outcome = archivist.store(study()).unwrap();
    assert!(outcome.archived_path.ends_with("memorie/python/fragment_0001.py"));
    assert_eq!(outcome.revision.as_deref(), Some(format!("{:040x}", 1).as_str()));

    let index = archivist.load_index().unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index.fragments[0].id, 1);
    assert_eq!(index.fragments[0].title, "A Study");

    let log = repo.log.borrow();
    assert_eq!(log.commits.len(), 1);
    assert!(log.commits[0].starts_with("Fragment #1: A Study"));
    assert!(log.staged.contains(&outcome.archived_path));
    assert!(log.staged.contains(&layout(&tmp).index_document()));
}

#[test]
fn missing_title_attempts_nothing() {
    let tmp = TempDir::new().unwrap();
    let repo = FakeRepository::default();
    let archivist = archivist_with(&tmp, &repo);

    let mut env = study();
    env.generated_title = None;
    assert!(archivist.store(env).is_err());

    assert!(!tmp.path().join("memorie").exists());
    let log = repo.log.borrow();
    assert!(log.staged.is_empty());
    assert!(log.commits.is_empty());
}

#[test]
fn commit_failure_keeps_file_and_index_entry() {
    let tmp = TempDir::new().unwrap();
    let repo = FakeRepository {
        fail_commit: true,
        ..Default::default()
    };
    let archivist = archivist_with(&tmp, &repo);

    let err = archivist.store(study()).unwrap_err();
    assert_eq!(err.stage(), "commit");
    assert!(err.to_string().contains("index.lock exists"));

    assert!(layout(&tmp).fragment_path(1, FileKind::Script).exists());
    assert_eq!(archivist.load_index().unwrap().len(), 1);
    assert_eq!(archivist.peek_next_id().unwrap(), 2);
}

#[test]
fn index_failure_leaves_orphan_file() {
    let tmp = TempDir::new().unwrap();
    let repo = FakeRepository::default();
    let layout = layout(&tmp);
    let archivist = archivist_with(&tmp, &repo);

    archivist.store(study()).unwrap();
    // Corrupt the log so the next append cannot read it.
    std::fs::write(layout.index_log(), "not a record\n").unwrap();

    let err = archivist.store(study()).unwrap_err();
    assert_eq!(err.stage(), "index");
    assert!(layout.fragment_path(2, FileKind::Script).exists());
    assert_eq!(repo.log.borrow().commits.len(), 1);
}

#[test]
fn write_collision_skips_index_and_commit() {
    let tmp = TempDir::new().unwrap();
    let layout = layout(&tmp);
    let store = LogIndexStore::new(&layout);
    store.append(summary(1)).unwrap();
    let existing = layout.fragment_path(1, FileKind::Script);
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, "already archived").unwrap();

    let log_before = std::fs::read(layout.index_log()).unwrap();
    let doc_before = std::fs::read(layout.index_document()).unwrap();

    let repo = FakeRepository::default();
    let archivist = Archivist::new(
        layout.clone(),
        Box::new(StuckAllocator(1)),
        Box::new(LogIndexStore::new(&layout)),
        Some(Box::new(repo.clone())),
    );

    let err = archivist.store(study()).unwrap_err();
    assert_eq!(err.stage(), "write");
    assert_eq!(std::fs::read_to_string(&existing).unwrap(), "already archived");
    assert_eq!(std::fs::read(layout.index_log()).unwrap(), log_before);
    assert_eq!(std::fs::read(layout.index_document()).unwrap(), doc_before);

    let log = repo.log.borrow();
    assert!(log.staged.is_empty());
    assert!(log.commits.is_empty());
}

#[test]
fn pipeline_archives_each_discovery() {
    let tmp = TempDir::new().unwrap();
    let repo = FakeRepository::default();
    let archivist = archivist_with(&tmp, &repo);

    let search = QueueSearch {
        hits: RefCell::new(vec![
            Discovery {
                content: "{\"cells\": []}".to_string(),
                repo_url: "https://github.com/o/nb".to_string(),
                file_path: "explore.ipynb".to_string(),
                keyword: "keras".to_string(),
                timestamp: "2024-02-02T00:00:00Z".to_string(),
            },
            Discovery {
                content: "import torch\nclass Net: pass\n".to_string(),
                repo_url: "https://github.com/o/net".to_string(),
                file_path: "net.py".to_string(),
                keyword: "pytorch".to_string(),
                timestamp: "2024-02-01T00:00:00Z".to_string(),
            },
        ]),
    };

    let first = run_pipeline(&search, &KeywordTitle, &archivist, "pytorch")
        .unwrap()
        .unwrap();
    let second = run_pipeline(&search, &KeywordTitle, &archivist, "keras")
        .unwrap()
        .unwrap();
    let none = run_pipeline(&search, &KeywordTitle, &archivist, "bert").unwrap();

    assert_eq!(first.id, 1);
    assert_eq!(first.entry.title, "Residual Patterns of pytorch");
    assert_eq!(second.id, 2);
    assert_eq!(second.entry.file_type, FileKind::Notebook);
    assert!(none.is_none());

    let log = repo.log.borrow();
    assert!(log.commits[0].contains("- Patterns: object structure, neural tensor\n"));
    assert!(log.commits[1].contains("- Patterns: undetermined nature\n"));
}
