use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use crate::layout::ArchiveLayout;

/// Location of the config file when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/archivist.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub identifiers: IdentifiersConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Archive root. Relative paths resolve against `repository.path`.
    #[serde(default = "default_archive_root")]
    pub root: PathBuf,
    #[serde(default = "default_script_dir")]
    pub script_dir: String,
    #[serde(default = "default_notebook_dir")]
    pub notebook_dir: String,
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: default_archive_root(),
            script_dir: default_script_dir(),
            notebook_dir: default_notebook_dir(),
            metadata_dir: default_metadata_dir(),
        }
    }
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("memorie")
}
fn default_script_dir() -> String {
    "python".to_string()
}
fn default_notebook_dir() -> String {
    "jupyter".to_string()
}
fn default_metadata_dir() -> String {
    "_metadata".to_string()
}

/// Which identifier allocation strategy the archivist uses.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AllocatorKind {
    /// Counter record with compare-and-swap, floored by a directory scan.
    #[default]
    Counter,
    /// Directory scan only.
    Scan,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IdentifiersConfig {
    #[serde(default)]
    pub allocator: AllocatorKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,
    /// Stage and commit after each store. Disable to archive outside a work tree.
    #[serde(default = "default_commit")]
    pub commit: bool,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repository_path(),
            commit: default_commit(),
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

fn default_repository_path() -> PathBuf {
    PathBuf::from(".")
}
fn default_commit() -> bool {
    true
}
fn default_author_name() -> String {
    "Memoria Archivist".to_string()
}
fn default_author_email() -> String {
    "archivist@memoria.local".to_string()
}

impl Config {
    /// Config rooted at `repo`, everything else defaulted.
    pub fn for_repository(repo: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.repository.path = repo.into();
        config
    }

    pub fn layout(&self) -> ArchiveLayout {
        ArchiveLayout::new(
            &self.repository.path,
            &self.archive.root,
            &self.archive.script_dir,
            &self.archive.notebook_dir,
            &self.archive.metadata_dir,
        )
    }

    pub fn validate(&self) -> Result<()> {
        let dirs = [
            ("archive.script_dir", &self.archive.script_dir),
            ("archive.notebook_dir", &self.archive.notebook_dir),
            ("archive.metadata_dir", &self.archive.metadata_dir),
        ];
        for (key, value) in dirs {
            if !is_single_component(value) {
                bail!("{} must be a single directory name, got '{}'", key, value);
            }
        }

        if self.archive.script_dir == self.archive.notebook_dir
            || self.archive.script_dir == self.archive.metadata_dir
            || self.archive.notebook_dir == self.archive.metadata_dir
        {
            bail!("archive.script_dir, archive.notebook_dir and archive.metadata_dir must differ");
        }

        if self.archive.root.as_os_str().is_empty() {
            bail!("archive.root must not be empty");
        }

        if self.repository.commit {
            if self.repository.author_name.trim().is_empty() {
                bail!("repository.author_name must not be empty when repository.commit = true");
            }
            if self.repository.author_email.trim().is_empty() {
                bail!("repository.author_email must not be empty when repository.commit = true");
            }
        }

        Ok(())
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load `path` if given; otherwise the default location, falling back to
/// built-in defaults when that file does not exist.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_config(default_path)
            } else {
                tracing::debug!("no config at {}, using defaults", DEFAULT_CONFIG_PATH);
                Ok(Config::default())
            }
        }
    }
}
