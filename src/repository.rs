use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::config::RepositoryConfig;
use crate::traits::RepositoryClient;

/// [`RepositoryClient`] backed by the `git` executable.
///
/// Paths are passed to git relative to the work tree root. The author
/// identity is supplied per invocation so the host's git config is not
/// required.
pub struct GitCli {
    work_tree: PathBuf,
    author_name: String,
    author_email: String,
}

impl GitCli {
    pub fn new(work_tree: impl Into<PathBuf>, author_name: &str, author_email: &str) -> Self {
        Self {
            work_tree: work_tree.into(),
            author_name: author_name.to_string(),
            author_email: author_email.to_string(),
        }
    }

    pub fn from_config(config: &RepositoryConfig) -> Self {
        Self::new(&config.path, &config.author_name, &config.author_email)
    }

    pub fn work_tree(&self) -> &Path {
        &self.work_tree
    }

    /// Check that the configured directory is inside a git work tree.
    pub fn health(&self) -> Result<()> {
        let output = self.git(&["rev-parse", "--is-inside-work-tree"])?;
        let answer = String::from_utf8_lossy(&output.stdout);
        if answer.trim() != "true" {
            bail!("{} is not a git work tree", self.work_tree.display());
        }
        Ok(())
    }

    pub fn head_sha(&self) -> Result<String> {
        let output = self.git(&["rev-parse", "HEAD"])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.work_tree).unwrap_or(path)
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-c")
            .arg(format!("user.name={}", self.author_name))
            .arg("-c")
            .arg(format!("user.email={}", self.author_email))
            .current_dir(&self.work_tree);
        cmd
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = self.base_command();
        cmd.args(args);
        run(cmd, args.first().copied().unwrap_or("git"))
    }
}

fn run(mut cmd: Command, what: &str) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute 'git {}'. Is git installed?", what))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        bail!("git {} failed: {}", what, detail);
    }

    Ok(output)
}

impl RepositoryClient for GitCli {
    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut cmd = self.base_command();
        cmd.args(["add", "--"]);
        for path in paths {
            cmd.arg(self.relative(path));
        }
        run(cmd, "add")?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String> {
        let mut cmd = self.base_command();
        cmd.args(["commit", "--quiet", "--no-verify", "-m", message]);
        run(cmd, "commit")?;
        self.head_sha()
    }
}
