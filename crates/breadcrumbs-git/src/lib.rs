//! Repository introspection helpers for run records.
//!
//! Given any path inside a working tree, [`repository_info`] reports the
//! facts a run record needs to reproduce the code state: active branch,
//! commit hash, dirty flag, configured remotes, and the working directory
//! root. A path outside any repository is a normal outcome, reported as
//! `Ok(None)` rather than an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{ErrorCode, Repository, StatusOptions};
use serde::{Deserialize, Serialize};

/// Snapshot of the version-control state of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Name of the checked-out branch, or `"detached"` for a detached HEAD.
    pub active_branch: String,

    /// Full hash of the commit HEAD points at.
    pub commit_hash: String,

    /// Whether the working tree has staged or unstaged modifications.
    /// Untracked files do not count.
    pub is_dirty: bool,

    /// Configured remotes, name to URL.
    pub remotes: BTreeMap<String, String>,

    /// Root of the working directory.
    pub working_dir: PathBuf,
}

/// Collect [`RepositoryInfo`] for the repository containing `path`.
///
/// The search walks up from `path` (or its parent, when `path` is a file)
/// the same way git itself locates a repository. Returns `Ok(None)` when no
/// repository is found.
pub fn repository_info(path: &Path) -> Result<Option<RepositoryInfo>> {
    let start = if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    };

    let repo = match Repository::discover(start) {
        Ok(repo) => repo,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to open repository containing {}", path.display())
            })
        }
    };

    let head = repo
        .head()
        .with_context(|| format!("failed to resolve HEAD for {}", path.display()))?;
    let active_branch = if repo.head_detached()? {
        "detached".to_string()
    } else {
        head.shorthand().unwrap_or("detached").to_string()
    };
    let commit_hash = head.peel_to_commit()?.id().to_string();

    let mut remotes = BTreeMap::new();
    for name in repo.remotes()?.iter().flatten() {
        if let Some(url) = repo.find_remote(name)?.url() {
            remotes.insert(name.to_string(), url.to_string());
        }
    }

    let working_dir = repo
        .workdir()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| repo.path().to_path_buf());

    Ok(Some(RepositoryInfo {
        active_branch,
        commit_hash,
        is_dirty: is_dirty(&repo)?,
        remotes,
        working_dir,
    }))
}

/// Check whether the working tree differs from HEAD.
///
/// Matches the convention used by `git status --untracked-files=no`:
/// modified or staged paths make the tree dirty, untracked paths do not.
fn is_dirty(repo: &Repository) -> Result<bool> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(false).include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(!statuses.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a repository with one committed file and return its tempdir.
    fn fixture_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "fixture").unwrap();
            config.set_str("user.email", "fixture@example.com").unwrap();
        }
        std::fs::write(dir.path().join("data.txt"), "hello\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("data.txt")).unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = repo.signature().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        (dir, repo)
    }

    #[test]
    fn clean_repository_is_reported() {
        let (dir, _repo) = fixture_repo();

        let info = repository_info(dir.path()).unwrap().expect("repo exists");
        assert!(!info.active_branch.is_empty());
        assert_ne!(info.active_branch, "detached");
        assert_eq!(info.commit_hash.len(), 40);
        assert!(!info.is_dirty);
        assert!(info.remotes.is_empty());
    }

    #[test]
    fn file_path_resolves_to_containing_repository() {
        let (dir, _repo) = fixture_repo();

        let info = repository_info(&dir.path().join("data.txt"))
            .unwrap()
            .expect("repo exists");
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(info.working_dir.canonicalize().unwrap(), expected);
    }

    #[test]
    fn modified_file_marks_tree_dirty() {
        let (dir, _repo) = fixture_repo();
        std::fs::write(dir.path().join("data.txt"), "changed\n").unwrap();

        let info = repository_info(dir.path()).unwrap().expect("repo exists");
        assert!(info.is_dirty);
    }

    #[test]
    fn untracked_file_does_not_mark_tree_dirty() {
        let (dir, _repo) = fixture_repo();
        std::fs::write(dir.path().join("scratch.txt"), "temp\n").unwrap();

        let info = repository_info(dir.path()).unwrap().expect("repo exists");
        assert!(!info.is_dirty);
    }

    #[test]
    fn remotes_are_listed_by_name() {
        let (dir, repo) = fixture_repo();
        repo.remote("origin", "https://example.com/fixture.git")
            .unwrap();

        let info = repository_info(dir.path()).unwrap().expect("repo exists");
        assert_eq!(
            info.remotes.get("origin").map(String::as_str),
            Some("https://example.com/fixture.git")
        );
    }

    #[test]
    fn non_repository_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(repository_info(dir.path()).unwrap().is_none());
    }
}
