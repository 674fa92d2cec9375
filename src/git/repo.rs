//! Repository discovery, staging, and commit creation.

use std::path::{Path, PathBuf};

use git2::{Oid, Repository};

use crate::error::GitError;

/// Name of the hook that records every commit for the monitor.
pub const POST_COMMIT_HOOK: &str = "post-commit";

/// Commit log file written by the hook, relative to the git dir.
pub const COMMIT_LOG_FILE: &str = "commit-log.txt";

/// Open the repository containing `path`, searching parent directories.
///
/// Bare repositories are rejected since there is nothing to commit from.
pub fn open_repository(path: &Path) -> Result<Repository, GitError> {
    let repo = Repository::discover(path).map_err(GitError::OpenRepository)?;
    if repo.is_bare() {
        return Err(GitError::BareRepository);
    }
    Ok(repo)
}

/// Path of the post-commit hook inside the repository's git dir.
pub fn hook_path(repo: &Repository) -> PathBuf {
    repo.path().join("hooks").join(POST_COMMIT_HOOK)
}

/// Path of the commit log written by the post-commit hook.
pub fn commit_log_path(repo: &Repository) -> PathBuf {
    repo.path().join(COMMIT_LOG_FILE)
}

/// Stage modifications and deletions of tracked files (like `git add -u`).
pub fn stage_tracked(repo: &Repository) -> Result<(), GitError> {
    let mut index = repo.index().map_err(GitError::StagingFailed)?;
    index
        .update_all(["*"].iter(), None)
        .map_err(GitError::StagingFailed)?;
    index.write().map_err(GitError::StagingFailed)?;
    Ok(())
}

/// Create a commit on HEAD from the current index.
pub fn commit_staged(repo: &Repository, message: &str) -> Result<Oid, GitError> {
    let mut index = repo.index().map_err(GitError::StagingFailed)?;
    let tree_id = index.write_tree().map_err(GitError::StagingFailed)?;
    let tree = repo.find_tree(tree_id).map_err(GitError::CommitFailed)?;

    let sig = repo.signature().map_err(GitError::ConfigError)?;

    // Unborn HEAD means this is the first commit.
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit().map_err(GitError::CommitFailed)?),
        Err(_) => None,
    };
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .map_err(GitError::CommitFailed)
}
