//! Diff collection for staged changes and single commits using git2.

use std::fmt;

use git2::{Delta, Diff, DiffFormat, DiffOptions, ErrorCode, Oid, Repository, Tree};
use tracing::warn;

use crate::error::GitError;

/// Maximum characters for the unified diff text before truncation.
const MAX_DIFF_LENGTH: usize = 30_000;

/// Lock files are noise for commit messages and reviews.
const DEFAULT_EXCLUDES: &[&str] = &["package-lock.json", "pnpm-lock.yaml", "*.lock"];

/// Status of a changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "Added"),
            FileStatus::Modified => write!(f, "Modified"),
            FileStatus::Deleted => write!(f, "Deleted"),
            FileStatus::Renamed => write!(f, "Renamed"),
        }
    }
}

/// A file changed by the diff, with its own patch text.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
    /// Old path for renamed files (None for non-rename changes).
    pub old_path: Option<String>,
    pub patch: String,
}

/// Summary of a set of changes.
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    pub diff_text: String,
    pub changed_files: Vec<ChangedFile>,
    pub truncated: bool,
    pub additions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    pub fn file_paths(&self) -> Vec<&str> {
        self.changed_files.iter().map(|f| f.path.as_str()).collect()
    }
}

/// Resolve the HEAD tree, distinguishing empty-repo errors from real failures.
fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, GitError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(GitError::DiffFailed(e)),
    };

    let tree = head_ref.peel_to_tree().map_err(GitError::DiffFailed)?;
    Ok(Some(tree))
}

/// Collect the staged changes (HEAD tree against the index).
///
/// Files matching `exclude` or the built-in lock file patterns are left out.
/// Returns [`GitError::NoChanges`] when nothing relevant is staged.
pub fn collect_staged_diff(repo: &Repository, exclude: &[String]) -> Result<DiffSummary, GitError> {
    let head_tree = resolve_head_tree(repo)?;
    let diff = repo
        .diff_tree_to_index(head_tree.as_ref(), None, Some(&mut DiffOptions::new()))
        .map_err(GitError::DiffFailed)?;

    build_summary(&diff, exclude)?.ok_or(GitError::NoChanges)
}

/// Collect the changes introduced by one commit (against its first parent).
///
/// Returns `Ok(None)` when the commit has no relevant changes.
pub fn collect_commit_diff(
    repo: &Repository,
    hash: &str,
    exclude: &[String],
) -> Result<Option<DiffSummary>, GitError> {
    let oid = Oid::from_str(hash).map_err(|source| GitError::CommitNotFound {
        hash: hash.to_string(),
        source,
    })?;
    let commit = repo.find_commit(oid).map_err(|source| GitError::CommitNotFound {
        hash: hash.to_string(),
        source,
    })?;

    let tree = commit.tree().map_err(GitError::DiffFailed)?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree().map_err(GitError::DiffFailed)?),
        Err(e) if e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(GitError::DiffFailed(e)),
    };

    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut DiffOptions::new()))
        .map_err(GitError::DiffFailed)?;

    build_summary(&diff, exclude)
}

/// Build a [`DiffSummary`] from a diff, or `None` if every file was excluded.
fn build_summary(diff: &Diff<'_>, exclude: &[String]) -> Result<Option<DiffSummary>, GitError> {
    let mut changed_files = collect_files_from_diff(diff, exclude);
    if changed_files.is_empty() {
        return Ok(None);
    }

    let mut diff_text = String::new();
    let mut additions = 0usize;
    let mut deletions = 0usize;
    let mut truncated = false;

    let result = diff.print(DiffFormat::Patch, |delta, _hunk, line| {
        let Some(path) = delta_path(&delta) else {
            return true;
        };
        let Some(file) = changed_files.iter_mut().find(|f| f.path == path) else {
            return true;
        };

        match line.origin() {
            '+' => additions += 1,
            '-' => deletions += 1,
            _ => {}
        }

        let content = std::str::from_utf8(line.content()).unwrap_or("");
        let origin = line.origin();
        let mut rendered = String::with_capacity(content.len() + 1);
        if origin == '+' || origin == '-' || origin == ' ' {
            rendered.push(origin);
        }
        rendered.push_str(content);

        file.patch.push_str(&rendered);
        if !truncated {
            if diff_text.len() + rendered.len() > MAX_DIFF_LENGTH {
                truncated = true;
            } else {
                diff_text.push_str(&rendered);
            }
        }

        true
    });
    if let Err(e) = result {
        warn!("Failed to collect diff text: {e}");
        truncated = true;
    }

    changed_files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(Some(DiffSummary {
        diff_text,
        changed_files,
        truncated,
        additions,
        deletions,
    }))
}

fn delta_path(delta: &git2::DiffDelta<'_>) -> Option<String> {
    delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())
        .map(|p| p.to_string_lossy().to_string())
}

/// Collect changed file entries from a diff, skipping excluded paths.
fn collect_files_from_diff(diff: &Diff<'_>, exclude: &[String]) -> Vec<ChangedFile> {
    let mut files = Vec::new();
    for delta in diff.deltas() {
        let status = match delta.status() {
            Delta::Added | Delta::Untracked => FileStatus::Added,
            Delta::Modified => FileStatus::Modified,
            Delta::Deleted => FileStatus::Deleted,
            Delta::Renamed => FileStatus::Renamed,
            _ => FileStatus::Modified,
        };

        let Some(path) = delta_path(&delta) else {
            continue;
        };
        if path.is_empty() || is_excluded(&path, exclude) {
            continue;
        }

        let old_path = match status {
            FileStatus::Renamed => delta
                .old_file()
                .path()
                .map(|p| p.to_string_lossy().to_string()),
            _ => None,
        };

        files.push(ChangedFile {
            path,
            status,
            old_path,
            patch: String::new(),
        });
    }
    files
}

/// Match a path against exclude entries: exact path, file name, or `*.ext`.
pub fn is_excluded(path: &str, exclude: &[String]) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let matches = |pattern: &str| {
        if let Some(suffix) = pattern.strip_prefix('*') {
            file_name.ends_with(suffix)
        } else {
            pattern == path || pattern == file_name
        }
    };

    DEFAULT_EXCLUDES.iter().any(|p| matches(p)) || exclude.iter().any(|p| matches(p))
}
