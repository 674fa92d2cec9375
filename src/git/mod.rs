//! Git operations: repository discovery, diffs, and commits.

pub mod diff;
pub mod repo;

pub use diff::{ChangedFile, DiffSummary, FileStatus, collect_commit_diff, collect_staged_diff};
pub use repo::{commit_log_path, commit_staged, hook_path, open_repository, stage_tracked};
