//! Error types for aicommit modules using thiserror.

use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::RequestMode;

/// Errors from loading or editing the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine the user config directory. Set AICOMMIT_CONFIG instead.")]
    NoConfigDir,

    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Unknown config key '{0}'")]
    UnknownKey(String),

    #[error("System prompt file {path} could not be read: {source}")]
    SystemPrompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository (or any parent): {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Repository has no working directory (bare repositories are not supported)")]
    BareRepository,

    #[error("No staged changes found. Stage your changes or use --all")]
    NoChanges,

    #[error("Failed to collect diff: {0}")]
    DiffFailed(#[source] git2::Error),

    #[error("Commit {hash} not found: {source}")]
    CommitNotFound {
        hash: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to stage changes: {0}")]
    StagingFailed(#[source] git2::Error),

    #[error("Failed to create commit: {0}")]
    CommitFailed(#[source] git2::Error),

    #[error("Git config error (missing user.name or user.email): {0}")]
    ConfigError(#[source] git2::Error),
}

/// Errors from a single provider adapter call.
///
/// These never abort a run; the orchestrator turns them into a failed outcome.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0} CLI not found on PATH")]
    NotInstalled(String),

    #[error("Failed to spawn provider process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Provider CLI exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider returned no usable result")]
    EmptyResponse,

    #[error("All retry attempts failed: {0}")]
    RetriesExhausted(#[source] Box<ProviderError>),
}

/// A provider that failed within a run, kept for the aggregate error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub message: String,
}

/// Errors that end one orchestration + selection run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("No {mode} backend is configured and available. Set one up with `aicommit config set`")]
    NoEligibleProviders { mode: RequestMode },

    #[error("All {} backends failed: {}", failures.len(), format_failures(failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.provider, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that end the one-shot commit flow.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Errors that invalidate the commit monitor's state and trigger a restart.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Repository(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("Failed to install hook at {path}: {source}")]
    HookInstall {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Commit log I/O failed at {path}: {source}")]
    LogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watcher error: {0}")]
    Watch(#[source] notify::Error),

    #[error("Watcher stopped delivering events")]
    WatcherClosed,
}
