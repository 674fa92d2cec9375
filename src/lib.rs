//! aicommit - AI commit messages and code reviews from several backends at once.
//!
//! # Overview
//!
//! aicommit sends the staged diff to every configured AI backend concurrently,
//! lists each backend's candidates as soon as they arrive, and commits the one
//! you pick. In watch mode it installs a post-commit hook and reviews every new
//! commit as it lands.

pub mod config;
pub mod console;
pub mod error;
pub mod generate;
pub mod git;
pub mod llm;
pub mod monitor;
pub mod orchestrator;
pub mod selection;

// Re-export commonly used types
pub use config::{CliOverrides, Config};
pub use error::{ConfigError, GenerateError, GitError, MonitorError, ProviderError, RunError};
pub use orchestrator::{Candidate, Orchestrator, Outcome, RequestContext, RequestMode};
pub use selection::{RunResult, Selection, SelectionEngine};
