//! Commit monitor: runs a code review for every new commit.
//!
//! A post-commit hook appends `hash: message` lines to a log in the git dir.
//! The supervisor watches that log, drains it one batch at a time, and
//! restarts from scratch after any infrastructure failure.

pub mod hook;
pub mod watcher;

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::{self, CliOverrides, Config};
use crate::console::Console;
use crate::error::{MonitorError, RunError};
use crate::git::{collect_commit_diff, commit_log_path, hook_path, open_repository};
use crate::llm::{AdapterFactory, eligible_descriptors};
use crate::orchestrator::{Orchestrator, RequestMode};
use crate::selection::{PromptOptions, RunResult, SelectionEngine, SelectionUi};

pub use hook::{LogRecord, parse_records};
pub use watcher::{LogWatcher, NotifyLogWatcher};

/// Delay before re-initializing after a failure.
pub const DEFAULT_RESTART_BACKOFF: Duration = Duration::from_secs(3);

const WATCHING_MESSAGE: &str = "Watching for new Git commits...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Initializing,
    Watching,
    Processing,
    Restarting,
}

/// Everything the supervisor needs from the outside world.
#[async_trait]
pub trait MonitorHost: Send + Sync {
    fn assert_repository(&self) -> Result<(), MonitorError>;

    fn load_config(&self) -> Result<Config, MonitorError>;

    /// Write the post-commit hook, replacing any existing one.
    fn install_hook(&self) -> Result<(), MonitorError>;

    fn reset_log(&self) -> Result<(), MonitorError>;

    fn read_log(&self) -> Result<String, MonitorError>;

    /// Drop the `consumed` prefix, keeping records appended after it was read.
    fn consume_log(&self, consumed: &str) -> Result<(), MonitorError>;

    fn open_watcher(&self) -> Result<Box<dyn LogWatcher>, MonitorError>;

    /// One full diff, orchestrate, and select cycle for `hash`.
    async fn review_commit(&self, config: &Config, hash: &str) -> Result<(), MonitorError>;
}

/// Restart loop around initialize, watch, and drain.
pub struct Supervisor {
    host: Arc<dyn MonitorHost>,
    console: Arc<dyn Console>,
    backoff: Duration,
    state: Mutex<MonitorState>,
    restarts: AtomicUsize,
}

impl Supervisor {
    pub fn new(host: Arc<dyn MonitorHost>, console: Arc<dyn Console>) -> Self {
        Self {
            host,
            console,
            backoff: DEFAULT_RESTART_BACKOFF,
            state: Mutex::new(MonitorState::Initializing),
            restarts: AtomicUsize::new(0),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn state(&self) -> MonitorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: MonitorState) {
        debug!("Monitor state: {:?}", state);
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Monitor until `shutdown` resolves. Failures never end the loop.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => info!("Commit monitor shutting down"),
            _ = self.supervise() => {}
        }
        self.console.stop_loader();
    }

    async fn supervise(&self) {
        loop {
            self.set_state(MonitorState::Initializing);
            let Err(e) = self.watch_cycle().await;
            self.restart(e).await;
        }
    }

    /// Initialize, then watch and drain until something fails.
    async fn watch_cycle(&self) -> Result<std::convert::Infallible, MonitorError> {
        self.host.assert_repository()?;
        let config = self.host.load_config()?;
        self.host.install_hook()?;
        self.console.success("Git post-commit hook has been set up");
        self.host.reset_log()?;
        let mut watcher = self.host.open_watcher()?;

        self.idle();
        loop {
            watcher.changed().await?;
            self.set_state(MonitorState::Processing);
            let processed = self.drain(&config).await?;
            if processed > 0 {
                self.idle();
            } else {
                self.set_state(MonitorState::Watching);
            }
        }
    }

    fn idle(&self) {
        self.set_state(MonitorState::Watching);
        self.console.stop_loader();
        self.console.clear();
        self.console.show_loader(WATCHING_MESSAGE);
    }

    async fn restart(&self, e: MonitorError) {
        self.set_state(MonitorState::Restarting);
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.console.stop_loader();
        self.console.error(&format!("An error occurred: {e}"));
        error!("Commit monitor failed: {e}");

        tokio::time::sleep(self.backoff).await;
        self.console.warn("Restarting the commit monitoring process...");
    }

    /// Process every record in the log sequentially, then remove them from
    /// the log once.
    ///
    /// A failing record is reported and skipped. Returns the number of
    /// records processed.
    pub async fn drain(&self, config: &Config) -> Result<usize, MonitorError> {
        let content = match self.host.read_log() {
            Ok(content) => content,
            Err(e) => {
                if let Err(reset_err) = self.host.reset_log() {
                    warn!("Failed to truncate commit log after read error: {}", reset_err);
                }
                return Err(e);
            }
        };
        if content.trim().is_empty() {
            return Ok(0);
        }

        let records = parse_records(&content);
        for record in &records {
            debug!("Reviewing commit {}", record.hash);
            if let Err(e) = self.host.review_commit(config, &record.hash).await {
                self.console.stop_loader();
                self.console
                    .error(&format!("Error processing commit {}: {}", record.hash, e));
                warn!("Review of {} failed: {}", record.hash, e);
            }
        }

        // Commits landing during a review were appended after `content`;
        // they stay in the log and trigger the next drain.
        self.host.consume_log(&content)?;
        Ok(records.len())
    }
}

fn review_options() -> PromptOptions {
    PromptOptions {
        prompt: "Please check code reviews:".to_string(),
        loading_message: "Getting code reviews...".to_string(),
        empty_message: "⚠ No code reviews were generated".to_string(),
        page_size: 20,
    }
}

/// Real host: git2 for the repository, `notify` for the log.
pub struct GitMonitorHost {
    cwd: PathBuf,
    overrides: CliOverrides,
    console: Arc<dyn Console>,
    ui: Arc<dyn SelectionUi>,
    factory: Arc<dyn AdapterFactory>,
}

impl GitMonitorHost {
    pub fn new(
        cwd: PathBuf,
        overrides: CliOverrides,
        console: Arc<dyn Console>,
        ui: Arc<dyn SelectionUi>,
        factory: Arc<dyn AdapterFactory>,
    ) -> Self {
        Self {
            cwd,
            overrides,
            console,
            ui,
            factory,
        }
    }

    fn paths(&self) -> Result<(PathBuf, PathBuf), MonitorError> {
        let repo = open_repository(&self.cwd)?;
        Ok((hook_path(&repo), commit_log_path(&repo)))
    }
}

#[async_trait]
impl MonitorHost for GitMonitorHost {
    fn assert_repository(&self) -> Result<(), MonitorError> {
        open_repository(&self.cwd)?;
        Ok(())
    }

    fn load_config(&self) -> Result<Config, MonitorError> {
        Ok(config::load(&self.overrides)?)
    }

    fn install_hook(&self) -> Result<(), MonitorError> {
        let (hook, log) = self.paths()?;
        hook::install_hook(&hook, &log)
    }

    fn reset_log(&self) -> Result<(), MonitorError> {
        let (_, log) = self.paths()?;
        hook::truncate_log(&log)
    }

    fn read_log(&self) -> Result<String, MonitorError> {
        let (_, log) = self.paths()?;
        hook::read_log(&log)
    }

    fn consume_log(&self, consumed: &str) -> Result<(), MonitorError> {
        let (_, log) = self.paths()?;
        hook::consume_log(&log, consumed)
    }

    fn open_watcher(&self) -> Result<Box<dyn LogWatcher>, MonitorError> {
        let (_, log) = self.paths()?;
        Ok(Box::new(NotifyLogWatcher::watch(&log)?))
    }

    async fn review_commit(&self, config: &Config, hash: &str) -> Result<(), MonitorError> {
        let diff = {
            let repo = open_repository(&self.cwd)?;
            collect_commit_diff(&repo, hash, &config.exclude)?
        };
        let Some(diff) = diff else {
            self.console.warn("No changes found in this commit");
            return Ok(());
        };

        let mode = RequestMode::CodeReview;
        let eligible = eligible_descriptors(&config.descriptors, mode, config.code_review);
        if eligible.is_empty() {
            return Err(RunError::NoEligibleProviders { mode }.into());
        }

        self.console.stop_loader();
        let short_hash = hash.get(..7).unwrap_or(hash);
        self.console.success(&format!(
            "Detected {} changed file(s) in {}:",
            diff.changed_files.len(),
            short_hash
        ));
        for path in diff.file_paths() {
            self.console.info(&format!("     {path}"));
        }

        let orchestrator = Orchestrator::new(self.factory.build_all(&eligible), mode)?;
        let engine = SelectionEngine::new(
            Arc::clone(&self.console),
            Arc::clone(&self.ui),
            review_options(),
        );
        let context = Arc::new(config.request_context(mode, diff));
        let run = engine.start(orchestrator.dispatch(context), &orchestrator.provider_names());

        match run.wait().await? {
            RunResult::Selected(selection) => {
                self.console.info(&selection.candidate.long_description);
                self.console.success("Code review completed");
            }
            RunResult::Cancelled => debug!("Code review dismissed"),
        }
        Ok(())
    }
}
