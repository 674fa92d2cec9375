//! One-shot flow: staged diff, generate candidates, pick one, commit.

use std::path::Path;
use std::sync::Arc;

use dialoguer::Confirm;
use tracing::debug;

use crate::config::Config;
use crate::console::Console;
use crate::error::GenerateError;
use crate::git::{DiffSummary, collect_staged_diff, commit_staged, open_repository, stage_tracked};
use crate::llm::{AdapterFactory, eligible_descriptors};
use crate::orchestrator::{Orchestrator, RequestMode};
use crate::selection::{PromptOptions, RunResult, SelectionEngine, SelectionUi};

/// Flags of the default command.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Stage tracked modifications before reading the diff.
    pub all: bool,
    /// Commit without the confirmation prompt.
    pub yes: bool,
    /// Print the chosen message instead of committing.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Committed { id: String, message: String },
    DryRun(String),
    Cancelled,
}

/// Collaborators of one generate run.
pub struct Generator {
    pub console: Arc<dyn Console>,
    pub ui: Arc<dyn SelectionUi>,
    pub factory: Arc<dyn AdapterFactory>,
}

fn describe_files(diff: &DiffSummary) -> String {
    let count = diff.changed_files.len();
    let noun = if count == 1 { "file" } else { "files" };
    format!("Detected {count} staged {noun}:")
}

impl Generator {
    pub async fn run(
        &self,
        cwd: &Path,
        config: &Config,
        options: GenerateOptions,
    ) -> Result<GenerateOutcome, GenerateError> {
        let diff = {
            let repo = open_repository(cwd)?;
            if options.all {
                stage_tracked(&repo)?;
            }
            collect_staged_diff(&repo, &config.exclude)?
        };

        self.console.success(&describe_files(&diff));
        for path in diff.file_paths() {
            self.console.info(&format!("     {path}"));
        }

        let mode = RequestMode::CommitMessage;
        let eligible = eligible_descriptors(&config.descriptors, mode, config.code_review);
        let orchestrator = Orchestrator::new(self.factory.build_all(&eligible), mode)?;
        debug!("Requesting from: {}", orchestrator.provider_names().join(", "));

        let engine = SelectionEngine::new(
            Arc::clone(&self.console),
            Arc::clone(&self.ui),
            PromptOptions::default(),
        );
        let context = Arc::new(config.request_context(mode, diff));
        let run = engine.start(orchestrator.dispatch(context), &orchestrator.provider_names());
        let session = run.session();

        let result = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                session.close();
                RunResult::Cancelled
            }
            result = run.wait() => result?,
        };

        let selection = match result {
            RunResult::Selected(selection) => selection,
            RunResult::Cancelled => {
                self.console.warn("Commit cancelled");
                return Ok(GenerateOutcome::Cancelled);
            }
        };
        let message = selection.candidate.message;

        if options.dry_run {
            self.console.info(&message);
            return Ok(GenerateOutcome::DryRun(message));
        }

        if !options.yes {
            let confirmed = Confirm::new()
                .with_prompt("Use this commit message?")
                .default(true)
                .interact()?;
            if !confirmed {
                self.console.warn("Commit cancelled");
                return Ok(GenerateOutcome::Cancelled);
            }
        }

        let repo = open_repository(cwd)?;
        let id = commit_staged(&repo, &message)?;
        self.console.success("Successfully committed!");
        Ok(GenerateOutcome::Committed {
            id: id.to_string(),
            message,
        })
    }
}
