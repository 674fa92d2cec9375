//! Reactive selection over a stream of provider outcomes.
//!
//! Entries start pending and settle as outcomes arrive. The list becomes
//! interactive on the first outcome; the run ends when the user picks a
//! candidate, cancels, or every provider has failed.

mod session;
mod terminal;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::console::Console;
use crate::error::RunError;
use crate::orchestrator::{Candidate, Outcome, Subscription};

pub use session::RunSession;
pub use terminal::TerminalSelectionUi;

/// Display state of one provider's row group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Populated(Vec<Candidate>),
    Errored(String),
}

/// UI projection of one provider's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEntry {
    pub provider: String,
    pub state: EntryState,
}

impl SelectionEntry {
    pub fn pending(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            state: EntryState::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, EntryState::Pending)
    }

    pub fn is_populated(&self) -> bool {
        matches!(self.state, EntryState::Populated(_))
    }

    /// Settle a pending entry. Returns `false` if it was already terminal.
    fn settle(&mut self, outcome: Outcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = match outcome {
            Outcome::Success { candidates, .. } if candidates.is_empty() => {
                EntryState::Errored("No results returned".to_string())
            }
            Outcome::Success { candidates, .. } => EntryState::Populated(candidates),
            Outcome::Failure { message, .. } => EntryState::Errored(message),
        };
        true
    }
}

/// Engine-level lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Loading,
    Ready,
    Closed,
}

/// The candidate a user picked, with the provider it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub provider: String,
    pub candidate: Candidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Selected(Selection),
    Cancelled,
}

/// What the interactive list reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Selected(Selection),
    Cancelled,
}

/// Presentation options for one run.
#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub prompt: String,
    pub loading_message: String,
    /// Shown when the run ends with no populated entries.
    pub empty_message: String,
    /// Maximum rows visible at once in the list.
    pub page_size: usize,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            prompt: "Pick a commit message to use".to_string(),
            loading_message: "Generating commit messages...".to_string(),
            empty_message: "No commit messages were generated".to_string(),
            page_size: 10,
        }
    }
}

/// Interactive list the engine drives.
///
/// `refresh` is called exactly once per outcome with only that entry, in
/// whatever order outcomes complete.
#[async_trait]
pub trait SelectionUi: Send + Sync {
    fn init(&self, options: &PromptOptions, providers: &[String]);

    fn refresh(&self, entry: &SelectionEntry);

    fn show_empty(&self, message: &str);

    /// Resolves when the user picks a candidate or cancels.
    async fn wait_for_choice(&self) -> UiEvent;

    /// Release the list. Must tolerate being called before `wait_for_choice`.
    fn close(&self);
}

/// Builds one [`SelectionRun`] per orchestration.
pub struct SelectionEngine {
    console: Arc<dyn Console>,
    ui: Arc<dyn SelectionUi>,
    options: PromptOptions,
}

impl SelectionEngine {
    pub fn new(console: Arc<dyn Console>, ui: Arc<dyn SelectionUi>, options: PromptOptions) -> Self {
        Self { console, ui, options }
    }

    /// Open a session over `subscription`: entries pending, loader running.
    pub fn start(&self, subscription: Subscription, providers: &[String]) -> SelectionRun {
        let session = Arc::new(RunSession::new(
            Arc::clone(&self.console),
            Arc::clone(&self.ui),
            subscription.handle(),
            providers,
        ));
        self.ui.init(&self.options, providers);
        session.start_loader(&self.options.loading_message);

        SelectionRun {
            session,
            ui: Arc::clone(&self.ui),
            subscription,
            empty_message: self.options.empty_message.clone(),
        }
    }
}

/// One live run. Awaiting [`SelectionRun::wait`] drives it to completion.
pub struct SelectionRun {
    session: Arc<RunSession>,
    ui: Arc<dyn SelectionUi>,
    subscription: Subscription,
    empty_message: String,
}

impl SelectionRun {
    /// Shared session, for cancelling the run from another branch.
    pub fn session(&self) -> Arc<RunSession> {
        Arc::clone(&self.session)
    }

    /// Feed outcomes into the session until the user decides or the run ends.
    ///
    /// The session is closed on every return path.
    pub async fn wait(self) -> Result<RunResult, RunError> {
        let SelectionRun {
            session,
            ui,
            mut subscription,
            empty_message,
        } = self;

        let choice = ui.wait_for_choice();
        tokio::pin!(choice);
        let mut stream_done = false;

        loop {
            if session.is_closed() {
                return Ok(RunResult::Cancelled);
            }
            let ready = session.state() == EngineState::Ready;

            tokio::select! {
                biased;

                _ = session.closed() => return Ok(RunResult::Cancelled),

                outcome = subscription.next(), if !stream_done => match outcome {
                    Some(outcome) => {
                        session.apply(outcome);
                    }
                    None => {
                        stream_done = true;
                        if session.is_closed() {
                            return Ok(RunResult::Cancelled);
                        }
                        if session.populated_count() == 0 {
                            let failures = session.failures();
                            ui.show_empty(&empty_message);
                            session.close();
                            return Err(RunError::AllProvidersFailed { failures });
                        }
                        debug!("All {} outcome(s) received", subscription.received());
                    }
                },

                event = &mut choice, if ready => {
                    session.close();
                    return Ok(match event {
                        UiEvent::Selected(selection) => RunResult::Selected(selection),
                        UiEvent::Cancelled => RunResult::Cancelled,
                    });
                }
            }
        }
    }
}
