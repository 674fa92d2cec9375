//! Concurrent fan-out of one request to every eligible provider adapter.
//!
//! Each adapter runs in its own task and writes exactly one [`Outcome`] onto a
//! shared channel, so the [`Subscription`] yields outcomes in completion order.
//! A failing adapter becomes [`Outcome::Failure`]; it never aborts the run.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::error::RunError;
use crate::git::DiffSummary;
use crate::llm::ProviderAdapter;

/// What the providers are asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// One combined context, N candidate commit messages per adapter.
    CommitMessage,
    /// Review of a commit's changes.
    CodeReview,
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMode::CommitMessage => f.write_str("commit message"),
            RequestMode::CodeReview => f.write_str("code review"),
        }
    }
}

/// Read-only input shared by every adapter call of one run.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub mode: RequestMode,
    pub diff: DiffSummary,
    pub locale: String,
    /// Number of candidates requested from each adapter.
    pub generate: u8,
    pub exclude: Vec<String>,
    /// Overrides every adapter's own custom prompt when set.
    pub prompt: Option<String>,
    pub commit_type: Option<String>,
    pub max_length: usize,
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
}

/// A generated message or review, with the text shown in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Full text used when the candidate is chosen.
    pub message: String,
    pub short_description: String,
    pub long_description: String,
}

impl Candidate {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let short_description = message.lines().next().unwrap_or_default().trim().to_string();
        Self {
            long_description: message.clone(),
            short_description,
            message,
        }
    }
}

/// Terminal result of one adapter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        provider: String,
        candidates: Vec<Candidate>,
    },
    Failure {
        provider: String,
        message: String,
    },
}

impl Outcome {
    pub fn provider(&self) -> &str {
        match self {
            Outcome::Success { provider, .. } | Outcome::Failure { provider, .. } => provider,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Fans a request out to a fixed, non-empty set of adapters.
pub struct Orchestrator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl Orchestrator {
    /// Fails with [`RunError::NoEligibleProviders`] when `adapters` is empty.
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, mode: RequestMode) -> Result<Self, RunError> {
        if adapters.is_empty() {
            return Err(RunError::NoEligibleProviders { mode });
        }
        Ok(Self { adapters })
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// Start every adapter concurrently and return the outcome stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, context: Arc<RequestContext>) -> Subscription {
        let expected = self.adapters.len();
        // Capacity covers one outcome per adapter, so a worker never blocks on send.
        let (tx, rx) = mpsc::channel(expected);
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut tasks = Vec::with_capacity(expected);
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let context = Arc::clone(&context);
            let slot = OutcomeSlot {
                provider: adapter.name().to_string(),
                tx: tx.clone(),
                cancelled: Arc::clone(&cancelled),
                sent: false,
            };

            let handle = tokio::spawn(async move {
                let mut slot = slot;
                let outcome = match adapter.invoke(&context).await {
                    Ok(candidates) => {
                        debug!("{} returned {} candidate(s)", slot.provider, candidates.len());
                        Outcome::Success {
                            provider: slot.provider.clone(),
                            candidates,
                        }
                    }
                    Err(e) => {
                        warn!("{} failed: {}", slot.provider, e);
                        Outcome::Failure {
                            provider: slot.provider.clone(),
                            message: e.to_string(),
                        }
                    }
                };
                slot.send(outcome);
            });
            tasks.push(handle.abort_handle());
        }

        debug!("Dispatched {} {} request(s)", expected, context.mode);

        Subscription {
            rx,
            expected,
            received: 0,
            handle: SubscriptionHandle {
                inner: Arc::new(HandleInner { cancelled, tasks }),
            },
        }
    }
}

/// Write side of one adapter's single outcome.
///
/// If the worker panics before sending, dropping the slot still emits a
/// failure so the run sees exactly one outcome per adapter.
struct OutcomeSlot {
    provider: String,
    tx: mpsc::Sender<Outcome>,
    cancelled: Arc<AtomicBool>,
    sent: bool,
}

impl OutcomeSlot {
    fn send(&mut self, outcome: Outcome) {
        self.sent = true;
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.try_send(outcome);
    }
}

impl Drop for OutcomeSlot {
    fn drop(&mut self) {
        if !self.sent && !self.cancelled.load(Ordering::SeqCst) {
            let _ = self.tx.try_send(Outcome::Failure {
                provider: self.provider.clone(),
                message: "Provider task stopped unexpectedly".to_string(),
            });
        }
    }
}

/// Ordered stream of outcomes for one dispatch.
pub struct Subscription {
    rx: mpsc::Receiver<Outcome>,
    expected: usize,
    received: usize,
    handle: SubscriptionHandle,
}

impl Subscription {
    /// Next outcome in completion order.
    ///
    /// Returns `None` once every adapter has reported, or as soon as the
    /// subscription has been cancelled. Outcomes arriving after cancellation
    /// are discarded.
    pub async fn next(&mut self) -> Option<Outcome> {
        if self.received == self.expected || self.handle.is_cancelled() {
            self.rx.close();
            return None;
        }

        let outcome = self.rx.recv().await;
        if self.handle.is_cancelled() {
            self.rx.close();
            return None;
        }

        let outcome = outcome?;
        self.received += 1;
        if self.received == self.expected {
            self.rx.close();
        }
        Some(outcome)
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Cloneable handle that can cancel this subscription from elsewhere.
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn unsubscribe(&mut self) {
        self.handle.unsubscribe();
        self.rx.close();
    }
}

struct HandleInner {
    cancelled: Arc<AtomicBool>,
    tasks: Vec<AbortHandle>,
}

#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

impl SubscriptionHandle {
    /// Stop delivering outcomes and abort in-flight adapter tasks.
    ///
    /// Transports that cannot be interrupted may still finish; their results
    /// are dropped on arrival.
    pub fn unsubscribe(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        for task in &self.inner.tasks {
            task.abort();
        }
        debug!("Unsubscribed; aborted {} adapter task(s)", self.inner.tasks.len());
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}
