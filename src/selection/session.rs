use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::debug;

use crate::console::Console;
use crate::error::ProviderFailure;
use crate::orchestrator::{Outcome, SubscriptionHandle};

use super::{EngineState, EntryState, SelectionEntry, SelectionUi};

/// Mutable state of one orchestration + selection run.
///
/// Owned by whichever call path started the run. Teardown happens exactly
/// once, through [`RunSession::close`] or on drop.
pub struct RunSession {
    console: Arc<dyn Console>,
    ui: Arc<dyn SelectionUi>,
    subscription: SubscriptionHandle,
    entries: Mutex<Vec<SelectionEntry>>,
    state: Mutex<EngineState>,
    loader_active: AtomicBool,
    updates_open: AtomicBool,
    closed: AtomicBool,
    close_signal: Notify,
}

impl RunSession {
    pub fn new(
        console: Arc<dyn Console>,
        ui: Arc<dyn SelectionUi>,
        subscription: SubscriptionHandle,
        providers: &[String],
    ) -> Self {
        Self {
            console,
            ui,
            subscription,
            entries: Mutex::new(providers.iter().map(SelectionEntry::pending).collect()),
            state: Mutex::new(EngineState::Loading),
            loader_active: AtomicBool::new(false),
            updates_open: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<SelectionEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn start_loader(&self, text: &str) {
        if self.is_closed() {
            return;
        }
        self.loader_active.store(true, Ordering::SeqCst);
        self.console.show_loader(text);
    }

    fn stop_loader(&self) {
        if self.loader_active.swap(false, Ordering::SeqCst) {
            self.console.stop_loader();
        }
    }

    /// Settle the matching entry and push exactly one refresh for it.
    ///
    /// Outcomes for unknown or already-settled providers, or arriving after
    /// updates were closed, are ignored.
    pub fn apply(&self, outcome: Outcome) -> Option<SelectionEntry> {
        if !self.updates_open.load(Ordering::SeqCst) {
            debug!("Discarding outcome from {} after close", outcome.provider());
            return None;
        }

        let updated = {
            let mut entries = self.entries();
            let entry = entries.iter_mut().find(|e| e.provider == outcome.provider())?;
            if !entry.settle(outcome) {
                return None;
            }
            entry.clone()
        };

        if self.state() == EngineState::Loading {
            self.stop_loader();
            self.set_state(EngineState::Ready);
        }
        self.ui.refresh(&updated);
        Some(updated)
    }

    pub fn snapshot(&self) -> Vec<SelectionEntry> {
        self.entries().clone()
    }

    pub fn populated_count(&self) -> usize {
        self.entries().iter().filter(|e| e.is_populated()).count()
    }

    pub fn failures(&self) -> Vec<ProviderFailure> {
        self.entries()
            .iter()
            .filter_map(|e| match &e.state {
                EntryState::Errored(message) => Some(ProviderFailure {
                    provider: e.provider.clone(),
                    message: message.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the session has been closed.
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.close_signal.notified().await;
    }

    /// Tear the run down: stop the loader, stop accepting updates, release
    /// the list, then unsubscribe. Later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_loader();
        self.updates_open.store(false, Ordering::SeqCst);
        self.ui.close();
        self.subscription.unsubscribe();
        self.set_state(EngineState::Closed);
        self.close_signal.notify_one();
        debug!("Run session closed");
    }
}

impl Drop for RunSession {
    fn drop(&mut self) {
        self.close();
    }
}
