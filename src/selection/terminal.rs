use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use tokio::sync::Notify;
use tracing::warn;

use super::{EntryState, PromptOptions, Selection, SelectionEntry, SelectionUi, UiEvent};

/// Shows `items` and returns the picked index, or `None` on escape.
type Picker = dyn Fn(&PromptOptions, &[String]) -> dialoguer::Result<Option<usize>> + Send + Sync;

fn dialoguer_pick(options: &PromptOptions, items: &[String]) -> dialoguer::Result<Option<usize>> {
    Select::with_theme(&ColorfulTheme::default())
        .with_prompt(options.prompt.clone())
        .items(items)
        .default(0)
        .max_length(options.page_size)
        .interact_opt()
}

#[derive(Default)]
struct ListState {
    options: Option<PromptOptions>,
    expected: usize,
    entries: Vec<SelectionEntry>,
    /// Entries that arrived while the picker owned the terminal.
    held: Vec<SelectionEntry>,
    prompting: bool,
    closed: bool,
}

impl ListState {
    fn pending(&self) -> usize {
        self.expected.saturating_sub(self.entries.len())
    }

    fn rows(&self) -> Vec<Selection> {
        self.entries
            .iter()
            .filter_map(|entry| match &entry.state {
                EntryState::Populated(candidates) => Some(
                    candidates
                        .iter()
                        .map(|candidate| Selection {
                            provider: entry.provider.clone(),
                            candidate: candidate.clone(),
                        })
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Picker items: one per row, plus a refresh item while providers are pending.
    fn items(&self, rows: &[Selection]) -> Vec<String> {
        let mut items: Vec<String> = rows
            .iter()
            .map(|row| format!("[{}] {}", row.provider, row.candidate.short_description))
            .collect();
        let pending = self.pending();
        if pending > 0 {
            items.push(format!("↻ Refresh ({pending} still loading)"));
        }
        items
    }
}

/// Terminal list: prints each provider's rows as they arrive and offers a
/// `dialoguer` picker as soon as one row exists.
///
/// While providers are still pending the picker carries a refresh item that
/// rebuilds it with whatever has arrived since.
pub struct TerminalSelectionUi {
    state: Mutex<ListState>,
    changed: Notify,
    picker: Arc<Picker>,
}

impl Default for TerminalSelectionUi {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSelectionUi {
    pub fn new() -> Self {
        Self::with_picker(dialoguer_pick)
    }

    pub(crate) fn with_picker<F>(picker: F) -> Self
    where
        F: Fn(&PromptOptions, &[String]) -> dialoguer::Result<Option<usize>> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(ListState::default()),
            changed: Notify::new(),
            picker: Arc::new(picker),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn print_entry(entry: &SelectionEntry) {
        match &entry.state {
            EntryState::Pending => {}
            EntryState::Populated(candidates) => {
                println!("✔ {} ({} result(s))", entry.provider, candidates.len());
                for candidate in candidates {
                    println!("    {}", candidate.short_description);
                }
            }
            EntryState::Errored(message) => {
                println!("✖ {}: {}", entry.provider, message);
            }
        }
    }

    /// Wait until at least one row can be picked, or the list is closed.
    async fn rows_available(&self) -> bool {
        loop {
            {
                let state = self.lock();
                if state.closed {
                    return false;
                }
                if !state.rows().is_empty() {
                    return true;
                }
            }
            self.changed.notified().await;
        }
    }
}

#[async_trait]
impl SelectionUi for TerminalSelectionUi {
    fn init(&self, options: &PromptOptions, providers: &[String]) {
        let mut state = self.lock();
        *state = ListState {
            options: Some(options.clone()),
            expected: providers.len(),
            entries: Vec::with_capacity(providers.len()),
            ..Default::default()
        };
    }

    fn refresh(&self, entry: &SelectionEntry) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        match state.entries.iter_mut().find(|e| e.provider == entry.provider) {
            Some(existing) => *existing = entry.clone(),
            None => state.entries.push(entry.clone()),
        }
        if state.prompting {
            state.held.push(entry.clone());
        } else {
            Self::print_entry(entry);
        }
        drop(state);
        self.changed.notify_one();
    }

    fn show_empty(&self, message: &str) {
        println!("{message}");
    }

    async fn wait_for_choice(&self) -> UiEvent {
        loop {
            // With no rows at all there is nothing to pick; the engine ends
            // the run when the stream completes.
            if !self.rows_available().await {
                return UiEvent::Cancelled;
            }

            let (rows, items, options) = {
                let mut state = self.lock();
                state.prompting = true;
                let rows = state.rows();
                let items = state.items(&rows);
                (rows, items, state.options.clone().unwrap_or_default())
            };

            let picker = Arc::clone(&self.picker);
            let picked = tokio::task::spawn_blocking(move || picker(&options, &items)).await;

            let held = {
                let mut state = self.lock();
                state.prompting = false;
                if state.closed {
                    return UiEvent::Cancelled;
                }
                std::mem::take(&mut state.held)
            };
            held.iter().for_each(Self::print_entry);

            match picked {
                Ok(Ok(Some(index))) if index < rows.len() => {
                    return rows
                        .into_iter()
                        .nth(index)
                        .map_or(UiEvent::Cancelled, UiEvent::Selected);
                }
                // The refresh item: rebuild with the rows that arrived meanwhile.
                Ok(Ok(Some(_))) => continue,
                Ok(Ok(None)) => return UiEvent::Cancelled,
                Ok(Err(e)) => {
                    warn!("Selection prompt failed: {}", e);
                    return UiEvent::Cancelled;
                }
                Err(e) => {
                    warn!("Selection prompt task failed: {}", e);
                    return UiEvent::Cancelled;
                }
            }
        }
    }

    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.changed.notify_one();
    }
}
