//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use git2::{Oid, Repository, Signature};
use tokio::sync::Notify;

use aicommit::console::Console;
use aicommit::error::ProviderError;
use aicommit::llm::{AdapterDescriptor, AdapterFactory, ProviderAdapter};
use aicommit::orchestrator::{Candidate, RequestContext};
use aicommit::selection::{
    EntryState, PromptOptions, Selection, SelectionEntry, SelectionUi, UiEvent,
};

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository in a temp directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        let mut config = repo.config().expect("Failed to open repo config");
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the work tree.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(path, content).expect("Failed to write test file");
    }

    /// Add a path to the index.
    pub fn stage(&self, relative: &str) {
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(relative)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Commit the current index. Returns the commit OID.
    pub fn commit(&self, message: &str) -> Oid {
        let sig = Signature::now("Test User", "test@example.com").expect("Failed to create signature");
        let mut index = self.repo.index().expect("Failed to get index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Write, stage, and commit one file.
    pub fn commit_file(&self, relative: &str, content: &str, message: &str) -> Oid {
        self.write(relative, content);
        self.stage(relative);
        self.commit(message)
    }

    pub fn head_message(&self) -> String {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        head.message().unwrap_or_default().to_string()
    }
}

/// Console that records lines instead of printing them.
#[derive(Default)]
pub struct RecordingConsole {
    pub lines: Mutex<Vec<String>>,
    pub loaders_started: AtomicUsize,
    pub loaders_stopped: AtomicUsize,
}

impl RecordingConsole {
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

impl Console for RecordingConsole {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }

    fn success(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("success: {message}"));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("warn: {message}"));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("error: {message}"));
    }

    fn show_loader(&self, _text: &str) {
        self.loaders_started.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_loader(&self) {
        self.loaders_stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self) {}
}

/// Selection UI that waits for every provider, then picks the first row.
#[derive(Default)]
pub struct FirstRowUi {
    expected: AtomicUsize,
    pub refreshes: Mutex<Vec<SelectionEntry>>,
    pub empty_messages: Mutex<Vec<String>>,
    changed: Notify,
}

impl FirstRowUi {
    pub fn refreshed_providers(&self) -> Vec<String> {
        self.refreshes
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.provider.clone())
            .collect()
    }
}

#[async_trait]
impl SelectionUi for FirstRowUi {
    fn init(&self, _options: &PromptOptions, providers: &[String]) {
        self.expected.store(providers.len(), Ordering::SeqCst);
        self.refreshes.lock().unwrap().clear();
    }

    fn refresh(&self, entry: &SelectionEntry) {
        self.refreshes.lock().unwrap().push(entry.clone());
        self.changed.notify_one();
    }

    fn show_empty(&self, message: &str) {
        self.empty_messages.lock().unwrap().push(message.to_string());
    }

    async fn wait_for_choice(&self) -> UiEvent {
        loop {
            // Outer `Some` once every provider reported; inner is the first row.
            let decision: Option<Option<Selection>> = {
                let refreshes = self.refreshes.lock().unwrap();
                (refreshes.len() >= self.expected.load(Ordering::SeqCst)).then(|| {
                    refreshes.iter().find_map(|e| match &e.state {
                        EntryState::Populated(candidates) => Some(Selection {
                            provider: e.provider.clone(),
                            candidate: candidates[0].clone(),
                        }),
                        _ => None,
                    })
                })
            };
            match decision {
                Some(Some(selection)) => return UiEvent::Selected(selection),
                Some(None) => return std::future::pending().await,
                None => self.changed.notified().await,
            }
        }
    }

    fn close(&self) {}
}

/// Adapter with a fixed latency and result that counts its invocations.
pub struct FakeAdapter {
    pub name: String,
    pub delay: Duration,
    pub result: Result<Vec<String>, String>,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _context: &RequestContext) -> Result<Vec<Candidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.result {
            Ok(messages) => Ok(messages.iter().map(|m| Candidate::new(m.as_str())).collect()),
            Err(message) => Err(ProviderError::InvalidResponse(message.clone())),
        }
    }
}

pub fn fake_adapter(
    name: &str,
    delay_ms: u64,
    result: Result<Vec<&str>, &str>,
) -> Arc<dyn ProviderAdapter> {
    Arc::new(FakeAdapter {
        name: name.to_string(),
        delay: Duration::from_millis(delay_ms),
        result: result
            .map(|messages| messages.into_iter().map(str::to_string).collect())
            .map_err(str::to_string),
        calls: Arc::new(AtomicUsize::new(0)),
    })
}

/// Factory that answers every descriptor with a canned success and records
/// which descriptors were built and invoked.
#[derive(Default)]
pub struct CountingFactory {
    pub calls: Mutex<Vec<(String, Arc<AtomicUsize>)>>,
}

impl CountingFactory {
    pub fn invocations(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, c)| c.load(Ordering::SeqCst))
            .sum()
    }
}

impl AdapterFactory for CountingFactory {
    fn build(&self, descriptor: &AdapterDescriptor) -> Arc<dyn ProviderAdapter> {
        let calls = Arc::new(AtomicUsize::new(0));
        self.calls
            .lock()
            .unwrap()
            .push((descriptor.name.clone(), Arc::clone(&calls)));
        Arc::new(FakeAdapter {
            name: descriptor.name.clone(),
            delay: Duration::from_millis(1),
            result: Ok(vec![format!("feat: from {}", descriptor.name)]),
            calls,
        })
    }
}
