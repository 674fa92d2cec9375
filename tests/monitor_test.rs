//! Integration tests for the commit monitor over a real repository.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use aicommit::config::{CliOverrides, Config};
use aicommit::error::{MonitorError, RunError};
use aicommit::llm::{AdapterDescriptor, Provider};
use aicommit::monitor::{GitMonitorHost, MonitorHost, Supervisor};
use common::{CountingFactory, FirstRowUi, RecordingConsole, TestRepo};

fn config(descriptors: Vec<AdapterDescriptor>) -> Config {
    Config {
        path: PathBuf::from("/nonexistent/aicommit.toml"),
        locale: "en".to_string(),
        generate: 1,
        commit_type: None,
        max_length: 50,
        code_review: false,
        system_prompt: None,
        exclude: Vec::new(),
        prompt: None,
        descriptors,
    }
}

fn reviewer(name: &str) -> AdapterDescriptor {
    let mut descriptor = AdapterDescriptor::new(name, Provider::Ollama);
    descriptor.code_review = true;
    descriptor
}

struct Harness {
    repo: TestRepo,
    console: Arc<RecordingConsole>,
    factory: Arc<CountingFactory>,
    host: Arc<GitMonitorHost>,
}

fn harness() -> Harness {
    let repo = TestRepo::new();
    let console = Arc::new(RecordingConsole::default());
    let factory = Arc::new(CountingFactory::default());
    let host = Arc::new(GitMonitorHost::new(
        repo.path().to_path_buf(),
        CliOverrides::default(),
        console.clone(),
        Arc::new(FirstRowUi::default()),
        factory.clone(),
    ));
    Harness {
        repo,
        console,
        factory,
        host,
    }
}

#[test]
fn test_hook_and_log_live_in_git_dir() {
    let h = harness();
    h.host.assert_repository().unwrap();
    h.host.install_hook().unwrap();
    h.host.reset_log().unwrap();

    let git_dir = h.repo.path().join(".git");
    let hook = std::fs::read_to_string(git_dir.join("hooks").join("post-commit")).unwrap();
    assert!(hook.starts_with("#!/bin/sh"));
    assert!(hook.contains("commit-log.txt"));
    assert!(git_dir.join("commit-log.txt").exists());
    assert_eq!(h.host.read_log().unwrap(), "");
}

#[test]
fn test_assert_repository_outside_repo_fails() {
    let dir = tempfile::tempdir().unwrap();
    let host = GitMonitorHost::new(
        dir.path().to_path_buf(),
        CliOverrides::default(),
        Arc::new(RecordingConsole::default()),
        Arc::new(FirstRowUi::default()),
        Arc::new(CountingFactory::default()),
    );
    assert!(matches!(host.assert_repository(), Err(MonitorError::Repository(_))));
}

#[tokio::test]
async fn test_review_commit_prints_selected_review() {
    let h = harness();
    let oid = h.repo.commit_file("src/main.rs", "fn main() {}\n", "feat: init");

    let config = config(vec![
        AdapterDescriptor::new("claude", Provider::Claude),
        reviewer("ollama/llama3"),
    ]);
    h.host.review_commit(&config, &oid.to_string()).await.unwrap();

    assert_eq!(h.factory.invocations("ollama/llama3"), 1);
    assert_eq!(h.factory.invocations("claude"), 0);
    assert!(h.console.contains("src/main.rs"));
    assert!(h.console.contains("feat: from ollama/llama3"));
    assert!(h.console.contains("Code review completed"));
}

#[tokio::test]
async fn test_review_without_reviewers_is_no_eligible_providers() {
    let h = harness();
    let oid = h.repo.commit_file("a.txt", "a\n", "init");

    let config = config(vec![AdapterDescriptor::new("claude", Provider::Claude)]);
    let err = h.host.review_commit(&config, &oid.to_string()).await.unwrap_err();
    assert!(matches!(err, MonitorError::Run(RunError::NoEligibleProviders { .. })));
}

#[tokio::test]
async fn test_drain_reviews_logged_commits_and_empties_log() {
    let h = harness();
    let first = h.repo.commit_file("a.txt", "a\n", "feat: a");
    let second = h.repo.commit_file("b.txt", "b\n", "feat: b\n\nWith a body: spanning lines.");
    h.host.install_hook().unwrap();

    let log = h.repo.path().join(".git").join("commit-log.txt");
    std::fs::write(
        &log,
        format!(
            "{first}: feat: a\n{}: broken\n{second}: feat: b\n\nWith a body: spanning lines.\n",
            "0".repeat(40)
        ),
    )
    .unwrap();

    let supervisor = Supervisor::new(h.host.clone(), h.console.clone());
    let processed = supervisor
        .drain(&config(vec![reviewer("ollama/llama3")]))
        .await
        .unwrap();

    assert_eq!(processed, 3);
    assert_eq!(h.factory.invocations("ollama/llama3"), 2);
    assert!(h.console.contains(&format!("error: Error processing commit {}", "0".repeat(40))));
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "");
}
