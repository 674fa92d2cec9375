//! Adapter built on top of a plain text-completion backend.

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ProviderError;
use crate::orchestrator::{Candidate, RequestContext, RequestMode};

use super::json::{parse_commit_candidates, parse_review_candidate};
use super::prompt::{PromptPair, build_commit_prompt, build_file_review_prompt, build_review_prompt};
use super::provider::{ProviderAdapter, ProviderSettings};
use super::retry::retry_with_backoff;

/// A backend that turns one prompt into raw text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &PromptPair) -> Result<String, ProviderError>;
}

/// Builds prompts, bounds each call by the adapter timeout, retries, and
/// parses the backend's text into candidates.
pub struct CompletionAdapter<B> {
    name: String,
    settings: ProviderSettings,
    backend: B,
}

impl<B: CompletionBackend> CompletionAdapter<B> {
    pub fn new(name: impl Into<String>, settings: ProviderSettings, backend: B) -> Self {
        Self {
            name: name.into(),
            settings,
            backend,
        }
    }

    /// One logical backend call: retried, and bounded as a whole by the timeout.
    async fn complete(&self, prompt: &PromptPair) -> Result<String, ProviderError> {
        let limit = self.settings.timeout;
        timeout(
            limit,
            retry_with_backoff(&self.name, || self.backend.complete(prompt)),
        )
        .await
        .map_err(|_| ProviderError::Timeout(limit.as_secs()))?
    }

    async fn commit_messages(&self, context: &RequestContext) -> Result<Vec<Candidate>, ProviderError> {
        let prompt = build_commit_prompt(context, self.settings.prompt.as_deref());
        let raw = self.complete(&prompt).await?;
        parse_commit_candidates(&raw, usize::from(context.generate.max(1)))
    }

    async fn review(&self, context: &RequestContext) -> Result<Vec<Candidate>, ProviderError> {
        let custom = self.settings.prompt.as_deref();

        if !self.settings.review_per_file {
            let raw = self.complete(&build_review_prompt(context, custom)).await?;
            return Ok(vec![parse_review_candidate(&raw, None)?]);
        }

        let mut candidates = Vec::with_capacity(context.diff.changed_files.len());
        for file in &context.diff.changed_files {
            debug!("{} reviewing {}", self.name, file.path);
            let prompt = build_file_review_prompt(context, file, custom);
            let raw = self.complete(&prompt).await?;
            candidates.push(parse_review_candidate(&raw, Some(&file.path))?);
        }
        if candidates.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(candidates)
    }
}

#[async_trait]
impl<B: CompletionBackend> ProviderAdapter for CompletionAdapter<B> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, context: &RequestContext) -> Result<Vec<Candidate>, ProviderError> {
        match context.mode {
            RequestMode::CommitMessage => self.commit_messages(context).await,
            RequestMode::CodeReview => self.review(context).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::git::{ChangedFile, DiffSummary, FileStatus};

    struct ScriptedBackend {
        responses: Mutex<Vec<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<PromptPair>>,
        delay: Duration,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, prompt: &PromptPair) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            tokio::time::sleep(self.delay).await;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ProviderError::EmptyResponse);
            }
            responses.remove(0)
        }
    }

    fn context(mode: RequestMode) -> RequestContext {
        let file = |path: &str| ChangedFile {
            path: path.to_string(),
            status: FileStatus::Modified,
            old_path: None,
            patch: format!("+{path}\n"),
        };
        RequestContext {
            mode,
            diff: DiffSummary {
                diff_text: "+a\n+b\n".to_string(),
                changed_files: vec![file("a.rs"), file("b.rs")],
                truncated: false,
                additions: 2,
                deletions: 0,
            },
            locale: "en".to_string(),
            generate: 2,
            exclude: vec![],
            prompt: None,
            commit_type: None,
            max_length: 50,
            system_prompt: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_mode_parses_candidates() {
        let backend = ScriptedBackend::new(vec![Ok(
            r#"{"messages": [{"subject": "feat: one"}, {"subject": "feat: two"}]}"#.to_string(),
        )]);
        let adapter = CompletionAdapter::new("fake", ProviderSettings::default(), backend);

        let candidates = adapter.invoke(&context(RequestMode::CommitMessage)).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].message, "feat: two");
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_per_file_calls_backend_once_per_file() {
        let backend = ScriptedBackend::new(vec![
            Ok("Looks risky.".to_string()),
            Ok("Fine.".to_string()),
        ]);
        let settings = ProviderSettings {
            review_per_file: true,
            ..Default::default()
        };
        let adapter = CompletionAdapter::new("fake", settings, backend);

        let candidates = adapter.invoke(&context(RequestMode::CodeReview)).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].short_description, "a.rs: Looks risky.");
        assert_eq!(candidates[1].short_description, "b.rs: Fine.");
        assert_eq!(adapter.backend.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_review_whole_diff_calls_backend_once() {
        let backend = ScriptedBackend::new(vec![Ok("Overall fine.".to_string())]);
        let adapter = CompletionAdapter::new("fake", ProviderSettings::default(), backend);

        let candidates = adapter.invoke(&context(RequestMode::CodeReview)).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(adapter.backend.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_the_whole_call() {
        let mut backend = ScriptedBackend::new(vec![Ok("late".to_string())]);
        backend.delay = Duration::from_secs(10);
        let settings = ProviderSettings {
            timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let adapter = CompletionAdapter::new("slow", settings, backend);

        let result = adapter.invoke(&context(RequestMode::CommitMessage)).await;
        assert!(matches!(result, Err(ProviderError::Timeout(2))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(ProviderError::Api {
                status: 503,
                body: "overloaded".to_string(),
            }),
            Ok(r#"{"messages": [{"subject": "fix: retry"}]}"#.to_string()),
        ]);
        let adapter = CompletionAdapter::new("flaky", ProviderSettings::default(), backend);

        let candidates = adapter.invoke(&context(RequestMode::CommitMessage)).await.unwrap();
        assert_eq!(candidates[0].short_description, "fix: retry");
    }
}
