//! AI backends: adapters, prompts, response parsing, and retry.

pub mod completion;
pub mod http;
pub mod json;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod subprocess;

use std::sync::Arc;

pub use completion::{CompletionAdapter, CompletionBackend};
pub use json::{extract_json, parse_commit_candidates, parse_review_candidate};
pub use prompt::{PromptPair, build_commit_prompt, build_review_prompt};
pub use provider::{
    AdapterDescriptor, AdapterFactory, Provider, ProviderAdapter, ProviderSettings,
    eligible_descriptors,
};

use crate::error::ProviderError;
use crate::orchestrator::{Candidate, RequestContext};
use http::{OllamaBackend, OpenAiBackend};
use subprocess::{ClaudeCliBackend, CodexCliBackend};

/// Builds the real backends for each provider.
pub struct DefaultAdapterFactory {
    client: reqwest::Client,
}

impl DefaultAdapterFactory {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DefaultAdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterFactory for DefaultAdapterFactory {
    fn build(&self, descriptor: &AdapterDescriptor) -> Arc<dyn ProviderAdapter> {
        let settings = descriptor.settings.clone();
        let name = descriptor.name.clone();

        match descriptor.provider {
            Provider::Claude => {
                let backend = ClaudeCliBackend::new(settings.model.clone());
                Arc::new(CompletionAdapter::new(name, settings, backend))
            }
            Provider::Codex => {
                let backend = CodexCliBackend::new(settings.model.clone());
                Arc::new(CompletionAdapter::new(name, settings, backend))
            }
            Provider::OpenAi => {
                let Some(api_key) = settings.api_key.clone() else {
                    return Arc::new(MisconfiguredAdapter {
                        name,
                        reason: "no API key configured".to_string(),
                    });
                };
                let backend = OpenAiBackend::new(
                    self.client.clone(),
                    settings.endpoint.clone(),
                    api_key,
                    settings.model.clone(),
                    settings.temperature,
                );
                Arc::new(CompletionAdapter::new(name, settings, backend))
            }
            Provider::Ollama => {
                let Some(model) = settings.model.clone() else {
                    return Arc::new(MisconfiguredAdapter {
                        name,
                        reason: "no model configured".to_string(),
                    });
                };
                let backend = OllamaBackend::new(
                    self.client.clone(),
                    settings.endpoint.clone(),
                    model,
                    settings.temperature,
                );
                Arc::new(CompletionAdapter::new(name, settings, backend))
            }
        }
    }
}

/// Stands in for a descriptor that passed gating without its required
/// setting, so the run reports it as a failed entry instead of panicking.
struct MisconfiguredAdapter {
    name: String,
    reason: String,
}

#[async_trait::async_trait]
impl ProviderAdapter for MisconfiguredAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _context: &RequestContext) -> Result<Vec<Candidate>, ProviderError> {
        Err(ProviderError::InvalidResponse(format!(
            "{} is misconfigured: {}",
            self.name, self.reason
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_keeps_descriptor_name() {
        let factory = DefaultAdapterFactory::new();
        let mut descriptor = AdapterDescriptor::new("ollama/llama3", Provider::Ollama);
        descriptor.settings.model = Some("llama3".to_string());

        let adapter = factory.build(&descriptor);
        assert_eq!(adapter.name(), "ollama/llama3");
    }

    #[tokio::test]
    async fn test_factory_reports_missing_key_as_failure() {
        let factory = DefaultAdapterFactory::new();
        let descriptor = AdapterDescriptor::new("openai", Provider::OpenAi);

        let adapters = factory.build_all(&[descriptor]);
        let ctx = RequestContext {
            mode: crate::orchestrator::RequestMode::CommitMessage,
            diff: crate::git::DiffSummary {
                diff_text: String::new(),
                changed_files: vec![],
                truncated: false,
                additions: 0,
                deletions: 0,
            },
            locale: "en".to_string(),
            generate: 1,
            exclude: vec![],
            prompt: None,
            commit_type: None,
            max_length: 50,
            system_prompt: None,
        };
        let err = adapters[0].invoke(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }
}
