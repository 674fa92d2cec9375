//! Provider identities, descriptors, and the adapter seam used by the orchestrator.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::orchestrator::{Candidate, RequestContext, RequestMode};

/// Supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Claude,
    Codex,
    OpenAi,
    Ollama,
}

impl Provider {
    pub const ALL: [Provider; 4] = [Provider::Claude, Provider::Codex, Provider::OpenAi, Provider::Ollama];

    /// Key used for the provider's table in the config file.
    pub fn config_key(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Codex => "codex",
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.config_key() == key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "Claude",
            Provider::Codex => "Codex",
            Provider::OpenAi => "OpenAI",
            Provider::Ollama => "Ollama",
        }
    }

    /// Executable name for CLI-backed providers.
    pub fn executable(&self) -> Option<&'static str> {
        match self {
            Provider::Claude => Some("claude"),
            Provider::Codex => Some("codex"),
            Provider::OpenAi | Provider::Ollama => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider settings resolved from the config file.
#[derive(Clone)]
pub struct ProviderSettings {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Adapter-level custom prompt; a request-level prompt overrides it.
    pub prompt: Option<String>,
    pub timeout: Duration,
    /// In review mode, call the backend once per changed file.
    pub review_per_file: bool,
    /// Base URL for HTTP backends.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("prompt", &self.prompt)
            .field("timeout", &self.timeout)
            .field("review_per_file", &self.review_per_file)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            prompt: None,
            timeout: Duration::from_secs(120),
            review_per_file: false,
            endpoint: None,
            api_key: None,
        }
    }
}

/// One configured backend, as seen by the core.
///
/// Produced once per config load and never mutated during a run.
#[derive(Debug, Clone)]
pub struct AdapterDescriptor {
    /// Display name and outcome key, e.g. `openai` or `ollama/llama3`.
    pub name: String,
    pub provider: Provider,
    pub disabled: bool,
    /// Credentials, model, or executable present.
    pub available: bool,
    /// Review mode explicitly enabled for this backend.
    pub code_review: bool,
    pub settings: ProviderSettings,
}

impl AdapterDescriptor {
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            disabled: false,
            available: true,
            code_review: false,
            settings: ProviderSettings::default(),
        }
    }

    /// Whether this backend may run in `mode`.
    ///
    /// Review mode additionally requires `code_review` on the backend or
    /// globally; commit-message configuration alone is not enough.
    pub fn is_eligible(&self, mode: RequestMode, global_code_review: bool) -> bool {
        if self.disabled || !self.available {
            return false;
        }
        match mode {
            RequestMode::CommitMessage => true,
            RequestMode::CodeReview => global_code_review || self.code_review,
        }
    }
}

/// Filter descriptors down to the eligible set for one cycle.
pub fn eligible_descriptors(
    descriptors: &[AdapterDescriptor],
    mode: RequestMode,
    global_code_review: bool,
) -> Vec<AdapterDescriptor> {
    descriptors
        .iter()
        .filter(|d| d.is_eligible(mode, global_code_review))
        .cloned()
        .collect()
}

/// A uniform integration point for one AI backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, context: &RequestContext) -> Result<Vec<Candidate>, ProviderError>;
}

/// Builds adapters from descriptors.
pub trait AdapterFactory: Send + Sync {
    fn build(&self, descriptor: &AdapterDescriptor) -> Arc<dyn ProviderAdapter>;

    fn build_all(&self, descriptors: &[AdapterDescriptor]) -> Vec<Arc<dyn ProviderAdapter>> {
        descriptors.iter().map(|d| self.build(d)).collect()
    }
}
