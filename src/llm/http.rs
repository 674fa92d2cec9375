//! HTTP backends: OpenAI-compatible chat completions and Ollama.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::completion::CompletionBackend;
use super::prompt::PromptPair;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

fn chat_messages(prompt: &PromptPair) -> [ChatMessage<'_>; 2] {
    [
        ChatMessage {
            role: "system",
            content: &prompt.system,
        },
        ChatMessage {
            role: "user",
            content: &prompt.user,
        },
    ]
}

async fn send_json<T: for<'de> Deserialize<'de>>(
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(ProviderError::Request)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// `POST {url}/v1/chat/completions` with bearer auth.
pub struct OpenAiBackend {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiBackend {
    pub fn new(
        client: reqwest::Client,
        url: Option<String>,
        api_key: String,
        model: Option<String>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            client,
            url: url
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            temperature,
        }
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, prompt: &PromptPair) -> Result<String, ProviderError> {
        let body = OpenAiRequest {
            model: &self.model,
            messages: chat_messages(prompt),
            temperature: self.temperature,
        };
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .bearer_auth(&self.api_key)
            .json(&body);

        let response: OpenAiResponse = send_json(request).await?;
        response
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

/// `POST {host}/api/chat` against a local Ollama server.
pub struct OllamaBackend {
    client: reqwest::Client,
    host: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaBackend {
    pub fn new(
        client: reqwest::Client,
        host: Option<String>,
        model: String,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            client,
            host: host
                .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            temperature,
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn complete(&self, prompt: &PromptPair) -> Result<String, ProviderError> {
        let body = OllamaRequest {
            model: &self.model,
            messages: chat_messages(prompt),
            stream: false,
            options: self.temperature.map(|temperature| OllamaOptions { temperature }),
        };
        let request = self.client.post(format!("{}/api/chat", self.host)).json(&body);

        let response: OllamaResponse = send_json(request).await?;
        if response.message.content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(response.message.content)
    }
}
