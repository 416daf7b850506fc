use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use slide_common::ChatMessage;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Minimal OpenAI Chat Completions client: one request, one text reply.
pub struct OpenAiModelClient {
    api_key: String,
    pub model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiModelClient {
    pub fn new(api_key: String) -> Self {
        Self::new_with_model(api_key, "gpt-4".to_string())
    }

    pub fn new_with_model(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every request by `timeout`. Without this a request may wait forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!(e))?;
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send `messages` and return the text of the first choice.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = CompletionRequest { model: &self.model, messages };
        tracing::debug!(model = %self.model, messages = messages.len(), "sending chat completion request");

        let mut req = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json");
        if let Ok(project) = std::env::var("OPENAI_PROJECT") {
            if !project.is_empty() {
                req = req.header("OpenAI-Project", project);
            }
        }
        if let Ok(org) = std::env::var("OPENAI_ORG") {
            if !org.is_empty() {
                req = req.header("OpenAI-Organization", org);
            }
        }

        let resp = req.json(&body).send().await.map_err(|e| anyhow!(e))?;
        let status = resp.status();
        tracing::debug!(%status, "chat completion response");

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!("openai http {status}: {text}");
            return Err(anyhow!("openai http {status}"));
        }

        let parsed: CompletionResponse = resp.json().await.map_err(|e| anyhow!(e))?;
        extract_content(parsed)
    }
}

fn extract_content(resp: CompletionResponse) -> Result<String> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("chat completion returned no content"))
}
