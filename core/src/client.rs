use anyhow::Result;
use async_trait::async_trait;
use slide_common::ChatMessage;
use std::sync::Mutex;
use std::time::Duration;

/// Anything that can turn an ordered list of chat messages into one reply.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String>;

    /// Model name, for logging.
    fn model(&self) -> &str;
}

/// A very small stub client for testing the flow. Replies with a fixed string
/// and remembers every request it received.
pub struct StubClient {
    reply: String,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), requests: Mutex::new(Vec::new()) }
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for StubClient {
    fn default() -> Self {
        Self::new("No language model is configured; set OPENAI_API_KEY to edit slides.")
    }
}

#[async_trait]
impl ModelClient for StubClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(messages);
        }
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "stub"
    }
}

/// Adapter to wrap OpenAiModelClient into ModelClient
pub struct OpenAiAdapter {
    inner: slide_chatgpt::OpenAiModelClient,
}

impl OpenAiAdapter {
    pub fn new(api_key: String) -> Self {
        Self { inner: slide_chatgpt::OpenAiModelClient::new(api_key) }
    }

    pub fn new_with_model(api_key: String, model: String) -> Self {
        Self { inner: slide_chatgpt::OpenAiModelClient::new_with_model(api_key, model) }
    }

    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self { inner: self.inner.with_base_url(base_url) }
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self> {
        Ok(Self { inner: self.inner.with_timeout(timeout)? })
    }
}

#[async_trait]
impl ModelClient for OpenAiAdapter {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.inner.complete(&messages).await
    }

    fn model(&self) -> &str {
        &self.inner.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_records_requests() {
        let stub = StubClient::new("{}");
        let reply = stub
            .complete(vec![ChatMessage::system("sys"), ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply, "{}");
        let seen = stub.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][1].content, "hi");
    }

    #[tokio::test]
    async fn test_default_stub_reply_has_no_json() {
        let reply = StubClient::default().complete(Vec::new()).await.unwrap();
        assert!(!reply.contains('{'));
    }

    #[test]
    fn test_adapter_reports_model() {
        let client = OpenAiAdapter::new_with_model("k".into(), "gpt-4o".into());
        assert_eq!(client.model(), "gpt-4o");
        assert_eq!(OpenAiAdapter::new("k".into()).model(), "gpt-4");
    }
}
