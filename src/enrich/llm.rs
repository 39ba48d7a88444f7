//! LLM client abstraction: one `prompt` operation, provider-agnostic.
//! The fact extractor and delta computer depend only on this shape and
//! must defensively validate whatever string comes back.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Issue one chat-style request and return the raw response text.
    async fn prompt(&self, system: &str, user: &str) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type SharedLlm = Arc<dyn LlmClient>;

/// OpenAI provider (Chat Completions API). Requires `OPENAI_API_KEY`.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// `model_override`: pass Some("gpt-4o-mini") to override the default.
    pub fn new(model_override: Option<&str>) -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("ai-release-radar/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn prompt(&self, system: &str, user: &str) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("OPENAI_API_KEY is not set");
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("openai returned HTTP {status}");
        }
        let body: Resp = resp.json().await.context("openai response body")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.trim().is_empty() {
            bail!("openai returned an empty completion");
        }
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic scripted client for tests: pops queued responses in order,
/// falling back to the last one when the queue runs dry.
pub struct MockLlm {
    responses: Mutex<Vec<String>>,
    last: Mutex<Option<String>>,
}

impl MockLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut v: Vec<String> = responses.into_iter().map(Into::into).collect();
        v.reverse(); // pop() returns them in original order
        Self {
            responses: Mutex::new(v),
            last: Mutex::new(None),
        }
    }

    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new([response.into()])
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlm {
    async fn prompt(&self, _system: &str, _user: &str) -> Result<String> {
        let mut q = self.responses.lock().expect("mock llm mutex");
        if let Some(next) = q.pop() {
            *self.last.lock().expect("mock llm mutex") = Some(next.clone());
            return Ok(next);
        }
        match self.last.lock().expect("mock llm mutex").clone() {
            Some(last) => Ok(last),
            None => bail!("mock llm has no scripted responses"),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Always errors; used when no provider is configured.
pub struct DisabledLlm;

#[async_trait::async_trait]
impl LlmClient for DisabledLlm {
    async fn prompt(&self, _system: &str, _user: &str) -> Result<String> {
        bail!("llm is disabled")
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Build a client from the environment: mock in `LLM_TEST_MODE=mock`,
/// OpenAI when a key is present, otherwise disabled.
pub fn build_llm_from_env() -> SharedLlm {
    if std::env::var("LLM_TEST_MODE").map(|v| v == "mock").unwrap_or(false) {
        return Arc::new(MockLlm::fixed("{}"));
    }
    if std::env::var("OPENAI_API_KEY").map(|k| !k.is_empty()).unwrap_or(false) {
        return Arc::new(OpenAiClient::new(None));
    }
    Arc::new(DisabledLlm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_pops_in_order_then_repeats_last() {
        let llm = MockLlm::new(["one", "two"]);
        assert_eq!(llm.prompt("s", "u").await.unwrap(), "one");
        assert_eq!(llm.prompt("s", "u").await.unwrap(), "two");
        assert_eq!(llm.prompt("s", "u").await.unwrap(), "two");
    }

    #[tokio::test]
    async fn disabled_always_errors() {
        assert!(DisabledLlm.prompt("s", "u").await.is_err());
    }
}
