//! OpenAI-compatible chat-completions backend.

use std::time::Duration;

use checker_core::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::backend::CompletionBackend;

/// Connection settings for a chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
  /// API root, e.g. `https://api.openai.com/v1`.
  pub base_url: String,
  pub api_key:  String,
  pub model:    String,
  /// Bound on the whole request, connect to last body byte.
  pub timeout:  Duration,
}

#[derive(Clone)]
pub struct OpenAiBackend {
  client: Client,
  config: OpenAiConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
  message: Message,
}

#[derive(Deserialize)]
struct Message {
  #[serde(default)]
  content: Option<String>,
}

impl OpenAiBackend {
  pub fn new(config: OpenAiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!(
      "{}/chat/completions",
      self.config.base_url.trim_end_matches('/')
    )
  }
}

fn transport(e: reqwest::Error) -> Error {
  if e.is_timeout() {
    Error::Transport(format!("reasoning service timed out: {e}"))
  } else {
    Error::Transport(format!("reasoning service request failed: {e}"))
  }
}

impl CompletionBackend for OpenAiBackend {
  async fn complete<'a>(&'a self, prompt: &'a str) -> Result<String> {
    let body = json!({
      "model": self.config.model,
      "messages": [{ "role": "user", "content": prompt }],
      "temperature": 0.2,
    });

    let resp = self
      .client
      .post(self.url())
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await
      .map_err(transport)?;

    let status = resp.status();
    if !status.is_success() {
      let detail = resp.text().await.unwrap_or_default();
      let detail: String = detail.chars().take(200).collect();
      return Err(Error::Transport(format!(
        "reasoning service returned {status}: {detail}"
      )));
    }

    let parsed: ChatResponse = resp.json().await.map_err(transport)?;
    parsed
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| Error::Parse("completion has no message content".into()))
  }
}
