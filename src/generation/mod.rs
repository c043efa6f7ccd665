//! Generation service: produce an alternative version of the current source.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, Role, StreamEvent};

const REWRITE_PROMPT: &str = "You rewrite programs.\n\
Return an alternative implementation of the user's code with the same observable behaviour, \
improved for readability or efficiency.\n\
Provide only code in plain text format without Markdown formatting and without any description.\n\
Do not include symbols such as ``` or ```python.";

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, source: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    generated_code: String,
}

/// Posts the source to a remote generation endpoint.
#[derive(Debug)]
pub struct HttpGenerator {
    http: reqwest::Client,
    url: String,
}

impl HttpGenerator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, source: &str) -> Result<String> {
        debug!(url = %self.url, "posting generate request");
        let resp = self
            .http
            .post(&self.url)
            .json(&GenerateRequest { code: source })
            .send()
            .await
            .context("failed to send generate request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("generation service error: {}", status);
        }
        let body: GenerateResponse = resp.json().await.context("malformed generate response")?;
        Ok(body.generated_code)
    }
}

/// Asks an OpenAI-compatible chat model for the rewrite.
#[derive(Debug)]
pub struct LlmGenerator {
    client: LlmClient,
    model: String,
}

impl LlmGenerator {
    pub fn new(client: LlmClient, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, source: &str) -> Result<String> {
        let messages = vec![
            ChatMessage::new(Role::System, REWRITE_PROMPT),
            ChatMessage::new(Role::User, source),
        ];
        let opts = ChatOptions {
            model: self.model.clone(),
            temperature: 0.2,
            top_p: 1.0,
        };

        let mut text = String::new();
        let mut stream = self.client.chat_stream(messages, opts);
        while let Some(ev) = stream.next().await {
            match ev? {
                StreamEvent::Content(t) => text.push_str(&t),
                StreamEvent::Done => break,
            }
        }

        let code = strip_code_fence(&text);
        if code.trim().is_empty() {
            bail!("model returned an empty completion");
        }
        Ok(code)
    }
}

/// Remove one surrounding Markdown code fence, if the model added it anyway.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text.to_string();
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text.to_string();
    };
    // drop the info string (e.g. "python") on the opening line
    match body.split_once('\n') {
        Some((_, code)) => code.trim_end_matches('\n').to_string() + "\n",
        None => String::new(),
    }
}

/// Build the generator selected by `GENERATE_BACKEND`.
pub fn from_config(cfg: &Config) -> Result<Arc<dyn Generator>> {
    let backend = cfg.get("GENERATE_BACKEND").unwrap_or_else(|| "llm".into());
    match backend.to_ascii_lowercase().as_str() {
        "llm" | "openai" => {
            let model = cfg.get("DEFAULT_MODEL").unwrap_or_else(|| "gpt-4o".into());
            Ok(Arc::new(LlmGenerator::new(LlmClient::from_config(cfg)?, model)))
        }
        "http" | "remote" => {
            let url = cfg
                .get("GENERATE_URL")
                .ok_or_else(|| anyhow!("GENERATE_BACKEND=http requires GENERATE_URL"))?;
            Ok(Arc::new(HttpGenerator::new(url, cfg.request_timeout())?))
        }
        other => Err(anyhow!("unknown GENERATE_BACKEND: {}", other)),
    }
}
