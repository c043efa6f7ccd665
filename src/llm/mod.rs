//! Reqwest-based LLM client implementing OpenAI-compatible Chat Completions streaming.

use std::{pin::Pin, time::Duration};

use anyhow::{Context, Result};
use async_stream::try_stream;
use futures_core::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let api_base_url = cfg.get("API_BASE_URL").unwrap_or_else(|| "default".into());
        let base_url = if api_base_url == "default" {
            "https://api.openai.com/v1".to_string()
        } else {
            normalize_base_url(&api_base_url)
        };
        Self::new(base_url, cfg.get("OPENAI_API_KEY"), cfg.request_timeout())
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.into(), api_key })
    }

    pub fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        opts: ChatOptions,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();

        Box::pin(try_stream! {
            let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
            debug!(%url, model = %opts.model, "opening chat stream");

            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("text/event-stream"));
            if let Some(key) = api_key.clone() {
                let hv = HeaderValue::from_str(&format!("Bearer {}", key))?;
                headers.insert(AUTHORIZATION, hv);
            }

            let body = serde_json::json!({
                "model": opts.model,
                "temperature": opts.temperature,
                "top_p": opts.top_p,
                "messages": messages,
                "stream": true,
            });

            let resp = http
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .context("failed to send chat request")?;

            if !resp.status().is_success() {
                let status = resp.status();
                Err::<(), _>(anyhow::anyhow!("LLM error: {}", status))?;
            }

            // raw bytes: a multi-byte character may straddle two chunks
            let mut buf: Vec<u8> = Vec::new();
            let mut stream = resp.bytes_stream();
            use futures_util::StreamExt as _;

            while let Some(chunk) = stream.next().await {
                let bytes = chunk.context("stream error")?;
                buf.extend_from_slice(&bytes);
                while let Some(raw) = take_line(&mut buf) {
                    let line = String::from_utf8(raw).context("chat stream is not valid UTF-8")?;
                    match parse_sse_line(line.trim()) {
                        Some(SseLine::Done) => { yield StreamEvent::Done; return; }
                        Some(SseLine::Content(parts)) => {
                            for content in parts {
                                yield StreamEvent::Content(content);
                            }
                        }
                        None => {}
                    }
                }
            }
            yield StreamEvent::Done;
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(String),
    Done,
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim_end_matches('/');
    if !trimmed.ends_with("/v1") && !trimmed.contains("/v1/") {
        format!("{}/v1", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Remove and return the first complete line (without its `\n`) from `buf`.
fn take_line(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buf.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = buf.drain(..=pos).collect();
    line.pop();
    Some(line)
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Content(Vec<String>),
    Done,
}

fn parse_sse_line(line: &str) -> Option<SseLine> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(SseLine::Done);
    }
    // malformed lines are ignored
    let chunk: Chunk = serde_json::from_str(payload).ok()?;
    let parts: Vec<String> = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.and_then(|d| d.content))
        .filter(|c| !c.is_empty())
        .collect();
    Some(SseLine::Content(parts))
}

// Minimal chunk structures for OpenAI-like streaming
#[derive(Debug, Deserialize)]
struct Chunk {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_version_suffix() {
        assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434/v1");
        assert_eq!(normalize_base_url("https://proxy/v1/"), "https://proxy/v1");
    }

    #[test]
    fn lines_are_split_on_bytes() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n".as_bytes();
        let split = event.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut buf = event[..split].to_vec();
        assert_eq!(take_line(&mut buf), None);
        buf.extend_from_slice(&event[split..]);
        let line = String::from_utf8(take_line(&mut buf).unwrap()).unwrap();
        assert!(buf.is_empty());
        assert_eq!(parse_sse_line(&line), Some(SseLine::Content(vec!["caf\u{e9}".to_string()])));
    }

    #[test]
    fn sse_lines() {
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseLine::Done));
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"pri"}},{"delta":{}}]}"#),
            Some(SseLine::Content(vec!["pri".to_string()]))
        );
        assert_eq!(parse_sse_line("data: {oops"), None);
    }
}
