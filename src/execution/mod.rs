//! Execution service: protocol, result types and backends.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;

pub mod python;

pub use python::PythonExecutor;

/// Successful reply from an execution backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Evaluate `source`. An `Err` means the service could not be used at all;
    /// faults in the program itself come back in `ExecutionResponse::error`.
    async fn execute(&self, source: &str) -> Result<ExecutionResponse>;
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
}

/// Posts the source to a remote execution endpoint.
#[derive(Debug)]
pub struct HttpExecutor {
    http: reqwest::Client,
    url: String,
}

impl HttpExecutor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, source: &str) -> Result<ExecutionResponse> {
        debug!(url = %self.url, "posting execute request");
        let resp = self
            .http
            .post(&self.url)
            .json(&ExecuteRequest { code: source })
            .send()
            .await
            .context("failed to send execute request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("execution service error: {}", status);
        }
        resp.json::<ExecutionResponse>()
            .await
            .context("malformed execute response")
    }
}

/// Build the executor selected by `EXECUTE_BACKEND`.
pub fn from_config(cfg: &Config) -> Result<Arc<dyn Executor>> {
    let backend = cfg.get("EXECUTE_BACKEND").unwrap_or_else(|| "python".into());
    match backend.to_ascii_lowercase().as_str() {
        "python" | "local" => Ok(Arc::new(PythonExecutor::from_config(cfg))),
        "http" | "remote" => {
            let url = cfg
                .get("EXECUTE_URL")
                .ok_or_else(|| anyhow!("EXECUTE_BACKEND=http requires EXECUTE_URL"))?;
            Ok(Arc::new(HttpExecutor::new(url, cfg.request_timeout())?))
        }
        other => Err(anyhow!("unknown EXECUTE_BACKEND: {}", other)),
    }
}
