//! Local execution through a Python subprocess.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::{ExecutionResponse, Executor};
use crate::config::Config;
use crate::process::{spawn_interpreter, ProcessHandle};

const RESULT_MARKER: &str = "__CODEPAD_RESULT__";

/// Reads the program from stdin and runs it with fd 2 joined onto fd 1, so
/// everything the program writes reaches the stdout pipe in order. Ends with
/// the marker on a line of its own and the JSON result on the next line.
const BOOTSTRAP: &str = r#"
import sys, os, json, types
os.dup2(1, 2)
_src = sys.stdin.read()
_ns = {"__name__": "__main__"}
_err = None
try:
    exec(compile(_src, "<codepad>", "exec"), _ns)
except BaseException as e:
    _err = "%s: %s" % (type(e).__name__, e)
_skip = (types.ModuleType, types.FunctionType, types.BuiltinFunctionType, type)
_vars = {}
for _k, _v in list(_ns.items()):
    if _k.startswith("__") or isinstance(_v, _skip):
        continue
    try:
        _vars[_k] = repr(_v)
    except Exception:
        _vars[_k] = "<unrepresentable>"
_res = {"variables": _vars}
if _err is not None:
    _res["error"] = _err
for _s in (sys.stdout, sys.stderr):
    try:
        _s.flush()
    except Exception:
        pass
sys.__stdout__.write("\n__CODEPAD_RESULT__\n" + json.dumps(_res) + "\n")
sys.__stdout__.flush()
"#;

#[derive(Debug, Clone)]
pub struct PythonExecutor {
    python: String,
    timeout: Duration,
}

impl PythonExecutor {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self { python: python.into(), timeout }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let python = cfg.get("PYTHON_BIN").unwrap_or_else(|| "python3".into());
        Self::new(python, cfg.execution_timeout())
    }

    async fn run(&self, source: &str) -> Result<ExecutionResponse> {
        let ProcessHandle { mut child, mut stdin, mut stdout, mut stderr } =
            spawn_interpreter(&self.python, BOOTSTRAP)?;

        stdin
            .write_all(source.as_bytes())
            .await
            .context("failed to send source to interpreter")?;
        drop(stdin);

        let mut out = String::new();
        let mut err = String::new();
        let (out_res, err_res) = tokio::join!(stdout.read_to_string(&mut out), stderr.read_to_string(&mut err));
        out_res.context("failed to read interpreter stdout")?;
        err_res.context("failed to read interpreter stderr")?;
        let status = child.wait().await?;
        debug!(%status, stdout_bytes = out.len(), "interpreter exited");

        match parse_result(&out) {
            Some(parsed) => parsed,
            None if !status.success() => {
                let detail = if err.trim().is_empty() { out.trim() } else { err.trim() };
                bail!("interpreter exited with {}: {}", status, detail)
            }
            None => bail!("interpreter produced no result"),
        }
    }
}

#[async_trait]
impl Executor for PythonExecutor {
    async fn execute(&self, source: &str) -> Result<ExecutionResponse> {
        tokio::time::timeout(self.timeout, self.run(source))
            .await
            .map_err(|_| anyhow!("execution timed out after {}s", self.timeout.as_secs()))?
    }
}


/// Split `stdout` at the last line that is exactly the marker. Everything
/// before it is the program's output, the line after it is the JSON result.
fn parse_result(stdout: &str) -> Option<Result<ExecutionResponse>> {
    let fence = format!("\n{}\n", RESULT_MARKER);
    let pos = stdout.rfind(&fence)?;
    let line = stdout[pos + fence.len()..].lines().next().unwrap_or_default();
    Some(
        serde_json::from_str::<ExecutionResponse>(line)
            .context("malformed interpreter result")
            .map(|resp| ExecutionResponse { output: stdout[..pos].to_string(), ..resp }),
    )
}
