//! Interpreter process management: spawn a child with piped stdio.

use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

pub struct ProcessHandle {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Start `program -u -c <bootstrap>` with all three streams piped.
///
/// The child is killed when the handle's `Child` is dropped, so abandoning a
/// call (e.g. on timeout) never leaves a stray interpreter behind.
pub fn spawn_interpreter(program: &str, bootstrap: &str) -> Result<ProcessHandle> {
    let mut cmd = Command::new(program);
    cmd.arg("-u") // unbuffered
        .arg("-c")
        .arg(bootstrap)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to start interpreter `{}`", program))?;
    let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("no stderr"))?;

    Ok(ProcessHandle { child, stdin, stdout, stderr })
}
