//! Headless execute: one Run through the session controller, then print the channels.

use std::path::Path;

use anyhow::Result;
use is_terminal::IsTerminal;
use tokio::sync::mpsc;

use super::{apply_and_settle, read_source};
use crate::config::Config;
use crate::printer::ResultPrinter;
use crate::session::{Command, Dispatcher, Session, Trigger};
use crate::execution;

/// Returns true when the error channel ended up non-empty.
pub async fn run(cfg: &Config, file: Option<&Path>, trigger: Trigger) -> Result<bool> {
    let mut session = Session::with_source(read_source(file)?);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(tx).with_executor(execution::from_config(cfg)?);
    apply_and_settle(&mut session, Command::RunOrDebug(trigger), &dispatcher, &mut rx)
        .await?;

    let printer = ResultPrinter { color: std::io::stdout().is_terminal() };
    printer.print(session.result(), session.active_tab());
    Ok(session.result().error.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn run_ignores_generator_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("prog.py");
        std::fs::write(&file, "print(1)\n").unwrap();

        let mut cfg = Config::load_from(PathBuf::from("/nonexistent/.codepadrc"));
        cfg.set("EXECUTE_BACKEND", "python");
        cfg.set("PYTHON_BIN", "codepad-no-such-python");
        cfg.set("GENERATE_BACKEND", "http");
        cfg.set("GENERATE_URL", "");

        // the executor fails, which lands in the error channel rather than aborting
        assert!(run(&cfg, Some(&file), Trigger::Run).await.unwrap());
    }
}
