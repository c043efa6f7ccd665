//! Command handlers: interactive editor and the one-shot headless commands.

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::session::{Command, Dispatcher, Session, SessionError, Settlement};

pub mod edit;
pub mod run;
pub mod suggest;

/// Read the source from `path`, or from stdin when no path is given.
pub fn read_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("failed to read source from stdin")?;
            Ok(buf)
        }
    }
}

/// Issue one command and wait until every request it dispatched has settled.
pub(crate) async fn apply_and_settle(
    session: &mut Session,
    command: Command,
    dispatcher: &Dispatcher,
    settled_rx: &mut mpsc::UnboundedReceiver<Settlement>,
) -> Result<(), SessionError> {
    let effects = session.apply(command)?;
    let pending = effects.len();
    dispatcher.dispatch_all(effects);
    for _ in 0..pending {
        match settled_rx.recv().await {
            Some(settlement) => session.settle(settlement),
            None => break,
        }
    }
    Ok(())
}
