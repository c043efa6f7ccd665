//! Headless AI suggestion: one generate request, candidate printed to stdout.

use std::path::Path;

use anyhow::{bail, Result};
use tokio::sync::mpsc;

use super::{apply_and_settle, read_source};
use crate::config::Config;
use crate::printer::print_candidate;
use crate::session::{Command, Dispatcher, Session};
use crate::generation;

pub async fn run(cfg: &Config, file: Option<&Path>) -> Result<()> {
    let mut session = Session::with_source(read_source(file)?);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(tx).with_generator(generation::from_config(cfg)?);
    apply_and_settle(&mut session, Command::GenerateAlternative, &dispatcher, &mut rx)
        .await?;

    match session.candidate() {
        Some(candidate) => {
            print_candidate(candidate);
            Ok(())
        }
        None => bail!("{}", session.result().error.as_deref().unwrap_or("no suggestion returned")),
    }
}
