//! Interactive editor handler.

use std::io;
use std::path::Path;

use anyhow::{bail, Result};

use super::read_source;
use crate::config::Config;
use crate::session::Session;
use crate::{execution, generation, tui};

pub async fn run(cfg: &Config, file: Option<&Path>) -> Result<()> {
    if !io::IsTerminal::is_terminal(&io::stdout()) {
        eprintln!("Warning: the editor is not available in this environment. It requires a proper terminal.");
        eprintln!("Use `codepad run` or `codepad suggest` for non-interactive use.");
        bail!("the editor requires a proper terminal environment");
    }

    let (session, origin) = match file {
        Some(path) => (Session::with_source(read_source(Some(path))?), path.display().to_string()),
        None => (Session::new(), "example".to_string()),
    };

    let executor = execution::from_config(cfg)?;
    let generator = generation::from_config(cfg)?;
    tui::run_tui(session, origin, executor, generator).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn editor_refuses_without_a_terminal() {
        if io::IsTerminal::is_terminal(&io::stdout()) {
            return;
        }
        let cfg = Config::load_from(PathBuf::from("/nonexistent/.codepadrc"));
        let err = run(&cfg, None).await.unwrap_err();
        assert!(err.to_string().contains("terminal"));
    }
}
