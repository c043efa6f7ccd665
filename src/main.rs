use std::process::ExitCode;

use anyhow::Result;
use codepad::cli::{Cli, Mode};
use codepad::config::Config;
use codepad::session::Trigger;
use codepad::{handlers, logging};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    // CLI overrides config
    let mut cfg = Config::load();
    if let Some(model) = &args.model {
        cfg.set("DEFAULT_MODEL", model.as_str());
    }
    if let Some(url) = &args.execute_url {
        cfg.set("EXECUTE_BACKEND", "http");
        cfg.set("EXECUTE_URL", url.as_str());
    }
    if let Some(url) = &args.generate_url {
        cfg.set("GENERATE_BACKEND", "http");
        cfg.set("GENERATE_URL", url.as_str());
    }
    if let Some(python) = &args.python {
        cfg.set("PYTHON_BIN", python.as_str());
    }

    match args.command {
        Some(Mode::Run { path, debug }) => {
            logging::init_stderr();
            let trigger = if debug { Trigger::Debug } else { Trigger::Run };
            let had_error = handlers::run::run(&cfg, path.as_deref(), trigger).await?;
            Ok(if had_error { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Some(Mode::Suggest { path }) => {
            logging::init_stderr();
            handlers::suggest::run(&cfg, path.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            logging::init_file(&cfg.log_path())?;
            handlers::edit::run(&cfg, args.file.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
