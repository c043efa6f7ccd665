use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "codepad", about = "Edit code, run it, inspect output/variables/errors, review AI rewrites", version)]
pub struct Cli {
    /// Open the editor with this file's contents instead of the example program.
    /// The file is read once and never written back.
    #[arg(short = 'f', long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Model used for AI suggestions (overrides DEFAULT_MODEL).
    #[arg(long)]
    pub model: Option<String>,

    /// Send code to this HTTP execution endpoint instead of a local interpreter.
    #[arg(long = "execute-url", value_name = "URL")]
    pub execute_url: Option<String>,

    /// Ask this HTTP endpoint for AI suggestions instead of an LLM.
    #[arg(long = "generate-url", value_name = "URL")]
    pub generate_url: Option<String>,

    /// Interpreter used by the local execution backend (overrides PYTHON_BIN).
    #[arg(long, value_name = "BIN")]
    pub python: Option<String>,

    #[command(subcommand)]
    pub command: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Mode {
    /// Run a program once and print output, variables and error.
    Run {
        /// Source file; reads stdin when omitted.
        path: Option<PathBuf>,
        /// Use the Debug entry point (same behaviour as Run).
        #[arg(long)]
        debug: bool,
    },
    /// Ask for an alternative version of a program and print it.
    Suggest {
        /// Source file; reads stdin when omitted.
        path: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from(["codepad", "--execute-url", "http://x/execute", "run", "a.py", "--debug"]).unwrap();
        assert_eq!(cli.execute_url.as_deref(), Some("http://x/execute"));
        match cli.command {
            Some(Mode::Run { path, debug }) => {
                assert_eq!(path, Some(PathBuf::from("a.py")));
                assert!(debug);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn no_subcommand_opens_editor() {
        let cli = Cli::try_parse_from(["codepad", "-f", "main.py"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.file, Some(PathBuf::from("main.py")));
    }
}
