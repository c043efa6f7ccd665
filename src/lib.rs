//! codepad: a terminal code pad. Source is run through an execution service,
//! results land in three channels (output, variables, error), and an AI
//! suggestion can be reviewed and swapped in.

pub mod cli;
pub mod config;
pub mod execution;
pub mod generation;
pub mod handlers;
pub mod llm;
pub mod logging;
pub mod printer;
pub mod process;
pub mod session;
pub mod tui;
