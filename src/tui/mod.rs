//! Terminal front-end: editor pane, tabbed results and the review popup.

pub mod app;
pub mod editor;
pub mod events;
pub mod handler;
pub mod ui;

pub use handler::run_tui;
