//! Custom event types for TUI application.

use crossterm::event::KeyEvent;

use crate::session::Settlement;

/// Events that can occur in the TUI application
#[derive(Debug)]
pub enum TuiEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Bracketed paste content
    Paste(String),
    /// Terminal resized; redraw
    Resize,
    /// A collaborator call finished
    Settled(Settlement),
}
