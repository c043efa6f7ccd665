//! TUI application state: the session controller plus view-only state.

use std::time::{Duration, Instant};

use tracing::debug;

use super::editor::Editor;
use crate::session::{Command, Effect, ErrorOrigin, Session, SessionError, Settlement, Tab, Trigger};

const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_millis(500);

/// Application state for the TUI
#[derive(Debug)]
pub struct App {
    /// Controller state; the editor buffer mirrors `session.source()`
    pub session: Session,
    pub editor: Editor,
    /// Where the source came from, for the editor title
    pub origin: String,
    /// One-line notice shown in the status bar until the next key
    pub notice: Option<String>,
    pub show_help: bool,
    /// Scroll offset of the result pane
    pub result_scroll: u16,
    /// Scroll offset of the review popup
    pub review_scroll: u16,
    last_ctrl_c_time: Option<Instant>,
}

impl App {
    pub fn new(session: Session, origin: impl Into<String>) -> Self {
        let editor = Editor::new(session.source());
        Self {
            session,
            editor,
            origin: origin.into(),
            notice: None,
            show_help: false,
            result_scroll: 0,
            review_scroll: 0,
            last_ctrl_c_time: None,
        }
    }

    /// Apply a command to the session, turning guard rejections into a notice.
    pub fn command(&mut self, command: Command) -> Vec<Effect> {
        match self.session.apply(command) {
            Ok(effects) => effects,
            Err(err) => {
                debug!(%err, "command rejected");
                self.notice = Some(match err {
                    SessionError::RequestInFlight(kind) => format!("Still waiting for the {} request", kind),
                    SessionError::NoCandidate => "Nothing to accept".to_string(),
                });
                Vec::new()
            }
        }
    }

    /// Run an editing operation on the buffer and push the new text into the session.
    pub fn edit(&mut self, f: impl FnOnce(&mut Editor)) {
        f(&mut self.editor);
        let text = self.editor.text();
        if text != self.session.source() {
            self.command(Command::EditSource(text));
        }
    }

    pub fn run(&mut self, trigger: Trigger) -> Vec<Effect> {
        // The affordance is disabled while a request is outstanding.
        if !self.session.can_run() {
            self.notice = Some("Already running".to_string());
            return Vec::new();
        }
        self.result_scroll = 0;
        self.command(Command::RunOrDebug(trigger))
    }

    pub fn suggest(&mut self) -> Vec<Effect> {
        if !self.session.can_generate() {
            self.notice = Some("Already generating".to_string());
            return Vec::new();
        }
        self.command(Command::GenerateAlternative)
    }

    pub fn reset(&mut self) {
        self.result_scroll = 0;
        self.command(Command::Reset);
    }

    pub fn accept_candidate(&mut self) {
        self.command(Command::AcceptCandidate);
        if self.editor.text() != self.session.source() {
            self.editor.set_text(self.session.source());
        }
    }

    pub fn dismiss_candidate(&mut self) {
        self.command(Command::DismissCandidate);
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.result_scroll = 0;
        self.command(Command::SelectTab(tab));
    }

    pub fn settle(&mut self, settlement: Settlement) {
        let executed = matches!(settlement, Settlement::Executed { .. });
        self.session.settle(settlement);
        if executed {
            self.result_scroll = 0;
        }
        if self.session.review_open() {
            self.review_scroll = 0;
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn scroll_result_up(&mut self) {
        self.result_scroll = self.result_scroll.saturating_sub(1);
    }

    pub fn scroll_result_down(&mut self) {
        self.result_scroll = self.result_scroll.saturating_add(1);
    }

    /// Status bar text derived from the controller flags.
    pub fn status_line(&self) -> String {
        if let Some(notice) = &self.notice {
            return notice.clone();
        }
        let mut parts = Vec::new();
        if self.session.is_executing() {
            parts.push("running...".to_string());
        }
        if self.session.is_generating() {
            parts.push("generating...".to_string());
        }
        if self.session.error_origin() == Some(ErrorOrigin::Service) {
            parts.push("service unavailable, ^R to retry".to_string());
        }
        if parts.is_empty() {
            parts.push("^R run  ^D debug  ^L reset  ^G AI suggest  F1 help".to_string());
        }
        parts.join(" | ")
    }

    /// Handle Ctrl+C press and detect double press for quit
    /// Returns true if should quit (double Ctrl+C), false otherwise
    pub fn handle_ctrl_c(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last_time) = self.last_ctrl_c_time {
            if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                self.last_ctrl_c_time = None;
                return true;
            }
        }
        self.last_ctrl_c_time = Some(now);
        self.notice = Some("Press Ctrl+C again to quit".to_string());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionResponse;

    #[test]
    fn edits_flow_into_session() {
        let mut app = App::new(Session::with_source("a"), "test");
        app.edit(|e| {
            e.move_end();
            e.insert_char('b');
        });
        assert_eq!(app.session.source(), "ab");
    }

    #[test]
    fn run_is_disabled_while_in_flight() {
        let mut app = App::new(Session::with_source("a"), "test");
        assert_eq!(app.run(Trigger::Run).len(), 1);
        assert!(app.run(Trigger::Debug).is_empty());
        assert_eq!(app.notice.as_deref(), Some("Already running"));
    }

    #[test]
    fn accepting_reloads_editor() {
        let mut app = App::new(Session::with_source("old"), "test");
        let id = match app.suggest().as_slice() {
            [Effect::Generate { id, .. }] => *id,
            other => panic!("unexpected {:?}", other),
        };
        app.settle(Settlement::Generated { id, outcome: Ok("new\nline".into()) });
        app.accept_candidate();
        assert_eq!(app.editor.text(), "new\nline");
        assert!(!app.session.review_open());
    }

    #[test]
    fn accept_without_candidate_sets_notice() {
        let mut app = App::new(Session::with_source("old"), "test");
        app.accept_candidate();
        assert_eq!(app.editor.text(), "old");
        assert_eq!(app.notice.as_deref(), Some("Nothing to accept"));
    }

    #[test]
    fn status_offers_retry_after_service_failure() {
        let mut app = App::new(Session::with_source("x"), "test");
        let id = match app.run(Trigger::Run).as_slice() {
            [Effect::Execute { id, .. }] => *id,
            other => panic!("unexpected {:?}", other),
        };
        assert!(app.status_line().contains("running"));
        app.settle(Settlement::Executed { id, outcome: Err("refused".into()) });
        assert!(app.status_line().contains("retry"));

        let id = match app.run(Trigger::Run).as_slice() {
            [Effect::Execute { id, .. }] => *id,
            other => panic!("unexpected {:?}", other),
        };
        app.settle(Settlement::Executed { id, outcome: Ok(ExecutionResponse::default()) });
        assert!(app.status_line().contains("^R run"));
    }
}
