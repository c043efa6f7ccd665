//! Session controller: owns the editor source, the in-flight flags, the result
//! channels and the review state, and applies commands and settlements to them.
//!
//! Commands never talk to a collaborator directly. `Session::apply` mutates the
//! state and returns the [`Effect`]s to issue; whoever runs the effects reports
//! back through `Session::settle`.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::execution::ExecutionResponse;

pub mod dispatch;

pub use dispatch::Dispatcher;

/// Program loaded into a fresh session.
pub const EXAMPLE_PROGRAM: &str = r#"def fibonacci(n):
    a, b = 0, 1
    for _ in range(n):
        a, b = b, a + b
    return a

numbers = [fibonacci(i) for i in range(10)]
total = sum(numbers)
print("Fibonacci:", numbers)
print("Sum:", total)
"#;

pub const EXECUTE_FAILURE_MESSAGE: &str = "An error occurred while executing the code.";
pub const GENERATE_FAILURE_MESSAGE: &str = "An error occurred while generating alternative code.";

/// Result channel shown in the tabbed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Output,
    Variables,
    Error,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Output, Tab::Variables, Tab::Error];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Output => "Output",
            Tab::Variables => "Variables",
            Tab::Error => "Error",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Tab::Output => 0,
            Tab::Variables => 1,
            Tab::Error => 2,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Execute,
    Generate,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Execute => f.write_str("execute"),
            RequestKind::Generate => f.write_str("generate"),
        }
    }
}

/// Which affordance started an execute request. Run and Debug behave the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Run,
    Debug,
}

/// Where the text in the error channel came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// The evaluated program raised.
    Program,
    /// A collaborator call itself failed; retrying may help.
    Service,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub output: String,
    pub variables: BTreeMap<String, Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    EditSource(String),
    RunOrDebug(Trigger),
    Reset,
    GenerateAlternative,
    AcceptCandidate,
    DismissCandidate,
    SelectTab(Tab),
}

/// Collaborator call requested by a command. The source is the snapshot taken at dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Execute { id: RequestId, source: String },
    Generate { id: RequestId, source: String },
}

/// Outcome of a collaborator call, posted back into the session.
///
/// The `Err` side carries the collaborator's failure description for logging;
/// it is never shown to the user.
#[derive(Debug)]
pub enum Settlement {
    Executed {
        id: RequestId,
        outcome: Result<ExecutionResponse, String>,
    },
    Generated {
        id: RequestId,
        outcome: Result<String, String>,
    },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("a {0} request is already in flight")]
    RequestInFlight(RequestKind),
    #[error("no generated candidate to accept")]
    NoCandidate,
}

#[derive(Debug, Clone)]
pub struct Session {
    source: String,
    result: ExecutionResult,
    error_origin: Option<ErrorOrigin>,
    active_tab: Tab,
    candidate: Option<Candidate>,
    review_open: bool,
    executing: bool,
    generating: bool,
    next_request: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_source(EXAMPLE_PROGRAM)
    }

    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            result: ExecutionResult::default(),
            error_origin: None,
            active_tab: Tab::Output,
            candidate: None,
            review_open: false,
            executing: false,
            generating: false,
            next_request: 1,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn result(&self) -> &ExecutionResult {
        &self.result
    }

    pub fn error_origin(&self) -> Option<ErrorOrigin> {
        self.error_origin
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        self.candidate.as_ref()
    }

    pub fn review_open(&self) -> bool {
        self.review_open
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn in_flight(&self, kind: RequestKind) -> bool {
        match kind {
            RequestKind::Execute => self.executing,
            RequestKind::Generate => self.generating,
        }
    }

    /// Whether the Run/Debug affordance should be enabled.
    pub fn can_run(&self) -> bool {
        !self.executing
    }

    /// Whether the AI-Suggest affordance should be enabled.
    pub fn can_generate(&self) -> bool {
        !self.generating
    }

    /// Apply a user command. On error the state is left untouched.
    pub fn apply(&mut self, command: Command) -> Result<Vec<Effect>, SessionError> {
        match command {
            Command::EditSource(text) => {
                self.source = text;
                Ok(Vec::new())
            }
            Command::RunOrDebug(trigger) => self.run_or_debug(trigger),
            Command::Reset => {
                self.result = ExecutionResult::default();
                self.error_origin = None;
                debug!("result channels reset");
                Ok(Vec::new())
            }
            Command::GenerateAlternative => self.generate_alternative(),
            Command::AcceptCandidate => {
                let candidate = self.candidate.take().ok_or(SessionError::NoCandidate)?;
                self.source = candidate.text;
                self.review_open = false;
                info!("candidate accepted into source");
                Ok(Vec::new())
            }
            Command::DismissCandidate => {
                self.review_open = false;
                self.candidate = None;
                debug!("candidate dismissed");
                Ok(Vec::new())
            }
            Command::SelectTab(tab) => {
                self.active_tab = tab;
                Ok(Vec::new())
            }
        }
    }

    fn run_or_debug(&mut self, trigger: Trigger) -> Result<Vec<Effect>, SessionError> {
        if self.executing {
            warn!(?trigger, "execute ignored, previous request still in flight");
            return Err(SessionError::RequestInFlight(RequestKind::Execute));
        }
        self.executing = true;
        self.result.error = None;
        self.error_origin = None;
        let id = self.allocate_id();
        info!(%id, ?trigger, bytes = self.source.len(), "dispatching execute");
        Ok(vec![Effect::Execute {
            id,
            source: self.source.clone(),
        }])
    }

    fn generate_alternative(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.generating {
            warn!("generate ignored, previous request still in flight");
            return Err(SessionError::RequestInFlight(RequestKind::Generate));
        }
        self.generating = true;
        let id = self.allocate_id();
        info!(%id, bytes = self.source.len(), "dispatching generate");
        Ok(vec![Effect::Generate {
            id,
            source: self.source.clone(),
        }])
    }

    /// Fold a collaborator outcome into the state. Settlements are applied in
    /// arrival order; the last one to arrive wins.
    pub fn settle(&mut self, settlement: Settlement) {
        match settlement {
            Settlement::Executed { id, outcome } => {
                match outcome {
                    Ok(response) => {
                        let error = response.error.filter(|e| !e.is_empty());
                        self.active_tab = if error.is_some() { Tab::Error } else { Tab::Output };
                        self.error_origin = error.as_ref().map(|_| ErrorOrigin::Program);
                        self.result = ExecutionResult {
                            output: response.output,
                            variables: response.variables.unwrap_or_default(),
                            error,
                        };
                        info!(%id, has_error = self.result.error.is_some(), "execute settled");
                    }
                    Err(reason) => {
                        // Prior output and variables are kept alongside the failure.
                        warn!(%id, %reason, "execute failed");
                        self.result.error = Some(EXECUTE_FAILURE_MESSAGE.to_string());
                        self.error_origin = Some(ErrorOrigin::Service);
                        self.active_tab = Tab::Error;
                    }
                }
                self.executing = false;
            }
            Settlement::Generated { id, outcome } => {
                match outcome {
                    Ok(text) => {
                        info!(%id, bytes = text.len(), "generate settled");
                        self.candidate = Some(Candidate { text });
                        self.review_open = true;
                    }
                    Err(reason) => {
                        warn!(%id, %reason, "generate failed");
                        self.result.error = Some(GENERATE_FAILURE_MESSAGE.to_string());
                        self.error_origin = Some(ErrorOrigin::Service);
                    }
                }
                self.generating = false;
            }
        }
    }

    fn allocate_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(output: &str, error: Option<&str>) -> ExecutionResponse {
        ExecutionResponse {
            output: output.to_string(),
            variables: None,
            error: error.map(str::to_string),
        }
    }

    fn dispatched_id(effects: &[Effect]) -> RequestId {
        match effects {
            [Effect::Execute { id, .. }] | [Effect::Generate { id, .. }] => *id,
            other => panic!("expected one effect, got {:?}", other),
        }
    }

    #[test]
    fn new_session_starts_idle_with_example_program() {
        let session = Session::new();
        assert_eq!(session.source(), EXAMPLE_PROGRAM);
        assert_eq!(session.result(), &ExecutionResult::default());
        assert_eq!(session.active_tab(), Tab::Output);
        assert!(session.can_run());
        assert!(session.can_generate());
        assert!(session.candidate().is_none());
        assert!(!session.review_open());
    }

    #[test]
    fn run_snapshots_source_and_marks_in_flight() {
        let mut session = Session::with_source("print(1)");
        let effects = session.apply(Command::RunOrDebug(Trigger::Run)).unwrap();
        assert_eq!(
            effects,
            vec![Effect::Execute { id: RequestId(1), source: "print(1)".into() }]
        );
        assert!(session.is_executing());
        assert!(!session.can_run());

        // Edits after dispatch do not change what was sent.
        session.apply(Command::EditSource("print(2)".into())).unwrap();
        assert_eq!(session.source(), "print(2)");
    }

    #[test]
    fn second_run_while_in_flight_is_rejected_without_side_effects() {
        let mut session = Session::with_source("x = 1");
        session.apply(Command::RunOrDebug(Trigger::Run)).unwrap();
        let before = session.clone();
        let err = session.apply(Command::RunOrDebug(Trigger::Debug)).unwrap_err();
        assert_eq!(err, SessionError::RequestInFlight(RequestKind::Execute));
        assert_eq!(session.next_request, before.next_request);
        assert!(session.is_executing());
    }

    #[test]
    fn run_clears_prior_error_but_not_output() {
        let mut session = Session::with_source("x");
        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        session.settle(Settlement::Executed { id, outcome: Ok(response("partial\n", Some("boom"))) });
        assert_eq!(session.result().error.as_deref(), Some("boom"));

        session.apply(Command::RunOrDebug(Trigger::Debug)).unwrap();
        assert!(session.result().error.is_none());
        assert_eq!(session.result().output, "partial\n");
    }

    #[test]
    fn successful_execute_selects_output_tab() {
        let mut session = Session::with_source("print(1)");
        session.apply(Command::SelectTab(Tab::Variables)).unwrap();
        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        session.settle(Settlement::Executed { id, outcome: Ok(response("1\n", None)) });

        assert_eq!(
            session.result(),
            &ExecutionResult { output: "1\n".into(), variables: BTreeMap::new(), error: None }
        );
        assert_eq!(session.active_tab(), Tab::Output);
        assert!(!session.is_executing());
        assert_eq!(session.error_origin(), None);
    }

    #[test]
    fn program_error_selects_error_tab() {
        let mut session = Session::with_source("x");
        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        session.settle(Settlement::Executed {
            id,
            outcome: Ok(response("", Some("NameError: x is not defined"))),
        });
        assert_eq!(session.active_tab(), Tab::Error);
        assert_eq!(session.result().error.as_deref(), Some("NameError: x is not defined"));
        assert_eq!(session.error_origin(), Some(ErrorOrigin::Program));
    }

    #[test]
    fn execute_response_replaces_variables_wholesale() {
        let mut session = Session::with_source("a = 1");
        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        let mut vars = BTreeMap::new();
        vars.insert("a".to_string(), json!(1));
        session.settle(Settlement::Executed {
            id,
            outcome: Ok(ExecutionResponse { output: String::new(), variables: Some(vars), error: None }),
        });
        assert_eq!(session.result().variables.get("a"), Some(&json!(1)));

        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        session.settle(Settlement::Executed { id, outcome: Ok(response("", None)) });
        assert!(session.result().variables.is_empty());
    }

    #[test]
    fn failed_execute_reports_generic_message_and_keeps_prior_output() {
        let mut session = Session::with_source("print(1)");
        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        session.settle(Settlement::Executed { id, outcome: Ok(response("1\n", None)) });

        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        session.settle(Settlement::Executed { id, outcome: Err("connection refused".into()) });

        assert_eq!(session.result().error.as_deref(), Some(EXECUTE_FAILURE_MESSAGE));
        assert_eq!(session.result().output, "1\n");
        assert_eq!(session.active_tab(), Tab::Error);
        assert_eq!(session.error_origin(), Some(ErrorOrigin::Service));
        assert!(!session.is_executing());
    }

    #[test]
    fn reset_clears_result_and_nothing_else() {
        let mut session = Session::with_source("x");
        let id = dispatched_id(&session.apply(Command::GenerateAlternative).unwrap());
        session.settle(Settlement::Generated { id, outcome: Ok("y".into()) });
        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        session.settle(Settlement::Executed { id, outcome: Ok(response("out", Some("err"))) });
        session.apply(Command::RunOrDebug(Trigger::Run)).unwrap();

        session.apply(Command::Reset).unwrap();

        assert_eq!(session.result(), &ExecutionResult::default());
        assert_eq!(session.error_origin(), None);
        assert_eq!(session.source(), "x");
        assert_eq!(session.candidate().map(|c| c.text.as_str()), Some("y"));
        assert!(session.is_executing());
    }

    #[test]
    fn settlement_after_reset_overwrites_cleared_result() {
        let mut session = Session::with_source("print(3)");
        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        session.apply(Command::Reset).unwrap();
        session.settle(Settlement::Executed { id, outcome: Ok(response("3\n", None)) });
        assert_eq!(session.result().output, "3\n");
    }

    #[test]
    fn generate_success_opens_review_and_accept_replaces_source() {
        let mut session = Session::with_source("print(1)");
        let id = dispatched_id(&session.apply(Command::GenerateAlternative).unwrap());
        assert!(session.is_generating());
        session.settle(Settlement::Generated { id, outcome: Ok("print(2)".into()) });

        assert!(session.review_open());
        assert!(!session.is_generating());
        session.apply(Command::AcceptCandidate).unwrap();

        assert_eq!(session.source(), "print(2)");
        assert!(!session.review_open());
        assert!(session.candidate().is_none());
    }

    #[test]
    fn generate_failure_uses_error_channel_without_switching_tab() {
        let mut session = Session::with_source("print(1)");
        let id = dispatched_id(&session.apply(Command::GenerateAlternative).unwrap());
        session.settle(Settlement::Generated { id, outcome: Err("503".into()) });

        assert_eq!(session.result().error.as_deref(), Some(GENERATE_FAILURE_MESSAGE));
        assert!(!session.review_open());
        assert!(session.candidate().is_none());
        assert!(!session.is_generating());
        assert_eq!(session.active_tab(), Tab::Output);
    }

    #[test]
    fn accept_without_candidate_leaves_source_untouched() {
        let mut session = Session::with_source("keep me");
        assert_eq!(session.apply(Command::AcceptCandidate), Err(SessionError::NoCandidate));
        assert_eq!(session.source(), "keep me");
    }

    #[test]
    fn dismiss_closes_review_without_touching_source() {
        let mut session = Session::with_source("orig");
        let id = dispatched_id(&session.apply(Command::GenerateAlternative).unwrap());
        session.settle(Settlement::Generated { id, outcome: Ok("new".into()) });
        session.apply(Command::DismissCandidate).unwrap();

        assert_eq!(session.source(), "orig");
        assert!(!session.review_open());
        assert_eq!(session.apply(Command::AcceptCandidate), Err(SessionError::NoCandidate));
    }

    #[test]
    fn execute_and_generate_may_overlap() {
        let mut session = Session::with_source("a");
        let exec = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        let generate = dispatched_id(&session.apply(Command::GenerateAlternative).unwrap());
        assert_ne!(exec, generate);
        assert!(session.is_executing() && session.is_generating());

        session.settle(Settlement::Generated { id: generate, outcome: Ok("b".into()) });
        assert!(session.is_executing());
        session.settle(Settlement::Executed { id: exec, outcome: Ok(response("", None)) });
        assert!(!session.in_flight(RequestKind::Execute));
        assert!(!session.in_flight(RequestKind::Generate));
    }

    #[test]
    fn edits_always_store_last_value() {
        let mut session = Session::new();
        let id = dispatched_id(&session.apply(Command::RunOrDebug(Trigger::Run)).unwrap());
        for text in ["a", "ab", "abc", ""] {
            session.apply(Command::EditSource(text.into())).unwrap();
        }
        session.settle(Settlement::Executed { id, outcome: Ok(response("", None)) });
        assert_eq!(session.source(), "");
    }

    #[test]
    fn tab_cycling_wraps() {
        assert_eq!(Tab::Output.next(), Tab::Variables);
        assert_eq!(Tab::Error.next(), Tab::Output);
        assert_eq!(Tab::Output.prev(), Tab::Error);
    }
}
