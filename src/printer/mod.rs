//! Printers for the headless commands.

use std::fmt::Write as _;

use owo_colors::OwoColorize;
use serde_json::Value;

use crate::session::{Candidate, ExecutionResult, Tab};

/// Human-readable form of a variable value; strings are shown without quotes.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct ResultPrinter {
    pub color: bool,
}

impl ResultPrinter {
    pub fn render(&self, result: &ExecutionResult, active: Tab) -> String {
        let mut out = String::new();
        for tab in Tab::ALL {
            let marker = if tab == active { "*" } else { " " };
            let header = format!("{} {}", marker, tab.title());
            let header = if !self.color {
                header
            } else {
                match tab {
                    Tab::Output => header.cyan().to_string(),
                    Tab::Variables => header.green().to_string(),
                    Tab::Error => header.red().to_string(),
                }
            };
            let _ = writeln!(out, "{}", header);
            out.push_str(&self.body(result, tab));
            out.push('\n');
        }
        out
    }

    fn body(&self, result: &ExecutionResult, tab: Tab) -> String {
        match tab {
            Tab::Output if result.output.is_empty() => "(no output)\n".to_string(),
            Tab::Output => {
                let mut s = result.output.clone();
                if !s.ends_with('\n') {
                    s.push('\n');
                }
                s
            }
            Tab::Variables if result.variables.is_empty() => "(no variables)\n".to_string(),
            Tab::Variables => {
                let width = result.variables.keys().map(|k| k.len()).max().unwrap_or(0);
                result
                    .variables
                    .iter()
                    .map(|(k, v)| format!("{:width$} = {}\n", k, display_value(v), width = width))
                    .collect()
            }
            Tab::Error => match &result.error {
                Some(e) if self.color => format!("{}\n", e.red()),
                Some(e) => format!("{}\n", e),
                None => "(no error)\n".to_string(),
            },
        }
    }

    pub fn print(&self, result: &ExecutionResult, active: Tab) {
        print!("{}", self.render(result, active));
    }
}

pub fn print_candidate(candidate: &Candidate) {
    print!("{}", candidate.text);
    if !candidate.text.ends_with('\n') {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_all_three_channels_plain() {
        let mut result = ExecutionResult {
            output: "1".into(),
            ..Default::default()
        };
        result.variables.insert("name".into(), json!("ada"));
        result.variables.insert("n".into(), json!(3));

        let text = ResultPrinter { color: false }.render(&result, Tab::Output);
        assert_eq!(
            text,
            "* Output\n1\n\n  Variables\nn    = 3\nname = ada\n\n  Error\n(no error)\n\n"
        );
    }

    #[test]
    fn empty_result_uses_placeholders() {
        let result = ExecutionResult { error: Some("boom".into()), ..Default::default() };
        let text = ResultPrinter { color: false }.render(&result, Tab::Error);
        assert!(text.contains("(no output)"));
        assert!(text.contains("(no variables)"));
        assert!(text.contains("* Error\nboom\n"));
    }
}
