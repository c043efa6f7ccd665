//! UI layout and rendering logic for the TUI.

use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame,
};

use super::app::App;
use crate::printer::display_value;
use crate::session::{ExecutionResult, Tab};

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &mut App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Editor + results
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(main_layout[0]);

    render_editor(frame, app, panes[0]);
    render_results(frame, app, panes[1]);
    render_status_bar(frame, app, main_layout[1]);

    if app.session.review_open() {
        render_review_popup(frame, app);
    }
    if app.show_help {
        render_help_overlay(frame);
    }
}

fn render_editor(frame: &mut Frame, app: &mut App, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize;
    app.editor.scroll_into_view(inner_height);

    let gutter = app.editor.lines().len().to_string().len();
    let lines: Vec<Line> = app
        .editor
        .lines()
        .iter()
        .enumerate()
        .skip(app.editor.scroll)
        .take(inner_height)
        .map(|(i, l)| {
            Line::from(vec![
                Span::styled(format!("{:>gutter$} ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::raw(l.clone()),
            ])
        })
        .collect();

    let title = format!("Editor - {}", app.origin);
    let paragraph = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);

    if !app.session.review_open() && !app.show_help {
        let (row, _) = app.editor.cursor();
        let col = gutter + 1 + app.editor.cursor_display_col();
        if let Some(pos) = cursor_position(area, col, row.saturating_sub(app.editor.scroll)) {
            frame.set_cursor_position(pos);
        }
    }
}

/// Screen position for a cursor at `col`/`row` inside the bordered `area`,
/// or `None` when it falls outside.
fn cursor_position(area: Rect, col: usize, row: usize) -> Option<Position> {
    let x = usize::from(area.x) + 1 + col;
    let y = usize::from(area.y) + 1 + row;
    let right = usize::from(area.right().saturating_sub(1));
    let bottom = usize::from(area.bottom().saturating_sub(1));
    if x < right && y < bottom {
        Some(Position::new(u16::try_from(x).ok()?, u16::try_from(y).ok()?))
    } else {
        None
    }
}

fn render_results(frame: &mut Frame, app: &App, area: Rect) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    let result = app.session.result();
    let titles: Vec<Line> = Tab::ALL
        .iter()
        .map(|tab| {
            let mut title = tab.title().to_string();
            match tab {
                Tab::Variables if !result.variables.is_empty() => {
                    title = format!("{} ({})", title, result.variables.len());
                }
                Tab::Error if result.error.is_some() => title.push_str(" !"),
                _ => {}
            }
            Line::from(title)
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.session.active_tab().index())
        .block(Block::default().borders(Borders::ALL).title("Results"))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, layout[0]);

    let active = app.session.active_tab();
    let (body, style) = result_body(result, active);
    let title = if app.session.is_executing() {
        format!("{} (running...)", active.title())
    } else {
        active.title().to_string()
    };
    let paragraph = Paragraph::new(body)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((app.result_scroll, 0));
    frame.render_widget(paragraph, layout[1]);
}

fn result_body(result: &ExecutionResult, tab: Tab) -> (Text<'static>, Style) {
    let dim = Style::default().fg(Color::DarkGray);
    match tab {
        Tab::Output if result.output.is_empty() => (Text::from("No output"), dim),
        Tab::Output => (Text::from(result.output.clone()), Style::default()),
        Tab::Variables if result.variables.is_empty() => (Text::from("No variables"), dim),
        Tab::Variables => {
            let lines: Vec<Line> = result
                .variables
                .iter()
                .map(|(name, value)| {
                    Line::from(vec![
                        Span::styled(name.clone(), Style::default().fg(Color::Cyan)),
                        Span::raw(" = "),
                        Span::raw(display_value(value)),
                    ])
                })
                .collect();
            (Text::from(lines), Style::default())
        }
        Tab::Error => match &result.error {
            Some(e) => (Text::from(e.clone()), Style::default().fg(Color::Red)),
            None => (Text::from("No errors"), dim),
        },
    }
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status_paragraph =
        Paragraph::new(app.status_line()).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status_paragraph, area);
}

/// Render the generated-code review popup
fn render_review_popup(frame: &mut Frame, app: &App) {
    let Some(candidate) = app.session.candidate() else {
        return;
    };
    let popup_area = centered_rect(85, 75, frame.area());
    frame.render_widget(Clear, popup_area);

    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Candidate
            Constraint::Length(3), // Instructions
        ])
        .split(popup_area);

    let code = Paragraph::new(candidate.text.clone())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("AI Suggestion")
                .title_style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        )
        .scroll((app.review_scroll, 0));
    frame.render_widget(code, popup_layout[0]);

    let instructions = Paragraph::new("Enter/y: replace editor contents   Esc/n: dismiss   ↑/↓: scroll")
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(instructions, popup_layout[1]);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame) {
    let popup_area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, popup_area);

    let help_lines = vec![
        Line::from("Commands:"),
        Line::from("  Ctrl+R       - Run"),
        Line::from("  Ctrl+D       - Debug"),
        Line::from("  Ctrl+L       - Reset results"),
        Line::from("  Ctrl+G       - AI suggestion"),
        Line::from(""),
        Line::from("Results:"),
        Line::from("  F2/F3/F4     - Output / Variables / Error"),
        Line::from("  Alt+1..3     - Same as F2..F4"),
        Line::from("  Ctrl+N/P     - Next / previous tab"),
        Line::from("  PgUp/PgDn    - Scroll results"),
        Line::from(""),
        Line::from("  F1           - Toggle this help"),
        Line::from("  Ctrl+Q       - Quit (or Ctrl+C twice)"),
    ];

    let help_paragraph = Paragraph::new(Text::from(help_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .title_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(help_paragraph, popup_area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
