//! Async event loop and key bindings for the editor TUI.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::info;

use super::{app::App, events::TuiEvent, ui::render_ui};
use crate::execution::Executor;
use crate::generation::Generator;
use crate::session::{Dispatcher, Session, Settlement, Tab, Trigger};

/// Run the interactive editor until the user quits.
pub async fn run_tui(
    session: Session,
    origin: String,
    executor: Arc<dyn Executor>,
    generator: Arc<dyn Generator>,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (event_tx, event_rx) = mpsc::unbounded_channel::<TuiEvent>();
    let (settled_tx, mut settled_rx) = mpsc::unbounded_channel::<Settlement>();
    let dispatcher = Dispatcher::new(settled_tx).with_executor(executor).with_generator(generator);

    // Settlements re-enter the loop as ordinary events
    let forward_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(settlement) = settled_rx.recv().await {
            if forward_tx.send(TuiEvent::Settled(settlement)).is_err() {
                break;
            }
        }
    });

    let mut app = App::new(session, origin);
    info!("editor session started");
    let result = run_app(&mut terminal, &mut app, &dispatcher, event_tx, event_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!("editor session ended");

    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    dispatcher: &Dispatcher,
    event_tx: mpsc::UnboundedSender<TuiEvent>,
    mut event_rx: mpsc::UnboundedReceiver<TuiEvent>,
) -> Result<()> {
    // Spawn input handler
    let input_tx = event_tx;
    tokio::task::spawn_blocking(move || {
        while !input_tx.is_closed() {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let ev = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => TuiEvent::Key(key),
                Ok(Event::Paste(text)) => TuiEvent::Paste(text),
                Ok(Event::Resize(..)) => TuiEvent::Resize,
                _ => continue,
            };
            if input_tx.send(ev).is_err() {
                break; // Channel closed
            }
        }
    });

    loop {
        terminal.draw(|frame| render_ui(frame, app))?;

        while let Ok(tui_event) = event_rx.try_recv() {
            match tui_event {
                TuiEvent::Key(key) => {
                    if handle_key_event(app, key, dispatcher) {
                        return Ok(()); // Quit requested
                    }
                }
                TuiEvent::Paste(text) => app.edit(|e| e.insert_str(&text)),
                TuiEvent::Resize => {}
                TuiEvent::Settled(settlement) => app.settle(settlement),
            }
        }

        // Small delay to prevent busy waiting
        tokio::time::sleep(Duration::from_millis(16)).await; // ~60 FPS
    }
}

/// Handle keyboard events. Returns true when the user asked to quit.
fn handle_key_event(app: &mut App, key: KeyEvent, dispatcher: &Dispatcher) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    if ctrl && key.code == KeyCode::Char('c') {
        return app.handle_ctrl_c();
    }
    app.notice = None;

    if ctrl && key.code == KeyCode::Char('q') {
        return true;
    }

    if app.show_help {
        app.toggle_help();
        return false;
    }

    if app.session.review_open() {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') => app.accept_candidate(),
            KeyCode::Esc | KeyCode::Char('n') => app.dismiss_candidate(),
            KeyCode::Up => app.review_scroll = app.review_scroll.saturating_sub(1),
            KeyCode::Down => app.review_scroll = app.review_scroll.saturating_add(1),
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::F(1) => app.toggle_help(),
        KeyCode::Char('r') if ctrl => dispatcher.dispatch_all(app.run(Trigger::Run)),
        KeyCode::Char('d') if ctrl => dispatcher.dispatch_all(app.run(Trigger::Debug)),
        KeyCode::Char('g') if ctrl => dispatcher.dispatch_all(app.suggest()),
        KeyCode::Char('l') if ctrl => app.reset(),
        KeyCode::Char('n') if ctrl => app.select_tab(app.session.active_tab().next()),
        KeyCode::Char('p') if ctrl => app.select_tab(app.session.active_tab().prev()),
        KeyCode::F(2) => app.select_tab(Tab::Output),
        KeyCode::F(3) => app.select_tab(Tab::Variables),
        KeyCode::F(4) => app.select_tab(Tab::Error),
        KeyCode::Char('1') if alt => app.select_tab(Tab::Output),
        KeyCode::Char('2') if alt => app.select_tab(Tab::Variables),
        KeyCode::Char('3') if alt => app.select_tab(Tab::Error),
        KeyCode::PageUp => app.scroll_result_up(),
        KeyCode::PageDown => app.scroll_result_down(),
        KeyCode::Char(c) if !ctrl && !alt => app.edit(|e| e.insert_char(c)),
        KeyCode::Enter => app.edit(|e| e.newline()),
        KeyCode::Tab => app.edit(|e| e.indent()),
        KeyCode::Backspace => app.edit(|e| e.backspace()),
        KeyCode::Delete => app.edit(|e| e.delete()),
        KeyCode::Left => app.editor.move_left(),
        KeyCode::Right => app.editor.move_right(),
        KeyCode::Up => app.editor.move_up(),
        KeyCode::Down => app.editor.move_down(),
        KeyCode::Home => app.editor.move_home(),
        KeyCode::End => app.editor.move_end(),
        _ => {}
    }
    false
}
