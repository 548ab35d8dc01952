//! Interactive terminal explorer.
//!
//! The loop is synchronous: read one input event, apply it to the
//! [`Explorer`], repaint the whole grid. Raw mode swallows SIGINT, so
//! Ctrl-C arrives as a key and quits like `q`.
use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};

use crate::errors::DepTreeError;
use crate::graph::{ModuleGraph, ModuleId};
use crate::query::EntropyWeighting;

pub mod grid;
pub mod layout;
pub mod render;
pub mod state;

pub use grid::{Cell, Grid, Point, ScreenSize, Style};
pub use render::{render_error, wrap_words};
pub use state::{Explorer, InputEvent, Mode, RenderState, SpatialState, Transition, ViewMode};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn terminal_error(e: io::Error) -> DepTreeError {
    DepTreeError::Terminal(e.to_string())
}

/// Raw mode plus alternate screen, restored on drop even when the loop errors.
struct TerminalGuard {
    stdout: Stdout,
}

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, cursor::Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(Self { stdout })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, LeaveAlternateScreen, cursor::Show);
        let _ = disable_raw_mode();
    }
}

/// Map a terminal event to an explorer input, ignoring key releases.
#[must_use]
pub fn translate(event: &Event) -> Option<InputEvent> {
    match event {
        Event::Resize(columns, rows) => Some(InputEvent::Resize { columns: *columns, rows: *rows }),
        Event::Key(KeyEvent { code, modifiers, kind: KeyEventKind::Press, .. }) => {
            if modifiers.contains(KeyModifiers::CONTROL) && *code == KeyCode::Char('c') {
                return Some(InputEvent::Quit);
            }
            match code {
                KeyCode::Char('q') => Some(InputEvent::Quit),
                KeyCode::Up | KeyCode::Char('k') => Some(InputEvent::MoveUp),
                KeyCode::Down | KeyCode::Char('j') => Some(InputEvent::MoveDown),
                KeyCode::Enter => Some(InputEvent::Select),
                KeyCode::Esc | KeyCode::Backspace => Some(InputEvent::Deselect),
                KeyCode::Char(' ') | KeyCode::Right | KeyCode::Char('l') => Some(InputEvent::ToggleExpand),
                KeyCode::Char('e') => Some(InputEvent::ToggleErrors),
                KeyCode::Char('o') => Some(InputEvent::ToggleOverview),
                KeyCode::PageUp => Some(InputEvent::ScrollUp),
                KeyCode::PageDown => Some(InputEvent::ScrollDown),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Options for [`run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExploreOptions {
    pub view: ViewMode,
    pub weighting: EntropyWeighting,
}

/// Run the explorer on the current terminal until the user quits.
///
/// # Errors
/// Returns `DepTreeError::Terminal` when the terminal cannot be set up, read or written.
pub fn run(graph: &ModuleGraph, entry: ModuleId, options: ExploreOptions) -> Result<(), DepTreeError> {
    let (columns, rows) = terminal::size().map_err(terminal_error)?;
    let size = ScreenSize::new(columns, rows);
    let mut explorer = Explorer::new(graph, entry, size).with_view(options.view).with_weighting(options.weighting);
    let mut grid = Grid::new(size);

    let mut guard = TerminalGuard::enter().map_err(terminal_error)?;
    let mut dirty = true;
    tracing::debug!(columns, rows, "explorer started");
    loop {
        if dirty {
            explorer.paint(&mut grid);
            grid.flush(&mut guard.stdout).map_err(terminal_error)?;
            dirty = false;
        }
        if !event::poll(POLL_INTERVAL).map_err(terminal_error)? {
            continue;
        }
        let ev = event::read().map_err(terminal_error)?;
        let Some(input) = translate(&ev) else { continue };
        if explorer.handle(input) == Transition::Quit {
            break;
        }
        dirty = true;
    }
    Ok(())
}
