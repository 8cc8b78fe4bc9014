//! Terminal ownership for the dashboard.
//!
//! The dashboard holds the terminal from [`Tui::enter`] until the [`Tui`]
//! is dropped: raw mode, alternate screen, hidden cursor. Every exit
//! path runs the same [`leave`] sequence, panics included via the hook
//! from [`install_hooks`]. Once entered, only ratatui frames go to stdout;
//! diagnostics go to the log file.

use std::io::{Stdout, stdout};

use color_eyre::eyre::Result;
use crossterm::{
    ExecutableCommand, cursor,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

type Backend = CrosstermBackend<Stdout>;

/// The entered terminal. Dropping it gives the shell its screen back.
pub struct Tui {
    terminal: Terminal<Backend>,
}

impl Tui {
    /// Take over the terminal.
    ///
    /// If any step fails the steps already taken are undone before the
    /// error is returned.
    pub fn enter() -> Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal::enable_raw_mode()?;
        let mut tui = Self { terminal };
        stdout().execute(EnterAlternateScreen)?;
        stdout().execute(cursor::Hide)?;
        tui.terminal.clear()?;
        Ok(tui)
    }

    pub fn draw(&mut self, render: impl FnOnce(&mut ratatui::Frame)) -> Result<()> {
        self.terminal.draw(render)?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        leave();
    }
}

/// Undo [`Tui::enter`]. Each step is attempted regardless of the others,
/// and repeating the sequence is harmless.
fn leave() {
    let _ = stdout().execute(cursor::Show);
    let _ = stdout().execute(LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
}

/// Route panics and `eyre` reports through color-eyre, leaving the
/// terminal first so the report lands on the normal screen.
///
/// Call before [`Tui::enter`].
pub fn install_hooks() -> Result<()> {
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .into_hooks();
    eyre_hook.install()?;

    let panic_hook = panic_hook.into_panic_hook();
    std::panic::set_hook(Box::new(move |info| {
        leave();
        panic_hook(info);
    }));
    Ok(())
}
