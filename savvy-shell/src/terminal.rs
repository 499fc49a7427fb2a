use std::io::{self, IsTerminal};

pub fn is_tty() -> bool {
    io::stdin().is_terminal()
}

/// Puts the controlling terminal into raw mode until dropped.
///
/// Dropping restores cooked mode on every exit path, including unwinding.
/// When stdin is not a terminal (CI, tests, piped input) the guard does nothing.
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn new() -> io::Result<Self> {
        if !is_tty() || crossterm::terminal::is_raw_mode_enabled()? {
            return Ok(Self { active: false });
        }
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self { active: true })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active
            && let Err(e) = crossterm::terminal::disable_raw_mode()
        {
            tracing::warn!("failed to restore terminal mode: {}", e);
        }
    }
}
