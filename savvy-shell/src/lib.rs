//! Shell integration for savvy.
//!
//! Detects the user's shell, generates startup scripts that report every
//! executed command over a Unix socket, and runs the hooked shell on a PTY.

pub mod detect;
pub mod dialect;
pub mod history;
mod kind;
mod launcher;
mod pty;
mod session;
mod terminal;

pub use detect::{DetectError, ProcessTable, PsProcessTable, detect, detect_with_default};
pub use dialect::{Dialect, StartupLayout, dialect_for};
pub use history::{HistoryError, tail_history};
pub use kind::ShellKind;
pub use launcher::{Launch, LaunchError, Launcher};
pub use pty::{Pty, PtyError, terminal_size};
pub use session::{SessionError, SessionIo, ShellSession};
pub use terminal::{RawModeGuard, is_tty};

pub use portable_pty::{CommandBuilder, PtySize};
