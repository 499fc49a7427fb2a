//! Interactive shell session on a PTY.
//!
//! Puts the terminal into raw mode, spawns the shell, copies bytes both ways
//! between the terminal and the PTY, and forwards window size changes until
//! the shell exits or the session is cancelled.

use crate::pty::{Pty, PtyError, terminal_size};
use crate::terminal::RawModeGuard;
use miette::Diagnostic;
use portable_pty::{CommandBuilder, PtySize};
use savvy_core::EXIT_GRACE_PERIOD;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("PTY error: {0}")]
    Pty(#[from] PtyError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Where the session reads keys, writes output and learns about size changes.
///
/// Without `stdin`, the real terminal is used and switched to raw mode.
/// Without `resize`, sizes come from SIGWINCH and the controlling terminal
/// unless the session has a fixed size.
#[derive(Default)]
pub struct SessionIo {
    pub stdin: Option<Box<dyn Read + Send>>,
    pub stdout: Option<Box<dyn Write + Send>>,
    pub resize: Option<mpsc::UnboundedReceiver<PtySize>>,
}

fn apply_size(pty: &Pty, size: PtySize) {
    tracing::trace!(cols = size.cols, rows = size.rows, "terminal resized");
    if let Err(e) = pty.resize(size) {
        tracing::debug!("failed to resize PTY: {}", e);
    }
}

/// Keeps the PTY size in step with the terminal; stops when dropped.
struct ResizeForwarder(JoinHandle<()>);

impl ResizeForwarder {
    fn from_signals(pty: Arc<Pty>) -> io::Result<Self> {
        let mut winch = signal(SignalKind::window_change())?;
        Ok(Self(tokio::spawn(async move {
            while winch.recv().await.is_some() {
                apply_size(&pty, terminal_size());
            }
        })))
    }

    fn from_channel(pty: Arc<Pty>, mut sizes: mpsc::UnboundedReceiver<PtySize>) -> Self {
        Self(tokio::spawn(async move {
            while let Some(size) = sizes.recv().await {
                apply_size(&pty, size);
            }
        }))
    }
}

impl Drop for ResizeForwarder {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct ShellSession {
    size: Option<PtySize>,
    grace_period: Duration,
}

impl Default for ShellSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellSession {
    pub fn new() -> Self {
        Self {
            size: None,
            grace_period: EXIT_GRACE_PERIOD,
        }
    }

    /// Fixed PTY size instead of the controlling terminal's.
    pub fn with_size(mut self, size: PtySize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Run `command` until it exits or `shutdown` is cancelled.
    ///
    /// Returns the shell's exit code, or `None` when it had to be killed.
    pub async fn run(
        self,
        command: CommandBuilder,
        io: SessionIo,
        shutdown: CancellationToken,
    ) -> Result<Option<u32>, SessionError> {
        let SessionIo {
            stdin,
            stdout,
            resize,
        } = io;
        let use_real_terminal = stdin.is_none();
        let stdin_source: Box<dyn Read + Send> = stdin.unwrap_or_else(|| Box::new(io::stdin()));
        let mut stdout: Box<dyn Write + Send> = stdout.unwrap_or_else(|| Box::new(io::stdout()));

        let _raw_mode = if use_real_terminal {
            Some(RawModeGuard::new()?)
        } else {
            None
        };

        let size = self.size.unwrap_or_else(terminal_size);
        let pty = Arc::new(Pty::spawn(command, size)?);
        tracing::debug!(pid = ?pty.pid(), cols = size.cols, rows = size.rows, "shell spawned");

        // Paint once at the right size before any resize signal arrives.
        pty.resize(size)?;
        let _resize = match (resize, self.size) {
            (Some(sizes), _) => Some(ResizeForwarder::from_channel(Arc::clone(&pty), sizes)),
            (None, None) => Some(ResizeForwarder::from_signals(Arc::clone(&pty))?),
            (None, Some(_)) => None,
        };

        let stdin_pty = Arc::clone(&pty);
        std::thread::spawn(move || {
            let mut stdin = stdin_source;
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if stdin_pty.write_all(&buf[..n]).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("session: stdin read error: {}", e);
                        break;
                    }
                }
            }
        });

        let (exit_tx, exit_rx) = oneshot::channel::<()>();
        let reader_pty = Arc::clone(&pty);
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader_pty.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if stdout
                            .write_all(&buf[..n])
                            .and_then(|_| stdout.flush())
                            .is_err()
                        {
                            break;
                        }
                    }
                    // EIO is how Linux reports a closed PTY.
                    Err(e) => {
                        tracing::trace!("session: PTY read ended: {}", e);
                        break;
                    }
                }
            }
            let _ = exit_tx.send(());
        });

        tokio::select! {
            _ = exit_rx => tracing::debug!("shell closed its terminal"),
            _ = shutdown.cancelled() => tracing::debug!("session cancelled"),
        }

        let exit_code = pty.wait_or_kill(self.grace_period).await?;
        tracing::debug!(?exit_code, "shell exited");
        Ok(exit_code)
    }
}
