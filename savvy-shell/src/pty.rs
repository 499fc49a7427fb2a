//! Pseudo-terminal wrapper around `portable-pty`.

use miette::Diagnostic;
use portable_pty::{CommandBuilder, ExitStatus, PtySize, native_pty_system};
use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

const DEFAULT_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 80,
    pixel_width: 0,
    pixel_height: 0,
};

#[derive(Debug, Error, Diagnostic)]
pub enum PtyError {
    #[error("failed to open a pseudo-terminal: {0}")]
    Open(String),
    #[error("failed to spawn shell: {0}")]
    Spawn(String),
    #[error("failed to attach to the pseudo-terminal: {0}")]
    Attach(String),
    #[error("failed to resize the pseudo-terminal: {0}")]
    Resize(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A child process running on the slave side of a PTY.
///
/// The reader and writer sit behind separate locks so a blocking read never
/// holds up input.
pub struct Pty {
    master: Mutex<Box<dyn portable_pty::MasterPty + Send>>,
    child: Mutex<Box<dyn portable_pty::Child + Send + Sync>>,
    reader: Mutex<Box<dyn Read + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Pty {
    pub fn spawn(cmd: CommandBuilder, size: PtySize) -> Result<Self, PtyError> {
        let pair = native_pty_system()
            .openpty(size)
            .map_err(|e| PtyError::Open(e.to_string()))?;

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        // The slave end is dropped here so reads see EOF once the child exits.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Attach(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Attach(e.to_string()))?;

        Ok(Self {
            master: Mutex::new(pair.master),
            child: Mutex::new(child),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        })
    }

    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.lock().unwrap().read(buf)
    }

    pub fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(data)?;
        writer.flush()
    }

    pub fn resize(&self, size: PtySize) -> Result<(), PtyError> {
        self.master
            .lock()
            .unwrap()
            .resize(size)
            .map_err(|e| PtyError::Resize(e.to_string()))
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.lock().unwrap().process_id()
    }

    pub fn try_wait(&self) -> Result<Option<ExitStatus>, PtyError> {
        Ok(self.child.lock().unwrap().try_wait()?)
    }

    pub fn kill(&self) -> Result<(), PtyError> {
        Ok(self.child.lock().unwrap().kill()?)
    }

    /// Wait up to `grace` for the child to exit, then kill it.
    ///
    /// Returns the exit code when the child exited on its own.
    pub async fn wait_or_kill(&self, grace: Duration) -> Result<Option<u32>, PtyError> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status.exit_code()));
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        tracing::debug!(pid = ?self.pid(), "shell did not exit within {:?}, killing", grace);
        if let Err(e) = self.kill() {
            tracing::warn!("failed to kill shell: {}", e);
        }
        Ok(None)
    }
}

/// Current size of the controlling terminal, or 80x24 when there is none.
pub fn terminal_size() -> PtySize {
    match crossterm::terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        },
        _ => DEFAULT_SIZE,
    }
}
