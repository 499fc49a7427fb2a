//! Command capture server.
//!
//! Each connection carries one command from the shell's pre-execution hook.
//! Commands are appended to the log in the order their connections finish.

use crate::error::ServerError;
use crate::protocol::CaptureMessage;
use crate::socket::SocketFile;
use regex::Regex;
use savvy_core::{FileAttachment, RecordedCommand, SessionConfig};
use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex};
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

/// Prefix of the command that attaches a file; the attachment itself arrives
/// as a separate directive.
const RECORD_FILE_COMMAND: &str = "savvy record file";

static GREP_EXPANSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"grep --color=auto --exclude-dir=\{[\w,.]+\}").expect("grep regex is valid")
});

/// Clean up a captured line. `None` when there is nothing worth recording.
pub fn normalize_command(raw: &str) -> Option<String> {
    let command = raw.trim();
    if command.is_empty() || command.starts_with(RECORD_FILE_COMMAND) {
        return None;
    }
    Some(GREP_EXPANSION.replace_all(command, "grep").into_owned())
}

struct Entry {
    step_id: Option<String>,
    command: RecordedCommand,
}

struct Shared {
    socket: SocketFile,
    ignore_errors: bool,
    log: Mutex<Vec<Entry>>,
}

impl Shared {
    async fn handle(self: Arc<Self>, mut stream: UnixStream) {
        let mut buf = Vec::new();
        if let Err(e) = stream.read_to_end(&mut buf).await {
            if self.socket.is_closed() {
                debug!("connection error after close: {}", e);
            } else {
                warn!("failed to read command: {}", e);
            }
            return;
        }

        let text = match String::from_utf8(buf) {
            Ok(text) => text,
            Err(e) => {
                warn!("dropping command that is not valid UTF-8: {}", e);
                return;
            }
        };

        let message = match CaptureMessage::decode(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping malformed capture message: {}", e);
                return;
            }
        };

        match message {
            CaptureMessage::Command {
                command,
                step_id,
                prompt,
            } => self.record(&command, step_id, prompt),
            CaptureMessage::ExitStatus { step_id, exit_code } => {
                self.update_exit_status(&step_id, exit_code)
            }
            CaptureMessage::File { path } => self.attach(&path),
            CaptureMessage::Shutdown => {
                tracing::info!("shutdown requested over capture socket");
                self.socket.close();
            }
        }
    }

    fn record(&self, raw: &str, step_id: Option<String>, prompt: Option<String>) {
        let Some(text) = normalize_command(raw) else {
            return;
        };

        let mut log = self.log.lock().unwrap();
        if step_id.is_some() && log.iter().any(|entry| entry.step_id == step_id) {
            debug!(?step_id, "ignoring repeated step");
            return;
        }
        debug!(command = %text, "captured command");
        let mut command = RecordedCommand::new(text);
        command.prompt = prompt.filter(|p| !p.is_empty());
        log.push(Entry { step_id, command });
    }

    fn update_exit_status(&self, step_id: &str, exit_code: i32) {
        let mut log = self.log.lock().unwrap();
        match log
            .iter_mut()
            .find(|entry| entry.step_id.as_deref() == Some(step_id))
        {
            Some(entry) => {
                if exit_code != 0 {
                    debug!(command = %entry.command.command, exit_code, "command failed");
                }
                entry.command.exit_code = exit_code;
            }
            None => debug!(step_id, exit_code, "exit status for an unrecorded step"),
        }
    }

    fn attach(&self, path: &Path) {
        match FileAttachment::read(path) {
            Ok(file) => {
                let command = format!("{} {}", RECORD_FILE_COMMAND, path.display());
                debug!(%command, bytes = file.content.len(), "captured file");
                self.log.lock().unwrap().push(Entry {
                    step_id: None,
                    command: RecordedCommand::with_file(command, file),
                });
            }
            Err(e) => warn!("not attaching {}: {}", path.display(), e),
        }
    }
}

/// Unix-socket endpoint that records the commands of one session.
pub struct CaptureServer {
    shared: Arc<Shared>,
    span: tracing::Span,
}

impl CaptureServer {
    /// Bind the configured socket. Fails if a file already exists there.
    pub fn bind(config: SessionConfig) -> Result<Self, ServerError> {
        let socket = config.span.in_scope(|| SocketFile::bind(&config.socket_path))?;
        Ok(Self {
            shared: Arc::new(Shared {
                socket,
                ignore_errors: config.ignore_errors,
                log: Mutex::new(Vec::new()),
            }),
            span: config.span,
        })
    }

    pub fn socket_path(&self) -> &Path {
        self.shared.socket.path()
    }

    /// Cancelled once the server closes, by [`close`](Self::close) or a shutdown directive.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.socket.shutdown_token()
    }

    /// Serve until closed. A failing connection never stops the loop.
    pub async fn listen_and_serve(&self) -> Result<(), ServerError> {
        let shared = Arc::clone(&self.shared);
        self.shared
            .socket
            .serve(move |stream| Arc::clone(&shared).handle(stream))
            .instrument(self.span.clone())
            .await
    }

    /// Snapshot of the commands captured so far, without failed ones when
    /// the session ignores errors.
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.shared
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| !(self.shared.ignore_errors && entry.command.failed()))
            .map(|entry| entry.command.clone())
            .collect()
    }

    /// Stop the server and remove its socket. Safe to call more than once.
    pub fn close(&self) {
        let _guard = self.span.enter();
        self.shared.socket.close();
    }
}
