//! Wire formats for the two session sockets.
//!
//! Capture: the client writes one message and closes its write half; the
//! server reads to EOF and sends nothing back. A plain command is sent as its
//! UTF-8 text. Anything else is a directive: a NUL byte followed by a JSON
//! [`CaptureMessage`]. Command text reaches the hook through argv, so it can
//! never start with NUL and never be mistaken for a directive.
//!
//! Replay: newline-delimited JSON, one [`Request`] and one [`Response`] per
//! connection.

use savvy_core::Bindings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

const DIRECTIVE_MARKER: char = '\0';

/// Identifier tying a command to the exit status reported after it ran.
pub fn new_step_id() -> String {
    format!("cmd-{}", Uuid::new_v4().simple())
}

/// One message on the capture socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureMessage {
    Command {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },
    /// How the command recorded under `step_id` ended.
    ExitStatus { step_id: String, exit_code: i32 },
    /// Attach the file at this absolute path.
    File { path: PathBuf },
    Shutdown,
}

impl CaptureMessage {
    pub fn command(command: impl Into<String>) -> Self {
        CaptureMessage::Command {
            command: command.into(),
            step_id: None,
            prompt: None,
        }
    }

    pub fn decode(text: &str) -> io::Result<Self> {
        match text.strip_prefix(DIRECTIVE_MARKER) {
            Some(json) => serde_json::from_str(json.trim_end())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            None => Ok(CaptureMessage::command(text)),
        }
    }

    pub fn encode(&self) -> io::Result<String> {
        match self {
            CaptureMessage::Command {
                command,
                step_id: None,
                prompt: None,
            } => Ok(format!("{command}\n")),
            directive => {
                let json = serde_json::to_string(directive).map_err(io::Error::other)?;
                Ok(format!("{DIRECTIVE_MARKER}{json}\n"))
            }
        }
    }
}

/// Request sent to the replay server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum Request {
    Next,
    Previous,
    Current,
    SetParams(Bindings),
    Shutdown,
}

/// The step under the replay cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentStep {
    pub index: usize,
    pub total: usize,
    pub command: String,
    pub command_with_params: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response sent by the replay server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    State(CurrentStep),
    Ok,
    Error { message: String },
}

/// Write `message` as one JSON line.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_vec(message).map_err(io::Error::other)?;
    json.push(b'\n');
    writer.write_all(&json).await?;
    writer.flush().await
}

/// Read one JSON line. `Ok(None)` means the peer closed without sending anything.
pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    serde_json::from_str(&line)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
