//! Clients used by the short-lived hook invocations.
//!
//! Every call opens one connection, performs one exchange and closes it.

use crate::error::ClientError;
use crate::protocol::{CaptureMessage, CurrentStep, Request, Response, read_message, write_message};
use savvy_core::Bindings;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn with_timeout<T>(
    path: &Path,
    fut: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    tokio::time::timeout(REQUEST_TIMEOUT, fut)
        .await
        .map_err(|_| ClientError::Timeout(path.to_path_buf()))?
}

#[derive(Debug, Clone)]
pub struct CaptureClient {
    socket_path: PathBuf,
}

impl CaptureClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    async fn deliver(&self, message: &CaptureMessage, wait_for_close: bool) -> Result<(), ClientError> {
        let path = &self.socket_path;
        with_timeout(path, async {
            let wire = message.encode().map_err(|e| ClientError::from_io(path, e))?;
            let mut stream = UnixStream::connect(path)
                .await
                .map_err(|e| ClientError::from_io(path, e))?;
            stream
                .write_all(wire.as_bytes())
                .await
                .map_err(|e| ClientError::from_io(path, e))?;
            stream
                .shutdown()
                .await
                .map_err(|e| ClientError::from_io(path, e))?;

            if wait_for_close {
                let mut rest = Vec::new();
                // A reset here still means the server is gone.
                let _ = stream.read_to_end(&mut rest).await;
            }
            Ok(())
        })
        .await
    }

    /// Deliver any capture message. No acknowledgement is expected.
    pub async fn send_message(&self, message: &CaptureMessage) -> Result<(), ClientError> {
        self.deliver(message, false).await
    }

    /// Report one executed command. No acknowledgement is expected.
    pub async fn send(&self, command: &str) -> Result<(), ClientError> {
        self.deliver(&CaptureMessage::command(command), false).await
    }

    /// Report a command under `step_id`, so its exit status can follow.
    pub async fn send_step(
        &self,
        step_id: &str,
        command: &str,
        prompt: Option<&str>,
    ) -> Result<(), ClientError> {
        let message = CaptureMessage::Command {
            command: command.to_string(),
            step_id: Some(step_id.to_string()),
            prompt: prompt.map(str::to_string),
        };
        self.deliver(&message, false).await
    }

    pub async fn send_exit_status(&self, step_id: &str, exit_code: i32) -> Result<(), ClientError> {
        let message = CaptureMessage::ExitStatus {
            step_id: step_id.to_string(),
            exit_code,
        };
        self.deliver(&message, false).await
    }

    /// Ask the server to attach the file at `path` (made absolute by the caller).
    pub async fn send_file(&self, path: &Path) -> Result<(), ClientError> {
        let message = CaptureMessage::File {
            path: path.to_path_buf(),
        };
        self.deliver(&message, false).await
    }

    /// Stop the server and wait until it has let go of the connection.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.deliver(&CaptureMessage::Shutdown, true).await
    }
}

#[derive(Debug, Clone)]
pub struct ReplayClient {
    socket_path: PathBuf,
}

impl ReplayClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub async fn request(&self, request: &Request) -> Result<Response, ClientError> {
        let path = &self.socket_path;
        with_timeout(path, async {
            let stream = UnixStream::connect(path)
                .await
                .map_err(|e| ClientError::from_io(path, e))?;
            let (reader, mut writer) = stream.into_split();

            write_message(&mut writer, request)
                .await
                .map_err(|e| ClientError::from_io(path, e))?;

            let mut reader = BufReader::new(reader);
            read_message::<_, Response>(&mut reader)
                .await
                .map_err(|e| ClientError::from_io(path, e))?
                .ok_or(ClientError::NoResponse)
        })
        .await
    }

    async fn step(&self, request: Request) -> Result<CurrentStep, ClientError> {
        match self.request(&request).await? {
            Response::State(step) => Ok(step),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    pub async fn current(&self) -> Result<CurrentStep, ClientError> {
        self.step(Request::Current).await
    }

    pub async fn next(&self) -> Result<CurrentStep, ClientError> {
        self.step(Request::Next).await
    }

    pub async fn previous(&self) -> Result<CurrentStep, ClientError> {
        self.step(Request::Previous).await
    }

    pub async fn set_params(&self, params: Bindings) -> Result<CurrentStep, ClientError> {
        self.step(Request::SetParams(params)).await
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.request(&Request::Shutdown).await? {
            Response::Ok => Ok(()),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::UnexpectedResponse(format!("{other:?}"))),
        }
    }
}
