//! Runbook replay server and its state machine.

use crate::error::ServerError;
use crate::protocol::{CurrentStep, Request, Response, read_message, write_message};
use crate::socket::SocketFile;
use savvy_core::{Bindings, ReplayConfig, ReplayStep, substitute};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

/// Cursor over an immutable step list plus the parameters bound so far.
///
/// The cursor saturates at both ends; bound parameters are never overwritten.
#[derive(Debug, Clone)]
pub struct ReplayState {
    steps: Vec<ReplayStep>,
    index: usize,
    params: Bindings,
}

impl ReplayState {
    pub fn new(steps: Vec<ReplayStep>) -> Self {
        Self {
            steps,
            index: 0,
            params: Bindings::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn params(&self) -> &Bindings {
        &self.params
    }

    pub fn next(&mut self) {
        if self.index + 1 < self.steps.len() {
            self.index += 1;
        }
    }

    pub fn previous(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    /// Bind every key that is not bound yet; existing bindings win.
    pub fn set_params(&mut self, params: Bindings) {
        for (key, value) in params {
            self.params.entry(key).or_insert(value);
        }
    }

    /// The step under the cursor, `None` for an empty runbook.
    pub fn current(&self) -> Option<CurrentStep> {
        let step = self.steps.get(self.index)?;
        Some(CurrentStep {
            index: self.index,
            total: self.steps.len(),
            command: step.command.clone(),
            command_with_params: substitute(&step.command, &self.params),
            description: step.description.clone(),
        })
    }

    fn apply(&mut self, request: Request) -> Response {
        match request {
            Request::Next => self.next(),
            Request::Previous => self.previous(),
            Request::Current => {}
            Request::SetParams(params) => self.set_params(params),
            Request::Shutdown => return Response::Ok,
        }
        match self.current() {
            Some(step) => Response::State(step),
            None => Response::Error {
                message: "runbook has no steps".to_string(),
            },
        }
    }
}

struct Shared {
    socket: SocketFile,
    state: Mutex<ReplayState>,
}

impl Shared {
    async fn handle(self: Arc<Self>, stream: UnixStream) {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let response = match read_message::<_, Request>(&mut reader).await {
            Ok(Some(request)) => {
                debug!(?request, "replay request");
                let shutdown = request == Request::Shutdown;
                let response = self.state.lock().unwrap().apply(request);
                if shutdown {
                    tracing::info!("shutdown requested over replay socket");
                    self.socket.close();
                }
                response
            }
            Ok(None) => return,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Response::Error {
                message: format!("invalid request: {}", e),
            },
            Err(e) => {
                if !self.socket.is_closed() {
                    warn!("failed to read replay request: {}", e);
                }
                return;
            }
        };

        if let Err(e) = write_message(&mut writer, &response).await
            && !self.socket.is_closed()
        {
            warn!("failed to write replay response: {}", e);
        }
    }
}

/// Unix-socket endpoint that walks a runbook one step at a time.
pub struct ReplayServer {
    shared: Arc<Shared>,
    span: tracing::Span,
}

impl ReplayServer {
    pub fn bind(config: ReplayConfig) -> Result<Self, ServerError> {
        let socket = config.span.in_scope(|| SocketFile::bind(&config.socket_path))?;
        Ok(Self {
            shared: Arc::new(Shared {
                socket,
                state: Mutex::new(ReplayState::new(config.steps)),
            }),
            span: config.span,
        })
    }

    pub fn socket_path(&self) -> &Path {
        self.shared.socket.path()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.socket.shutdown_token()
    }

    pub async fn listen_and_serve(&self) -> Result<(), ServerError> {
        let shared = Arc::clone(&self.shared);
        self.shared
            .socket
            .serve(move |stream| Arc::clone(&shared).handle(stream))
            .instrument(self.span.clone())
            .await
    }

    /// Snapshot of the replay state.
    pub fn state(&self) -> ReplayState {
        self.shared.state.lock().unwrap().clone()
    }

    pub fn close(&self) {
        let _guard = self.span.enter();
        self.shared.socket.close();
    }
}
