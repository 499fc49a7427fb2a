use crate::runbook::ReplayStep;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Marks a shell as running inside a recording or replay session.
pub const CONTEXT_ENV: &str = "SAVVY_CONTEXT";

/// Socket path override read by hook invocations.
pub const SOCKET_PATH_ENV: &str = "SAVVY_SOCKET_PATH";

/// Absolute path of the savvy binary, exported so hooks call the same executable.
pub const SAVVY_BIN_ENV: &str = "SAVVY_BIN";

/// How long to wait for the shell to exit once its PTY closes before killing it.
pub const EXIT_GRACE_PERIOD: Duration = Duration::from_millis(500);

const RECORD_SOCKET_NAME: &str = "savvy-record.sock";
const RUN_SOCKET_NAME: &str = "savvy-run.sock";

/// Which kind of session a spawned shell belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionContext {
    Record,
    Run,
}

impl SessionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionContext::Record => "record",
            SessionContext::Run => "run",
        }
    }

    /// Human readable name used in prompts ("Multiple recording sessions detected").
    pub fn noun(&self) -> &'static str {
        match self {
            SessionContext::Record => "recording",
            SessionContext::Run => "run",
        }
    }

    /// Read the session marker from the current process environment.
    pub fn from_env() -> Option<Self> {
        std::env::var(CONTEXT_ENV).ok()?.parse().ok()
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "record" => Ok(SessionContext::Record),
            "run" => Ok(SessionContext::Run),
            _ => Err(format!("Unknown session context: {}", s)),
        }
    }
}

fn runtime_dir() -> PathBuf {
    xdg::BaseDirectories::new()
        .get_runtime_directory()
        .ok()
        .cloned()
        .unwrap_or_else(std::env::temp_dir)
}

/// Default socket for the command capture server.
pub fn default_record_socket() -> PathBuf {
    runtime_dir().join(RECORD_SOCKET_NAME)
}

/// Default socket for the runbook replay server.
pub fn default_run_socket() -> PathBuf {
    runtime_dir().join(RUN_SOCKET_NAME)
}

/// Socket for a session: `requested` or the default for `session`, made
/// absolute so hooks still find it after the shell changes directory.
pub fn resolve_socket(requested: Option<PathBuf>, session: SessionContext) -> io::Result<PathBuf> {
    let path = requested.unwrap_or_else(|| match session {
        SessionContext::Record => default_record_socket(),
        SessionContext::Run => default_run_socket(),
    });
    std::path::absolute(path)
}

/// Configuration for a command capture session.
///
/// Owned by the caller and handed to the server; the span replaces a
/// process-wide logger so every log line carries the session's context.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub socket_path: PathBuf,
    /// Leave commands that exited with a non-zero status out of the log.
    pub ignore_errors: bool,
    pub span: tracing::Span,
}

impl SessionConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        let socket_path = socket_path.into();
        let span = tracing::info_span!("capture", socket = %socket_path.display());
        Self {
            socket_path,
            ignore_errors: false,
            span,
        }
    }

    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(default_record_socket())
    }
}

/// Configuration for a runbook replay session.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub socket_path: PathBuf,
    pub steps: Vec<ReplayStep>,
    pub span: tracing::Span,
}

impl ReplayConfig {
    pub fn new(socket_path: impl Into<PathBuf>, steps: Vec<ReplayStep>) -> Self {
        let socket_path = socket_path.into();
        let span = tracing::info_span!("replay", socket = %socket_path.display(), steps = steps.len());
        Self {
            socket_path,
            steps,
            span,
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }
}
