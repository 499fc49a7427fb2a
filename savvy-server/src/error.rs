use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ServerError {
    #[error("a socket already exists at {0}")]
    #[diagnostic(help("another savvy session may be running; remove the file if it is stale"))]
    AlreadyExists(PathBuf),
    #[error("failed to bind socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("the server is already serving or has been closed")]
    NotListening,
    #[error("aborted by user")]
    Aborted,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error, Diagnostic)]
pub enum ClientError {
    #[error("no savvy session is listening at {0}")]
    #[diagnostic(help("start one with `savvy record` or `savvy run`"))]
    Unavailable(PathBuf),
    #[error("timed out waiting for the savvy session at {0}")]
    Timeout(PathBuf),
    #[error("IO error talking to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("server closed the connection without responding")]
    NoResponse,
    #[error("unexpected response from server: {0}")]
    UnexpectedResponse(String),
    #[error("server error: {0}")]
    Server(String),
}

impl ClientError {
    /// Map socket errors that mean "nobody is listening" to [`ClientError::Unavailable`].
    pub(crate) fn from_io(path: &std::path::Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotFound
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe => ClientError::Unavailable(path.to_path_buf()),
            _ => ClientError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::Unavailable(_))
    }
}
