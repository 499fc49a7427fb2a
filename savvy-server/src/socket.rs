//! Listener lifecycle shared by the capture and replay servers.

use crate::error::ServerError;
use std::future::Future;
use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

/// A bound Unix socket that owns its path on disk.
pub(crate) struct SocketFile {
    path: PathBuf,
    listener: Mutex<Option<StdUnixListener>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl SocketFile {
    /// Bind `path`, refusing to touch an existing file.
    pub(crate) fn bind(path: &Path) -> Result<Self, ServerError> {
        if path.symlink_metadata().is_ok() {
            return Err(ServerError::AlreadyExists(path.to_path_buf()));
        }
        let listener = StdUnixListener::bind(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::AddrInUse => ServerError::AlreadyExists(path.to_path_buf()),
            _ => ServerError::Bind {
                path: path.to_path_buf(),
                source,
            },
        })?;
        listener.set_nonblocking(true)?;
        debug!("bound socket at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            listener: Mutex::new(Some(listener)),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting, release the listener and remove the socket file.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        drop(self.listener.lock().unwrap().take());
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed socket at {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove socket at {}: {}", self.path.display(), e),
        }
    }

    /// Accept connections until closed, running `handle` on its own task per connection.
    pub(crate) async fn serve<F, Fut>(&self, handle: F) -> Result<(), ServerError>
    where
        F: Fn(UnixStream) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = self
            .listener
            .lock()
            .unwrap()
            .take()
            .ok_or(ServerError::NotListening)?;
        let listener = UnixListener::from_std(listener)?;
        tracing::info!("listening on {}", self.path.display());

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        tokio::spawn(handle(stream).in_current_span());
                    }
                    Err(e) if self.is_closed() => {
                        debug!("accept failed after close: {}", e);
                        break;
                    }
                    Err(e) => {
                        warn!("accept error: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        debug!("stopped accepting on {}", self.path.display());
        Ok(())
    }
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        self.close();
    }
}
