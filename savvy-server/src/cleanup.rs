//! Taking over a socket path left behind by another session.
//!
//! An existing socket file is either a live session or a crashed one. A live
//! session is asked to shut down. If nobody answers, the file is only removed
//! after the user confirms, since a failed connect cannot rule out a session that is
//! still starting up.

use crate::client::{CaptureClient, ReplayClient};
use crate::error::ServerError;
use savvy_core::SessionContext;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Asks the user whether to remove a socket that did not answer.
pub trait ConfirmTakeover {
    fn confirm(&self, session: SessionContext, path: &Path) -> io::Result<bool>;
}

impl<F> ConfirmTakeover for F
where
    F: Fn(SessionContext, &Path) -> io::Result<bool>,
{
    fn confirm(&self, session: SessionContext, path: &Path) -> io::Result<bool> {
        self(session, path)
    }
}

/// Make `path` free for a new server of kind `session`.
///
/// Returns [`ServerError::Aborted`] when the user declines.
pub async fn prepare_socket(
    path: &Path,
    session: SessionContext,
    confirm: &dyn ConfirmTakeover,
) -> Result<(), ServerError> {
    if path.symlink_metadata().is_err() {
        return Ok(());
    }

    let shutdown = match session {
        SessionContext::Record => CaptureClient::new(path).shutdown().await,
        SessionContext::Run => ReplayClient::new(path).shutdown().await,
    };

    match shutdown {
        Ok(()) => info!("stopped the previous {} session", session.noun()),
        Err(e) => {
            debug!("previous session at {} did not answer: {}", path.display(), e);
            if !confirm.confirm(session, path)? {
                return Err(ServerError::Aborted);
            }
        }
    }

    remove_socket(path)
}

fn remove_socket(path: &Path) -> Result<(), ServerError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
