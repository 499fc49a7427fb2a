pub mod history;
pub mod init;
pub mod internal;
pub mod record;
pub mod run;
pub mod send;

use miette::{IntoDiagnostic, Result, WrapErr, bail};
use savvy_core::{CONTEXT_ENV, SessionContext, resolve_socket};
use savvy_server::{ClientError, ServerError, prepare_socket};
use savvy_shell::{Launch, SessionIo, ShellSession, is_tty};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sessions do not nest: the hooks of the inner shell would report to the
/// outer session.
fn ensure_outside_session(session: SessionContext) -> Result<()> {
    if let Some(current) = SessionContext::from_env() {
        bail!(
            "cannot start a {} session inside a {} session ({CONTEXT_ENV}={current}); exit this shell first",
            session.noun(),
            current.noun(),
        );
    }
    Ok(())
}

/// The socket path handed to the shell. Hooks run from whatever directory
/// the user is in, so it must be absolute.
fn session_socket(requested: Option<PathBuf>, session: SessionContext) -> Result<PathBuf> {
    resolve_socket(requested, session)
        .into_diagnostic()
        .wrap_err("Failed to resolve the session socket path")
}

fn confirm_takeover(session: SessionContext, path: &Path) -> io::Result<bool> {
    if !is_tty() {
        warn!(
            "{} is in use and there is no terminal to confirm removing it",
            path.display()
        );
        return Ok(false);
    }

    let choice = dialoguer::Select::new()
        .with_prompt(format!("Multiple {} sessions detected", session.noun()))
        .items(&["Continue here and kill other sessions", "Quit this session"])
        .default(0)
        .interact()
        .map_err(io::Error::other)?;
    Ok(choice == 0)
}

/// Free the socket path for a new session. Returns false when the user
/// chose to quit.
async fn take_over_socket(path: &Path, session: SessionContext) -> Result<bool> {
    match prepare_socket(path, session, &confirm_takeover).await {
        Ok(()) => Ok(true),
        Err(ServerError::Aborted) => {
            info!("Aborted by user");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Cancel the session when savvy itself is asked to stop.
fn cancel_on_termination(token: CancellationToken) -> io::Result<JoinHandle<()>> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = terminate.recv() => info!("Received SIGTERM, stopping the session"),
            _ = hangup.recv() => debug!("terminal hung up"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    }))
}

/// Run the prepared shell on the user's terminal until it exits or
/// `shutdown` fires.
async fn run_shell(launch: &Launch, shutdown: CancellationToken) -> Result<()> {
    let signals = cancel_on_termination(shutdown.clone()).into_diagnostic()?;

    let status = ShellSession::new()
        .with_grace_period(launch.grace_period())
        .run(launch.command(), SessionIo::default(), shutdown)
        .await;
    signals.abort();

    match status? {
        Some(code) => debug!(code, shell = %launch.kind(), "shell exited"),
        None => debug!(shell = %launch.kind(), "shell was stopped"),
    }
    Ok(())
}

/// Hooks run on every prompt. A missing session is reported in one line
/// instead of a full diagnostic.
fn client_failure(err: ClientError) -> Result<ExitCode> {
    if err.is_unavailable() {
        eprintln!("savvy: {err}");
        return Ok(ExitCode::FAILURE);
    }
    Err(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use savvy_core::SOCKET_PATH_ENV;
    use savvy_shell::{Launcher, ShellKind};

    #[test]
    fn test_relative_socket_survives_cd() {
        let socket = session_socket(Some(PathBuf::from("rec.sock")), SessionContext::Record).unwrap();
        assert!(socket.is_absolute());
        assert_eq!(socket, std::env::current_dir().unwrap().join("rec.sock"));
    }

    #[test]
    fn test_launcher_exports_absolute_socket() {
        let socket = session_socket(Some(PathBuf::from("run.sock")), SessionContext::Run).unwrap();
        let launch = Launcher::new(ShellKind::Bash, SessionContext::Run, &socket)
            .with_shell_path("/bin/sh")
            .with_savvy_bin("/usr/local/bin/savvy")
            .prepare()
            .unwrap();

        let exported = launch.command().get_env(SOCKET_PATH_ENV).map(PathBuf::from);
        assert_eq!(exported, Some(socket.clone()));
        let script = std::fs::read_to_string(launch.startup_path()).unwrap();
        assert!(script.contains(&*socket.to_string_lossy()), "{script}");
    }
}
