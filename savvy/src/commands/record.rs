use super::{client_failure, ensure_outside_session, run_shell, session_socket, take_over_socket};
use miette::{IntoDiagnostic, Result, WrapErr};
use savvy_core::{FileAttachment, RecordedCommand, SessionConfig, SessionContext};
use savvy_server::{CaptureClient, CaptureServer};
use savvy_shell::{Launcher, detect_with_default};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, info_span, warn};

pub async fn record(
    socket: Option<PathBuf>,
    output: Option<PathBuf>,
    ignore_errors: bool,
) -> Result<ExitCode> {
    ensure_outside_session(SessionContext::Record)?;
    let socket = session_socket(socket, SessionContext::Record)?;

    let kind = detect_with_default()?;
    let launch = Launcher::new(kind, SessionContext::Record, &socket).prepare()?;

    if !take_over_socket(&socket, SessionContext::Record).await? {
        return Ok(ExitCode::SUCCESS);
    }

    let span = info_span!("record", shell = %kind, socket = %socket.display());
    let server = Arc::new(CaptureServer::bind(
        SessionConfig::new(&socket)
            .with_ignore_errors(ignore_errors)
            .with_span(span),
    )?);
    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.listen_and_serve().await }
    });

    info!("Recording a new {kind} session");
    let result = run_shell(&launch, server.shutdown_token()).await;

    server.close();
    match serving.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("capture server stopped: {e}"),
        Err(e) => warn!("capture server task failed: {e}"),
    }
    result?;

    write_recording(&server.commands(), output.as_deref())
}

/// Hand the captured log to whatever turns it into a runbook: a file or stdout.
fn write_recording(commands: &[RecordedCommand], output: Option<&Path>) -> Result<ExitCode> {
    if commands.is_empty() {
        warn!("No commands were recorded");
        return Ok(ExitCode::SUCCESS);
    }

    let json = serde_json::to_string_pretty(commands).into_diagnostic()?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} commands to {}", commands.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}

/// `savvy record file <path>`: validate locally so the user sees the problem,
/// then let the capture server read the file.
pub async fn attach(path: PathBuf, socket: Option<PathBuf>) -> Result<ExitCode> {
    FileAttachment::check(&path)?;
    let path = path
        .canonicalize()
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to resolve {}", path.display()))?;

    let socket = session_socket(socket, SessionContext::Record)?;
    match CaptureClient::new(&socket).send_file(&path).await {
        Ok(()) => {
            info!("Attached {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => client_failure(e),
    }
}
