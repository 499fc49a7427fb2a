use super::{ensure_outside_session, run_shell, session_socket, take_over_socket};
use console::style;
use miette::Result;
use savvy_core::{ReplayConfig, Runbook, SessionContext};
use savvy_server::ReplayServer;
use savvy_shell::{Launcher, detect_with_default};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

pub async fn run(file: PathBuf, socket: Option<PathBuf>) -> Result<ExitCode> {
    ensure_outside_session(SessionContext::Run)?;
    let socket = session_socket(socket, SessionContext::Run)?;

    let runbook = Runbook::load(&file)?;
    let kind = detect_with_default()?;
    let launch = Launcher::new(kind, SessionContext::Run, &socket).prepare()?;

    if !take_over_socket(&socket, SessionContext::Run).await? {
        return Ok(ExitCode::SUCCESS);
    }

    let total = runbook.steps.len();
    let span = info_span!("run", shell = %kind, socket = %socket.display(), steps = total);
    let server = Arc::new(ReplayServer::bind(
        ReplayConfig::new(&socket, runbook.steps).with_span(span),
    )?);
    let serving = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.listen_and_serve().await }
    });

    if runbook.title.is_empty() {
        info!("Running a runbook with {total} steps");
    } else {
        info!("Running {} ({total} steps)", style(&runbook.title).bold());
    }
    let result = run_shell(&launch, server.shutdown_token()).await;

    server.close();
    match serving.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("replay server stopped: {e}"),
        Err(e) => warn!("replay server task failed: {e}"),
    }
    result?;

    let reached = server.state().index() + 1;
    debug!(reached, total, "replay finished");
    Ok(ExitCode::SUCCESS)
}
