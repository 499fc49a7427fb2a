use super::client_failure;
use crate::cli::InternalCommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use savvy_core::{Bindings, default_run_socket, extract};
use savvy_server::{ClientError, CurrentStep, ReplayClient};
use savvy_shell::is_tty;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

pub async fn internal(command: InternalCommand, socket: Option<PathBuf>) -> Result<ExitCode> {
    let client = ReplayClient::new(socket.unwrap_or_else(default_run_socket));
    let outcome = match command {
        InternalCommand::Current => current(&client).await,
        InternalCommand::Next { cmd, force } => next(&client, cmd.as_deref(), force).await,
        InternalCommand::Previous { force } => previous(&client, force).await,
        InternalCommand::SetParam => return set_param(&client).await,
        InternalCommand::Shutdown => client.shutdown().await,
    };
    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => client_failure(e),
    }
}

/// Printed without a trailing newline so the shell can put it on the prompt as is.
async fn current(client: &ReplayClient) -> Result<(), ClientError> {
    let step = client.current().await?;
    print!("{}", step.command_with_params);
    Ok(())
}

/// The hook reports every executed command; only the one matching the current
/// step moves the cursor.
fn should_advance(step: &CurrentStep, executed: Option<&str>, force: bool) -> bool {
    force || executed.is_some_and(|cmd| cmd.trim() == step.command_with_params.trim())
}

async fn next(client: &ReplayClient, executed: Option<&str>, force: bool) -> Result<(), ClientError> {
    let step = client.current().await?;
    let step = if should_advance(&step, executed, force) {
        client.next().await?
    } else {
        debug!(?executed, expected = %step.command_with_params, "not advancing");
        step
    };
    println!("{}", step.index);
    Ok(())
}

async fn previous(client: &ReplayClient, force: bool) -> Result<(), ClientError> {
    let step = if force {
        client.previous().await?
    } else {
        client.current().await?
    };
    println!("{}", step.index);
    Ok(())
}

/// Prompt for the placeholders of the current step that are still unbound.
async fn set_param(client: &ReplayClient) -> Result<ExitCode> {
    let step = match client.current().await {
        Ok(step) => step,
        Err(e) => return client_failure(e),
    };
    let unbound = extract(&step.command_with_params);
    if unbound.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    if !is_tty() {
        debug!(?unbound, "no terminal to prompt for parameters");
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(description) = &step.description {
        eprintln!("{}", style(description).dim());
    }
    let mut params = Bindings::new();
    for name in unbound {
        let value = dialoguer::Input::<String>::new()
            .with_prompt(format!("Set {name}"))
            .interact_text()
            .into_diagnostic()?;
        params.insert(name, value);
    }

    match client.set_params(params).await {
        Ok(step) => {
            debug!(command = %step.command_with_params, "parameters bound");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => client_failure(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(command_with_params: &str) -> CurrentStep {
        CurrentStep {
            index: 1,
            total: 3,
            command: "echo <param>".to_string(),
            command_with_params: command_with_params.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_advances_only_on_matching_command() {
        let current = step("echo world");
        assert!(should_advance(&current, Some("echo world"), false));
        assert!(should_advance(&current, Some("echo world  "), false));
        assert!(!should_advance(&current, Some("echo other"), false));
        assert!(!should_advance(&current, None, false));
    }

    #[test]
    fn test_force_always_advances() {
        let current = step("echo <param>");
        assert!(should_advance(&current, Some("ls"), true));
        assert!(should_advance(&current, None, true));
    }

    #[tokio::test]
    async fn test_missing_session_exits_with_failure() {
        let dir = tempfile::tempdir().unwrap();
        let code = internal(InternalCommand::Current, Some(dir.path().join("run.sock")))
            .await
            .unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }
}
