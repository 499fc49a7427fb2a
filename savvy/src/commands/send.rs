use super::client_failure;
use miette::Result;
use savvy_core::default_record_socket;
use savvy_server::{CaptureClient, CaptureMessage, new_step_id};
use std::path::PathBuf;
use std::process::ExitCode;

/// What the preexec and precmd hooks report about one command.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub command: String,
    pub step_id: Option<String>,
    pub exit_code: i32,
    pub prompt: Option<String>,
}

impl Report {
    /// The message to send, plus the step id to print when this call created it.
    fn into_message(self) -> Option<(CaptureMessage, Option<String>)> {
        let command = self.command.trim().to_string();
        match (self.step_id, command.is_empty()) {
            (None, true) => None,
            (Some(step_id), true) => Some((
                CaptureMessage::ExitStatus {
                    step_id,
                    exit_code: self.exit_code,
                },
                None,
            )),
            (Some(step_id), false) => Some((
                CaptureMessage::Command {
                    command,
                    step_id: Some(step_id),
                    prompt: self.prompt,
                },
                None,
            )),
            (None, false) => {
                let step_id = new_step_id();
                Some((
                    CaptureMessage::Command {
                        command,
                        step_id: Some(step_id.clone()),
                        prompt: self.prompt,
                    },
                    Some(step_id),
                ))
            }
        }
    }
}

/// Called by the shell hooks: before a command runs to report it, and at the
/// next prompt to report its exit status.
pub async fn send(report: Report, socket: Option<PathBuf>) -> Result<ExitCode> {
    let Some((message, new_step)) = report.into_message() else {
        return Ok(ExitCode::SUCCESS);
    };

    let client = CaptureClient::new(socket.unwrap_or_else(default_record_socket));
    match client.send_message(&message).await {
        Ok(()) => {
            if let Some(step_id) = new_step {
                print!("{step_id}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => client_failure(e),
    }
}
