mod cli;
mod commands;
mod log;

use cli::{Cli, Commands, RecordCommand};
use clap::Parser;
use miette::Result;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    log::init_tracing(cli.global_options.level(), cli.global_options.log_format);

    match cli.command {
        Commands::Record {
            command: Some(RecordCommand::File { path }),
            socket,
            ..
        } => commands::record::attach(path, socket).await,
        Commands::Record {
            command: None,
            socket,
            output,
            ignore_errors,
        } => commands::record::record(socket, output, ignore_errors).await,
        Commands::Run { file, socket } => commands::run::run(file, socket).await,
        Commands::Send {
            socket,
            step_id,
            exit_code,
            prompt,
            words,
        } => {
            let report = commands::send::Report {
                command: words.join(" "),
                step_id,
                exit_code,
                prompt,
            };
            commands::send::send(report, socket).await
        }
        Commands::Internal { command, socket } => {
            commands::internal::internal(command, socket).await
        }
        Commands::Init { shell } => {
            commands::init::init(shell)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::History { limit } => {
            commands::history::history(limit)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
