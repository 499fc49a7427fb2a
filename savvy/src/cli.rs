use crate::log::{Level, LogFormat};
use clap::{Parser, Subcommand, crate_version};
use indoc::indoc;
use savvy_core::SOCKET_PATH_ENV;
use savvy_shell::ShellKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "savvy",
    color = clap::ColorChoice::Auto,
    version = crate_version!(),
    about = "Record terminal sessions and replay runbooks step by step"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global_options: GlobalOptions,
}

#[derive(Clone, Debug, Parser)]
pub struct GlobalOptions {
    #[arg(short, long, global = true, help = "Enable additional debug logs.")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Silence all logs"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        help = "Configure the output format of the logs.",
        default_value_t,
        value_enum
    )]
    pub log_format: LogFormat,
}

impl GlobalOptions {
    pub fn level(&self) -> Level {
        if self.quiet {
            Level::Silent
        } else if self.verbose {
            Level::Debug
        } else {
            Level::Info
        }
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    #[command(
        about = "Record the commands you run in a new shell.",
        long_about = indoc! {"
            Record the commands you run in a new shell.

            Every command is sent to savvy as you press enter. Exit the shell
            to stop recording; the captured commands are printed as JSON.
        "}
    )]
    Record {
        #[command(subcommand)]
        command: Option<RecordCommand>,

        #[arg(
            long,
            global = true,
            env = SOCKET_PATH_ENV,
            help = "Socket of the recording session."
        )]
        socket: Option<PathBuf>,

        #[arg(short, long, help = "Write the recorded commands to a file instead of stdout.")]
        output: Option<PathBuf>,

        #[arg(long, help = "Leave out commands that exit with an error.")]
        ignore_errors: bool,
    },

    #[command(about = "Replay a runbook one step at a time in a new shell.")]
    Run {
        #[arg(short, long, help = "Runbook to replay (JSON or YAML).")]
        file: PathBuf,

        #[arg(long, env = SOCKET_PATH_ENV, help = "Socket of the replay session.")]
        socket: Option<PathBuf>,
    },

    #[command(
        about = "Send a command to the recording session.",
        long_about = indoc! {"
            Send a command to the recording session.

            Without --step-id a new step id is printed, for the hook to report
            the exit status with later. With --step-id and no command only the
            exit status is sent.
        "},
        hide = true
    )]
    Send {
        #[arg(long, env = SOCKET_PATH_ENV)]
        socket: Option<PathBuf>,

        #[arg(long, help = "Step the command or exit status belongs to.")]
        step_id: Option<String>,

        #[arg(long, default_value_t = 0)]
        exit_code: i32,

        #[arg(long, help = "Shell prompt shown when the command was entered.")]
        prompt: Option<String>,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    #[command(about = "Commands used by the shell hooks.", hide = true)]
    Internal {
        #[command(subcommand)]
        command: InternalCommand,

        #[arg(long, global = true, env = SOCKET_PATH_ENV)]
        socket: Option<PathBuf>,
    },

    #[command(about = "Print the savvy hook functions for a shell.")]
    Init {
        #[arg(value_parser = parse_shell)]
        shell: ShellKind,
    },

    #[command(about = "Print your most recent shell history, newest first.")]
    History {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum RecordCommand {
    #[command(about = "Attach a file to the running recording.")]
    File { path: PathBuf },
}

#[derive(Subcommand, Clone, Debug)]
pub enum InternalCommand {
    #[command(about = "Print the current step with parameters filled in.")]
    Current,

    #[command(about = "Advance to the next step once the current one has run.")]
    Next {
        #[arg(short, long, help = "The command the user just executed.")]
        cmd: Option<String>,

        #[arg(short, long, help = "Advance regardless of the executed command.")]
        force: bool,
    },

    #[command(about = "Go back one step.")]
    Previous {
        #[arg(short, long, help = "Actually move; without it the index is only printed.")]
        force: bool,
    },

    #[command(about = "Prompt for the parameters of the current step.")]
    SetParam,

    #[command(about = "Stop the replay session.")]
    Shutdown,
}

fn parse_shell(value: &str) -> Result<ShellKind, String> {
    value.parse::<ShellKind>().map_err(|_| {
        let supported: Vec<&str> = ShellKind::SUPPORTED.iter().map(|k| k.as_str()).collect();
        format!("unsupported shell, expected one of: {}", supported.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_send_keeps_hyphenated_words() {
        let cli = parse(&["savvy", "send", "--", "ls", "-la", "--color=auto"]);
        match cli.command {
            Commands::Send { words, .. } => assert_eq!(words, vec!["ls", "-la", "--color=auto"]),
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_send_exit_status_without_words() {
        let cli = parse(&["savvy", "send", "--step-id", "cmd-1", "--exit-code", "127"]);
        match cli.command {
            Commands::Send {
                step_id,
                exit_code,
                words,
                ..
            } => {
                assert_eq!(step_id.as_deref(), Some("cmd-1"));
                assert_eq!(exit_code, 127);
                assert!(words.is_empty());
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_record_ignore_errors() {
        match parse(&["savvy", "record", "--ignore-errors"]).command {
            Commands::Record { ignore_errors, .. } => assert!(ignore_errors),
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn test_internal_next_flags() {
        let cli = parse(&["savvy", "internal", "next", "--cmd", "echo hi", "--force"]);
        match cli.command {
            Commands::Internal {
                command: InternalCommand::Next { cmd, force },
                ..
            } => {
                assert_eq!(cmd.as_deref(), Some("echo hi"));
                assert!(force);
            }
            _ => panic!("expected internal next"),
        }
    }

    #[test]
    fn test_record_file_accepts_socket_after_subcommand() {
        let cli = parse(&["savvy", "record", "file", "notes.txt", "--socket", "/tmp/r.sock"]);
        match cli.command {
            Commands::Record {
                command: Some(RecordCommand::File { path }),
                socket,
                ..
            } => {
                assert_eq!(path, PathBuf::from("notes.txt"));
                assert_eq!(socket, Some(PathBuf::from("/tmp/r.sock")));
            }
            _ => panic!("expected record file"),
        }
    }

    #[test]
    fn test_log_level_flags() {
        let cli = parse(&["savvy", "--quiet", "history"]);
        assert_eq!(cli.global_options.level(), Level::Silent);
        let cli = parse(&["savvy", "history", "-v"]);
        assert_eq!(cli.global_options.level(), Level::Debug);
        assert!(Cli::try_parse_from(["savvy", "-q", "-v", "history"]).is_err());
    }

    #[test]
    fn test_init_rejects_unknown_shell() {
        assert!(Cli::try_parse_from(["savvy", "init", "powershell"]).is_err());
        match parse(&["savvy", "init", "ZSH"]).command {
            Commands::Init { shell } => assert_eq!(shell, ShellKind::Zsh),
            _ => panic!("expected init"),
        }
    }
}
