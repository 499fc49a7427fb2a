//! Find the interactive shell that launched the current process.
//!
//! Walks up the process tree from our parent, asking the process table for
//! each ancestor's command line, until an entry names a known shell. Non-shell
//! ancestors such as `tmux`, `node` or an editor are skipped.

use crate::kind::ShellKind;
use miette::Diagnostic;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DetectError {
    #[error("failed to query the process table for pid {pid}: {source}")]
    Query {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected process table entry for pid {pid}: {line:?}")]
    Parse { pid: u32, line: String },
    #[error("no supported shell found among the ancestors of pid {0}")]
    NotFound(u32),
    #[error("could not determine which shell you are using")]
    #[diagnostic(help("savvy supports bash, zsh, dash and fish; set SHELL to one of them"))]
    Unsupported,
}

/// Read-only view of the OS process table.
pub trait ProcessTable {
    /// Full command line of `pid`.
    fn command_line(&self, pid: u32) -> Result<String, DetectError>;

    /// Parent of `pid`.
    fn parent_pid(&self, pid: u32) -> Result<u32, DetectError>;
}

/// Process table backed by `ps`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PsProcessTable;

impl PsProcessTable {
    fn query(&self, pid: u32, field: &str) -> Result<String, DetectError> {
        let output = Command::new("ps")
            .args(["-o", field, "-p", &pid.to_string()])
            .output()
            .map_err(|source| DetectError::Query { pid, source })?;

        if !output.status.success() {
            return Err(DetectError::Query {
                pid,
                source: std::io::Error::other(format!("ps exited with {}", output.status)),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ProcessTable for PsProcessTable {
    fn command_line(&self, pid: u32) -> Result<String, DetectError> {
        self.query(pid, "args=")
    }

    fn parent_pid(&self, pid: u32) -> Result<u32, DetectError> {
        let line = self.query(pid, "ppid=")?;
        line.parse()
            .map_err(|_| DetectError::Parse { pid, line })
    }
}

/// Bare executable name from a command line.
///
/// `"/bin/zsh -il"` and `"-zsh"` both give `zsh`; version-like suffixes are
/// trimmed so `python3.12` gives `python`.
pub fn parse_command(line: &str) -> Option<&str> {
    let first = line.split_whitespace().next()?;
    let base = first.rsplit('/').next().unwrap_or(first);
    let name = base
        .trim_start_matches('-')
        .trim_matches(|c: char| c.is_ascii_digit() || c == '.');
    (!name.is_empty()).then_some(name)
}

/// Walk the ancestry of `start_pid` (inclusive) until a known shell is found.
pub fn detect_with(table: &dyn ProcessTable, start_pid: u32) -> Result<ShellKind, DetectError> {
    let mut pid = start_pid;
    while pid > 1 {
        let line = table.command_line(pid)?;
        let name = parse_command(&line).ok_or_else(|| DetectError::Parse {
            pid,
            line: line.clone(),
        })?;

        let kind = ShellKind::from_process_name(name);
        if kind.is_known() {
            tracing::debug!(pid, %kind, "detected shell");
            return Ok(kind);
        }

        tracing::trace!(pid, name, "skipping non-shell ancestor");
        pid = table.parent_pid(pid)?;
    }
    Err(DetectError::NotFound(start_pid))
}

/// Detect the shell that (transitively) launched this process.
pub fn detect() -> Result<ShellKind, DetectError> {
    detect_with(&PsProcessTable, std::os::unix::process::parent_id())
}

/// Like [`detect`], falling back to `$SHELL` when the process tree has no answer.
pub fn detect_with_default() -> Result<ShellKind, DetectError> {
    fall_back_to_env(detect(), std::env::var("SHELL").ok().as_deref())
}

fn fall_back_to_env(
    detected: Result<ShellKind, DetectError>,
    shell: Option<&str>,
) -> Result<ShellKind, DetectError> {
    detected.or_else(|err| {
        let kind = shell_from_env(shell)?;
        tracing::warn!("Could not detect your shell: {err}. Defaulting to {kind}");
        Ok(kind)
    })
}

fn shell_from_env(shell: Option<&str>) -> Result<ShellKind, DetectError> {
    shell
        .and_then(parse_command)
        .map(ShellKind::from_process_name)
        .filter(ShellKind::is_known)
        .ok_or(DetectError::Unsupported)
}
