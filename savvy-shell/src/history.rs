//! Recent commands from the user's shell history file.

use crate::kind::ShellKind;
use miette::Diagnostic;
use regex::Regex;
use savvy_core::{TailError, tail};
use std::io::Read;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

static BASH_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\d{10}$").expect("timestamp regex is valid"));

static ZSH_EXTENDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^: \d+:\d+;").expect("extended history regex is valid"));

#[derive(Debug, Error, Diagnostic)]
pub enum HistoryError {
    #[error("shell history is not available for {0}")]
    Unsupported(ShellKind),
    #[error("could not locate the {0} history file")]
    #[diagnostic(help("set HISTFILE to the location of your history file"))]
    NoHistoryFile(ShellKind),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tail(#[from] TailError),
    #[error("failed to read history: {0}")]
    Io(#[from] std::io::Error),
}

/// Shell variables such as `HISTFILE` and `ZDOTDIR`, when exported.
fn shell_var(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Location of the history file for `kind`.
pub fn history_file(kind: ShellKind) -> Option<PathBuf> {
    match kind {
        ShellKind::Bash | ShellKind::Dash => {
            shell_var("HISTFILE").or_else(|| dirs::home_dir().map(|h| h.join(".bash_history")))
        }
        ShellKind::Zsh => shell_var("HISTFILE").or_else(|| {
            shell_var("ZDOTDIR")
                .or_else(dirs::home_dir)
                .map(|d| d.join(".zsh_history"))
        }),
        ShellKind::Fish => xdg::BaseDirectories::with_prefix("fish")
            .get_data_home()
            .map(|d| d.join("fish_history")),
        ShellKind::Unknown => None,
    }
}

/// Lines to read from the end of the file for `kind`.
fn window(kind: ShellKind) -> usize {
    match kind {
        // zsh may spread a command over several continuation lines, but most
        // entries are one line each.
        ShellKind::Zsh => 100,
        // bash stores a timestamp line before every command; fish a `when:` line.
        _ => 200,
    }
}

/// Most recent commands for `kind`, newest first, at most `limit` of them.
pub fn tail_history(kind: ShellKind, limit: usize) -> Result<Vec<String>, HistoryError> {
    if !kind.is_known() {
        return Err(HistoryError::Unsupported(kind));
    }
    let path = history_file(kind).ok_or(HistoryError::NoHistoryFile(kind))?;
    tracing::debug!(path = %path.display(), %kind, "reading shell history");

    let mut bytes = Vec::new();
    tail(&path, window(kind))?.read_to_end(&mut bytes)?;
    // zsh metafies non-ASCII bytes; treat anything undecodable as lossy text.
    let text = String::from_utf8_lossy(&bytes);

    let mut commands = parse(kind, &text);
    commands.reverse();
    commands.truncate(limit);
    Ok(commands)
}

/// Commands in file order.
fn parse(kind: ShellKind, text: &str) -> Vec<String> {
    match kind {
        ShellKind::Zsh => parse_zsh(text),
        ShellKind::Fish => parse_fish(text),
        _ => parse_bash(text),
    }
}

fn parse_bash(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.is_empty() && !BASH_TIMESTAMP.is_match(line))
        .map(str::to_string)
        .collect()
}

fn parse_zsh(text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut pending = String::new();

    for line in text.lines() {
        if let Some(head) = line.strip_suffix('\\') {
            pending.push_str(head);
            pending.push('\n');
            continue;
        }
        pending.push_str(line);
        let entry = std::mem::take(&mut pending);
        let command = ZSH_EXTENDED.replace(&entry, "");
        if !command.trim().is_empty() {
            commands.push(command.into_owned());
        }
    }
    commands
}

fn parse_fish(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("- cmd: "))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_bash_skips_timestamps() {
        let text = "#1616420000\nls -la\n#1616420001\ngit status\n\n";
        assert_eq!(parse_bash(text), vec!["ls -la", "git status"]);
    }

    #[test]
    fn test_parse_bash_keeps_comment_like_commands() {
        assert_eq!(parse_bash("#123\necho hi\n"), vec!["#123", "echo hi"]);
    }

    #[test]
    fn test_parse_zsh_extended_and_continuations() {
        let text = ": 1700000000:0;ls\n: 1700000001:0;echo one \\\ntwo\nplain\n";
        assert_eq!(parse_zsh(text), vec!["ls", "echo one \ntwo", "plain"]);
    }

    #[test]
    fn test_parse_fish_entries() {
        let text = "- cmd: ls\n  when: 1700000000\n- cmd: cd /tmp\n  when: 1700000001\n  paths:\n    - /tmp\n";
        assert_eq!(parse_fish(text), vec!["ls", "cd /tmp"]);
    }

    #[test]
    fn test_fish_history_lives_under_data_home() {
        if let Some(path) = history_file(ShellKind::Fish) {
            assert!(path.ends_with("fish/fish_history"), "{}", path.display());
        }
    }

    #[test]
    fn test_unknown_shell_has_no_history() {
        assert!(history_file(ShellKind::Unknown).is_none());
        assert!(matches!(
            tail_history(ShellKind::Unknown, 10),
            Err(HistoryError::Unsupported(ShellKind::Unknown))
        ));
    }
}
