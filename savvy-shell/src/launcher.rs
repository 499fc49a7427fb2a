//! Build the command that starts a hooked shell.
//!
//! The launcher writes the generated startup script to a temporary file or
//! directory and returns a [`Launch`] holding the PTY command. It never
//! touches the terminal; [`crate::ShellSession`] runs the command.

use crate::dialect::{self, Dialect, ScriptContext, StartupLayout};
use crate::kind::ShellKind;
use miette::Diagnostic;
use portable_pty::CommandBuilder;
use savvy_core::{CONTEXT_ENV, EXIT_GRACE_PERIOD, SAVVY_BIN_ENV, SOCKET_PATH_ENV, SessionContext};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;

const DEFAULT_XDG_DATA_DIRS: &str = "/usr/local/share:/usr/share";

#[derive(Debug, Error, Diagnostic)]
pub enum LaunchError {
    #[error("unsupported shell: {0}")]
    #[diagnostic(help("savvy supports bash, zsh, dash and fish"))]
    Unsupported(ShellKind),
    #[error("`{binary}` was not found on PATH")]
    #[diagnostic(help("install {binary} or make sure it is on your PATH"))]
    MissingExecutable {
        binary: &'static str,
        #[source]
        source: which::Error,
    },
    #[error("failed to locate the savvy executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("failed to write shell startup script: {0}")]
    Script(#[from] std::io::Error),
}

/// Temporary startup files; removed when the [`Launch`] is dropped.
enum StartupFiles {
    File(NamedTempFile),
    Dir(TempDir),
}

/// A prepared shell: the PTY command plus the files it depends on.
pub struct Launch {
    kind: ShellKind,
    command: CommandBuilder,
    startup: StartupFiles,
    grace_period: Duration,
}

impl Launch {
    pub fn kind(&self) -> ShellKind {
        self.kind
    }

    /// The command to spawn. The startup files live as long as `self`.
    pub fn command(&self) -> CommandBuilder {
        self.command.clone()
    }

    /// Path of the generated script (or the directory holding it).
    pub fn startup_path(&self) -> &Path {
        match &self.startup {
            StartupFiles::File(file) => file.path(),
            StartupFiles::Dir(dir) => dir.path(),
        }
    }

    /// How long to wait for the shell after its terminal closes.
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }
}

/// Prepares a shell of a given kind for a recording or replay session.
#[derive(Debug, Clone)]
pub struct Launcher {
    kind: ShellKind,
    session: SessionContext,
    socket_path: PathBuf,
    savvy_bin: Option<PathBuf>,
    shell_path: Option<PathBuf>,
}

impl Launcher {
    pub fn new(kind: ShellKind, session: SessionContext, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            session,
            socket_path: socket_path.into(),
            savvy_bin: None,
            shell_path: None,
        }
    }

    /// Executable the hooks call back into. Defaults to the running binary.
    pub fn with_savvy_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.savvy_bin = Some(path.into());
        self
    }

    /// Skip the PATH lookup and launch this shell binary.
    pub fn with_shell_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.shell_path = Some(path.into());
        self
    }

    pub fn prepare(&self) -> Result<Launch, LaunchError> {
        let dialect =
            dialect::dialect_for(self.kind).ok_or(LaunchError::Unsupported(self.kind))?;

        let shell_path = match &self.shell_path {
            Some(path) => path.clone(),
            None => which::which(dialect.binary).map_err(|source| {
                LaunchError::MissingExecutable {
                    binary: dialect.binary,
                    source,
                }
            })?,
        };
        let savvy_bin = match &self.savvy_bin {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(LaunchError::CurrentExe)?,
        };

        let script = dialect.startup_script(&ScriptContext {
            session: self.session,
            socket_path: &self.socket_path,
            savvy_bin: &savvy_bin,
        });

        let mut command = CommandBuilder::new(&shell_path);
        if let Ok(cwd) = std::env::current_dir() {
            command.cwd(cwd);
        }
        command.env(CONTEXT_ENV, self.session.as_str());
        command.env(SOCKET_PATH_ENV, &self.socket_path);
        command.env(SAVVY_BIN_ENV, &savvy_bin);

        let startup = write_startup(dialect, &script, &mut command)?;

        tracing::debug!(
            shell = dialect.name,
            path = %shell_path.display(),
            session = %self.session,
            "prepared shell"
        );

        Ok(Launch {
            kind: self.kind,
            command,
            startup,
            grace_period: EXIT_GRACE_PERIOD,
        })
    }
}

fn write_startup(
    dialect: &Dialect,
    script: &str,
    command: &mut CommandBuilder,
) -> Result<StartupFiles, LaunchError> {
    match dialect.layout {
        StartupLayout::RcFile => {
            let mut file = tempfile::Builder::new()
                .prefix("savvy-bashrc-")
                .suffix(".bash")
                .tempfile()?;
            file.write_all(script.as_bytes())?;
            file.flush()?;
            command.arg("--rcfile");
            command.arg(file.path());
            command.arg("-i");
            Ok(StartupFiles::File(file))
        }
        StartupLayout::ZdotDir => {
            let dir = tempfile::Builder::new().prefix("savvy-zsh-").tempdir()?;
            std::fs::write(dir.path().join(".zshrc"), script)?;
            command.env("ZDOTDIR", dir.path());
            Ok(StartupFiles::Dir(dir))
        }
        StartupLayout::VendorConf => {
            let dir = tempfile::Builder::new().prefix("savvy-fish-").tempdir()?;
            let conf_dir = dir.path().join("fish").join("vendor_conf.d");
            std::fs::create_dir_all(&conf_dir)?;
            std::fs::write(conf_dir.join("savvy.fish"), script)?;
            command.env(
                "XDG_DATA_DIRS",
                xdg_data_dirs(std::env::var_os("XDG_DATA_DIRS"), dir.path()),
            );
            Ok(StartupFiles::Dir(dir))
        }
    }
}

/// Append `extra` to an `XDG_DATA_DIRS` value, keeping the defaults when unset.
fn xdg_data_dirs(current: Option<OsString>, extra: &Path) -> OsString {
    let mut dirs = match current {
        Some(value) if !value.is_empty() => value,
        _ => OsString::from(DEFAULT_XDG_DATA_DIRS),
    };
    dirs.push(":");
    dirs.push(extra);
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(kind: ShellKind) -> Launcher {
        Launcher::new(kind, SessionContext::Record, "/tmp/savvy-test.sock")
            .with_savvy_bin("/usr/local/bin/savvy")
            .with_shell_path("/bin/sh")
    }

    fn env(launch: &Launch, key: &str) -> Option<String> {
        launch
            .command()
            .get_env(key)
            .map(|v| v.to_string_lossy().into_owned())
    }

    #[test]
    fn test_unknown_shell_is_rejected() {
        let err = launcher(ShellKind::Unknown).prepare().err().unwrap();
        assert!(matches!(err, LaunchError::Unsupported(ShellKind::Unknown)));
    }

    #[test]
    fn test_bash_uses_rcfile() {
        let launch = launcher(ShellKind::Bash).prepare().unwrap();
        let argv = launch.command().get_argv().clone();
        assert_eq!(argv[1], "--rcfile");
        assert_eq!(Path::new(&argv[2]), launch.startup_path());

        let script = std::fs::read_to_string(launch.startup_path()).unwrap();
        assert!(script.contains("/tmp/savvy-test.sock"));
        assert!(script.contains("__savvy_preexec"));

        assert_eq!(env(&launch, CONTEXT_ENV).as_deref(), Some("record"));
        assert_eq!(
            env(&launch, SOCKET_PATH_ENV).as_deref(),
            Some("/tmp/savvy-test.sock")
        );
        assert_eq!(
            env(&launch, SAVVY_BIN_ENV).as_deref(),
            Some("/usr/local/bin/savvy")
        );
        assert_eq!(launch.grace_period(), EXIT_GRACE_PERIOD);
    }

    #[test]
    fn test_zsh_uses_zdotdir() {
        let launch = launcher(ShellKind::Zsh).prepare().unwrap();
        let zdotdir = env(&launch, "ZDOTDIR").unwrap();
        assert_eq!(Path::new(&zdotdir), launch.startup_path());
        assert!(launch.startup_path().join(".zshrc").is_file());
    }

    #[test]
    fn test_fish_appends_vendor_dir() {
        let launch = launcher(ShellKind::Fish).prepare().unwrap();
        let dirs = env(&launch, "XDG_DATA_DIRS").unwrap();
        assert!(dirs.ends_with(&*launch.startup_path().to_string_lossy()));
        assert!(
            launch
                .startup_path()
                .join("fish/vendor_conf.d/savvy.fish")
                .is_file()
        );
    }

    #[test]
    fn test_startup_files_removed_on_drop() {
        let launch = launcher(ShellKind::Zsh).prepare().unwrap();
        let path = launch.startup_path().to_path_buf();
        drop(launch);
        assert!(!path.exists());
    }

    #[test]
    fn test_xdg_data_dirs() {
        let extra = Path::new("/tmp/savvy-fish-x");
        assert_eq!(
            xdg_data_dirs(None, extra),
            OsString::from("/usr/local/share:/usr/share:/tmp/savvy-fish-x")
        );
        assert_eq!(
            xdg_data_dirs(Some("/opt/share".into()), extra),
            OsString::from("/opt/share:/tmp/savvy-fish-x")
        );
    }
}
