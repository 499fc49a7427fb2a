//! Per-shell startup strategies.
//!
//! Each supported [`ShellKind`] maps to a [`Dialect`]: the binary to launch,
//! how the generated startup script is handed to it, the script's
//! startup-file sourcing prelude, and the hook functions that report commands
//! to the capture or replay socket.

mod bash;
mod fish;
mod zsh;

use crate::kind::ShellKind;
use savvy_core::SessionContext;
use std::path::Path;

/// How a shell is pointed at the generated startup script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupLayout {
    /// `<binary> --rcfile <file>`
    RcFile,
    /// `ZDOTDIR=<dir>` where `<dir>/.zshrc` is the script.
    ZdotDir,
    /// `<dir>/fish/vendor_conf.d/savvy.fish`, with `<dir>` appended to `XDG_DATA_DIRS`.
    VendorConf,
}

/// Values substituted into a startup script.
pub struct ScriptContext<'a> {
    pub session: SessionContext,
    pub socket_path: &'a Path,
    pub savvy_bin: &'a Path,
}

/// Strategy table entry for one shell.
pub struct Dialect {
    pub name: &'static str,
    pub binary: &'static str,
    pub layout: StartupLayout,
    /// Hook functions, also printed by `savvy init`.
    pub hooks: &'static str,
    prelude: fn(&ScriptContext) -> String,
}

impl Dialect {
    /// Full startup script: environment, user startup files, hooks and banner.
    pub fn startup_script(&self, ctx: &ScriptContext) -> String {
        let mut script = (self.prelude)(ctx);
        script.push('\n');
        script.push_str(self.hooks);
        script.push('\n');
        script.push_str(banner(ctx.session));
        script
    }
}

/// Look up the strategy for a shell kind.
///
/// `dash` cannot host pre-execution hooks, so dash users get a bash session.
pub fn dialect_for(kind: ShellKind) -> Option<&'static Dialect> {
    match kind {
        ShellKind::Bash | ShellKind::Dash => Some(&bash::DIALECT),
        ShellKind::Zsh => Some(&zsh::DIALECT),
        ShellKind::Fish => Some(&fish::DIALECT),
        ShellKind::Unknown => None,
    }
}

pub(crate) fn quote(path: &Path) -> String {
    shell_escape::unix::escape(path.to_string_lossy()).into_owned()
}

fn banner(session: SessionContext) -> &'static str {
    match session {
        SessionContext::Record => {
            r#"
echo
echo "Type 'exit' or press 'ctrl+d' to stop recording."
"#
        }
        SessionContext::Run => {
            r#"
echo
echo "Press 'ctrl+n' to load the next command."
echo
echo "Type 'exit' or press 'ctrl+d' to stop running."
"#
        }
    }
}
