use super::{Dialect, ScriptContext, StartupLayout, quote};

// fish loads vendor_conf.d snippets before the user's config.fish on its own,
// so the prelude only has to export the session environment.
pub(super) static DIALECT: Dialect = Dialect {
    name: "fish",
    binary: "fish",
    layout: StartupLayout::VendorConf,
    hooks: HOOKS,
    prelude,
};

pub(super) const HOOKS: &str = r#"
set -q SAVVY_BIN; or set -g SAVVY_BIN savvy

function __savvy_preexec --on-event fish_preexec
    switch "$SAVVY_CONTEXT"
        case record
            set -g __savvy_step_id (command $SAVVY_BIN --quiet send -- $argv[1] 2>/dev/null)
        case run
            command $SAVVY_BIN internal next --cmd $argv[1] >/dev/null 2>&1
    end
end

function __savvy_postexec --on-event fish_postexec
    set -l exit_code $status
    set -q __savvy_step_id[1]; or return
    command $SAVVY_BIN --quiet send --step-id $__savvy_step_id[1] --exit-code $exit_code >/dev/null 2>&1 &
    set -e __savvy_step_id
end

function __savvy_set_params --on-event fish_prompt
    test "$SAVVY_CONTEXT" = run; or return
    command $SAVVY_BIN --quiet internal set-param
end

function __savvy_load_step
    commandline -r -- (command $SAVVY_BIN internal current 2>/dev/null)
    commandline -f end-of-line
end

if test "$SAVVY_CONTEXT" = run
    bind \cn __savvy_load_step
end
"#;

fn prelude(ctx: &ScriptContext) -> String {
    format!(
        "set -gx SAVVY_CONTEXT {context}\nset -gx SAVVY_SOCKET_PATH {socket}\nset -gx SAVVY_BIN {bin}\n",
        context = ctx.session,
        socket = quote(ctx.socket_path),
        bin = quote(ctx.savvy_bin),
    )
}
