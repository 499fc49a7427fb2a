use super::{Dialect, ScriptContext, StartupLayout, quote};

pub(super) static DIALECT: Dialect = Dialect {
    name: "bash",
    binary: "bash",
    layout: StartupLayout::RcFile,
    hooks: HOOKS,
    prelude,
};

// `--rcfile` replaces ~/.bashrc, so replay the usual login/non-login order here.
const STARTUP_FILES: &str = r#"
if shopt -q login_shell; then
    if [[ -f "/etc/profile" ]]; then
        source "/etc/profile"
    fi

    if [[ -f "$HOME/.bash_profile" ]]; then
        source "$HOME/.bash_profile"
    elif [[ -f "$HOME/.bash_login" ]]; then
        source "$HOME/.bash_login"
    elif [[ -f "$HOME/.profile" ]]; then
        source "$HOME/.profile"
    fi
else
    if [[ -f "/etc/bash.bashrc" ]]; then
        source "/etc/bash.bashrc"
    fi

    if [[ -f "$HOME/.bashrc" ]]; then
        source "$HOME/.bashrc"
    fi
fi
"#;

pub(super) const HOOKS: &str = r#"
__savvy_preexec() {
    [[ -n "${__savvy_ready:-}" ]] || return 0
    __savvy_ready=

    local num cmd prompt=
    read -r num cmd <<< "$(HISTTIMEFORMAT= builtin history 1)"
    # Empty prompts re-run PROMPT_COMMAND without adding a history entry.
    [[ "$num" == "${__savvy_last_histnum:-}" ]] && return 0
    __savvy_last_histnum=$num

    case "${SAVVY_CONTEXT:-}" in
        record)
            # ${PS1@P} needs bash 4.4.
            if (( BASH_VERSINFO[0] > 4 || (BASH_VERSINFO[0] == 4 && BASH_VERSINFO[1] >= 4) )); then
                prompt=${PS1@P}
            fi
            __savvy_step_id=$("${SAVVY_BIN:-savvy}" --quiet send --prompt "$prompt" -- "$cmd" 2>/dev/null)
            ;;
        run) "${SAVVY_BIN:-savvy}" internal next --cmd "$cmd" >/dev/null 2>&1 ;;
    esac
}

__savvy_precmd() {
    local status=$?
    if [[ -n "${__savvy_step_id:-}" ]]; then
        ("${SAVVY_BIN:-savvy}" --quiet send --step-id "$__savvy_step_id" --exit-code "$status" >/dev/null 2>&1 &)
        __savvy_step_id=
    fi
    if [[ "${SAVVY_CONTEXT:-}" == "run" ]]; then
        "${SAVVY_BIN:-savvy}" --quiet internal set-param
    fi
    __savvy_ready=1
    return $status
}

__savvy_load_step() {
    READLINE_LINE=$("${SAVVY_BIN:-savvy}" internal current 2>/dev/null)
    READLINE_POINT=${#READLINE_LINE}
}

# Keep a DEBUG trap from the user's rc files running after ours.
__savvy_read_trap() { __savvy_user_debug_trap=$2; }
__savvy_existing_trap=$(trap -p DEBUG)
if [[ -n "$__savvy_existing_trap" && "$__savvy_existing_trap" != *__savvy_debug* ]]; then
    eval "__savvy_read_trap ${__savvy_existing_trap#trap }"
fi
unset __savvy_existing_trap
unset -f __savvy_read_trap

__savvy_restore_status() { return "$1"; }

__savvy_debug() {
    local status=$?
    __savvy_preexec
    if [[ -n "${__savvy_user_debug_trap:-}" ]]; then
        __savvy_restore_status "$status"
        eval "$__savvy_user_debug_trap"
    fi
}

trap '__savvy_debug' DEBUG

if [[ "$PROMPT_COMMAND" != *"__savvy_precmd"* ]]; then
    PROMPT_COMMAND="__savvy_precmd${PROMPT_COMMAND:+;$PROMPT_COMMAND}"
fi

if [[ "${SAVVY_CONTEXT:-}" == "run" && $- == *i* ]]; then
    bind -x '"\C-n": __savvy_load_step'
fi
"#;

fn prelude(ctx: &ScriptContext) -> String {
    format!(
        "export SAVVY_CONTEXT={context}\nexport SAVVY_SOCKET_PATH={socket}\nexport SAVVY_BIN={bin}\n{STARTUP_FILES}",
        context = ctx.session,
        socket = quote(ctx.socket_path),
        bin = quote(ctx.savvy_bin),
    )
}
