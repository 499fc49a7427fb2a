use super::{Dialect, ScriptContext, StartupLayout, quote};

pub(super) static DIALECT: Dialect = Dialect {
    name: "zsh",
    binary: "zsh",
    layout: StartupLayout::ZdotDir,
    hooks: HOOKS,
    prelude,
};

// ZDOTDIR points at our temp dir, so only this file runs; source the user's
// files in zsh's own order, honouring a ZDOTDIR they set in ~/.zshenv.
const STARTUP_FILES: &str = r#"
if [[ -f "/etc/zshenv" ]]; then
    source "/etc/zshenv"
elif [[ -f "/etc/zsh/zshenv" ]]; then
    source "/etc/zsh/zshenv"
fi

if [[ -f "$HOME/.zshenv" ]]; then
    __savvy_zdotdir=$ZDOTDIR
    source "$HOME/.zshenv"
    if [[ "$__savvy_zdotdir" != "$ZDOTDIR" ]]; then
        __savvy_user_zdotdir=$ZDOTDIR
        ZDOTDIR=$__savvy_zdotdir
    fi
    unset __savvy_zdotdir
fi

HISTFILE="${__savvy_user_zdotdir:-$HOME}/.zsh_history"

if [[ -o login ]]; then
    if [[ -f "/etc/zprofile" ]]; then
        source "/etc/zprofile"
    elif [[ -f "/etc/zsh/zprofile" ]]; then
        source "/etc/zsh/zprofile"
    fi
    if [[ -f "${__savvy_user_zdotdir:-$HOME}/.zprofile" ]]; then
        source "${__savvy_user_zdotdir:-$HOME}/.zprofile"
    fi
fi

if [[ -f "/etc/zshrc" ]]; then
    source "/etc/zshrc"
elif [[ -f "/etc/zsh/zshrc" ]]; then
    source "/etc/zsh/zshrc"
fi

if [[ -f "${__savvy_user_zdotdir:-$HOME}/.zshrc" ]]; then
    source "${__savvy_user_zdotdir:-$HOME}/.zshrc"
fi

if [[ -o login ]]; then
    if [[ -f "/etc/zlogin" ]]; then
        source "/etc/zlogin"
    elif [[ -f "/etc/zsh/zlogin" ]]; then
        source "/etc/zsh/zlogin"
    fi
    if [[ -f "${__savvy_user_zdotdir:-$HOME}/.zlogin" ]]; then
        source "${__savvy_user_zdotdir:-$HOME}/.zlogin"
    fi
fi

unset __savvy_user_zdotdir
"#;

pub(super) const HOOKS: &str = r#"
__savvy_preexec() {
    local cmd="$1"
    case "${SAVVY_CONTEXT:-}" in
        record)
            __savvy_step_id=$("${SAVVY_BIN:-savvy}" --quiet send --prompt "${(%)PS1}" -- "$cmd" 2>/dev/null)
            ;;
        run) "${SAVVY_BIN:-savvy}" internal next --cmd "$cmd" >/dev/null 2>&1 ;;
    esac
}

__savvy_precmd() {
    local exit_code=$?
    if [[ -n "${__savvy_step_id:-}" ]]; then
        ("${SAVVY_BIN:-savvy}" --quiet send --step-id "$__savvy_step_id" --exit-code "$exit_code" >/dev/null 2>&1 &)
        __savvy_step_id=
    fi
    [[ "${SAVVY_CONTEXT:-}" == "run" ]] || return 0
    local step
    "${SAVVY_BIN:-savvy}" --quiet internal set-param || return 0
    step=$("${SAVVY_BIN:-savvy}" internal current 2>/dev/null) || return 0
    [[ -n "$step" ]] && print -z -- "$step"
}

__savvy_load_step() {
    BUFFER=$("${SAVVY_BIN:-savvy}" internal current 2>/dev/null)
    CURSOR=${#BUFFER}
}

autoload -Uz add-zsh-hook
add-zsh-hook preexec __savvy_preexec
add-zsh-hook precmd __savvy_precmd

if [[ "${SAVVY_CONTEXT:-}" == "run" ]]; then
    zle -N __savvy_load_step
    bindkey '^N' __savvy_load_step
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
