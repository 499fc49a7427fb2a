use serde::{Deserialize, Serialize};

/// Shells savvy knows how to host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    Bash,
    Zsh,
    Dash,
    Fish,
    Unknown,
}

impl ShellKind {
    pub const SUPPORTED: [ShellKind; 4] = [
        ShellKind::Bash,
        ShellKind::Zsh,
        ShellKind::Dash,
        ShellKind::Fish,
    ];

    /// Map a bare executable name (`zsh`, not `/bin/zsh` or `-zsh`) to a kind.
    pub fn from_process_name(name: &str) -> Self {
        match name {
            "bash" => ShellKind::Bash,
            "zsh" => ShellKind::Zsh,
            "dash" => ShellKind::Dash,
            "fish" => ShellKind::Fish,
            _ => ShellKind::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ShellKind::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Zsh => "zsh",
            ShellKind::Dash => "dash",
            ShellKind::Fish => "fish",
            ShellKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ShellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ShellKind::from_process_name(&s.to_lowercase()) {
            ShellKind::Unknown => Err(format!("Unknown shell type: {}", s)),
            kind => Ok(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_process_name() {
        assert_eq!(ShellKind::from_process_name("zsh"), ShellKind::Zsh);
        assert_eq!(ShellKind::from_process_name("dash"), ShellKind::Dash);
        assert_eq!(ShellKind::from_process_name("tmux"), ShellKind::Unknown);
        assert_eq!(ShellKind::from_process_name("/bin/zsh"), ShellKind::Unknown);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Fish".parse::<ShellKind>(), Ok(ShellKind::Fish));
        assert!("unknown".parse::<ShellKind>().is_err());
        assert!("nu".parse::<ShellKind>().is_err());
    }

    #[test]
    fn test_supported_kinds_are_known() {
        for kind in ShellKind::SUPPORTED {
            assert!(kind.is_known());
            assert_eq!(kind.to_string().parse::<ShellKind>(), Ok(kind));
        }
        assert!(!ShellKind::Unknown.is_known());
    }
}
