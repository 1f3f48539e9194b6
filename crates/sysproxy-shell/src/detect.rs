use std::path::PathBuf;

use log::debug;

use crate::config::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
}

impl ShellType {
    pub const ALL: [Self; 3] = [Self::Bash, Self::Zsh, Self::Fish];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bash => "Bash",
            Self::Zsh => "Zsh",
            Self::Fish => "Fish",
        }
    }

    #[must_use]
    pub const fn binary(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
        }
    }

    #[must_use]
    pub const fn dialect(self) -> Dialect {
        match self {
            Self::Bash | Self::Zsh => Dialect::PosixExport,
            Self::Fish => Dialect::FishSetx,
        }
    }

    /// The rc file interactive sessions of this shell read.
    #[must_use]
    pub fn config_file(self) -> Option<PathBuf> {
        match self {
            Self::Bash => dirs::home_dir().map(|home| home.join(".bashrc")),
            Self::Zsh => dirs::home_dir().map(|home| home.join(".zshrc")),
            Self::Fish => sysproxy_platform::xdg_config_home()
                .map(|config| config.join("fish").join("config.fish")),
        }
    }
}

impl std::fmt::Display for ShellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellDescriptor {
    pub shell_type: ShellType,
    pub config_path: PathBuf,
}

impl ShellDescriptor {
    #[must_use]
    pub fn new(shell_type: ShellType, config_path: PathBuf) -> Self {
        Self {
            shell_type,
            config_path,
        }
    }
}

/// Every supported shell whose binary is on `PATH`.
#[must_use]
pub fn detect_shells() -> Vec<ShellDescriptor> {
    ShellType::ALL
        .into_iter()
        .filter(|shell| which::which(shell.binary()).is_ok())
        .filter_map(|shell| {
            let path = shell.config_file()?;
            debug!("Detected {shell}, rc file {}", path.display());
            Some(ShellDescriptor::new(shell, path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fish_uses_its_own_dialect() {
        assert_eq!(ShellType::Fish.dialect(), Dialect::FishSetx);
        assert_eq!(ShellType::Bash.dialect(), Dialect::PosixExport);
        assert_eq!(ShellType::Zsh.dialect(), Dialect::PosixExport);
    }

    #[test]
    fn rc_file_names() {
        if let Some(path) = ShellType::Bash.config_file() {
            assert!(path.ends_with(".bashrc"));
        }
        if let Some(path) = ShellType::Zsh.config_file() {
            assert!(path.ends_with(".zshrc"));
        }
        if let Some(path) = ShellType::Fish.config_file() {
            assert!(path.ends_with("fish/config.fish"));
        }
    }

    #[test]
    fn detected_shells_are_unique() {
        let shells = detect_shells();
        for (i, shell) in shells.iter().enumerate() {
            assert!(
                shells[i + 1..]
                    .iter()
                    .all(|other| other.shell_type != shell.shell_type)
            );
        }
    }
}
