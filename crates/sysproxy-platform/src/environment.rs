use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Desktop {
    Gnome,
    Kde,
}

impl Desktop {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gnome => "GNOME",
            Self::Kde => "KDE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEnvironment {
    Windows,
    MacOs,
    Linux { desktop: Option<Desktop> },
}

impl HostEnvironment {
    #[must_use]
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self::MacOs
        }
        #[cfg(target_os = "windows")]
        {
            Self::Windows
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            Self::Linux {
                desktop: current_desktop(),
            }
        }
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Windows => "Windows".to_string(),
            Self::MacOs => "macOS".to_string(),
            Self::Linux {
                desktop: Some(desktop),
            } => format!("Linux ({})", desktop.as_str()),
            Self::Linux { desktop: None } => "Linux (unrecognized desktop)".to_string(),
        }
    }
}

/// Picks GNOME or KDE from a desktop marker such as `ubuntu:GNOME` or `KDE`.
#[must_use]
pub fn detect_desktop(marker: Option<&str>) -> Option<Desktop> {
    marker?
        .split(':')
        .map(str::trim)
        .find_map(|component| match component.to_ascii_lowercase().as_str() {
            "gnome" | "gnome-classic" | "gnome-flashback" => Some(Desktop::Gnome),
            "kde" | "plasma" => Some(Desktop::Kde),
            _ => None,
        })
}

#[must_use]
pub fn current_desktop() -> Option<Desktop> {
    ["XDG_CURRENT_DESKTOP", "DESKTOP_SESSION"]
        .iter()
        .find_map(|var| detect_desktop(std::env::var(var).ok().as_deref()))
}

/// Major version suffix for `kreadconfig`/`kwriteconfig`.
#[must_use]
pub fn kde_session_version() -> String {
    parse_kde_session_version(std::env::var("KDE_SESSION_VERSION").ok().as_deref())
}

fn parse_kde_session_version(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or("5")
        .to_string()
}

/// `$XDG_CONFIG_HOME` when it is absolute, otherwise `~/.config` on every
/// platform (shells and systemd ignore the native macOS/Windows locations).
#[must_use]
pub fn xdg_config_home() -> Option<PathBuf> {
    select_xdg_config_home(
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        dirs::home_dir(),
    )
}

fn select_xdg_config_home(env: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    env.filter(|path| path.is_absolute())
        .or_else(|| home.map(|home| home.join(".config")))
}
