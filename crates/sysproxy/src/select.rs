use std::sync::Arc;

use log::{debug, info};
use sysproxy_backend::{BackendError, EnvironmentSink, ProxyBackend};
use sysproxy_gnome::GnomeBackend;
use sysproxy_kde::KdeBackend;
use sysproxy_macos::MacosBackend;
use sysproxy_platform::{CommandRunner, Desktop, HostEnvironment};
use sysproxy_shell::{EnvironmentDirSink, ShellEnvironmentRegistry};
use sysproxy_windows::{WindowsBackend, WindowsEnvironmentSink};

use crate::settings::SyncSettings;

/// Picks the native proxy store for `host`.
pub fn detect_backend(
    host: HostEnvironment,
    runner: Arc<dyn CommandRunner>,
    settings: &SyncSettings,
) -> Result<Box<dyn ProxyBackend>, BackendError> {
    let backend: Box<dyn ProxyBackend> = match host {
        HostEnvironment::Windows => Box::new(WindowsBackend::open()?),
        HostEnvironment::MacOs => Box::new(MacosBackend::new(runner)?),
        HostEnvironment::Linux {
            desktop: Some(Desktop::Gnome),
        } => Box::new(GnomeBackend::new(runner)?),
        HostEnvironment::Linux {
            desktop: Some(Desktop::Kde),
        } => Box::new(KdeBackend::detect(runner, settings.mirror_kde_to_gsettings)?),
        HostEnvironment::Linux { desktop: None } => {
            return Err(BackendError::unsupported(
                "no GNOME or KDE session detected (XDG_CURRENT_DESKTOP)",
            ));
        }
    };
    info!(
        "Using {} proxy backend on {}",
        backend.name(),
        host.display_name()
    );
    Ok(backend)
}

/// Sinks enabled by `settings` that make sense on `host`, in projection order.
#[must_use]
pub fn detect_sinks(
    host: HostEnvironment,
    runner: Arc<dyn CommandRunner>,
    settings: &SyncSettings,
) -> Vec<Box<dyn EnvironmentSink>> {
    let mut sinks: Vec<Box<dyn EnvironmentSink>> = Vec::new();

    if settings.project_shells && host != HostEnvironment::Windows {
        let registry = ShellEnvironmentRegistry::detect();
        debug!("Found {} installed shell(s)", registry.shells().len());
        sinks.push(Box::new(registry));
    }

    if settings.project_environment_d
        && matches!(host, HostEnvironment::Linux { .. })
        && let Some(dir) = EnvironmentDirSink::user_dir()
    {
        sinks.push(Box::new(EnvironmentDirSink::new(dir, runner.clone())));
    }

    if settings.project_user_environment && host == HostEnvironment::Windows {
        sinks.push(Box::new(WindowsEnvironmentSink::new(runner)));
    }

    sinks
}
