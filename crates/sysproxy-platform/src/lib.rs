#![allow(clippy::missing_errors_doc)]

mod commands;
mod environment;
mod paths;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use commands::{CommandOutput, CommandRunner, HideWindow, SystemRunner, args};
pub use environment::{
    Desktop, HostEnvironment, current_desktop, detect_desktop, kde_session_version,
    xdg_config_home,
};
pub use paths::{AppPaths, AppPathsError};
