#![allow(clippy::missing_errors_doc)]

mod config;
mod detect;
mod environment_d;
mod registry;

pub use config::{Dialect, ManagedFile, ManagedLineSet, SinkEdit, remove, write};
pub use detect::{ShellDescriptor, ShellType, detect_shells};
pub use environment_d::{BYPASS_FILE, EnvironmentDirSink, PROXY_FILE};
pub use registry::ShellEnvironmentRegistry;
