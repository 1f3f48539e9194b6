#![allow(clippy::missing_errors_doc)]

mod backend;
mod environment;
#[cfg(windows)]
mod registry;
mod server;
mod store;

pub use backend::{INTERNET_SETTINGS_KEY, WindowsBackend};
pub use environment::WindowsEnvironmentSink;
#[cfg(windows)]
pub use registry::RegistryStore;
pub use server::{format_proxy_server, parse_proxy_server};
#[cfg(any(test, feature = "testing"))]
pub use store::MemoryStore;
pub use store::{RegValue, SettingsStore};
