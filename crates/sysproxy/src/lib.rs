//! Keeps the operating system's proxy settings and the user's shell
//! environment pointing at the same proxy.

#![allow(clippy::missing_errors_doc)]

mod error;
mod select;
mod synchronizer;

pub mod logging;
pub mod settings;

pub use error::SyncError;
pub use select::{detect_backend, detect_sinks};
pub use settings::SyncSettings;
pub use synchronizer::{ProxySynchronizer, SyncReport};

pub use sysproxy_backend::{
    BackendError, BypassList, EnvironmentSink, Protocol, ProxyBackend, ProxyEndpoint, ProxyState,
    SinkError, StateError,
};
