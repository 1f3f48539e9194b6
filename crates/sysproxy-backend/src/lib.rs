#![allow(clippy::missing_errors_doc)]

mod error;
mod traits;
mod types;

pub mod env;

pub use error::{BackendError, SinkError};
pub use traits::{EnvironmentSink, ProxyBackend};
pub use types::{BypassList, Endpoints, Protocol, ProxyEndpoint, ProxyState, StateError};
