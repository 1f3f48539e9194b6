#![allow(clippy::missing_errors_doc)]

mod backend;

pub use backend::{DEFAULT_NO_PROXY_FOR, GROUP, KdeBackend};
