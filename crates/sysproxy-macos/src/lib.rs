#![allow(clippy::missing_errors_doc)]

mod backend;
mod services;

pub use backend::MacosBackend;
pub use services::{NetworkService, ProxyInfo};
