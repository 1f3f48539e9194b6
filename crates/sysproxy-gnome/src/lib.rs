#![allow(clippy::missing_errors_doc)]

mod backend;
pub mod variant;

pub use backend::{GnomeBackend, SCHEMA};
