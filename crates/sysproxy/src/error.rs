use sysproxy_backend::{BackendError, StateError};
use thiserror::Error;

/// Why a synchronization step stopped. Sink failures never end up here; they
/// are collected in the [`SyncReport`](crate::SyncReport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid proxy state: {0}")]
    InvalidState(#[from] StateError),
}
