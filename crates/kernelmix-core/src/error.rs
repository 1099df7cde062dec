//! Error types for the mixing layer.
//!
//! Two levels:
//! - [`BackendError`]: what a single backend reports for one call.
//! - [`KernelError`]: what callers of the facade see. Lifecycle failures name
//!   the kernel and the operation so a client knows exactly what broke.

use kernelmix_types::{KernelId, SessionId};
use strum::Display;
use thiserror::Error;

use crate::lifecycle::KernelState;

/// Errors reported by a backend (local manager or remote gateway).
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend has no kernel or kernel type by that name/id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials were missing or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend could not be reached or refused service.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backend answered but the operation failed.
    #[error("{0}")]
    Failed(String),

    /// The backend answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Channel transport failure (socket closed, send failed, ...).
    #[error("transport error: {0}")]
    Transport(String),
}

impl BackendError {
    /// True for [`BackendError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Result alias for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Lifecycle operation names, used in errors and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Start,
    Shutdown,
    Interrupt,
    Restart,
    Model,
}

/// Errors surfaced by the mixing facade.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("kernel not found: {0}")]
    KernelNotFound(KernelId),

    #[error("kernel spec not found: {0}")]
    SpecNotFound(String),

    #[error("kernel id already in use: {0}")]
    AlreadyExists(KernelId),

    #[error("cannot {operation} kernel {kernel}: kernel is {state}")]
    InvalidState {
        kernel: KernelId,
        operation: Operation,
        state: KernelState,
    },

    #[error("{operation} failed for kernel {kernel}: {source}")]
    OperationFailed {
        kernel: KernelId,
        operation: Operation,
        #[source]
        source: BackendError,
    },

    /// The local backend could not list its kernel types or kernels.
    /// Remote listing failures never surface.
    #[error("local backend unavailable: {0}")]
    Catalog(#[source] BackendError),

    #[error("channel error for session {session}: {source}")]
    Channel {
        session: SessionId,
        #[source]
        source: BackendError,
    },

    #[error("kernel task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl KernelError {
    /// Wrap a backend error for a lifecycle operation.
    pub fn operation(kernel: KernelId, operation: Operation, source: BackendError) -> Self {
        Self::OperationFailed {
            kernel,
            operation,
            source,
        }
    }

    /// True when the error means "no such kernel / kernel type".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            KernelError::KernelNotFound(_) | KernelError::SpecNotFound(_)
        )
    }
}

/// Result alias for facade operations.
pub type KernelResult<T> = Result<T, KernelError>;
