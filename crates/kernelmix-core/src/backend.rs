//! Backend capability interface.
//!
//! Both kernel hosts (the local process supervisor and the remote gateway)
//! are driven through one explicit trait, [`KernelBackend`]. Which one handles
//! a kernel is decided by catalog provenance, never by inspecting the object.
//!
//! The local supervisor's native calling convention is synchronous; it
//! implements [`SyncKernelManager`] and is lifted into [`KernelBackend`] by
//! [`BlockingBackend`](crate::backends::BlockingBackend), so the delegators
//! never branch on calling convention.
//!
//! ```text
//!   MappingKernelManager
//!       │
//!       ├── Local  ──► BlockingBackend<impl SyncKernelManager> ──► processes
//!       │
//!       └── Remote ──► impl KernelBackend (gateway) ──► HTTP / WebSocket
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use kernelmix_types::{BackendKind, ChannelMessage, KernelId, KernelModel, KernelSpec, SessionId};

use crate::error::BackendResult;

/// Where a channel delivers kernel → client messages.
pub type MessageSink = mpsc::UnboundedSender<ChannelMessage>;

/// Caller-supplied extras for a kernel start.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Caller-chosen external id. Forwarded to the backend as a hint.
    pub kernel_id: Option<KernelId>,
    /// Extra environment for the kernel.
    pub env: HashMap<String, String>,
    /// Working directory for the kernel.
    pub cwd: Option<String>,
}

impl StartOptions {
    /// Request a specific external id.
    pub fn with_kernel_id(mut self, id: KernelId) -> Self {
        self.kernel_id = Some(id);
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// A message transport to one running kernel.
///
/// `connect` hands the transport a sink for kernel → client traffic; `send`
/// carries client → kernel traffic.
#[async_trait]
pub trait KernelChannel: Send {
    /// Establish the connection. Kernel messages flow into `sink` afterwards.
    async fn connect(&mut self, sink: MessageSink) -> BackendResult<()>;

    /// Deliver one client message to the kernel.
    async fn send(&mut self, msg: ChannelMessage) -> BackendResult<()>;

    /// Close the connection. Idempotent.
    async fn disconnect(&mut self) -> BackendResult<()>;
}

/// Async kernel host: the operation set both backends expose.
///
/// Kernel ids passed here are *delegate* ids, assigned by this backend.
#[async_trait]
pub trait KernelBackend: Send + Sync {
    /// Which side of the mix this backend is.
    fn kind(&self) -> BackendKind;

    /// All kernel types this backend offers.
    async fn kernel_specs(&self) -> BackendResult<Vec<KernelSpec>>;

    /// One kernel type by name.
    async fn kernel_spec(&self, name: &str) -> BackendResult<KernelSpec>;

    /// Start a kernel, returning the backend's id for it.
    async fn start_kernel(&self, name: &str, options: &StartOptions) -> BackendResult<String>;

    /// Stop a kernel. `now` skips any graceful shutdown request.
    async fn shutdown_kernel(&self, kernel_id: &str, now: bool) -> BackendResult<()>;

    /// Interrupt the kernel's current execution.
    async fn interrupt_kernel(&self, kernel_id: &str) -> BackendResult<()>;

    /// Restart a kernel in place, keeping its id.
    async fn restart_kernel(&self, kernel_id: &str, now: bool) -> BackendResult<()>;

    /// Runtime model for one kernel.
    async fn kernel_model(&self, kernel_id: &str) -> BackendResult<KernelModel>;

    /// Runtime models for every kernel this backend holds.
    async fn list_kernels(&self) -> BackendResult<Vec<KernelModel>>;

    /// Whether the backend currently holds a kernel with this id.
    async fn has_kernel(&self, kernel_id: &str) -> bool;

    /// Open a message channel to a kernel for one client session.
    async fn open_channel(
        &self,
        kernel_id: &str,
        session: SessionId,
    ) -> BackendResult<Box<dyn KernelChannel>>;
}

/// Synchronous kernel host, the local supervisor's native calling convention.
///
/// Calls may block; [`BlockingBackend`](crate::backends::BlockingBackend)
/// runs them off the async executor.
pub trait SyncKernelManager: Send + Sync + 'static {
    fn kernel_specs(&self) -> BackendResult<Vec<KernelSpec>>;
    fn kernel_spec(&self, name: &str) -> BackendResult<KernelSpec>;
    fn start_kernel(&self, name: &str, options: &StartOptions) -> BackendResult<String>;
    fn shutdown_kernel(&self, kernel_id: &str, now: bool) -> BackendResult<()>;
    fn interrupt_kernel(&self, kernel_id: &str) -> BackendResult<()>;
    fn restart_kernel(&self, kernel_id: &str, now: bool) -> BackendResult<()>;
    fn kernel_model(&self, kernel_id: &str) -> BackendResult<KernelModel>;
    fn list_kernels(&self) -> BackendResult<Vec<KernelModel>>;
    fn has_kernel(&self, kernel_id: &str) -> bool;
    fn open_channel(
        &self,
        kernel_id: &str,
        session: SessionId,
    ) -> BackendResult<Box<dyn KernelChannel>>;
}
