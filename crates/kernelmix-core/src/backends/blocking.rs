//! Sync → async adapter for the local kernel manager.
//!
//! Every call runs on `tokio::task::spawn_blocking`, so a slow local manager
//! (process spawn, signal delivery, waiting for a port) never stalls the
//! executor.

use std::sync::Arc;

use async_trait::async_trait;

use kernelmix_types::{BackendKind, KernelModel, KernelSpec, SessionId};

use crate::backend::{KernelBackend, KernelChannel, StartOptions, SyncKernelManager};
use crate::error::{BackendError, BackendResult};

/// Async facade over a synchronous local kernel manager.
pub struct BlockingBackend<M> {
    manager: Arc<M>,
}

impl<M> Clone for BlockingBackend<M> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<M: SyncKernelManager> BlockingBackend<M> {
    pub fn new(manager: M) -> Self {
        Self::from_arc(Arc::new(manager))
    }

    /// Wrap a manager the caller keeps a handle to.
    pub fn from_arc(manager: Arc<M>) -> Self {
        Self { manager }
    }

    /// The wrapped manager.
    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    async fn run<T, F>(&self, f: F) -> BackendResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&M) -> BackendResult<T> + Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || f(&manager))
            .await
            .map_err(|e| BackendError::Failed(format!("spawn_blocking: {}", e)))?
    }
}

#[async_trait]
impl<M: SyncKernelManager> KernelBackend for BlockingBackend<M> {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn kernel_specs(&self) -> BackendResult<Vec<KernelSpec>> {
        self.run(|m| m.kernel_specs()).await
    }

    async fn kernel_spec(&self, name: &str) -> BackendResult<KernelSpec> {
        let name = name.to_string();
        self.run(move |m| m.kernel_spec(&name)).await
    }

    async fn start_kernel(&self, name: &str, options: &StartOptions) -> BackendResult<String> {
        let name = name.to_string();
        let options = options.clone();
        self.run(move |m| m.start_kernel(&name, &options)).await
    }

    async fn shutdown_kernel(&self, kernel_id: &str, now: bool) -> BackendResult<()> {
        let kernel_id = kernel_id.to_string();
        self.run(move |m| m.shutdown_kernel(&kernel_id, now)).await
    }

    async fn interrupt_kernel(&self, kernel_id: &str) -> BackendResult<()> {
        let kernel_id = kernel_id.to_string();
        self.run(move |m| m.interrupt_kernel(&kernel_id)).await
    }

    async fn restart_kernel(&self, kernel_id: &str, now: bool) -> BackendResult<()> {
        let kernel_id = kernel_id.to_string();
        self.run(move |m| m.restart_kernel(&kernel_id, now)).await
    }

    async fn kernel_model(&self, kernel_id: &str) -> BackendResult<KernelModel> {
        let kernel_id = kernel_id.to_string();
        self.run(move |m| m.kernel_model(&kernel_id)).await
    }

    async fn list_kernels(&self) -> BackendResult<Vec<KernelModel>> {
        self.run(|m| m.list_kernels()).await
    }

    async fn has_kernel(&self, kernel_id: &str) -> bool {
        let kernel_id = kernel_id.to_string();
        self.run(move |m| Ok(m.has_kernel(&kernel_id)))
            .await
            .unwrap_or(false)
    }

    async fn open_channel(
        &self,
        kernel_id: &str,
        session: SessionId,
    ) -> BackendResult<Box<dyn KernelChannel>> {
        let kernel_id = kernel_id.to_string();
        self.run(move |m| m.open_channel(&kernel_id, session)).await
    }
}
