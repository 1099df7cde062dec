//! Per-kernel lifecycle delegation.
//!
//! A [`KernelDelegator`] owns one kernel's external identity and forwards
//! lifecycle operations to whichever backend hosts it. The backend is chosen
//! once, at start, from catalog provenance, and never changes afterwards.
//!
//! ```text
//!   Unborn ──start──► Starting ──ok──► Running ◄──────────────┐
//!                        │               │  │                 │
//!                      fail          interrupt restart ──ok───┤
//!                        │               │  │   (or unreachable)
//!                        ▼               ▼  ▼                 │
//!                       Dead ◄─gone── Interrupting / Restarting
//!                        ▲        (restart only)
//!   Running ──shutdown───┘
//! ```
//!
//! Operations on one kernel are serialized by a per-record async mutex: a
//! second caller waits for the first to finish. Each operation runs on its
//! own task, so dropping the caller's future never interrupts a backend call
//! half way and the resulting state transition is always recorded.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use strum::Display;
use tracing::{debug, info, warn};

use kernelmix_types::{BackendKind, KernelId, KernelModel};

use crate::backend::{KernelBackend, StartOptions};
use crate::catalog::KernelSpecCatalog;
use crate::error::{BackendError, KernelError, KernelResult, Operation};

/// Lifecycle state of one kernel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum KernelState {
    Unborn,
    Starting,
    Running,
    Interrupting,
    Restarting,
    Dead,
}

impl KernelState {
    /// True once the record can never run again.
    pub fn is_terminal(self) -> bool {
        matches!(self, KernelState::Dead)
    }
}

/// Where a kernel actually lives: backend kind plus the backend's own id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateBinding {
    pub backend: BackendKind,
    pub delegate_id: String,
}

/// External id → delegate binding, shared by every delegator.
///
/// An entry exists exactly while its kernel is started and not yet shut down.
#[derive(Debug, Default)]
pub struct IdMap {
    entries: DashMap<KernelId, DelegateBinding>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &KernelId) -> Option<DelegateBinding> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &KernelId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// External id for a delegate id on the given backend.
    pub fn external_id(&self, backend: BackendKind, delegate_id: &str) -> Option<KernelId> {
        self.entries
            .iter()
            .find(|entry| entry.backend == backend && entry.delegate_id == delegate_id)
            .map(|entry| *entry.key())
    }

    /// Delegate id → external id for every kernel on one backend.
    pub fn delegates(&self, backend: BackendKind) -> HashMap<String, KernelId> {
        self.entries
            .iter()
            .filter(|entry| entry.backend == backend)
            .map(|entry| (entry.delegate_id.clone(), *entry.key()))
            .collect()
    }

    fn insert(&self, id: KernelId, binding: DelegateBinding) {
        self.entries.insert(id, binding);
    }

    fn remove(&self, id: &KernelId) -> Option<DelegateBinding> {
        self.entries.remove(id).map(|(_, binding)| binding)
    }
}

/// Rewrite a backend model for clients: external id, and only the fields
/// that make sense for the hosting backend.
pub(crate) fn client_model(id: KernelId, backend: BackendKind, mut model: KernelModel) -> KernelModel {
    model.id = id.to_string();
    match backend {
        BackendKind::Local => model.additional = None,
        BackendKind::Remote => model.execution_state = None,
    }
    model
}

/// Lifecycle delegator for one kernel.
///
/// Cheap to clone; clones share the same record.
#[derive(Clone)]
pub struct KernelDelegator {
    inner: Arc<Record>,
}

struct Record {
    id: KernelId,
    kernel_name: String,
    catalog: Arc<KernelSpecCatalog>,
    id_map: Arc<IdMap>,
    /// Held for the whole duration of every lifecycle operation.
    guard: tokio::sync::Mutex<()>,
    state: Mutex<KernelState>,
    binding: RwLock<Option<DelegateBinding>>,
}

impl KernelDelegator {
    /// A fresh, unborn record.
    pub fn new(
        id: KernelId,
        kernel_name: impl Into<String>,
        catalog: Arc<KernelSpecCatalog>,
        id_map: Arc<IdMap>,
    ) -> Self {
        Self {
            inner: Arc::new(Record {
                id,
                kernel_name: kernel_name.into(),
                catalog,
                id_map,
                guard: tokio::sync::Mutex::new(()),
                state: Mutex::new(KernelState::Unborn),
                binding: RwLock::new(None),
            }),
        }
    }

    pub fn id(&self) -> KernelId {
        self.inner.id
    }

    pub fn kernel_name(&self) -> &str {
        &self.inner.kernel_name
    }

    /// Current state. Does not wait for an in-flight operation.
    pub fn state(&self) -> KernelState {
        *self.inner.state.lock()
    }

    /// Hosting backend, once started.
    pub fn backend(&self) -> Option<BackendKind> {
        self.binding().map(|b| b.backend)
    }

    /// Backend binding while the kernel is started and not shut down.
    pub fn binding(&self) -> Option<DelegateBinding> {
        self.inner.binding.read().clone()
    }

    /// Start the kernel on the backend chosen by provenance.
    pub async fn start(&self, options: StartOptions) -> KernelResult<KernelId> {
        let record = Arc::clone(&self.inner);
        tokio::spawn(async move { record.start(options).await }).await?
    }

    /// Stop the kernel. A second shutdown is a no-op.
    pub async fn shutdown(&self, now: bool) -> KernelResult<()> {
        let record = Arc::clone(&self.inner);
        tokio::spawn(async move { record.shutdown(now).await }).await?
    }

    /// Interrupt the kernel's current execution.
    pub async fn interrupt(&self) -> KernelResult<()> {
        let record = Arc::clone(&self.inner);
        tokio::spawn(async move { record.interrupt().await }).await?
    }

    /// Restart the kernel in place.
    pub async fn restart(&self, now: bool) -> KernelResult<()> {
        let record = Arc::clone(&self.inner);
        tokio::spawn(async move { record.restart(now).await }).await?
    }

    /// Client-facing model: external id, normalized for the backend.
    pub async fn model(&self) -> KernelResult<KernelModel> {
        let record = Arc::clone(&self.inner);
        tokio::spawn(async move { record.model().await }).await?
    }

    /// True iff the backend currently holds this kernel.
    pub async fn has_active_kernel(&self) -> bool {
        match self.inner.bound() {
            Some((backend, binding)) => backend.has_kernel(&binding.delegate_id).await,
            None => false,
        }
    }

    /// Backend handle and binding for opening a channel.
    pub(crate) fn channel_target(&self) -> KernelResult<(Arc<dyn KernelBackend>, DelegateBinding)> {
        self.inner
            .bound()
            .ok_or(KernelError::KernelNotFound(self.inner.id))
    }
}

impl Record {
    fn state(&self) -> KernelState {
        *self.state.lock()
    }

    fn set_state(&self, state: KernelState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            debug!(kernel = %self.id, from = %previous, to = %state, "Kernel state changed");
        }
    }

    fn bound(&self) -> Option<(Arc<dyn KernelBackend>, DelegateBinding)> {
        let binding = self.binding.read().clone()?;
        let backend = self.catalog.backend(binding.backend)?;
        Some((Arc::clone(backend), binding))
    }

    fn require_running(&self, operation: Operation) -> KernelResult<(Arc<dyn KernelBackend>, DelegateBinding)> {
        let state = self.state();
        if state != KernelState::Running {
            return Err(KernelError::InvalidState {
                kernel: self.id,
                operation,
                state,
            });
        }
        self.bound().ok_or(KernelError::KernelNotFound(self.id))
    }

    /// After a failed restart: dead only when the backend answers that the
    /// kernel is gone. An unreachable backend leaves the kernel running.
    async fn settle(&self, backend: &dyn KernelBackend, binding: &DelegateBinding) {
        match backend.kernel_model(&binding.delegate_id).await {
            Err(BackendError::NotFound(_)) => {
                warn!(kernel = %self.id, "Kernel lost by backend");
                self.set_state(KernelState::Dead);
            }
            Err(e) => {
                debug!(kernel = %self.id, error = %e, "Backend unreachable, keeping kernel");
                self.set_state(KernelState::Running);
            }
            Ok(_) => self.set_state(KernelState::Running),
        }
    }

    async fn start(&self, options: StartOptions) -> KernelResult<KernelId> {
        let _guard = self.guard.lock().await;
        let state = self.state();
        if state != KernelState::Unborn {
            return Err(KernelError::InvalidState {
                kernel: self.id,
                operation: Operation::Start,
                state,
            });
        }

        let kind = self.catalog.provenance().route(&self.kernel_name);
        let Some(backend) = self.catalog.backend(kind).cloned() else {
            self.set_state(KernelState::Dead);
            return Err(KernelError::SpecNotFound(self.kernel_name.clone()));
        };

        self.set_state(KernelState::Starting);
        info!(kernel = %self.id, kernel_name = %self.kernel_name, backend = %kind, "Starting kernel");

        match backend.start_kernel(&self.kernel_name, &options).await {
            Ok(delegate_id) => {
                let binding = DelegateBinding {
                    backend: kind,
                    delegate_id,
                };
                self.id_map.insert(self.id, binding.clone());
                *self.binding.write() = Some(binding);
                self.set_state(KernelState::Running);
                info!(kernel = %self.id, backend = %kind, "Kernel running");
                Ok(self.id)
            }
            Err(e) => {
                self.set_state(KernelState::Dead);
                warn!(kernel = %self.id, backend = %kind, error = %e, "Kernel failed to start");
                Err(match e {
                    BackendError::NotFound(_) => KernelError::SpecNotFound(self.kernel_name.clone()),
                    e => KernelError::operation(self.id, Operation::Start, e),
                })
            }
        }
    }

    async fn shutdown(&self, now: bool) -> KernelResult<()> {
        let _guard = self.guard.lock().await;
        let Some((backend, binding)) = self.bound() else {
            return match self.state() {
                KernelState::Dead => {
                    debug!(kernel = %self.id, "Kernel already shut down");
                    Ok(())
                }
                state => Err(KernelError::InvalidState {
                    kernel: self.id,
                    operation: Operation::Shutdown,
                    state,
                }),
            };
        };

        info!(kernel = %self.id, backend = %binding.backend, now, "Shutting down kernel");
        match backend.shutdown_kernel(&binding.delegate_id, now).await {
            Ok(()) => {}
            Err(BackendError::NotFound(_)) => {
                debug!(kernel = %self.id, "Backend had already dropped kernel");
            }
            Err(e) => {
                warn!(kernel = %self.id, error = %e, "Kernel shutdown failed");
                return Err(KernelError::operation(self.id, Operation::Shutdown, e));
            }
        }

        self.id_map.remove(&self.id);
        *self.binding.write() = None;
        self.set_state(KernelState::Dead);
        info!(kernel = %self.id, "Kernel shut down");
        Ok(())
    }

    async fn interrupt(&self) -> KernelResult<()> {
        let _guard = self.guard.lock().await;
        let (backend, binding) = self.require_running(Operation::Interrupt)?;

        self.set_state(KernelState::Interrupting);
        debug!(kernel = %self.id, backend = %binding.backend, "Interrupting kernel");
        match backend.interrupt_kernel(&binding.delegate_id).await {
            Ok(()) => {
                self.set_state(KernelState::Running);
                Ok(())
            }
            Err(e) => {
                self.set_state(KernelState::Running);
                warn!(kernel = %self.id, error = %e, "Kernel interrupt failed");
                Err(KernelError::operation(self.id, Operation::Interrupt, e))
            }
        }
    }

    async fn restart(&self, now: bool) -> KernelResult<()> {
        let _guard = self.guard.lock().await;
        let (backend, binding) = self.require_running(Operation::Restart)?;

        self.set_state(KernelState::Restarting);
        info!(kernel = %self.id, backend = %binding.backend, now, "Restarting kernel");
        match backend.restart_kernel(&binding.delegate_id, now).await {
            Ok(()) => {
                self.set_state(KernelState::Running);
                info!(kernel = %self.id, "Kernel restarted");
                Ok(())
            }
            Err(e) => {
                warn!(kernel = %self.id, error = %e, "Kernel restart failed");
                self.settle(backend.as_ref(), &binding).await;
                Err(KernelError::operation(self.id, Operation::Restart, e))
            }
        }
    }

    async fn model(&self) -> KernelResult<KernelModel> {
        let _guard = self.guard.lock().await;
        let (backend, binding) = self.bound().ok_or(KernelError::KernelNotFound(self.id))?;
        match backend.kernel_model(&binding.delegate_id).await {
            Ok(model) => Ok(client_model(self.id, binding.backend, model)),
            Err(BackendError::NotFound(_)) => Err(KernelError::KernelNotFound(self.id)),
            Err(e) => Err(KernelError::operation(self.id, Operation::Model, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backends::{BlockingBackend, MemoryGateway, MemoryKernelManager};
    use crate::catalog::Provenance;
    use crate::config::MixConfig;
    use kernelmix_types::{ExecutionState, KernelSpec};

    struct Fixture {
        local: Arc<MemoryKernelManager>,
        gateway: Arc<MemoryGateway>,
        catalog: Arc<KernelSpecCatalog>,
        id_map: Arc<IdMap>,
    }

    impl Fixture {
        async fn new() -> Self {
            let local = Arc::new(MemoryKernelManager::with_specs(vec![KernelSpec::new(
                "python3", "Python 3", "python",
            )]));
            let gateway = Arc::new(MemoryGateway::with_specs(vec![KernelSpec::new(
                "remote-python3",
                "Python 3",
                "python",
            )]));
            let local_backend: Arc<dyn KernelBackend> =
                Arc::new(BlockingBackend::from_arc(Arc::clone(&local)));
            let remote_backend: Arc<dyn KernelBackend> = gateway.clone();
            let catalog = Arc::new(KernelSpecCatalog::new(
                local_backend,
                Some(remote_backend),
                Arc::new(Provenance::new()),
                MixConfig::default(),
            ));
            catalog.all_specs().await.unwrap();
            Self {
                local,
                gateway,
                catalog,
                id_map: Arc::new(IdMap::new()),
            }
        }

        fn delegator(&self, name: &str) -> KernelDelegator {
            KernelDelegator::new(
                KernelId::new(),
                name,
                Arc::clone(&self.catalog),
                Arc::clone(&self.id_map),
            )
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_routes_by_provenance() {
        let fx = Fixture::new().await;

        let local = fx.delegator("python3");
        assert_eq!(local.state(), KernelState::Unborn);
        let id = local.start(StartOptions::default()).await.unwrap();
        assert_eq!(id, local.id());
        assert_eq!(local.state(), KernelState::Running);
        assert_eq!(local.backend(), Some(BackendKind::Local));
        assert_eq!(fx.local.kernel_count(), 1);

        let remote = fx.delegator("remote-python3");
        remote.start(StartOptions::default()).await.unwrap();
        assert_eq!(remote.backend(), Some(BackendKind::Remote));
        assert_eq!(fx.gateway.kernel_count(), 1);

        let binding = fx.id_map.get(&remote.id()).unwrap();
        assert!(fx.gateway.kernel_ids().contains(&binding.delegate_id));
        assert_eq!(
            fx.id_map.external_id(BackendKind::Remote, &binding.delegate_id),
            Some(remote.id())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_start_is_dead() {
        let fx = Fixture::new().await;
        fx.gateway.set_failing(true);
        let delegator = fx.delegator("remote-python3");
        let err = delegator.start(StartOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            KernelError::OperationFailed {
                operation: Operation::Start,
                ..
            }
        ));
        assert_eq!(delegator.state(), KernelState::Dead);
        assert!(fx.id_map.is_empty());

        // No second attempt on a dead record.
        fx.gateway.set_failing(false);
        assert!(matches!(
            delegator.start(StartOptions::default()).await,
            Err(KernelError::InvalidState { .. })
        ));
        assert_eq!(fx.gateway.kernel_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_name_start() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("julia");
        let err = delegator.start(StartOptions::default()).await.unwrap_err();
        assert!(matches!(err, KernelError::SpecNotFound(name) if name == "julia"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_twice() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("python3");
        delegator.start(StartOptions::default()).await.unwrap();

        delegator.shutdown(false).await.unwrap();
        assert_eq!(delegator.state(), KernelState::Dead);
        assert!(!fx.id_map.contains(&delegator.id()));

        delegator.shutdown(false).await.unwrap();
        assert!(!fx.id_map.contains(&delegator.id()));
        assert!(delegator.binding().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_unborn_rejected() {
        let fx = Fixture::new().await;
        let err = fx.delegator("python3").shutdown(false).await.unwrap_err();
        assert!(matches!(err, KernelError::InvalidState { state: KernelState::Unborn, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interrupt_and_restart_return_to_running() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("python3");
        delegator.start(StartOptions::default()).await.unwrap();

        delegator.interrupt().await.unwrap();
        assert_eq!(delegator.state(), KernelState::Running);
        delegator.restart(false).await.unwrap();
        assert_eq!(delegator.state(), KernelState::Running);
        assert!(delegator.has_active_kernel().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interrupt_requires_running() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("python3");
        delegator.start(StartOptions::default()).await.unwrap();
        delegator.shutdown(true).await.unwrap();

        let err = delegator.interrupt().await.unwrap_err();
        assert!(matches!(
            err,
            KernelError::InvalidState {
                operation: Operation::Interrupt,
                state: KernelState::Dead,
                ..
            }
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restart_failure_kernel_still_alive() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("remote-python3");
        delegator.start(StartOptions::default()).await.unwrap();

        fx.gateway.set_failing(true);
        let err = delegator.restart(false).await.unwrap_err();
        assert!(err.to_string().starts_with("restart failed for kernel"));
        assert_eq!(delegator.state(), KernelState::Running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restart_failure_kernel_gone() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("remote-python3");
        delegator.start(StartOptions::default()).await.unwrap();
        let delegate = delegator.binding().unwrap().delegate_id;

        fx.gateway.kill(&delegate);
        delegator.restart(false).await.unwrap_err();
        assert_eq!(delegator.state(), KernelState::Dead);

        // Shutting down the dead record still retires its mapping.
        delegator.shutdown(false).await.unwrap();
        assert!(!fx.id_map.contains(&delegator.id()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interrupt_failure_keeps_running() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("remote-python3");
        delegator.start(StartOptions::default()).await.unwrap();

        fx.gateway.set_failing(true);
        let err = delegator.interrupt().await.unwrap_err();
        assert!(matches!(
            err,
            KernelError::OperationFailed {
                operation: Operation::Interrupt,
                ..
            }
        ));
        assert_eq!(delegator.state(), KernelState::Running);

        // Even a kernel the backend lost stays running: interrupt never
        // changes the net state.
        fx.gateway.set_failing(false);
        fx.gateway.kill(&delegator.binding().unwrap().delegate_id);
        delegator.interrupt().await.unwrap_err();
        assert_eq!(delegator.state(), KernelState::Running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_outage_does_not_kill_kernel() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("remote-python3");
        delegator.start(StartOptions::default()).await.unwrap();

        fx.gateway.set_available(false);
        delegator.interrupt().await.unwrap_err();
        assert_eq!(delegator.state(), KernelState::Running);
        delegator.restart(false).await.unwrap_err();
        assert_eq!(delegator.state(), KernelState::Running);

        fx.gateway.set_available(true);
        assert_eq!(fx.gateway.kernel_count(), 1);
        delegator.interrupt().await.unwrap();
        delegator.restart(false).await.unwrap();
        assert_eq!(delegator.state(), KernelState::Running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_model_normalized() {
        let fx = Fixture::new().await;

        let local = fx.delegator("python3");
        local.start(StartOptions::default()).await.unwrap();
        let model = local.model().await.unwrap();
        assert_eq!(model.id, local.id().to_string());
        assert_eq!(model.name, "python3");
        assert_eq!(model.execution_state, Some(ExecutionState::Idle));
        assert!(model.additional.is_none());

        let remote = fx.delegator("remote-python3");
        remote.start(StartOptions::default()).await.unwrap();
        let model = remote.model().await.unwrap();
        assert_eq!(model.id, remote.id().to_string());
        assert!(model.execution_state.is_none());
        assert!(model.additional.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_record_operations_serialized() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("remote-python3");
        delegator.start(StartOptions::default()).await.unwrap();
        fx.gateway.set_delay(Duration::from_millis(20));

        let mut tasks = Vec::new();
        for i in 0..6 {
            let d = delegator.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    d.interrupt().await
                } else {
                    d.restart(false).await
                }
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(fx.gateway.overlaps(), 0);
        assert_eq!(delegator.state(), KernelState::Running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_abandoned_start_still_completes() {
        let fx = Fixture::new().await;
        fx.gateway.set_delay(Duration::from_millis(100));
        let delegator = fx.delegator("remote-python3");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), delegator.start(StartOptions::default()))
                .await;
        assert!(abandoned.is_err());

        // The next operation waits for the abandoned start to finish.
        fx.gateway.set_delay(Duration::ZERO);
        let model = delegator.model().await.unwrap();
        assert_eq!(model.name, "remote-python3");
        assert_eq!(delegator.state(), KernelState::Running);
        assert!(fx.id_map.contains(&delegator.id()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transient_state_visible() {
        let fx = Fixture::new().await;
        let delegator = fx.delegator("remote-python3");
        delegator.start(StartOptions::default()).await.unwrap();
        fx.gateway.set_delay(Duration::from_millis(100));

        let d = delegator.clone();
        let restart = tokio::spawn(async move { d.restart(false).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(delegator.state(), KernelState::Restarting);
        restart.await.unwrap().unwrap();
        assert_eq!(delegator.state(), KernelState::Running);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(KernelState::Interrupting.to_string(), "interrupting");
        assert!(KernelState::Dead.is_terminal());
        assert!(!KernelState::Running.is_terminal());
    }
}
