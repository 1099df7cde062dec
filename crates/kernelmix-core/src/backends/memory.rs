//! In-memory kernel hosts.
//!
//! [`MemoryKernelManager`] plays the local supervisor (synchronous calling
//! convention), [`MemoryGateway`] plays the remote gateway (async). Neither
//! runs any code: kernels are records that answer requests with canned
//! replies. Used for testing and for embedding the mixing layer without real
//! kernel processes.
//!
//! Both hosts support:
//! - failure injection (`set_available`, `set_failing`, `kill`)
//! - an artificial per-operation delay
//! - an overlap counter that records when two lifecycle operations were in
//!   flight for the same kernel at once

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::sync::watch;

use kernelmix_types::{
    BackendKind, ChannelMessage, ExecutionState, KernelModel, KernelSpec, PROTOCOL_VERSION,
    SessionId,
};

use crate::backend::{
    KernelBackend, KernelChannel, MessageSink, StartOptions, SyncKernelManager,
};
use crate::error::{BackendError, BackendResult};

// ============================================================================
// Shared host state
// ============================================================================

/// One simulated kernel.
#[derive(Debug)]
struct MemoryKernel {
    name: String,
    language: String,
    pid: u32,
    state: Mutex<ExecutionState>,
    last_activity: Mutex<DateTime<Utc>>,
    connections: AtomicU32,
    execution_count: AtomicU32,
    in_flight: AtomicBool,
    received: Mutex<Vec<ChannelMessage>>,
}

impl MemoryKernel {
    fn touch(&self, state: ExecutionState) {
        *self.state.lock() = state;
        *self.last_activity.lock() = Utc::now();
    }
}

/// Marks a lifecycle operation in flight; cleared on drop.
struct InFlight {
    kernel: Arc<MemoryKernel>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.kernel.in_flight.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MemoryHost {
    kind: BackendKind,
    prefix: &'static str,
    specs: RwLock<Vec<KernelSpec>>,
    kernels: DashMap<String, Arc<MemoryKernel>>,
    available: AtomicBool,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    overlaps: AtomicUsize,
    next_pid: AtomicU32,
}

impl MemoryHost {
    fn new(kind: BackendKind, prefix: &'static str, specs: Vec<KernelSpec>) -> Self {
        Self {
            kind,
            prefix,
            specs: RwLock::new(specs),
            kernels: DashMap::new(),
            available: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            overlaps: AtomicUsize::new(0),
            next_pid: AtomicU32::new(4000),
        }
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::SeqCst))
    }

    fn check_available(&self) -> BackendResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable(format!("{} host is down", self.kind)))
        }
    }

    fn check_failing(&self, op: &str) -> BackendResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(BackendError::Failed(format!("{} rejected by {} host", op, self.kind)))
        } else {
            Ok(())
        }
    }

    fn specs(&self) -> BackendResult<Vec<KernelSpec>> {
        self.check_available()?;
        Ok(self.specs.read().clone())
    }

    fn spec(&self, name: &str) -> BackendResult<KernelSpec> {
        self.check_available()?;
        self.specs
            .read()
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("kernel spec {}", name)))
    }

    fn kernel(&self, kernel_id: &str) -> BackendResult<Arc<MemoryKernel>> {
        self.kernels
            .get(kernel_id)
            .map(|k| Arc::clone(k.value()))
            .ok_or_else(|| BackendError::NotFound(format!("kernel {}", kernel_id)))
    }

    /// Enter a lifecycle operation on one kernel.
    fn begin(&self, kernel_id: &str, op: &str) -> BackendResult<InFlight> {
        self.check_available()?;
        self.check_failing(op)?;
        let kernel = self.kernel(kernel_id)?;
        if kernel.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        Ok(InFlight { kernel })
    }

    fn prepare_start(&self, name: &str) -> BackendResult<KernelSpec> {
        self.check_available()?;
        self.check_failing("start")?;
        self.spec(name)
    }

    fn insert(&self, spec: &KernelSpec, options: &StartOptions) -> String {
        let kernel_id = options
            .kernel_id
            .map(|id| id.to_string())
            .filter(|id| !self.kernels.contains_key(id))
            .unwrap_or_else(|| format!("{}-{}", self.prefix, uuid::Uuid::new_v4()));
        let kernel = MemoryKernel {
            name: spec.name.clone(),
            language: spec.language.clone(),
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            state: Mutex::new(ExecutionState::Idle),
            last_activity: Mutex::new(Utc::now()),
            connections: AtomicU32::new(0),
            execution_count: AtomicU32::new(0),
            in_flight: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
        };
        self.kernels.insert(kernel_id.clone(), Arc::new(kernel));
        kernel_id
    }

    fn finish_shutdown(&self, kernel_id: &str) -> BackendResult<()> {
        let (_, kernel) = self
            .kernels
            .remove(kernel_id)
            .ok_or_else(|| BackendError::NotFound(format!("kernel {}", kernel_id)))?;
        kernel.touch(ExecutionState::Dead);
        Ok(())
    }

    fn finish_interrupt(&self, kernel: &MemoryKernel) {
        kernel.touch(ExecutionState::Idle);
    }

    fn finish_restart(&self, kernel: &MemoryKernel) {
        kernel.execution_count.store(0, Ordering::SeqCst);
        kernel.touch(ExecutionState::Idle);
    }

    fn model(&self, kernel_id: &str) -> BackendResult<KernelModel> {
        self.check_available()?;
        let kernel = self.kernel(kernel_id)?;
        Ok(self.build_model(kernel_id, &kernel))
    }

    fn build_model(&self, kernel_id: &str, kernel: &MemoryKernel) -> KernelModel {
        let state = *kernel.state.lock();
        let connections = kernel.connections.load(Ordering::SeqCst);
        let additional = match self.kind {
            BackendKind::Local => json!({ "pid": kernel.pid }),
            BackendKind::Remote => json!({
                "id": kernel_id,
                "name": kernel.name,
                "execution_state": state,
                "connections": connections,
            }),
        };
        let mut model = KernelModel::new(kernel_id, kernel.name.clone())
            .with_execution_state(state)
            .with_last_activity(*kernel.last_activity.lock())
            .with_additional(additional);
        model.connections = connections;
        model
    }

    fn list(&self) -> BackendResult<Vec<KernelModel>> {
        self.check_available()?;
        Ok(self
            .kernels
            .iter()
            .map(|entry| self.build_model(entry.key(), entry.value()))
            .collect())
    }

    fn has(&self, kernel_id: &str) -> bool {
        self.available.load(Ordering::SeqCst) && self.kernels.contains_key(kernel_id)
    }

    fn channel(
        &self,
        kernel_id: &str,
        session: SessionId,
        gate: Option<watch::Receiver<bool>>,
    ) -> BackendResult<Box<dyn KernelChannel>> {
        self.check_available()?;
        let kernel = self.kernel(kernel_id)?;
        Ok(Box::new(MemoryChannel {
            kernel,
            session,
            gate,
            sink: None,
        }))
    }

    fn received(&self, kernel_id: &str) -> Vec<ChannelMessage> {
        self.kernels
            .get(kernel_id)
            .map(|k| k.received.lock().clone())
            .unwrap_or_default()
    }
}

/// Test controls shared by both hosts.
macro_rules! impl_host_controls {
    ($T:ident) => {
        impl $T {
            /// Toggle reachability. While unavailable every call fails with
            /// [`BackendError::Unavailable`].
            pub fn set_available(&self, available: bool) {
                self.host.available.store(available, Ordering::SeqCst);
            }

            /// While failing, lifecycle operations are rejected with
            /// [`BackendError::Failed`]; kernels stay alive.
            pub fn set_failing(&self, failing: bool) {
                self.host.failing.store(failing, Ordering::SeqCst);
            }

            /// Delay applied inside every lifecycle operation.
            pub fn set_delay(&self, delay: Duration) {
                let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                self.host.delay_ms.store(millis, Ordering::SeqCst);
            }

            /// Replace the offered kernel types.
            pub fn set_specs(&self, specs: Vec<KernelSpec>) {
                *self.host.specs.write() = specs;
            }

            /// Drop a kernel without a shutdown request, as if it crashed.
            pub fn kill(&self, kernel_id: &str) -> bool {
                self.host.kernels.remove(kernel_id).is_some()
            }

            /// Number of live kernels.
            pub fn kernel_count(&self) -> usize {
                self.host.kernels.len()
            }

            /// Ids of live kernels.
            pub fn kernel_ids(&self) -> Vec<String> {
                self.host.kernels.iter().map(|e| e.key().clone()).collect()
            }

            /// Times two lifecycle operations overlapped on one kernel.
            pub fn overlaps(&self) -> usize {
                self.host.overlaps.load(Ordering::SeqCst)
            }

            /// Client messages a kernel has received over its channels.
            pub fn received(&self, kernel_id: &str) -> Vec<ChannelMessage> {
                self.host.received(kernel_id)
            }
        }
    };
}

// ============================================================================
// Local: synchronous manager
// ============================================================================

/// In-memory stand-in for the local process supervisor.
#[derive(Debug)]
pub struct MemoryKernelManager {
    host: MemoryHost,
}

impl Default for MemoryKernelManager {
    fn default() -> Self {
        Self::with_specs(Vec::new())
    }
}

impl MemoryKernelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager offering the given kernel types.
    pub fn with_specs(specs: Vec<KernelSpec>) -> Self {
        Self {
            host: MemoryHost::new(BackendKind::Local, "local", specs),
        }
    }

    fn pause(&self) {
        let delay = self.host.delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

impl_host_controls!(MemoryKernelManager);

impl SyncKernelManager for MemoryKernelManager {
    fn kernel_specs(&self) -> BackendResult<Vec<KernelSpec>> {
        self.host.specs()
    }

    fn kernel_spec(&self, name: &str) -> BackendResult<KernelSpec> {
        self.host.spec(name)
    }

    fn start_kernel(&self, name: &str, options: &StartOptions) -> BackendResult<String> {
        self.pause();
        let spec = self.host.prepare_start(name)?;
        Ok(self.host.insert(&spec, options))
    }

    fn shutdown_kernel(&self, kernel_id: &str, _now: bool) -> BackendResult<()> {
        let in_flight = self.host.begin(kernel_id, "shutdown")?;
        in_flight.kernel.touch(ExecutionState::Terminating);
        self.pause();
        self.host.finish_shutdown(kernel_id)
    }

    fn interrupt_kernel(&self, kernel_id: &str) -> BackendResult<()> {
        let in_flight = self.host.begin(kernel_id, "interrupt")?;
        self.pause();
        self.host.finish_interrupt(&in_flight.kernel);
        Ok(())
    }

    fn restart_kernel(&self, kernel_id: &str, _now: bool) -> BackendResult<()> {
        let in_flight = self.host.begin(kernel_id, "restart")?;
        in_flight.kernel.touch(ExecutionState::Restarting);
        self.pause();
        self.host.finish_restart(&in_flight.kernel);
        Ok(())
    }

    fn kernel_model(&self, kernel_id: &str) -> BackendResult<KernelModel> {
        self.host.model(kernel_id)
    }

    fn list_kernels(&self) -> BackendResult<Vec<KernelModel>> {
        self.host.list()
    }

    fn has_kernel(&self, kernel_id: &str) -> bool {
        self.host.has(kernel_id)
    }

    fn open_channel(
        &self,
        kernel_id: &str,
        session: SessionId,
    ) -> BackendResult<Box<dyn KernelChannel>> {
        self.host.channel(kernel_id, session, None)
    }
}

// ============================================================================
// Remote: async gateway
// ============================================================================

/// In-memory stand-in for a remote kernel gateway.
///
/// Channel connections can be held open-pending with [`hold_connections`]
/// to observe what a client sees while the gateway socket is still being
/// established.
///
/// [`hold_connections`]: MemoryGateway::hold_connections
#[derive(Debug)]
pub struct MemoryGateway {
    host: MemoryHost,
    gate: watch::Sender<bool>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::with_specs(Vec::new())
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway offering the given kernel types.
    pub fn with_specs(specs: Vec<KernelSpec>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            host: MemoryHost::new(BackendKind::Remote, "gw", specs),
            gate,
        }
    }

    /// Block channel connects until [`release_connections`](Self::release_connections).
    pub fn hold_connections(&self) {
        self.gate.send_replace(false);
    }

    /// Let pending and future channel connects complete.
    pub fn release_connections(&self) {
        self.gate.send_replace(true);
    }

    async fn pause(&self) {
        let delay = self.host.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl_host_controls!(MemoryGateway);

#[async_trait]
impl KernelBackend for MemoryGateway {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn kernel_specs(&self) -> BackendResult<Vec<KernelSpec>> {
        self.pause().await;
        self.host.specs()
    }

    async fn kernel_spec(&self, name: &str) -> BackendResult<KernelSpec> {
        self.host.spec(name)
    }

    async fn start_kernel(&self, name: &str, options: &StartOptions) -> BackendResult<String> {
        self.pause().await;
        let spec = self.host.prepare_start(name)?;
        Ok(self.host.insert(&spec, options))
    }

    async fn shutdown_kernel(&self, kernel_id: &str, _now: bool) -> BackendResult<()> {
        let in_flight = self.host.begin(kernel_id, "shutdown")?;
        in_flight.kernel.touch(ExecutionState::Terminating);
        self.pause().await;
        self.host.finish_shutdown(kernel_id)
    }

    async fn interrupt_kernel(&self, kernel_id: &str) -> BackendResult<()> {
        let in_flight = self.host.begin(kernel_id, "interrupt")?;
        self.pause().await;
        self.host.finish_interrupt(&in_flight.kernel);
        Ok(())
    }

    async fn restart_kernel(&self, kernel_id: &str, _now: bool) -> BackendResult<()> {
        let in_flight = self.host.begin(kernel_id, "restart")?;
        in_flight.kernel.touch(ExecutionState::Restarting);
        self.pause().await;
        self.host.finish_restart(&in_flight.kernel);
        Ok(())
    }

    async fn kernel_model(&self, kernel_id: &str) -> BackendResult<KernelModel> {
        self.host.model(kernel_id)
    }

    async fn list_kernels(&self) -> BackendResult<Vec<KernelModel>> {
        self.host.list()
    }

    async fn has_kernel(&self, kernel_id: &str) -> bool {
        self.host.has(kernel_id)
    }

    async fn open_channel(
        &self,
        kernel_id: &str,
        session: SessionId,
    ) -> BackendResult<Box<dyn KernelChannel>> {
        self.host
            .channel(kernel_id, session, Some(self.gate.subscribe()))
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Echo channel to a simulated kernel.
///
/// On connect the kernel announces itself with `starting` then `idle` on
/// iopub. Every `*_request` gets a matching `*_reply`; `execute_request` is
/// bracketed by `busy` / `idle` status messages.
struct MemoryChannel {
    kernel: Arc<MemoryKernel>,
    session: SessionId,
    gate: Option<watch::Receiver<bool>>,
    sink: Option<MessageSink>,
}

impl MemoryChannel {
    fn emit(&self, msg: ChannelMessage) -> BackendResult<()> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| BackendError::Transport("channel not connected".into()))?;
        sink.send(msg)
            .map_err(|_| BackendError::Transport("client went away".into()))
    }

    fn status(&self, state: ExecutionState, parent: Option<&ChannelMessage>) -> ChannelMessage {
        let mut msg = ChannelMessage::status(&self.session, state);
        if let Some(parent) = parent {
            msg.parent_header = serde_json::to_value(&parent.header).unwrap_or_default();
        }
        msg
    }

    fn replies(&self, request: &ChannelMessage) -> Vec<ChannelMessage> {
        let Some(base) = request.msg_type().strip_suffix("_request") else {
            return Vec::new();
        };
        let reply_type = format!("{}_reply", base);
        match base {
            "execute" => {
                self.kernel.touch(ExecutionState::Busy);
                let count = self.kernel.execution_count.fetch_add(1, Ordering::SeqCst) + 1;
                let reply = ChannelMessage::reply_to(
                    request,
                    reply_type,
                    json!({ "status": "ok", "execution_count": count }),
                );
                self.kernel.touch(ExecutionState::Idle);
                vec![
                    self.status(ExecutionState::Busy, Some(request)),
                    reply,
                    self.status(ExecutionState::Idle, Some(request)),
                ]
            }
            "kernel_info" => vec![ChannelMessage::reply_to(
                request,
                reply_type,
                json!({
                    "status": "ok",
                    "protocol_version": PROTOCOL_VERSION,
                    "implementation": "memory",
                    "language_info": { "name": self.kernel.language },
                }),
            )],
            _ => vec![ChannelMessage::reply_to(
                request,
                reply_type,
                json!({ "status": "ok" }),
            )],
        }
    }
}

#[async_trait]
impl KernelChannel for MemoryChannel {
    async fn connect(&mut self, sink: MessageSink) -> BackendResult<()> {
        if let Some(gate) = self.gate.as_mut() {
            let opened = gate.wait_for(|open| *open).await.map(|_| ());
            opened.map_err(|_| BackendError::Transport("gateway closed".into()))?;
        }
        if self.sink.is_none() {
            self.kernel.connections.fetch_add(1, Ordering::SeqCst);
        }
        self.sink = Some(sink);
        self.emit(self.status(ExecutionState::Starting, None))?;
        self.emit(self.status(ExecutionState::Idle, None))
    }

    async fn send(&mut self, msg: ChannelMessage) -> BackendResult<()> {
        if self.sink.is_none() {
            return Err(BackendError::Transport("channel not connected".into()));
        }
        self.kernel.received.lock().push(msg.clone());
        for reply in self.replies(&msg) {
            self.emit(reply)?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> BackendResult<()> {
        if self.sink.take().is_some() {
            self.kernel.connections.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
