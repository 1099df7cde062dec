//! Client ↔ kernel message bridging.
//!
//! A [`ChannelDelegator`] serves one client session. At open time it asks the
//! kernel's lifecycle delegator where the kernel lives and builds exactly one
//! bridge for the lifetime of the connection:
//!
//! - **Direct** (local kernels): the transport writes straight to the client.
//! - **Tunnel** (remote kernels): the client first receives a synthetic
//!   `status: starting` message, before the gateway socket is even up, so the
//!   UI can show progress. Kernel traffic then flows through a pump that drops
//!   any later `starting` status, so the client sees exactly one.
//!
//! ```text
//!   client ◄── socket ◄──────────────────────────── DirectChannel ◄── kernel
//!
//!   client ◄── socket ◄── OutgoingPath ◄── pump ◄── TunnelChannel ◄── gateway
//!                         (drops "starting")
//! ```

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use kernelmix_types::{BackendKind, ChannelMessage, ExecutionState, KernelId, SessionId};

use crate::backend::{KernelChannel, MessageSink};
use crate::error::{BackendError, BackendResult, KernelError, KernelResult};
use crate::lifecycle::KernelDelegator;

/// Ephemeral routing facts for one client connection. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub kernel_id: KernelId,
    pub session_id: SessionId,
    pub backend: BackendKind,
    pub delegate_id: String,
}

/// Kernel → client delivery, with optional `starting` suppression.
#[derive(Clone)]
struct OutgoingPath {
    socket: MessageSink,
    drop_starting: bool,
}

impl OutgoingPath {
    /// Deliver one message. Returns false when the message was filtered out.
    fn forward(&self, msg: ChannelMessage) -> BackendResult<bool> {
        if self.drop_starting && msg.reports_starting() {
            trace!(msg_id = %msg.header.msg_id, "Dropping kernel starting status");
            return Ok(false);
        }
        self.socket
            .send(msg)
            .map_err(|_| BackendError::Transport("client socket closed".into()))?;
        Ok(true)
    }
}

/// Bridge for locally hosted kernels. Messages pass through unmodified.
struct DirectChannel {
    transport: Box<dyn KernelChannel>,
    outgoing: OutgoingPath,
}

impl DirectChannel {
    async fn connect(&mut self) -> BackendResult<()> {
        self.transport.connect(self.outgoing.socket.clone()).await
    }

    async fn disconnect(&mut self) -> BackendResult<()> {
        self.transport.disconnect().await
    }
}

/// Bridge for gateway-hosted kernels, with provisional status injection.
struct TunnelChannel {
    transport: Box<dyn KernelChannel>,
    outgoing: OutgoingPath,
    session: SessionId,
    pump: Option<JoinHandle<()>>,
}

impl TunnelChannel {
    async fn connect(&mut self) -> BackendResult<()> {
        // The client hears "starting" before we wait on the gateway.
        let provisional = ChannelMessage::status(&self.session, ExecutionState::Starting);
        self.outgoing
            .socket
            .send(provisional)
            .map_err(|_| BackendError::Transport("client socket closed".into()))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<ChannelMessage>();
        let outgoing = self.outgoing.clone();
        if let Some(previous) = self.pump.take() {
            previous.abort();
        }
        self.pump = Some(tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if outgoing.forward(msg).is_err() {
                    break;
                }
            }
        }));

        self.transport.connect(tx).await
    }

    async fn disconnect(&mut self) -> BackendResult<()> {
        let result = self.transport.disconnect().await;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        result
    }
}

impl Drop for TunnelChannel {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

enum Bridge {
    Direct(DirectChannel),
    Tunnel(TunnelChannel),
}

impl Bridge {
    fn transport(&mut self) -> &mut Box<dyn KernelChannel> {
        match self {
            Bridge::Direct(c) => &mut c.transport,
            Bridge::Tunnel(c) => &mut c.transport,
        }
    }

    fn outgoing(&self) -> &OutgoingPath {
        match self {
            Bridge::Direct(c) => &c.outgoing,
            Bridge::Tunnel(c) => &c.outgoing,
        }
    }
}

/// One client's live message stream to one kernel.
pub struct ChannelDelegator {
    binding: SessionBinding,
    bridge: Bridge,
    connected: bool,
}

impl std::fmt::Debug for ChannelDelegator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDelegator")
            .field("binding", &self.binding)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl ChannelDelegator {
    /// Open a backend channel for `session` on the kernel behind `kernel`.
    ///
    /// Kernel → client messages will be delivered to `socket` once
    /// [`connect`](Self::connect) is called.
    pub async fn open(
        kernel: &KernelDelegator,
        session: SessionId,
        socket: MessageSink,
    ) -> KernelResult<Self> {
        let (backend, delegate) = kernel.channel_target()?;
        let binding = SessionBinding {
            kernel_id: kernel.id(),
            session_id: session,
            backend: delegate.backend,
            delegate_id: delegate.delegate_id,
        };

        let transport = backend
            .open_channel(&binding.delegate_id, session)
            .await
            .map_err(|source| match source {
                BackendError::NotFound(_) => KernelError::KernelNotFound(binding.kernel_id),
                source => KernelError::Channel { session, source },
            })?;

        let bridge = match binding.backend {
            BackendKind::Local => Bridge::Direct(DirectChannel {
                transport,
                outgoing: OutgoingPath {
                    socket,
                    drop_starting: false,
                },
            }),
            BackendKind::Remote => Bridge::Tunnel(TunnelChannel {
                transport,
                outgoing: OutgoingPath {
                    socket,
                    drop_starting: true,
                },
                session,
                pump: None,
            }),
        };
        debug!(
            kernel = %binding.kernel_id,
            session = %session,
            backend = %binding.backend,
            "Opened kernel channel"
        );

        Ok(Self {
            binding,
            bridge,
            connected: false,
        })
    }

    pub fn binding(&self) -> &SessionBinding {
        &self.binding
    }

    pub fn kernel_id(&self) -> KernelId {
        self.binding.kernel_id
    }

    pub fn session_id(&self) -> SessionId {
        self.binding.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn channel_error(&self, source: BackendError) -> KernelError {
        KernelError::Channel {
            session: self.binding.session_id,
            source,
        }
    }

    /// Connect the kernel transport. For remote kernels the client receives
    /// the provisional `starting` status before this waits on the gateway.
    pub async fn connect(&mut self) -> KernelResult<()> {
        let result = match &mut self.bridge {
            Bridge::Direct(c) => c.connect().await,
            Bridge::Tunnel(c) => c.connect().await,
        };
        result.map_err(|e| self.channel_error(e))?;
        self.connected = true;
        info!(
            kernel = %self.binding.kernel_id,
            session = %self.binding.session_id,
            backend = %self.binding.backend,
            "Kernel channel connected"
        );
        Ok(())
    }

    /// Close the kernel transport. Idempotent.
    pub async fn disconnect(&mut self) -> KernelResult<()> {
        let result = match &mut self.bridge {
            Bridge::Direct(c) => c.disconnect().await,
            Bridge::Tunnel(c) => c.disconnect().await,
        };
        if std::mem::replace(&mut self.connected, false) {
            debug!(session = %self.binding.session_id, "Kernel channel disconnected");
        }
        result.map_err(|e| self.channel_error(e))
    }

    /// Client → kernel.
    pub async fn handle_incoming(&mut self, msg: ChannelMessage) -> KernelResult<()> {
        trace!(session = %self.binding.session_id, msg_type = %msg.msg_type(), "Client message");
        let result = self.bridge.transport().send(msg).await;
        result.map_err(|e| self.channel_error(e))
    }

    /// Kernel → client. Returns false when the message was filtered out.
    pub fn handle_outgoing(&self, msg: ChannelMessage) -> KernelResult<bool> {
        self.bridge
            .outgoing()
            .forward(msg)
            .map_err(|e| self.channel_error(e))
    }
}
