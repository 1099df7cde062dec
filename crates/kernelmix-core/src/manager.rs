//! The mixing facade: one kernel manager over two backends.
//!
//! [`MappingKernelManager`] is what callers (HTTP handlers, session
//! managers) talk to. It owns the catalog, the shared id map, and a registry
//! of [`KernelDelegator`]s keyed by external id. Clients only ever see
//! external ids; backend ids stay inside the delegators.
//!
//! External ids are unique for the life of the process. A caller-supplied id
//! that matches a live kernel, or one that was shut down earlier, is refused
//! with [`KernelError::AlreadyExists`].

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tracing::{debug, info, warn};

use kernelmix_types::{BackendKind, KernelId, KernelModel, KernelSpec, SessionId};

use crate::backend::{KernelBackend, MessageSink, StartOptions};
use crate::catalog::{KernelSpecCatalog, Provenance};
use crate::channel::ChannelDelegator;
use crate::config::MixConfig;
use crate::error::{KernelError, KernelResult};
use crate::lifecycle::{IdMap, KernelDelegator, KernelState, client_model};

/// Unified kernel manager over a local and an optional remote backend.
pub struct MappingKernelManager {
    catalog: Arc<KernelSpecCatalog>,
    id_map: Arc<IdMap>,
    kernels: Arc<DashMap<KernelId, KernelDelegator>>,
    /// Ids of kernels that were shut down. Never reissued.
    retired: Arc<DashSet<KernelId>>,
}

impl MappingKernelManager {
    /// Create a manager with its own provenance record.
    pub fn new(
        local: Arc<dyn KernelBackend>,
        remote: Option<Arc<dyn KernelBackend>>,
        config: MixConfig,
    ) -> Self {
        Self::with_provenance(local, remote, Arc::new(Provenance::new()), config)
    }

    /// Create a manager sharing an existing provenance record.
    pub fn with_provenance(
        local: Arc<dyn KernelBackend>,
        remote: Option<Arc<dyn KernelBackend>>,
        provenance: Arc<Provenance>,
        config: MixConfig,
    ) -> Self {
        Self {
            catalog: Arc::new(KernelSpecCatalog::new(local, remote, provenance, config)),
            id_map: Arc::new(IdMap::new()),
            kernels: Arc::new(DashMap::new()),
            retired: Arc::new(DashSet::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<KernelSpecCatalog> {
        &self.catalog
    }

    pub fn id_map(&self) -> &Arc<IdMap> {
        &self.id_map
    }

    fn delegator(&self, id: &KernelId) -> KernelResult<KernelDelegator> {
        self.kernels
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(KernelError::KernelNotFound(*id))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// All kernel types from both backends, local shadowing remote.
    pub async fn list_kernel_types(&self) -> KernelResult<BTreeMap<String, KernelSpec>> {
        self.catalog.all_specs().await
    }

    /// One kernel type by name.
    pub async fn get_kernel_type(&self, name: &str) -> KernelResult<KernelSpec> {
        self.catalog.kernel_spec(name).await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start a kernel of type `kernel_name` (default type when `None`).
    ///
    /// Returns the new external id. If `options.kernel_id` is set it becomes
    /// the external id and is passed to the backend as a hint.
    #[tracing::instrument(skip(self, options), name = "mix.start_kernel")]
    pub async fn start_kernel(
        &self,
        kernel_name: Option<&str>,
        options: StartOptions,
    ) -> KernelResult<KernelId> {
        let kernel_name = match kernel_name {
            Some(name) => name.to_string(),
            None => self
                .catalog
                .default_kernel_name()
                .await?
                .ok_or_else(|| KernelError::SpecNotFound("<default>".to_string()))?,
        };

        // Names no merge has seen yet: refresh provenance before routing.
        let provenance = self.catalog.provenance();
        if !provenance.is_local(&kernel_name) && !provenance.is_remote(&kernel_name) {
            debug!(kernel_name = %kernel_name, "Unknown kernel type, refreshing catalog");
            self.catalog.all_specs().await?;
        }

        let id = options.kernel_id.unwrap_or_else(KernelId::new);
        let delegator = self.register(id, &kernel_name)?;

        // Registry cleanup rides on the spawned task so it still happens
        // if the caller stops waiting.
        let kernels = Arc::clone(&self.kernels);
        tokio::spawn(async move {
            match delegator.start(options).await {
                Ok(id) => {
                    info!(kernel = %id, kernel_name = %kernel_name, "Kernel started");
                    Ok(id)
                }
                Err(e) => {
                    kernels.remove(&id);
                    Err(e)
                }
            }
        })
        .await?
    }

    /// Insert a fresh record, refusing ids that are live or retired.
    fn register(&self, id: KernelId, kernel_name: &str) -> KernelResult<KernelDelegator> {
        match self.kernels.entry(id) {
            Entry::Occupied(_) => Err(KernelError::AlreadyExists(id)),
            Entry::Vacant(_) if self.retired.contains(&id) => {
                Err(KernelError::AlreadyExists(id))
            }
            Entry::Vacant(slot) => {
                let delegator = KernelDelegator::new(
                    id,
                    kernel_name,
                    Arc::clone(&self.catalog),
                    Arc::clone(&self.id_map),
                );
                slot.insert(delegator.clone());
                Ok(delegator)
            }
        }
    }

    /// Shut a kernel down. Shutting down an already retired id is a no-op.
    #[tracing::instrument(skip(self), name = "mix.shutdown_kernel")]
    pub async fn shutdown_kernel(&self, id: KernelId, now: bool) -> KernelResult<()> {
        if self.retired.contains(&id) {
            debug!(kernel = %id, "Kernel already retired");
            return Ok(());
        }
        let delegator = self.delegator(&id)?;
        let kernels = Arc::clone(&self.kernels);
        let retired = Arc::clone(&self.retired);
        tokio::spawn(async move {
            delegator.shutdown(now).await?;
            // Retire before unregistering so the id is never free in between.
            retired.insert(id);
            kernels.remove(&id);
            Ok::<_, KernelError>(())
        })
        .await?
    }

    #[tracing::instrument(skip(self), name = "mix.interrupt_kernel")]
    pub async fn interrupt_kernel(&self, id: KernelId) -> KernelResult<()> {
        self.delegator(&id)?.interrupt().await
    }

    #[tracing::instrument(skip(self), name = "mix.restart_kernel")]
    pub async fn restart_kernel(&self, id: KernelId, now: bool) -> KernelResult<()> {
        self.delegator(&id)?.restart(now).await
    }

    /// Client-facing model of one kernel.
    pub async fn get_kernel_model(&self, id: KernelId) -> KernelResult<KernelModel> {
        self.delegator(&id)?.model().await
    }

    /// Models of every kernel this manager started, remote first.
    ///
    /// A remote listing failure is logged and skipped. Remote kernels that a
    /// successful listing no longer reports are left out.
    #[tracing::instrument(skip(self), name = "mix.list_kernels")]
    pub async fn list_kernels(&self) -> KernelResult<Vec<KernelModel>> {
        let mut models = Vec::new();

        if let Some(remote) = self.catalog.backend(BackendKind::Remote) {
            match remote.list_kernels().await {
                Ok(listed) => {
                    let ours = self.id_map.delegates(BackendKind::Remote);
                    models.extend(listed.into_iter().filter_map(|model| {
                        let id = *ours.get(&model.id)?;
                        Some(client_model(id, BackendKind::Remote, model))
                    }));
                }
                Err(e) => {
                    warn!(error = %e, "Remote kernel listing unavailable, listing local only");
                }
            }
        }

        if let Some(local) = self.catalog.backend(BackendKind::Local) {
            let listed = local.list_kernels().await.map_err(KernelError::Catalog)?;
            let ours = self.id_map.delegates(BackendKind::Local);
            models.extend(listed.into_iter().filter_map(|model| {
                let id = *ours.get(&model.id)?;
                Some(client_model(id, BackendKind::Local, model))
            }));
        }

        Ok(models)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Open and connect a message channel between a client socket and a
    /// kernel. For remote kernels the socket receives a provisional
    /// `starting` status before the gateway connection completes.
    #[tracing::instrument(skip(self, socket), name = "mix.open_session")]
    pub async fn open_session(
        &self,
        id: KernelId,
        session: SessionId,
        socket: MessageSink,
    ) -> KernelResult<ChannelDelegator> {
        let delegator = self.delegator(&id)?;
        let mut channel = ChannelDelegator::open(&delegator, session, socket).await?;
        channel.connect().await?;
        Ok(channel)
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// True iff `id` names a kernel in the registry.
    pub fn has_kernel(&self, id: &KernelId) -> bool {
        self.kernels.contains_key(id)
    }

    /// External ids of all registered kernels.
    pub fn kernel_ids(&self) -> Vec<KernelId> {
        self.kernels.iter().map(|entry| *entry.key()).collect()
    }

    /// Hosting backend of a registered, started kernel.
    pub fn kernel_backend(&self, id: &KernelId) -> Option<BackendKind> {
        self.kernels.get(id).and_then(|entry| entry.backend())
    }

    /// Lifecycle state of a registered kernel.
    pub fn kernel_state(&self, id: &KernelId) -> Option<KernelState> {
        self.kernels.get(id).map(|entry| entry.state())
    }

    /// Shut down every registered kernel, logging failures.
    pub async fn shutdown_all(&self, now: bool) {
        let ids = self.kernel_ids();
        info!(count = ids.len(), "Shutting down all kernels");
        for id in ids {
            if let Err(e) = self.shutdown_kernel(id, now).await {
                warn!(kernel = %id, error = %e, "Failed to shut down kernel");
            }
        }
    }
}
