//! Merged kernel-type catalog.
//!
//! Every catalog merge lists the local specs first, then the remote ones.
//! Local names always win: a remote spec whose name is already local is
//! dropped. The outcome of each merge is recorded in a [`Provenance`], which
//! the lifecycle layer consults to pick a backend for a new kernel.
//!
//! The remote side is best-effort. If the gateway is down, slow, or rejects
//! our credentials, the catalog degrades to local-only and logs a warning.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use kernelmix_types::{BackendKind, KernelSpec};

use crate::backend::KernelBackend;
use crate::config::MixConfig;
use crate::error::{BackendError, KernelError, KernelResult};

/// Name sets produced by one completed catalog merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceSnapshot {
    pub local: BTreeSet<String>,
    pub remote: BTreeSet<String>,
}

/// Which backend each known kernel-type name belongs to.
///
/// Shared by `Arc` between the catalog and the lifecycle layer. The sets are
/// swapped wholesale at the end of each merge, so a reader sees either the
/// previous merge or the new one, never a mix.
#[derive(Debug, Default)]
pub struct Provenance {
    sets: RwLock<Arc<ProvenanceSnapshot>>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `name` was remote in the latest completed merge.
    ///
    /// False for unknown names and before any merge.
    pub fn is_remote(&self, name: &str) -> bool {
        self.sets.read().remote.contains(name)
    }

    /// True iff `name` was local in the latest completed merge.
    pub fn is_local(&self, name: &str) -> bool {
        self.sets.read().local.contains(name)
    }

    /// Backend that hosts kernels of this type.
    pub fn route(&self, name: &str) -> BackendKind {
        if self.is_remote(name) {
            BackendKind::Remote
        } else {
            BackendKind::Local
        }
    }

    /// The latest completed merge.
    pub fn snapshot(&self) -> Arc<ProvenanceSnapshot> {
        Arc::clone(&self.sets.read())
    }

    fn replace(&self, snapshot: ProvenanceSnapshot) {
        *self.sets.write() = Arc::new(snapshot);
    }
}

/// Unified kernel-type catalog over a local and an optional remote backend.
pub struct KernelSpecCatalog {
    local: Arc<dyn KernelBackend>,
    remote: Option<Arc<dyn KernelBackend>>,
    provenance: Arc<Provenance>,
    config: MixConfig,
}

impl KernelSpecCatalog {
    pub fn new(
        local: Arc<dyn KernelBackend>,
        remote: Option<Arc<dyn KernelBackend>>,
        provenance: Arc<Provenance>,
        config: MixConfig,
    ) -> Self {
        Self {
            local,
            remote,
            provenance,
            config,
        }
    }

    /// Shared provenance record.
    pub fn provenance(&self) -> &Arc<Provenance> {
        &self.provenance
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// The backend for one side of the mix, if configured.
    pub fn backend(&self, kind: BackendKind) -> Option<&Arc<dyn KernelBackend>> {
        match kind {
            BackendKind::Local => Some(&self.local),
            BackendKind::Remote => self.remote.as_ref(),
        }
    }

    /// True iff `name` is served by the remote backend (latest merge).
    pub fn is_remote(&self, name: &str) -> bool {
        self.provenance.is_remote(name)
    }

    fn suffix(&self, kind: BackendKind) -> &str {
        match kind {
            BackendKind::Local => &self.config.local_suffix,
            BackendKind::Remote => &self.config.remote_suffix,
        }
    }

    /// Merge both backends' specs into one catalog keyed by name.
    ///
    /// Fails only if the local backend cannot list its specs.
    #[tracing::instrument(skip(self), name = "catalog.all_specs")]
    pub async fn all_specs(&self) -> KernelResult<BTreeMap<String, KernelSpec>> {
        let local_specs = self
            .local
            .kernel_specs()
            .await
            .map_err(KernelError::Catalog)?;

        let mut merged = BTreeMap::new();
        let mut snapshot = ProvenanceSnapshot::default();
        let local_suffix = self.suffix(BackendKind::Local);
        for spec in local_specs {
            snapshot.local.insert(spec.name.clone());
            merged.insert(spec.name.clone(), spec.with_display_suffix(local_suffix));
        }

        if let Some(remote) = &self.remote {
            match remote.kernel_specs().await {
                Ok(remote_specs) => {
                    let remote_suffix = self.suffix(BackendKind::Remote);
                    for spec in remote_specs {
                        if snapshot.local.contains(&spec.name) {
                            debug!(kernel_name = %spec.name, "Remote spec shadowed by local");
                            continue;
                        }
                        snapshot.remote.insert(spec.name.clone());
                        merged.insert(spec.name.clone(), spec.with_display_suffix(remote_suffix));
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Remote kernel specs unavailable, listing local only");
                }
            }
        }

        debug!(
            local = snapshot.local.len(),
            remote = snapshot.remote.len(),
            "Kernel catalog merged"
        );
        self.provenance.replace(snapshot);
        Ok(merged)
    }

    /// Look up one kernel type, routed by provenance.
    #[tracing::instrument(skip(self), name = "catalog.kernel_spec")]
    pub async fn kernel_spec(&self, name: &str) -> KernelResult<KernelSpec> {
        let kind = self.provenance.route(name);
        let backend = self
            .backend(kind)
            .ok_or_else(|| KernelError::SpecNotFound(name.to_string()))?;
        debug!(kernel_name = %name, backend = %kind, "Routing spec lookup");

        match backend.kernel_spec(name).await {
            Ok(spec) => Ok(spec.with_display_suffix(self.suffix(kind))),
            Err(BackendError::NotFound(_)) => Err(KernelError::SpecNotFound(name.to_string())),
            Err(e) => Err(KernelError::Catalog(e)),
        }
    }

    /// Kernel type to offer as the default.
    ///
    /// The configured name (environment first) wins; otherwise the first local
    /// spec by name. `None` when nothing is configured and no local specs exist.
    pub async fn default_kernel_name(&self) -> KernelResult<Option<String>> {
        if let Some(name) = self.config.resolve_default_kernel_name() {
            return Ok(Some(name));
        }
        let mut names: Vec<String> = self
            .local
            .kernel_specs()
            .await
            .map_err(KernelError::Catalog)?
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        names.sort();
        Ok(names.into_iter().next())
    }
}
