//! # kernelmix-core
//!
//! Kernel mixing layer: one kernel manager in front of two kernel hosts, a
//! local process supervisor and a remote kernel gateway.
//!
//! Clients see a single catalog of kernel types and a single lifecycle API.
//! Which host actually runs a kernel is decided by the catalog (local names
//! shadow remote ones) and hidden behind stable external kernel ids.
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Merged kernel-type catalog and provenance |
//! | [`lifecycle`] | Per-kernel delegator: routing, id mapping, state |
//! | [`manager`] | [`MappingKernelManager`], the facade callers use |
//! | [`channel`] | Per-session message bridge, provisional status |
//! | [`backend`] | Backend traits both hosts implement |
//! | [`backends`] | Sync → async adapter and in-memory hosts |

pub mod backend;
pub mod backends;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod manager;

pub use backend::{KernelBackend, KernelChannel, MessageSink, StartOptions, SyncKernelManager};
pub use backends::{BlockingBackend, MemoryGateway, MemoryKernelManager};
pub use catalog::{KernelSpecCatalog, Provenance, ProvenanceSnapshot};
pub use channel::{ChannelDelegator, SessionBinding};
pub use config::{ConfigError, MixConfig};
pub use error::{BackendError, BackendResult, KernelError, KernelResult, Operation};
pub use lifecycle::{DelegateBinding, IdMap, KernelDelegator, KernelState};
pub use manager::MappingKernelManager;

// Re-export the shared types so callers need only one dependency.
pub use kernelmix_types::{
    BackendKind, ChannelMessage, ExecutionState, KernelId, KernelModel, KernelSpec, SessionId,
};
