//! Shared kernel types for kernelmix.
//!
//! This is the leaf crate: typed ids, kernel specs, runtime models and channel
//! messages. It has **no internal kernelmix dependencies**.
//!
//! # Key Types
//!
//! |----------------------|-------------------------------------------------|
//! | Type                 | Purpose                                         |
//! |----------------------|-------------------------------------------------|
//! | [`KernelId`]         | External kernel id, the only one clients see    |
//! | [`SessionId`]        | One client connection                           |
//! | [`KernelSpec`]       | A kernel type (name, display name, language)    |
//! | [`BackendKind`]      | Provenance: Local or Remote                     |
//! | [`KernelModel`]      | Runtime model returned by model/list queries    |
//! | [`ExecutionState`]   | `starting`, `idle`, `busy`, ...                 |
//! | [`ChannelMessage`]   | One kernel protocol message on a live channel   |
//! |----------------------|-------------------------------------------------|

pub mod ids;
pub mod message;
pub mod model;
pub mod spec;

// Re-export primary types at crate root for convenience.
pub use ids::{IdParseError, KernelId, SessionId};
pub use message::{ChannelMessage, IOPUB_CHANNEL, MessageHeader, PROTOCOL_VERSION};
pub use model::{ExecutionState, KernelModel};
pub use spec::{BackendKind, KernelSpec};
