//! # kernelmix-gateway
//!
//! Remote kernel backend for kernelmix. Talks to a kernel gateway over its
//! REST API (`reqwest`) for lifecycle calls and over WebSocket
//! (`tokio-tungstenite`) for kernel message channels.
//!
//! Plug a [`GatewayBackend`] into the mixing facade as the remote side:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kernelmix_core::{
//!     BlockingBackend, KernelBackend, MappingKernelManager, MemoryKernelManager, MixConfig,
//! };
//! use kernelmix_gateway::{GatewayBackend, GatewayConfig};
//!
//! let local: Arc<dyn KernelBackend> = Arc::new(BlockingBackend::new(MemoryKernelManager::new()));
//! let remote: Arc<dyn KernelBackend> =
//!     Arc::new(GatewayBackend::new(GatewayConfig::new("http://localhost:8888")).unwrap());
//! let manager = MappingKernelManager::new(local, Some(remote), MixConfig::default());
//! ```

pub mod backend;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;

pub use backend::GatewayBackend;
pub use channel::GatewayChannel;
pub use client::GatewayClient;
pub use config::GatewayConfig;
pub use error::GatewayError;
