//! Backend implementations.
//!
//! [`BlockingBackend`] lifts any [`SyncKernelManager`](crate::SyncKernelManager)
//! into the async [`KernelBackend`](crate::KernelBackend) interface. The
//! `memory` module holds in-process hosts for both sides of the mix.

mod blocking;
pub mod memory;

pub use blocking::BlockingBackend;
pub use memory::{MemoryGateway, MemoryKernelManager};
