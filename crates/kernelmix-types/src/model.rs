//! Kernel runtime model: what clients see when they ask about a kernel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kernel execution state as reported on status messages and models.
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionState {
    Starting,
    Idle,
    Busy,
    Restarting,
    Terminating,
    Dead,
    #[default]
    Unknown,
}

/// Runtime model of one kernel.
///
/// `execution_state` is populated for local kernels; remote kernels instead
/// carry the gateway's raw model in `additional`. Clients treat `additional`
/// as opaque.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelModel {
    /// Kernel id. Outside the mixing layer this is always the external id.
    pub id: String,
    /// Kernel type name.
    pub name: String,
    /// Last time the kernel sent or received a message.
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
    /// Execution state (local kernels only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_state: Option<ExecutionState>,
    /// Number of open client connections.
    #[serde(default)]
    pub connections: u32,
    /// Backend-specific model data (remote kernels only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<serde_json::Value>,
}

impl KernelModel {
    /// Create a model with the given id and kernel name, no activity yet.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            last_activity: None,
            execution_state: None,
            connections: 0,
            additional: None,
        }
    }

    /// Set the execution state.
    pub fn with_execution_state(mut self, state: ExecutionState) -> Self {
        self.execution_state = Some(state);
        self
    }

    /// Set the last activity timestamp.
    pub fn with_last_activity(mut self, at: DateTime<Utc>) -> Self {
        self.last_activity = Some(at);
        self
    }

    /// Attach backend-specific data.
    pub fn with_additional(mut self, additional: serde_json::Value) -> Self {
        self.additional = Some(additional);
        self
    }
}
