//! Typed identifiers for kernels and client sessions.
//!
//! Both wrap a UUID. They display as standard UUID text (the form clients see
//! in URLs and JSON). The `short()` form (first 8 hex chars) is for logs and
//! human-facing UI only, never a lookup key.
//!
//! Backend-assigned kernel ids are deliberately *not* typed here: they are
//! opaque strings owned by whichever backend started the kernel and never
//! leave the mixing layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// External kernel identifier (UUIDv4, matching what notebook clients expect).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KernelId(uuid::Uuid);

/// Client session identifier (UUIDv7, time-ordered).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

/// Error returned when a string is not a valid id.
#[derive(Debug, thiserror::Error)]
#[error("invalid {kind} id '{input}': {source}")]
pub struct IdParseError {
    kind: &'static str,
    input: String,
    #[source]
    source: uuid::Error,
}

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal, $kind:literal) => {
        impl $T {
            /// First 8 hex characters, for human display only. Never a lookup key.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                uuid::Uuid::parse_str(s).map(Self).map_err(|source| IdParseError {
                    kind: $kind,
                    input: s.to_string(),
                    source,
                })
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// A nil (all zero) id for sentinel values.
            pub fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            /// Check if this is the nil ID.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl FromStr for $T {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Hyphenated form is what clients put in URLs
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(KernelId, "KernelId", "kernel");
impl_typed_id!(SessionId, "SessionId", "session");

impl KernelId {
    /// Create a new random kernel ID (UUIDv4).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl SessionId {
    /// Create a new time-ordered session ID (UUIDv7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

// ============================================================================
// Tests
// ============================================================================
