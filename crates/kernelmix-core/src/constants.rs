//! Mixing layer defaults.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Display-name suffix for kernel types hosted locally.
pub const DEFAULT_LOCAL_SUFFIX: &str = " (Local)";

/// Display-name suffix for kernel types hosted by the gateway.
pub const DEFAULT_REMOTE_SUFFIX: &str = " (Remote)";

/// Environment variable overriding the configured default kernel type.
pub const DEFAULT_KERNEL_NAME_ENV: &str = "KERNELMIX_DEFAULT_KERNEL";
