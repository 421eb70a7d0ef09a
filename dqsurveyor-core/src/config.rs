//! Collection run configuration.
//!
//! This module provides the `CollectionConfig` struct for configuring a
//! diagnostic collection run: which filesystem root to inspect, how long each
//! command may take, which backends to consider and which configuration keys
//! must be masked.

use crate::models::BackendId;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-command timeout, matching the usual plugin timeout of sos.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound for a single command's timeout.
pub const MAX_COMMAND_TIMEOUT: Duration = Duration::from_secs(3600);

/// Configuration keys whose values are masked wherever they are collected.
pub const DEFAULT_PROTECTED_CONFIG_KEYS: &[&str] = &["rgw keystone admin password"];

/// Configuration for a collection run.
///
/// # Example
/// ```rust
/// use dqsurveyor_core::config::CollectionConfig;
/// use dqsurveyor_core::models::BackendId;
/// use std::time::Duration;
///
/// let config = CollectionConfig::new()
///     .with_hostname("node-1")
///     .with_command_timeout(Duration::from_secs(60))
///     .with_backends(vec![BackendId::MicroCeph]);
///
/// assert!(config.validate().is_ok());
/// assert!(config.selects(BackendId::MicroCeph));
/// assert!(!config.selects(BackendId::Lxd));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    /// Root of the filesystem being diagnosed; `/` on a live host
    pub sysroot: PathBuf,
    /// Name of the host being diagnosed, recorded in the run manifest
    pub hostname: String,
    /// Timeout applied to every external command
    pub command_timeout: Duration,
    /// Backends to consider; empty means all known backends
    pub backends: Vec<BackendId>,
    /// Whether queries are also submitted through the backend's SQL wrapper
    pub use_cli_transport: bool,
    /// Configuration keys whose values are masked in collected output
    pub protected_config_keys: Vec<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            sysroot: PathBuf::from("/"),
            hostname: "localhost".to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            backends: Vec::new(),
            use_cli_transport: true,
            protected_config_keys: DEFAULT_PROTECTED_CONFIG_KEYS
                .iter()
                .map(|key| (*key).to_string())
                .collect(),
        }
    }
}

impl CollectionConfig {
    /// Creates a new collection config with safe defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the collection configuration.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if !self.sysroot.is_absolute() {
            return Err(crate::CollectError::configuration(format!(
                "sysroot must be an absolute path, got {}",
                self.sysroot.display()
            )));
        }

        if self.hostname.trim().is_empty() {
            return Err(crate::CollectError::configuration(
                "hostname cannot be empty",
            ));
        }

        if self.command_timeout.is_zero() {
            return Err(crate::CollectError::configuration(
                "command timeout must be greater than 0",
            ));
        }

        if self.command_timeout > MAX_COMMAND_TIMEOUT {
            return Err(crate::CollectError::configuration(format!(
                "command timeout should not exceed {}s",
                MAX_COMMAND_TIMEOUT.as_secs()
            )));
        }

        if self
            .protected_config_keys
            .iter()
            .any(|key| key.trim().is_empty())
        {
            return Err(crate::CollectError::configuration(
                "protected config keys cannot be empty",
            ));
        }

        Ok(())
    }

    /// Whether a backend takes part in this run.
    pub fn selects(&self, backend: BackendId) -> bool {
        self.backends.is_empty() || self.backends.contains(&backend)
    }

    /// Builder method to set the filesystem root.
    pub fn with_sysroot(mut self, sysroot: impl Into<PathBuf>) -> Self {
        self.sysroot = sysroot.into();
        self
    }

    /// Builder method to set the hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Builder method to set the per-command timeout.
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Builder method to restrict the run to specific backends.
    pub fn with_backends(mut self, backends: Vec<BackendId>) -> Self {
        self.backends = backends;
        self
    }

    /// Builder method to enable/disable the SQL wrapper transport.
    pub const fn with_cli_transport(mut self, enabled: bool) -> Self {
        self.use_cli_transport = enabled;
        self
    }

    /// Builder method to replace the protected configuration keys.
    pub fn with_protected_config_keys(mut self, keys: Vec<String>) -> Self {
        self.protected_config_keys = keys;
        self
    }
}
