//! Interfaces to the host the collector runs on.
//!
//! The orchestrator never spawns processes, touches the filesystem or asks a
//! package manager directly. Everything goes through these traits so a run can
//! be driven against fakes in tests and against a mounted sysroot in
//! production. Host implementations live in [`crate::host`].

use crate::Result;
use crate::models::{CollectionResult, CommandLine, CommandOutput};
use async_trait::async_trait;
use std::path::Path;

/// Answers whether a package is installed on the host.
#[async_trait]
pub trait PackageQuery: Send + Sync {
    async fn is_installed(&self, name: &str) -> bool;
}

/// Executes external commands.
///
/// Implementations enforce their own timeout. A command that ran but exited
/// non-zero is an `Ok` with a non-zero exit code; only failing to run at all
/// is an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command and captures its standard output.
    ///
    /// # Errors
    /// Returns [`CollectError::CommandSpawn`](crate::CollectError::CommandSpawn)
    /// if the process could not be started and
    /// [`CollectError::CommandTimeout`](crate::CollectError::CommandTimeout) if
    /// it did not finish in time.
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput>;
}

/// Reads host files as text.
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Reads a file by its host path.
    ///
    /// A missing file is `Ok(None)`, not an error.
    ///
    /// # Errors
    /// Returns an I/O error if the file exists but cannot be read.
    async fn read(&self, path: &Path) -> Result<Option<String>>;
}

/// Persists redacted artifacts.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Writes one artifact.
    ///
    /// # Errors
    /// Returns an I/O error if the artifact cannot be written.
    async fn emit(&self, result: &CollectionResult) -> Result<()>;
}

/// Receives non-fatal warnings meant for the person reading the report.
pub trait Alerter: Send + Sync {
    fn alert(&self, message: &str);
}
