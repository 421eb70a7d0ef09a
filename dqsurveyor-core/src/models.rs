//! Core data models for dqlite diagnostic collection.
//!
//! This module defines the backend enumeration, the query plan produced for
//! each backend, the steps that make up a collection, and the results that
//! flow from the transports through redaction into the output sink. All
//! result types are serializable so a run can be summarised in a manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The dqlite consumers this collector knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    MicroCeph,
    MicroOvn,
    MicroCloud,
    MicroK8s,
    Lxd,
}

impl BackendId {
    /// Every known backend, in collection order.
    pub const ALL: [Self; 5] = [
        Self::MicroCeph,
        Self::MicroOvn,
        Self::MicroCloud,
        Self::MicroK8s,
        Self::Lxd,
    ];

    /// Package name used for installed checks, file naming and subdirectories.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MicroCeph => "microceph",
            Self::MicroOvn => "microovn",
            Self::MicroCloud => "microcloud",
            Self::MicroK8s => "microk8s",
            Self::Lxd => "lxd",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = crate::CollectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|backend| backend.as_str() == wanted)
            .ok_or_else(|| {
                crate::CollectError::configuration(format!(
                    "Unknown backend '{}' (expected one of: {})",
                    s,
                    Self::ALL.map(Self::as_str).join(", ")
                ))
            })
    }
}

/// A single SQL query and the label its output is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedQuery {
    pub query: String,
    pub label: String,
}

impl PlannedQuery {
    pub fn new(query: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            label: label.into(),
        }
    }
}

/// Ordered queries to run against one backend in one run.
///
/// Labels are unique within a plan; insertion order decides output ordering.
/// A plan is only built by the planner and is read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
    queries: Vec<PlannedQuery>,
}

impl QueryPlan {
    /// Appends a query unless its label is already taken.
    ///
    /// Returns `false` when the query was dropped as a duplicate.
    pub(crate) fn push(&mut self, query: PlannedQuery) -> bool {
        if self.contains_label(&query.label) {
            tracing::debug!(label = %query.label, "Dropping query with duplicate label");
            return false;
        }
        self.queries.push(query);
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedQuery> {
        self.queries.iter()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.queries.iter().any(|q| q.label == label)
    }

    /// Labels in plan order.
    pub fn labels(&self) -> Vec<&str> {
        self.queries.iter().map(|q| q.label.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a QueryPlan {
    type Item = &'a PlannedQuery;
    type IntoIter = std::slice::Iter<'a, PlannedQuery>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A program plus its arguments, executed without a shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Builder method to append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builder method to append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Splits a whitespace-separated command prefix such as `microceph cluster sql`.
    ///
    /// Returns `None` for an empty string.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let mut parts = prefix.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quotes an argument for display so the rendered command can be pasted into a shell.
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
}

impl CommandOutput {
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// How an artifact was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionChannel {
    /// HTTP POST over the backend's control socket
    Socket,
    /// The backend's own SQL wrapper command
    CliWrapper,
    /// Any other command (directory listing, dqlite shell)
    Command,
    /// A copied file
    File,
}

/// Where an artifact's content came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    Command { command_line: String },
    File { path: PathBuf },
}

impl Origin {
    /// The host file path for file artifacts.
    pub fn file_path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File { path } => Some(path),
            Self::Command { .. } => None,
        }
    }

    /// The rendered command line for command artifacts.
    pub fn command_line(&self) -> Option<&str> {
        match self {
            Self::Command { command_line } => Some(command_line),
            Self::File { .. } => None,
        }
    }
}

/// Outcome of a single collection step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionStatus {
    Succeeded,
    NonZeroExit { exit_code: Option<i32> },
    TimedOut { timeout_secs: u64 },
    Failed { reason: String },
}

impl CollectionStatus {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Raw output of one step plus the metadata the sink needs to persist it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionResult {
    pub backend: BackendId,
    pub output: String,
    pub origin: Origin,
    /// Name for command output; file artifacts keep their host path instead
    pub suggested_filename: Option<String>,
    pub subdir: Option<String>,
    pub channel: CollectionChannel,
    pub status: CollectionStatus,
    /// Number of values masked by the redaction stage
    pub redactions: usize,
}

impl CollectionResult {
    /// Result of a command-based step.
    pub fn from_command(
        backend: BackendId,
        command: &CommandLine,
        channel: CollectionChannel,
        suggested_filename: impl Into<String>,
        output: String,
        status: CollectionStatus,
    ) -> Self {
        Self {
            backend,
            output,
            origin: Origin::Command {
                command_line: command.to_string(),
            },
            suggested_filename: Some(suggested_filename.into()),
            subdir: Some(backend.as_str().to_string()),
            channel,
            status,
            redactions: 0,
        }
    }

    /// Result of a copied file.
    pub fn from_file(backend: BackendId, path: PathBuf, contents: String) -> Self {
        Self {
            backend,
            output: contents,
            origin: Origin::File { path },
            suggested_filename: None,
            subdir: None,
            channel: CollectionChannel::File,
            status: CollectionStatus::Succeeded,
            redactions: 0,
        }
    }

    /// Whether the artifact carries content worth persisting.
    ///
    /// Commands that never ran (spawn failure, timeout) produce nothing.
    pub const fn has_content(&self) -> bool {
        matches!(
            self.status,
            CollectionStatus::Succeeded | CollectionStatus::NonZeroExit { .. }
        )
    }

    /// Manifest record for this artifact.
    pub fn record(&self) -> ArtifactRecord {
        ArtifactRecord {
            suggested_filename: self.suggested_filename.clone(),
            origin: self.origin.clone(),
            channel: self.channel,
            status: self.status.clone(),
            redactions: self.redactions,
        }
    }
}

/// One unit of work for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionStep {
    /// Run a command and file its stdout under the suggested name
    Command {
        command: CommandLine,
        suggested_filename: String,
    },
    /// Copy a host file; a missing file is a no-op
    CopyFile { path: PathBuf },
}

impl CollectionStep {
    pub fn command(command: CommandLine, suggested_filename: impl Into<String>) -> Self {
        Self::Command {
            command,
            suggested_filename: suggested_filename.into(),
        }
    }

    pub fn copy(path: impl Into<PathBuf>) -> Self {
        Self::CopyFile { path: path.into() }
    }

    /// Suggested filename of a command step.
    pub fn suggested_filename(&self) -> Option<&str> {
        match self {
            Self::Command {
                suggested_filename, ..
            } => Some(suggested_filename),
            Self::CopyFile { .. } => None,
        }
    }
}

/// Manifest entry for one persisted or attempted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub suggested_filename: Option<String>,
    pub origin: Origin,
    pub channel: CollectionChannel,
    #[serde(flatten)]
    pub status: CollectionStatus,
    pub redactions: usize,
}

/// What happened to one backend during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOutcome {
    pub backend: BackendId,
    pub installed: bool,
    pub artifacts: Vec<ArtifactRecord>,
    /// Set when a step failed in a way that is not a per-query transport failure
    pub error: Option<String>,
}

impl BackendOutcome {
    pub const fn new(backend: BackendId, installed: bool) -> Self {
        Self {
            backend,
            installed,
            artifacts: Vec::new(),
            error: None,
        }
    }

    pub fn failed_artifacts(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| !a.status.is_success())
            .count()
    }
}

/// Summary of a whole collection run, written out as the run manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: uuid::Uuid,
    pub hostname: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub backends: Vec<BackendOutcome>,
    pub alerts: Vec<String>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            hostname: hostname.into(),
            started_at: Utc::now(),
            finished_at: None,
            backends: Vec::new(),
            alerts: Vec::new(),
            cancelled: false,
        }
    }

    /// Backends that were found installed.
    pub fn installed_backends(&self) -> impl Iterator<Item = BackendId> + '_ {
        self.backends
            .iter()
            .filter(|outcome| outcome.installed)
            .map(|outcome| outcome.backend)
    }

    pub fn artifact_count(&self) -> usize {
        self.backends.iter().map(|b| b.artifacts.len()).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.backends.iter().map(BackendOutcome::failed_artifacts).sum()
    }

    pub fn outcome(&self, backend: BackendId) -> Option<&BackendOutcome> {
        self.backends.iter().find(|b| b.backend == backend)
    }
}
