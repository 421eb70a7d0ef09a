//! Core data structures and collection logic for DQSurveyor.
//!
//! This crate gathers diagnostics from the dqlite databases embedded in
//! MicroCeph, MicroOVN, MicroCloud, MicroK8s and LXD. It knows where each
//! backend keeps its database and control socket, which queries are worth
//! running against it, and which values must be masked before anything is
//! written out.
//!
//! # Security Guarantees
//! - Only `SELECT` queries and dqlite shell inspection commands are issued
//! - Keyrings and private keys are excluded when the collection is planned
//! - Remaining secrets are masked by the redaction stage before persistence
//! - Collected output is never logged
//!
//! # Architecture
//! - [`registry`]: static per-backend configuration and capability flags
//! - [`planner`]: pure query planning from declared capabilities
//! - [`hooks`]: backend-specific extensions to the plan
//! - [`transport`]: socket (`curl --unix-socket`) and SQL wrapper transports
//! - [`redaction`]: line-wise masking rules
//! - [`collector`]: the run itself, driven through the [`collaborators`] traits
//! - [`host`]: implementations of those traits for a real or mounted host

pub mod collaborators;
pub mod collector;
pub mod config;
pub mod error;
pub mod hooks;
pub mod host;
pub mod logging;
pub mod models;
pub mod planner;
pub mod redaction;
pub mod registry;
pub mod security;
pub mod transport;

// Re-export commonly used types
pub use collector::{Collaborators, Collector};
pub use config::CollectionConfig;
pub use error::{CollectError, Result};
pub use logging::{LogFormat, init_logging};
pub use models::{
    ArtifactRecord, BackendId, BackendOutcome, CollectionChannel, CollectionResult,
    CollectionStatus, CollectionStep, CommandLine, CommandOutput, PlannedQuery, QueryPlan,
    RunSummary,
};
pub use registry::{BackendConfig, Capabilities, HookKind, Registry, RegistryContext};
