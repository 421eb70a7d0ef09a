//! The collection run.
//!
//! For every registry backend the configuration selects, the collector asks
//! whether it is installed, runs the base collection, submits the query plan
//! through the transports, then runs the backend's extension hook. Every
//! artifact passes through the redaction stage before it reaches the sink.
//!
//! Steps run one at a time. Cancellation is checked before each step; a
//! command already in flight is allowed to finish.

use crate::collaborators::{Alerter, CommandRunner, FileReader, OutputSink, PackageQuery};
use crate::config::CollectionConfig;
use crate::hooks::HookContext;
use crate::models::{
    BackendOutcome, CollectionChannel, CollectionResult, CollectionStatus, CollectionStep,
    RunSummary,
};
use crate::planner;
use crate::redaction::{RedactionRule, apply_rules, default_rules};
use crate::registry::{BackendConfig, Registry};
use crate::security::ForbiddenPaths;
use crate::transport::{self, Invocation};
use crate::{CollectError, Result};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// The host services a run needs.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub packages: &'a dyn PackageQuery,
    pub runner: &'a dyn CommandRunner,
    pub files: &'a dyn FileReader,
    pub sink: &'a dyn OutputSink,
    pub alerts: &'a dyn Alerter,
}

/// Forwards alerts and keeps a copy for the run summary.
struct RecordingAlerter<'a> {
    inner: &'a dyn Alerter,
    messages: Mutex<Vec<String>>,
}

impl<'a> RecordingAlerter<'a> {
    fn new(inner: &'a dyn Alerter) -> Self {
        Self {
            inner,
            messages: Mutex::new(Vec::new()),
        }
    }

    fn into_messages(self) -> Vec<String> {
        self.messages
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Alerter for RecordingAlerter<'_> {
    fn alert(&self, message: &str) {
        self.inner.alert(message);
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/// Drives one collection run.
pub struct Collector<'a> {
    config: CollectionConfig,
    registry: Registry,
    rules: Vec<RedactionRule>,
    host: Collaborators<'a>,
}

impl<'a> Collector<'a> {
    /// Validates the configuration and compiles the redaction rules.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid config, or a pattern
    /// error if a protected key cannot be turned into a redaction rule.
    pub fn new(config: CollectionConfig, host: Collaborators<'a>) -> Result<Self> {
        config.validate()?;
        let registry = Registry::new((&config).into());
        let rules = default_rules(&config.protected_config_keys)?;
        Ok(Self {
            config,
            registry,
            rules,
            host,
        })
    }

    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    pub const fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Collects from every selected backend.
    ///
    /// Never fails: per-step failures are recorded on the artifacts, and
    /// anything else that stops a backend is recorded on its outcome.
    pub async fn run(&self, cancel: &CancellationToken) -> RunSummary {
        let mut summary = RunSummary::new(self.registry.hostname());
        let alerts = RecordingAlerter::new(self.host.alerts);

        tracing::info!(
            run_id = %summary.run_id,
            hostname = %summary.hostname,
            sysroot = %self.registry.sysroot().display(),
            "Starting dqlite collection"
        );

        for backend in self.registry.iter() {
            if !self.config.selects(backend.id) {
                continue;
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let installed = self.host.packages.is_installed(backend.id.as_str()).await;
            let mut outcome = BackendOutcome::new(backend.id, installed);
            if !installed {
                tracing::debug!(backend = %backend.id, "Not installed, skipping");
                summary.backends.push(outcome);
                continue;
            }

            match self.collect_backend(backend, &mut outcome, &alerts, cancel).await {
                Ok(()) => {}
                Err(CollectError::Cancelled) => {
                    tracing::warn!(backend = %backend.id, "Collection cancelled");
                    summary.cancelled = true;
                }
                Err(e) => {
                    tracing::error!(backend = %backend.id, error = %e, "Backend collection failed");
                    outcome.error = Some(e.to_string());
                }
            }

            tracing::info!(
                backend = %backend.id,
                artifacts = outcome.artifacts.len(),
                failed = outcome.failed_artifacts(),
                "Backend collection finished"
            );
            summary.backends.push(outcome);

            if summary.cancelled {
                break;
            }
        }

        summary.alerts = alerts.into_messages();
        summary.finished_at = Some(chrono::Utc::now());
        summary
    }

    async fn collect_backend(
        &self,
        backend: &BackendConfig,
        outcome: &mut BackendOutcome,
        alerts: &dyn Alerter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let plan = planner::plan(backend);
        let hook = backend.extension_hook();
        tracing::info!(
            backend = %backend.id,
            queries = plan.len(),
            hook = hook.name(),
            "Collecting backend"
        );

        for step in planner::base_collection(backend) {
            ensure_active(cancel)?;
            self.run_step(backend, step, outcome).await;
        }

        for planned in &plan {
            ensure_active(cancel)?;
            let results = transport::execute_query(
                self.host.runner,
                backend,
                planned,
                self.config.use_cli_transport,
            )
            .await?;
            for result in results {
                self.finish(result, outcome).await;
            }
        }

        ensure_active(cancel)?;
        let ctx = HookContext {
            backend,
            files: self.host.files,
            alerts,
        };
        for step in hook.custom_steps(&ctx).await? {
            ensure_active(cancel)?;
            self.run_step(backend, step, outcome).await;
        }

        Ok(())
    }

    async fn run_step(
        &self,
        backend: &BackendConfig,
        step: CollectionStep,
        outcome: &mut BackendOutcome,
    ) {
        let result = match step {
            CollectionStep::Command {
                command,
                suggested_filename,
            } => {
                let invocation = Invocation {
                    command,
                    suggested_filename,
                    channel: CollectionChannel::Command,
                };
                Some(transport::execute(self.host.runner, backend.id, invocation).await)
            }
            CollectionStep::CopyFile { path } => self.copy_file(backend, &path).await,
        };

        if let Some(result) = result {
            self.finish(result, outcome).await;
        }
    }

    async fn copy_file(&self, backend: &BackendConfig, path: &Path) -> Option<CollectionResult> {
        if ForbiddenPaths::instance().is_forbidden(path) {
            tracing::warn!(path = %path.display(), "Refusing to copy forbidden path");
            return None;
        }

        match self.host.files.read(path).await {
            Ok(Some(contents)) => Some(CollectionResult::from_file(
                backend.id,
                path.to_path_buf(),
                contents,
            )),
            Ok(None) => {
                tracing::debug!(path = %path.display(), "File not present, skipping copy");
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to copy file");
                let mut result =
                    CollectionResult::from_file(backend.id, path.to_path_buf(), String::new());
                result.status = CollectionStatus::Failed {
                    reason: e.to_string(),
                };
                Some(result)
            }
        }
    }

    /// Redacts, persists and records one artifact.
    async fn finish(&self, mut result: CollectionResult, outcome: &mut BackendOutcome) {
        apply_rules(&mut result, &self.rules);

        if result.has_content()
            && let Err(e) = self.host.sink.emit(&result).await
        {
            tracing::error!(
                file = ?result.suggested_filename,
                error = %e,
                "Failed to persist artifact"
            );
            result.status = CollectionStatus::Failed {
                reason: e.to_string(),
            };
        }

        outcome.artifacts.push(result.record());
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(CollectError::Cancelled)
    } else {
        Ok(())
    }
}
