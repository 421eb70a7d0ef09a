use super::rooted;
use crate::collaborators::OutputSink;
use crate::models::{CollectionResult, Origin, RunSummary};
use crate::{CollectError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Command output lands below this directory, one subdirectory per backend.
pub const COMMANDS_DIR: &str = "sos_commands/dqlite";

/// Run manifest file name, at the top of the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Turns a suggested filename into a safe single path component.
///
/// Runs of characters outside `[A-Za-z0-9_.-]` collapse to one `_`, and
/// leading or trailing `.`, `_` and `-` are stripped. The result is never
/// empty.
pub fn mangle_filename(name: &str) -> String {
    let mut mangled = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            mangled.push(c);
            in_run = false;
        } else if !in_run {
            mangled.push('_');
            in_run = true;
        }
    }

    let trimmed = mangled.trim_matches(|c| matches!(c, '.' | '_' | '-'));
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Writes artifacts into a directory laid out like an sos report.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where an artifact is written.
    pub fn path_for(&self, result: &CollectionResult) -> PathBuf {
        match &result.origin {
            Origin::File { path } => rooted(&self.root, path),
            Origin::Command { .. } => {
                let mut path = self.root.join(COMMANDS_DIR);
                if let Some(subdir) = &result.subdir {
                    path.push(mangle_filename(subdir));
                }
                let name = result
                    .suggested_filename
                    .as_deref()
                    .unwrap_or(result.backend.as_str());
                path.push(mangle_filename(name));
                path
            }
        }
    }

    /// Writes the run summary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the summary cannot be serialized or written.
    pub async fn write_manifest(&self, summary: &RunSummary) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| CollectError::serialization("run manifest", e))?;
        let path = self.root.join(MANIFEST_FILE);
        write_file(&path, json.as_bytes()).await?;
        Ok(path)
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            CollectError::io(format!("Failed to create {}", parent.display()), e)
        })?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| CollectError::io(format!("Failed to write to {}", path.display()), e))
}

#[async_trait]
impl OutputSink for DirectorySink {
    async fn emit(&self, result: &CollectionResult) -> Result<()> {
        let path = self.path_for(result);
        write_file(&path, result.output.as_bytes()).await?;
        tracing::debug!(path = %path.display(), bytes = result.output.len(), "Wrote artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BackendId, CollectionChannel, CollectionStatus, CommandLine};

    #[test]
    fn test_mangle_filename() {
        assert_eq!(
            mangle_filename("microceph cluster sql_config"),
            "microceph_cluster_sql_config"
        );
        assert_eq!(
            mangle_filename("microk8s_dqlite_.describe_10.0.0.1:7000"),
            "microk8s_dqlite_.describe_10.0.0.1_7000"
        );
        assert_eq!(mangle_filename(".cluster"), "cluster");
        assert_eq!(mangle_filename("a  //  b"), "a_b");
        assert_eq!(mangle_filename("../.."), "unnamed");
    }

    #[test]
    fn test_mangle_filename_is_deterministic() {
        let name = "lxd sql local_schema";
        assert_eq!(mangle_filename(name), mangle_filename(name));
        assert_eq!(mangle_filename(&mangle_filename(name)), mangle_filename(name));
    }

    #[tokio::test]
    async fn test_emit_command_and_file_layout() {
        let out = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(out.path());

        let command = CollectionResult::from_command(
            BackendId::Lxd,
            &CommandLine::new("lxd").args(["sql", "local", "SELECT 1;"]),
            CollectionChannel::CliWrapper,
            "lxd sql local_schema",
            "rows\n".to_string(),
            CollectionStatus::Succeeded,
        );
        sink.emit(&command).await.unwrap();
        let written = out
            .path()
            .join("sos_commands/dqlite/lxd/lxd_sql_local_schema");
        assert_eq!(std::fs::read_to_string(written).unwrap(), "rows\n");

        let file = CollectionResult::from_file(
            BackendId::Lxd,
            PathBuf::from("/var/snap/lxd/common/lxd/database/global/info.yaml"),
            "id: 1\n".to_string(),
        );
        sink.emit(&file).await.unwrap();
        let mirrored = out
            .path()
            .join("var/snap/lxd/common/lxd/database/global/info.yaml");
        assert_eq!(std::fs::read_to_string(mirrored).unwrap(), "id: 1\n");
    }

    #[tokio::test]
    async fn test_write_manifest() {
        let out = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(out.path());
        let summary = RunSummary::new("node-1");

        let path = sink.write_manifest(&summary).await.unwrap();
        let decoded: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(decoded, summary);
    }
}
