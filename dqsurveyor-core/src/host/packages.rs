use crate::collaborators::PackageQuery;
use async_trait::async_trait;
use std::path::PathBuf;

/// A snap counts as installed when `<sysroot>/snap/<name>/current` exists.
#[derive(Debug, Clone)]
pub struct SnapPackageQuery {
    sysroot: PathBuf,
}

impl SnapPackageQuery {
    pub fn new(sysroot: impl Into<PathBuf>) -> Self {
        Self {
            sysroot: sysroot.into(),
        }
    }
}

#[async_trait]
impl PackageQuery for SnapPackageQuery {
    async fn is_installed(&self, name: &str) -> bool {
        let current = self.sysroot.join("snap").join(name).join("current");
        let installed = tokio::fs::try_exists(&current).await.unwrap_or(false);
        tracing::debug!(package = name, installed, "Checked snap mount");
        installed
    }
}
