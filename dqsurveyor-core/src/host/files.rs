use super::rooted;
use crate::collaborators::FileReader;
use crate::{CollectError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reads host paths below a sysroot.
#[derive(Debug, Clone)]
pub struct SysrootFileReader {
    sysroot: PathBuf,
}

impl SysrootFileReader {
    pub fn new(sysroot: impl Into<PathBuf>) -> Self {
        Self {
            sysroot: sysroot.into(),
        }
    }

    /// Where a host path lives under the sysroot.
    pub fn resolve(&self, host_path: &Path) -> PathBuf {
        rooted(&self.sysroot, host_path)
    }
}

#[async_trait]
impl FileReader for SysrootFileReader {
    async fn read(&self, path: &Path) -> Result<Option<String>> {
        let resolved = self.resolve(path);
        match tokio::fs::read(&resolved).await {
            // Text is all that gets collected; invalid UTF-8 is replaced
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CollectError::io(
                format!("Failed to read {}", resolved.display()),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_below_sysroot() {
        let sysroot = tempfile::tempdir().unwrap();
        let db = sysroot.path().join("var/snap/lxd/common/lxd/database/global");
        std::fs::create_dir_all(&db).unwrap();
        std::fs::write(db.join("info.yaml"), "id: 1\n").unwrap();

        let reader = SysrootFileReader::new(sysroot.path());
        let contents = reader
            .read(Path::new("/var/snap/lxd/common/lxd/database/global/info.yaml"))
            .await
            .unwrap();
        assert_eq!(contents.as_deref(), Some("id: 1\n"));
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let sysroot = tempfile::tempdir().unwrap();
        let reader = SysrootFileReader::new(sysroot.path());
        assert!(reader.read(Path::new("/etc/missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_directory_is_an_io_error() {
        let sysroot = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(sysroot.path().join("etc/dir")).unwrap();
        let reader = SysrootFileReader::new(sysroot.path());
        let err = reader.read(Path::new("/etc/dir")).await.unwrap_err();
        assert!(matches!(err, CollectError::Io { .. }));
    }
}
