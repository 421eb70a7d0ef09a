//! Host implementations of the collaborator traits.
//!
//! These are what the `dqsurveyor-collect` binary wires together. All
//! filesystem access is relative to a sysroot so a mounted image of another
//! machine can be inspected; commands always run on the live host.
//!
//! # Module Structure
//! - `process`: command execution with a per-command timeout
//! - `packages`: installed checks against the snap mount directory
//! - `files`: sysroot-aware file reads
//! - `sink`: the on-disk artifact layout and run manifest
//! - `alerts`: collected warnings

mod alerts;
mod files;
mod packages;
mod process;
mod sink;

pub use alerts::AlertLog;
pub use files::SysrootFileReader;
pub use packages::SnapPackageQuery;
pub use process::TokioCommandRunner;
pub use sink::{COMMANDS_DIR, DirectorySink, MANIFEST_FILE, mangle_filename};

use std::path::{Component, Path, PathBuf};

/// Joins a host absolute path onto a root, dropping `..` and prefix
/// components so the result can never escape the root.
pub(crate) fn rooted(root: &Path, host_path: &Path) -> PathBuf {
    let mut joined = root.to_path_buf();
    for component in host_path.components() {
        if let Component::Normal(part) = component {
            joined.push(part);
        }
    }
    joined
}
