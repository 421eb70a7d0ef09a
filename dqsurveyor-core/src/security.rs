//! Secret exclusion at planning time.
//!
//! Some files must never leave the host: keyrings, private keys and bind
//! passwords. Paths matching the forbidden list are dropped before a copy step
//! is even planned, so no artifact can be produced from them. Redaction
//! (see [`crate::redaction`]) only handles fields that must be collected.

use crate::{CollectError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Glob patterns for paths that are never collected.
pub const FORBIDDEN_PATH_GLOBS: &[&str] = &[
    "*keyring*",
    "*.key",
    "*ca_key*",
    "*bindpass*",
    "*/credentials/*token*",
];

/// Compiles a shell-style glob (`*` and `?` only) into an anchored regex.
pub(crate) fn compile_glob(glob: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| CollectError::pattern(glob, e))
}

/// Pre-compiled forbidden path patterns.
///
/// Uses `OnceLock` for thread-safe lazy initialization.
#[derive(Debug)]
pub struct ForbiddenPaths {
    patterns: Vec<Regex>,
}

impl ForbiddenPaths {
    /// Gets the singleton instance built from [`FORBIDDEN_PATH_GLOBS`].
    pub fn instance() -> &'static Self {
        static PATTERNS: OnceLock<ForbiddenPaths> = OnceLock::new();
        PATTERNS.get_or_init(|| Self {
            // The globs are constants; one that fails to compile is skipped
            // rather than taking the whole run down.
            patterns: FORBIDDEN_PATH_GLOBS
                .iter()
                .filter_map(|glob| compile_glob(glob).ok())
                .collect(),
        })
    }

    /// Checks whether a path must never be collected.
    pub fn is_forbidden(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.patterns.iter().any(|pattern| pattern.is_match(&text))
    }
}
