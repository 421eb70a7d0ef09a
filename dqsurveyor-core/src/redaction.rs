//! Redaction of sensitive values before artifacts are persisted.
//!
//! Rules are applied line by line: a rule can rewrite the inside of a line but
//! never adds, removes or reorders lines. Every default rule is idempotent, so
//! running the stage twice leaves the output of the first pass unchanged.
//!
//! # Default rules
//! - `kubeconfig-credentials`: certificate and token values in the MicroK8s
//!   client kubeconfig
//! - `secret-assignments`: `key=value"` tokens in any command output whose key
//!   mentions a password, key or secret
//! - `protected-config-keys`: configured keys in `ceph.conf` and in config
//!   table output, in `key = value`, JSON row and table cell form

use crate::hooks::MICROK8S_CREDENTIALS;
use crate::models::CollectionResult;
use crate::security::compile_glob;
use crate::{CollectError, Result};
use regex::Regex;
use std::borrow::Cow;
use std::path::PathBuf;

/// Replacement for every masked value.
pub const MASK: &str = "********";

/// MicroCeph's generated Ceph configuration.
pub const CEPH_CONF: &str = "/var/snap/microceph/current/conf/ceph.conf";

const KUBECONFIG_KEYS: &[&str] = &[
    "certificate-authority-data",
    "client-certificate-data",
    "client-key-data",
    "token",
];

/// Which artifacts a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    /// A copied file, by host path
    File(PathBuf),
    /// Command artifacts whose rendered command line matches a glob
    CommandGlob(String),
    /// Command artifacts whose suggested filename matches a glob
    SuggestedNameGlob(String),
}

/// A compiled pattern, its replacement and the artifacts it applies to.
#[derive(Debug, Clone)]
pub struct RedactionRule {
    pub name: String,
    pub target: TargetSelector,
    glob: Option<Regex>,
    pattern: Regex,
    replacement: String,
}

impl RedactionRule {
    /// Compiles a rule.
    ///
    /// `replacement` uses [`Regex::replace_all`] syntax (`${1}`, `${name}`).
    ///
    /// # Errors
    /// Returns a pattern error if the pattern or the selector glob is invalid.
    pub fn new(
        name: impl Into<String>,
        target: TargetSelector,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let glob = match &target {
            TargetSelector::File(_) => None,
            TargetSelector::CommandGlob(glob) | TargetSelector::SuggestedNameGlob(glob) => {
                Some(compile_glob(glob)?)
            }
        };
        let pattern = Regex::new(pattern).map_err(|e| CollectError::pattern(name.as_str(), e))?;

        Ok(Self {
            name,
            target,
            glob,
            pattern,
            replacement: replacement.into(),
        })
    }

    /// Whether this rule's selector matches the artifact.
    pub fn applies_to(&self, artifact: &CollectionResult) -> bool {
        let candidate = match &self.target {
            TargetSelector::File(path) => {
                return artifact.origin.file_path() == Some(path.as_path());
            }
            TargetSelector::CommandGlob(_) => artifact.origin.command_line(),
            TargetSelector::SuggestedNameGlob(_) => artifact.suggested_filename.as_deref(),
        };
        match (&self.glob, candidate) {
            (Some(glob), Some(candidate)) => glob.is_match(candidate),
            _ => false,
        }
    }

    /// Rewrites one line, counting matches whose replacement changes the text.
    fn mask_line<'a>(&self, line: &'a str, count: &mut usize) -> Cow<'a, str> {
        let mut changed = 0;
        for captures in self.pattern.captures_iter(line) {
            let mut expanded = String::new();
            captures.expand(&self.replacement, &mut expanded);
            if captures.get(0).map(|m| m.as_str()) != Some(expanded.as_str()) {
                changed += 1;
            }
        }
        if changed == 0 {
            return Cow::Borrowed(line);
        }
        *count += changed;
        self.pattern.replace_all(line, self.replacement.as_str())
    }
}

/// Splits a trailing `\n` or `\r\n` off a line.
fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Applies one rule to an artifact in place.
///
/// Returns the number of values masked; an artifact the rule does not select,
/// or that contains no match, is left untouched and yields 0.
pub fn redact(artifact: &mut CollectionResult, rule: &RedactionRule) -> usize {
    if !rule.applies_to(artifact) {
        return 0;
    }

    let mut count = 0;
    let mut redacted = String::with_capacity(artifact.output.len());
    for line in artifact.output.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        redacted.push_str(&rule.mask_line(body, &mut count));
        redacted.push_str(ending);
    }

    if count > 0 {
        tracing::debug!(
            rule = %rule.name,
            file = ?artifact.suggested_filename,
            count,
            "Masked sensitive values"
        );
        artifact.output = redacted;
        artifact.redactions += count;
    }
    count
}

/// Applies every rule to an artifact, returning the total number of masks.
pub fn apply_rules(artifact: &mut CollectionResult, rules: &[RedactionRule]) -> usize {
    rules.iter().map(|rule| redact(artifact, rule)).sum()
}

/// A key as a pattern fragment: case-insensitive, spaces and underscores
/// interchangeable as in Ceph option names.
fn key_pattern(key: &str) -> String {
    key.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|word| !word.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[ _]")
}

fn protected_key_rules(keys: &[String]) -> Result<Vec<RedactionRule>> {
    let alternatives: Vec<String> = keys
        .iter()
        .map(|key| key_pattern(key))
        .filter(|pattern| !pattern.is_empty())
        .collect();
    if alternatives.is_empty() {
        return Ok(Vec::new());
    }
    let keys = format!("(?:{})", alternatives.join("|"));

    let forms = [
        (format!(r"(?i)^(\s*{keys}\s*=\s*)(.*)$"), format!("${{1}}{MASK}")),
        (
            format!(r#"(?i)("{keys}"\s*,\s*)"(?:[^"\\]|\\.)*""#),
            format!(r#"${{1}}"{MASK}""#),
        ),
        // value is the last cell of a config row and may itself contain `|`
        (
            format!(r"(?i)(\|\s*{keys}\s*\|\s*).*?(\s*\|\s*)$"),
            format!("${{1}}{MASK}${{2}}"),
        ),
    ];
    let targets = [
        TargetSelector::File(PathBuf::from(CEPH_CONF)),
        TargetSelector::SuggestedNameGlob("*_config".to_string()),
    ];

    let mut rules = Vec::with_capacity(forms.len() * targets.len());
    for target in &targets {
        for (pattern, replacement) in &forms {
            rules.push(RedactionRule::new(
                "protected-config-keys",
                target.clone(),
                pattern,
                replacement.as_str(),
            )?);
        }
    }
    Ok(rules)
}

/// The built-in rule set.
///
/// # Errors
/// Returns a pattern error if a protected key produces an invalid pattern.
pub fn default_rules(protected_keys: &[String]) -> Result<Vec<RedactionRule>> {
    let mut rules = vec![
        RedactionRule::new(
            "kubeconfig-credentials",
            TargetSelector::File(PathBuf::from(MICROK8S_CREDENTIALS)),
            &format!(
                r"^(\s*#?\s*(?:{}):[ \t]*)(\S.*)$",
                KUBECONFIG_KEYS.join("|")
            ),
            format!("${{1}}{MASK}"),
        )?,
        RedactionRule::new(
            "secret-assignments",
            TargetSelector::CommandGlob("*".to_string()),
            r#"(?i)(?P<var>[^\s"=]*(?:pass|key|secret)[^\s"=]*)=(?P<open>"?)(?P<value>[^"]*)""#,
            format!(r#"${{var}}=${{open}}{MASK}""#),
        )?,
    ];
    rules.extend(protected_key_rules(protected_keys)?);
    Ok(rules)
}
