//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use dqsurveyor_core::collaborators::{
    Alerter, CommandRunner, FileReader, OutputSink, PackageQuery,
};
use dqsurveyor_core::host::AlertLog;
use dqsurveyor_core::{CollectError, CollectionResult, CommandLine, CommandOutput, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub(crate) struct InstalledPackages(pub(crate) HashSet<String>);

impl InstalledPackages {
    pub(crate) fn of(names: &[&str]) -> Self {
        Self(names.iter().map(|name| (*name).to_string()).collect())
    }
}

#[async_trait]
impl PackageQuery for InstalledPackages {
    async fn is_installed(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

type Responder = Box<dyn Fn(&CommandLine) -> Result<CommandOutput> + Send + Sync>;

/// Answers commands through a closure and remembers every command it saw.
pub(crate) struct ScriptedRunner {
    respond: Responder,
    pub(crate) seen: Mutex<Vec<CommandLine>>,
}

impl ScriptedRunner {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&CommandLine) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Succeeds with a fixed output for every command.
    pub(crate) fn always(stdout: &'static str) -> Self {
        Self::new(move |_| Ok(ok(stdout)))
    }

    pub(crate) fn commands(&self) -> Vec<CommandLine> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput> {
        self.seen.lock().unwrap().push(command.clone());
        (self.respond)(command)
    }
}

pub(crate) fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
    }
}

pub(crate) fn refused(command: &CommandLine) -> CollectError {
    CollectError::CommandSpawn {
        command: command.program.clone(),
        source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
    }
}

/// Host files keyed by absolute host path.
#[derive(Default)]
pub(crate) struct MemoryFiles {
    files: HashMap<PathBuf, String>,
    unreadable: HashSet<PathBuf>,
    pub(crate) reads: Mutex<Vec<PathBuf>>,
}

impl MemoryFiles {
    pub(crate) fn with(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(PathBuf::from(path), contents.to_string());
        self
    }

    pub(crate) fn unreadable(mut self, path: &str) -> Self {
        self.unreadable.insert(PathBuf::from(path));
        self
    }

    pub(crate) fn read_paths(&self) -> Vec<PathBuf> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileReader for MemoryFiles {
    async fn read(&self, path: &Path) -> Result<Option<String>> {
        self.reads.lock().unwrap().push(path.to_path_buf());
        if self.unreadable.contains(path) {
            return Err(CollectError::io(
                format!("Failed to read {}", path.display()),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            ));
        }
        Ok(self.files.get(path).cloned())
    }
}

#[derive(Default)]
pub(crate) struct MemorySink {
    pub(crate) emitted: Mutex<Vec<CollectionResult>>,
}

impl MemorySink {
    pub(crate) fn results(&self) -> Vec<CollectionResult> {
        self.emitted.lock().unwrap().clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.results()
            .into_iter()
            .filter_map(|result| result.suggested_filename)
            .collect()
    }

    pub(crate) fn find(&self, name: &str) -> Option<CollectionResult> {
        self.results()
            .into_iter()
            .find(|result| result.suggested_filename.as_deref() == Some(name))
    }

    pub(crate) fn file(&self, path: &str) -> Option<CollectionResult> {
        self.results()
            .into_iter()
            .find(|result| result.origin.file_path() == Some(Path::new(path)))
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn emit(&self, result: &CollectionResult) -> Result<()> {
        self.emitted.lock().unwrap().push(result.clone());
        Ok(())
    }
}

/// Everything a collector needs, owned in one place.
pub(crate) struct FakeHost {
    pub(crate) packages: InstalledPackages,
    pub(crate) runner: ScriptedRunner,
    pub(crate) files: MemoryFiles,
    pub(crate) sink: MemorySink,
    pub(crate) alerts: AlertLog,
}

impl FakeHost {
    pub(crate) fn new(
        packages: InstalledPackages,
        runner: ScriptedRunner,
        files: MemoryFiles,
    ) -> Self {
        Self {
            packages,
            runner,
            files,
            sink: MemorySink::default(),
            alerts: AlertLog::new(),
        }
    }

    pub(crate) fn collaborators(&self) -> dqsurveyor_core::Collaborators<'_> {
        dqsurveyor_core::Collaborators {
            packages: &self.packages,
            runner: &self.runner,
            files: &self.files,
            sink: &self.sink,
            alerts: &self.alerts as &dyn Alerter,
        }
    }
}
