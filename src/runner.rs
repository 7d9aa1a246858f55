//! Script runner
//!
//! Non-interactive execution: inline code, a single file, or every script in
//! a directory. Command-line references and packages are resolved once per
//! run and handed to the unit as its baseline references.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::cache::CacheConfig;
use crate::error::ScriptError;
use crate::executor::{Executor, ExecutorConfig};
use crate::format::{format_value, FormatOptions};
use crate::resolver::DependencySpec;
use crate::result::{ExecutionResult, FaultDescriptor};
use crate::session::Session;
use crate::unit::{CompilationReference, ScriptMode, ScriptUnit};

/// Configuration for the script runner
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory relative references and inline code resolve against
    pub working_directory: PathBuf,
    /// Library files loaded before the script
    pub references: Vec<PathBuf>,
    /// Packages loaded before the script
    pub packages: Vec<DependencySpec>,
    /// Package root (`None`: `EMX_SCRIPT_PACKAGES`, else `./packages`)
    pub package_root: Option<PathBuf>,
    /// How inline code is compiled; files always run as scripts
    pub mode: ScriptMode,
    pub format: FormatOptions,
    pub cache: CacheConfig,
    /// Print a non-unit return value after the script finishes
    pub echo_result: bool,
    /// File extensions picked up by [`ScriptRunner::run_all`]
    pub extensions: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            working_directory: PathBuf::from("."),
            references: Vec::new(),
            packages: Vec::new(),
            package_root: None,
            mode: ScriptMode::Script,
            format: FormatOptions::default(),
            cache: CacheConfig::default(),
            echo_result: false,
            extensions: vec![".emxs".into()],
        }
    }
}

/// Result of running one script
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Script name (file name, or `<inline>`)
    pub name: String,
    pub result: ExecutionResult,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_success()
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.passed() { 0 } else { 1 }
    }
}

/// Result of running a directory of scripts
#[derive(Debug)]
pub struct RunSummary {
    pub outcomes: Vec<RunOutcome>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed())
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }

    /// Format a summary line
    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed ({}ms)",
            self.passed_count(),
            self.failed_count(),
            self.duration.as_millis(),
        )
    }
}

/// The script runner
#[derive(Debug)]
pub struct ScriptRunner {
    executor: Arc<Executor>,
    config: RunConfig,
}

impl ScriptRunner {
    /// Create a runner with its own executor built from `config`
    pub fn new(config: RunConfig) -> Self {
        let executor = Executor::new(ExecutorConfig {
            package_root: config.package_root.clone(),
            cache: config.cache,
            format: config.format,
            ..ExecutorConfig::default()
        });
        Self::with_executor(Arc::new(executor), config)
    }

    /// Create a runner around an existing executor
    pub fn with_executor(executor: Arc<Executor>, config: RunConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    fn baseline_specs(&self) -> Vec<DependencySpec> {
        self.config.references.iter()
            .cloned()
            .map(DependencySpec::File)
            .chain(self.config.packages.iter().cloned())
            .collect()
    }

    /// Resolve the configured references and packages.
    pub fn baseline(&self) -> Result<Vec<CompilationReference>, ScriptError> {
        Ok(self.executor.resolve(&self.baseline_specs(), &self.config.working_directory)?)
    }

    /// A REPL session starting from the configured references.
    pub fn session(&self) -> Result<Session, ScriptError> {
        Ok(Session::new(Arc::clone(&self.executor))
            .with_baseline(self.baseline()?)
            .with_working_directory(self.config.working_directory.clone()))
    }

    /// Run inline code in the configured mode.
    pub fn run_source(&self, source: &str, out: &mut dyn Write) -> Result<RunOutcome, ScriptError> {
        let unit = ScriptUnit::new(source, self.config.mode)
            .with_working_directory(self.config.working_directory.clone());
        self.run_unit("<inline>", unit, out)
    }

    /// Run a script file; its `#r` paths resolve against its own directory.
    pub fn run_file(&self, path: &Path, out: &mut dyn Write) -> Result<RunOutcome, ScriptError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ScriptError::from(e).with_file(path.display().to_string()))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => self.config.working_directory.clone(),
        };
        let name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let unit = ScriptUnit::new(source, ScriptMode::Script).with_working_directory(dir);
        self.run_unit(&name, unit, out)
    }

    fn run_unit(&self, name: &str, unit: ScriptUnit, out: &mut dyn Write) -> Result<RunOutcome, ScriptError> {
        let start = Instant::now();
        let result = match self.executor.resolve(&self.baseline_specs(), &self.config.working_directory) {
            Ok(baseline) => {
                let unit = unit.with_references(baseline);
                self.executor.execute(Some(&unit), None, out)?
            }
            Err(e) => ExecutionResult::failure(FaultDescriptor::from(&e)),
        };

        if self.config.echo_result {
            if let Some(value) = result.return_value().filter(|v| !v.is_unit()) {
                writeln!(out, "{}", format_value(value, &self.config.format))?;
            }
        }

        Ok(RunOutcome {
            name: name.to_string(),
            result,
            duration: start.elapsed(),
        })
    }

    /// Discover script files directly inside `dir`, sorted by name
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("script directory not found: {}", dir.display()),
            ));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if self.config.extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Run every script in `dir`, each against a fresh state.
    pub fn run_all(&self, dir: &Path, out: &mut dyn Write) -> Result<RunSummary, ScriptError> {
        let start = Instant::now();
        let mut outcomes = Vec::new();
        for file in self.discover(dir)? {
            outcomes.push(self.run_file(&file, out)?);
        }
        Ok(RunSummary {
            outcomes,
            duration: start.elapsed(),
        })
    }
}

/// Builder API for convenient runner construction
#[derive(Debug, Default)]
pub struct ScriptRunnerBuilder {
    config: RunConfig,
    executor: Option<Arc<Executor>>,
}

impl ScriptRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_directory = dir.into();
        self
    }

    /// Add a library file loaded before the script
    pub fn reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.references.push(path.into());
        self
    }

    /// Add a package loaded before the script
    pub fn package(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.packages.push(DependencySpec::package(name, version));
        self
    }

    /// Add already-parsed dependency specs
    pub fn dependencies(mut self, specs: Vec<DependencySpec>) -> Self {
        self.config.packages.extend(specs);
        self
    }

    pub fn package_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.package_root = Some(root.into());
        self
    }

    pub fn mode(mut self, mode: ScriptMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn format(mut self, format: FormatOptions) -> Self {
        self.config.format = format;
        self
    }

    pub fn cache_failures(mut self, cache_failures: bool) -> Self {
        self.config.cache.cache_failures = cache_failures;
        self
    }

    pub fn echo_result(mut self, echo: bool) -> Self {
        self.config.echo_result = echo;
        self
    }

    pub fn extensions(mut self, exts: Vec<String>) -> Self {
        self.config.extensions = exts;
        self
    }

    /// Use a shared executor instead of building one
    pub fn executor(mut self, executor: Arc<Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> ScriptRunner {
        match self.executor {
            Some(executor) => ScriptRunner::with_executor(executor, self.config),
            None => ScriptRunner::new(self.config),
        }
    }
}

/// Run every script in `dir` and panic if any of them fails.
///
/// Meant for `#[test]` functions; per-script results go to stderr.
pub fn run_and_assert(dir: impl AsRef<Path>) {
    run_and_assert_with(dir, |b| b)
}

/// Like [`run_and_assert`] but allows runner customization.
pub fn run_and_assert_with(dir: impl AsRef<Path>, customize: impl FnOnce(ScriptRunnerBuilder) -> ScriptRunnerBuilder) {
    let dir = dir.as_ref();
    let runner = customize(ScriptRunnerBuilder::new().working_directory(dir)).build();
    let mut out = Vec::new();
    let summary = match runner.run_all(dir, &mut out) {
        Ok(summary) => summary,
        Err(e) => panic!("failed to run scripts in {}: {}", dir.display(), e),
    };

    for outcome in &summary.outcomes {
        match outcome.result.fault() {
            None => eprintln!("PASS  {} ({}ms)", outcome.name, outcome.duration.as_millis()),
            Some(fault) => {
                eprintln!("FAIL  {}", outcome.name);
                eprintln!("  {}", fault);
            }
        }
    }
    eprintln!("{}", summary.summary());

    if !summary.all_passed() {
        panic!("{} script(s) failed", summary.failed_count());
    }
}
