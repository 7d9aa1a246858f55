//! Interactive session
//!
//! A [`Session`] owns a [`SessionState`] and feeds each submission to the
//! [`Executor`] against it. Successful submissions are committed; failed
//! ones leave the state exactly as it was.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use crate::bindings::Bindings;
use crate::error::ScriptError;
use crate::executor::{ExecutionOutcome, Executor};
use crate::result::ExecutionResult;
use crate::unit::{CompilationReference, ScriptMode, ScriptUnit};

/// Everything accumulated by a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    history: Vec<ScriptUnit>,
    baseline: Vec<CompilationReference>,
    /// References whose libraries have been run into `bindings`
    loaded: Vec<CompilationReference>,
    usings: Vec<String>,
    bindings: Bindings,
    generation: u64,
}

impl SessionState {
    /// Fresh state whose reference set starts at `baseline`.
    ///
    /// Baseline libraries are loaded with the first accepted submission, and
    /// again with the first one after every reset.
    pub fn new(baseline: Vec<CompilationReference>) -> Self {
        Self {
            baseline,
            ..Self::default()
        }
    }

    /// Accepted units, oldest first
    pub fn history(&self) -> &[ScriptUnit] {
        &self.history
    }

    /// The accumulated reference set: baseline first, then later additions.
    pub fn references(&self) -> Vec<CompilationReference> {
        let mut refs = self.baseline.clone();
        for r in &self.loaded {
            if !refs.contains(r) {
                refs.push(r.clone());
            }
        }
        refs
    }

    /// References already loaded into the bindings
    pub fn loaded_references(&self) -> &[CompilationReference] {
        &self.loaded
    }

    pub fn baseline(&self) -> &[CompilationReference] {
        &self.baseline
    }

    pub fn usings(&self) -> &[String] {
        &self.usings
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when nothing has been accumulated past the baseline.
    pub fn is_clean(&self) -> bool {
        self.history.is_empty()
            && self.bindings.is_empty()
            && self.usings.is_empty()
            && self.loaded.is_empty()
    }

    fn commit(&mut self, unit: ScriptUnit, outcome: ExecutionOutcome) {
        let ExecutionOutcome { result, bindings } = outcome;
        let (ExecutionResult::Success { side_effects, .. }, Some(bindings)) = (result, bindings) else {
            return;
        };
        for using in side_effects.usings {
            if !self.usings.contains(&using) {
                self.usings.push(using);
            }
        }
        for reference in side_effects.references {
            if !self.loaded.contains(&reference) {
                self.loaded.push(reference);
            }
        }
        self.bindings = bindings;
        self.history.push(unit);
        self.generation += 1;
    }

    fn reset(&mut self) {
        if self.is_clean() {
            return;
        }
        self.history.clear();
        self.usings.clear();
        self.bindings.clear();
        self.loaded.clear();
        self.generation += 1;
    }
}

/// A REPL session
#[derive(Debug)]
pub struct Session {
    executor: Arc<Executor>,
    state: SessionState,
    working_directory: PathBuf,
}

impl Session {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self {
            executor,
            state: SessionState::default(),
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Start from `references` and return to them on every reset.
    pub fn with_baseline(mut self, references: Vec<CompilationReference>) -> Self {
        self.state = SessionState::new(references);
        self
    }

    /// Directory `#r` paths in submissions are resolved against.
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    pub fn bindings(&self) -> &Bindings {
        &self.state.bindings
    }

    /// Compile and run `source` as a REPL submission.
    pub fn submit(&mut self, source: &str, out: &mut dyn Write) -> ExecutionResult {
        let unit = ScriptUnit::new(source, ScriptMode::Repl)
            .with_working_directory(self.working_directory.clone())
            .with_references(self.state.baseline.clone());
        self.accept(unit, out)
    }

    /// Submit a prepared unit; an absent unit is a precondition error.
    pub fn submit_unit(&mut self, unit: Option<ScriptUnit>, out: &mut dyn Write) -> Result<ExecutionResult, ScriptError> {
        let unit = unit.ok_or_else(|| ScriptError::precondition("script unit"))?;
        Ok(self.accept(unit, out))
    }

    fn accept(&mut self, unit: ScriptUnit, out: &mut dyn Write) -> ExecutionResult {
        let outcome = self.executor.run(&unit, Some(&self.state), out);
        let result = outcome.result.clone();
        if result.is_success() {
            self.state.commit(unit, outcome);
            debug!(generation = self.state.generation, bindings = self.state.bindings.len(), "submission committed");
        }
        result
    }

    /// Discard everything accumulated. Does not touch any output.
    pub fn reset(&mut self) {
        self.state.reset();
        debug!(generation = self.state.generation, "session reset");
    }
}
