//! Script executor
//!
//! One submission goes through four phases:
//!
//! 1. strip `#r` directives off the head of the source
//! 2. resolve the declared dependencies
//! 3. compile through the [`CompilationCache`]
//! 4. run on a copy of the prior bindings
//!
//! Every script-level failure comes back as [`ExecutionResult::Failure`].
//! Only caller misuse (an absent unit) is a [`ScriptError`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use crate::backend::interp::{Machine, Unwind};
use crate::backend::{CompileRequest, Compiler, ScriptCompiler};
use crate::bindings::Bindings;
use crate::cache::{CacheConfig, CacheKey, CompilationCache};
use crate::cancel::CancellationToken;
use crate::directives;
use crate::error::ScriptError;
use crate::format::FormatOptions;
use crate::resolver::{DependencySpec, LocalPackageSource, PackageSource, ResolutionError, Resolver};
use crate::result::{Effects, ExecutionResult, FaultDescriptor};
use crate::session::SessionState;
use crate::unit::{CompilationReference, ScriptUnit};

/// Default limit on nested function calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Package root; `None` reads `EMX_SCRIPT_PACKAGES`, else `./packages`
    pub package_root: Option<PathBuf>,
    pub cache: CacheConfig,
    pub format: FormatOptions,
    pub max_call_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            package_root: None,
            cache: CacheConfig::default(),
            format: FormatOptions::default(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// A result plus the bindings the run left behind
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub result: ExecutionResult,
    /// Post-run globals; `Some` only on success
    pub bindings: Option<Bindings>,
}

impl ExecutionOutcome {
    fn failed(fault: FaultDescriptor) -> Self {
        Self {
            result: ExecutionResult::failure(fault),
            bindings: None,
        }
    }
}

/// Compiles and runs script units
pub struct Executor {
    config: ExecutorConfig,
    compiler: Arc<dyn Compiler>,
    cache: Arc<CompilationCache>,
    resolver: Resolver,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl Executor {
    /// Executor with the bundled compiler, a fresh cache and local packages.
    pub fn new(config: ExecutorConfig) -> Self {
        let source = match config.package_root {
            Some(ref root) => LocalPackageSource::new(root),
            None => LocalPackageSource::from_env(),
        };
        Self {
            cache: Arc::new(CompilationCache::new(config.cache)),
            compiler: Arc::new(ScriptCompiler::new()),
            resolver: Resolver::new(Arc::new(source)),
            cancel: CancellationToken::new(),
            config,
        }
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Share a cache with other executors.
    pub fn with_cache(mut self, cache: Arc<CompilationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_package_source(mut self, source: Arc<dyn PackageSource>) -> Self {
        self.resolver = Resolver::new(source);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CompilationCache> {
        &self.cache
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolve specs with this executor's package source.
    pub fn resolve(
        &self,
        specs: &[DependencySpec],
        working_directory: &Path,
    ) -> Result<Vec<CompilationReference>, ResolutionError> {
        self.resolver.resolve(specs, working_directory)
    }

    /// Execute `unit` on top of `prior`.
    ///
    /// Fails only when `unit` is absent.
    pub fn execute(
        &self,
        unit: Option<&ScriptUnit>,
        prior: Option<&SessionState>,
        out: &mut dyn Write,
    ) -> Result<ExecutionResult, ScriptError> {
        self.execute_with_state(unit, prior, out).map(|outcome| outcome.result)
    }

    /// Like [`execute`](Self::execute), also returning the post-run bindings.
    pub fn execute_with_state(
        &self,
        unit: Option<&ScriptUnit>,
        prior: Option<&SessionState>,
        out: &mut dyn Write,
    ) -> Result<ExecutionOutcome, ScriptError> {
        let unit = unit.ok_or_else(|| ScriptError::precondition("script unit"))?;
        Ok(self.run(unit, prior, out))
    }

    pub(crate) fn run(
        &self,
        unit: &ScriptUnit,
        prior: Option<&SessionState>,
        out: &mut dyn Write,
    ) -> ExecutionOutcome {
        if self.cancel.is_cancelled() {
            return ExecutionOutcome::failed(FaultDescriptor::cancelled());
        }

        let extracted = match directives::extract(unit.source_text()) {
            Ok(d) => d,
            Err(diagnostic) => return ExecutionOutcome::failed(FaultDescriptor::compilation(&[diagnostic])),
        };

        let resolved = match self.resolver.resolve(&extracted.specs, unit.working_directory()) {
            Ok(refs) => refs,
            Err(e) => {
                debug!(error = %e, "resolution failed");
                return ExecutionOutcome::failed(FaultDescriptor::from(&e));
            }
        };

        let prior_refs: &[CompilationReference] = prior.map(|s| s.loaded_references()).unwrap_or(&[]);
        let mut new_refs: Vec<CompilationReference> = Vec::new();
        for r in unit.references().iter().chain(resolved.iter()) {
            if !prior_refs.contains(r) && !new_refs.contains(r) {
                new_refs.push(r.clone());
            }
        }

        if self.cancel.is_cancelled() {
            return ExecutionOutcome::failed(FaultDescriptor::cancelled());
        }

        let globals = prior.map(|s| s.bindings().names()).unwrap_or_default();
        let usings: &[String] = prior.map(|s| s.usings()).unwrap_or(&[]);
        let generation = prior.map(|s| s.generation()).unwrap_or(0);
        let request = CompileRequest {
            source: &extracted.source,
            mode: unit.mode(),
            references: &new_refs,
            known_globals: &globals,
            usings,
        };
        let key = CacheKey::new(&request, prior_refs, generation);
        let compiled = match self.cache.get_or_compile(key, self.compiler.as_ref(), &request) {
            Ok(compiled) => compiled,
            Err(diagnostics) => {
                debug!(count = diagnostics.len(), "compilation failed");
                return ExecutionOutcome::failed(FaultDescriptor::compilation(&diagnostics));
            }
        };
        debug!(mode = %unit.mode(), generation, libraries = compiled.libraries.len(), "compiled");

        if self.cancel.is_cancelled() {
            return ExecutionOutcome::failed(FaultDescriptor::cancelled());
        }

        let mut bindings = prior.map(|s| s.bindings().clone()).unwrap_or_default();
        let value = Machine::new(
            &mut bindings,
            usings,
            out,
            &self.cancel,
            &self.config.format,
            self.config.max_call_depth,
        ).run_unit(&compiled);

        match value {
            Ok(return_value) => {
                debug!(value = return_value.type_name(), "executed");
                ExecutionOutcome {
                    result: ExecutionResult::Success {
                        return_value,
                        side_effects: Effects {
                            declared: compiled.all_declared(),
                            usings: compiled.usings.clone(),
                            references: new_refs,
                        },
                    },
                    bindings: Some(bindings),
                }
            }
            Err(Unwind::Fault(fault)) => {
                debug!(fault = %fault.type_name, "runtime fault");
                ExecutionOutcome::failed(fault.into())
            }
            Err(Unwind::Cancelled) => ExecutionOutcome::failed(FaultDescriptor::cancelled()),
        }
    }
}
