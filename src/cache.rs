//! Compilation cache
//!
//! Maps an explicit [`CacheKey`] to the backend's output. The key is built
//! from data, never from object identity, so two requests that would compile
//! the same way share an entry even across sessions.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::trace;
use crate::backend::{CompileRequest, CompiledUnit, Compiler, Diagnostic};
use crate::unit::{CompilationReference, ScriptMode};

/// What the cache stores per key
pub type CacheEntry = Result<Arc<CompiledUnit>, Arc<Vec<Diagnostic>>>;

/// Cache behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Keep failed compilations under their exact key
    pub cache_failures: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { cache_failures: true }
    }
}

/// Everything a compilation depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source: String,
    mode: ScriptMode,
    generation: u64,
    references: BTreeSet<PathBuf>,
    globals: BTreeSet<String>,
    usings: BTreeSet<String>,
    new_references: Vec<PathBuf>,
}

impl CacheKey {
    /// Key for `request` compiled on top of `prior_references` at `generation`.
    pub fn new(request: &CompileRequest<'_>, prior_references: &[CompilationReference], generation: u64) -> Self {
        let paths = |refs: &[CompilationReference]| {
            refs.iter().filter_map(|r| r.path().map(PathBuf::from)).collect::<Vec<_>>()
        };
        let new_references = paths(request.references);
        let mut references: BTreeSet<PathBuf> = paths(prior_references).into_iter().collect();
        references.extend(new_references.iter().cloned());

        Self {
            source: request.source.to_string(),
            mode: request.mode,
            generation,
            references,
            globals: request.known_globals.iter().cloned().collect(),
            usings: request.usings.iter().cloned().collect(),
            new_references,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe, process-lifetime compilation cache
#[derive(Debug, Default)]
pub struct CompilationCache {
    config: CacheConfig,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CompilationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Return the cached entry for `key`, compiling `request` on a miss.
    ///
    /// Concurrent misses on one key may both compile; the first insert wins
    /// and every caller gets that entry.
    pub fn get_or_compile(
        &self,
        key: CacheKey,
        backend: &dyn Compiler,
        request: &CompileRequest<'_>,
    ) -> CacheEntry {
        if let Some(entry) = self.entries.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(generation = key.generation, ok = entry.is_ok(), "compilation cache hit");
            return entry.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(generation = key.generation, "compilation cache miss");
        let entry: CacheEntry = backend.compile(request)
            .map(Arc::new)
            .map_err(Arc::new);
        if entry.is_err() && !self.config.cache_failures {
            return entry;
        }

        let mut entries = self.entries.write();
        entries.entry(key).or_insert(entry).clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry; counters are kept.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
