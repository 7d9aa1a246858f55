//! Script units and compilation references
//!
//! A `ScriptUnit` is one submission: source text plus everything needed to
//! compile it. Units are immutable once built; the builder-style `with_*`
//! methods consume and return a new value.

use std::fmt;
use std::path::{Path, PathBuf};

/// How a unit's source is interpreted.
///
/// Declaration order is significant: `Script < Eval < Repl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptMode {
    /// Top-level statements; the value is whatever `return` yields
    Script,
    /// A single expression
    Eval,
    /// Incremental submission; a trailing bare expression is echoed
    Repl,
}

impl fmt::Display for ScriptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptMode::Script => "script",
            ScriptMode::Eval => "eval",
            ScriptMode::Repl => "repl",
        };
        f.write_str(name)
    }
}

/// A resolved, loadable reference.
///
/// The path is fixed at construction. A reference without a path is allowed
/// and contributes nothing at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompilationReference {
    path: Option<PathBuf>,
}

impl CompilationReference {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Some(path.into()))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Display for CompilationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path {
            Some(ref p) => write!(f, "{}", p.display()),
            None => f.write_str("<none>"),
        }
    }
}

/// One unit of source text submitted for compilation and execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUnit {
    source_text: String,
    working_directory: PathBuf,
    references: Vec<CompilationReference>,
    mode: ScriptMode,
}

impl ScriptUnit {
    /// Create a unit rooted at the process working directory.
    pub fn new(source_text: impl Into<String>, mode: ScriptMode) -> Self {
        Self {
            source_text: source_text.into(),
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            references: Vec::new(),
            mode,
        }
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    pub fn with_references(mut self, references: Vec<CompilationReference>) -> Self {
        self.references = references;
        self
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn references(&self) -> &[CompilationReference] {
        &self.references
    }

    pub fn mode(&self) -> ScriptMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_ordering() {
        assert!(ScriptMode::Script < ScriptMode::Eval);
        assert!(ScriptMode::Eval < ScriptMode::Repl);
        let mut modes = vec![ScriptMode::Repl, ScriptMode::Script, ScriptMode::Eval];
        modes.sort();
        assert_eq!(modes, vec![ScriptMode::Script, ScriptMode::Eval, ScriptMode::Repl]);
    }

    #[test]
    fn test_reference_without_path() {
        let r = CompilationReference::new(None);
        assert!(r.path().is_none());
        assert_eq!(r.to_string(), "<none>");
    }

    #[test]
    fn test_reference_equality_by_path() {
        let a = CompilationReference::from_path("/lib/a.emxs");
        let b = CompilationReference::new(Some(PathBuf::from("/lib/a.emxs")));
        assert_eq!(a, b);
        assert_ne!(a, CompilationReference::from_path("/lib/b.emxs"));
    }

    #[test]
    fn test_unit_builder() {
        let unit = ScriptUnit::new("return 1;", ScriptMode::Script)
            .with_working_directory("/tmp/work")
            .with_references(vec![CompilationReference::from_path("/lib/a.emxs")]);
        assert_eq!(unit.source_text(), "return 1;");
        assert_eq!(unit.working_directory(), Path::new("/tmp/work"));
        assert_eq!(unit.references().len(), 1);
        assert_eq!(unit.mode(), ScriptMode::Script);
    }
}
