//! Compiler backend
//!
//! The executor only sees the [`Compiler`] trait. [`ScriptCompiler`] is the
//! bundled implementation: it parses and name-checks a small
//! expression-oriented language and hands back a [`CompiledUnit`] that the
//! evaluator in [`interp`] can run any number of times.
//!
//! # Language
//!
//! ```text
//! #r "lib/util.emxs"          // inline reference (see directives)
//! using math;
//! var xs = [1, 2, 3];
//! fn sum(list) {
//!     var i = 0;
//!     var acc = 0;
//!     while (i < len(list)) { acc = acc + list[i]; i = i + 1; }
//!     return acc;
//! }
//! var p = new { name = "origin", x = 0 };
//! if (sum(xs) > 5) { print("big"); } else { throw "small"; }
//! return sqrt(sum(xs));
//! ```

pub mod ast;
pub mod builtins;
pub mod check;
pub mod interp;
pub mod lexer;
pub mod parser;

use std::fmt;
use std::path::{Path, PathBuf};
use ast::{Pos, Program};
use check::Scope;
use crate::unit::{CompilationReference, ScriptMode};

/// A compile-time error with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: Pos,
    pub message: String,
    /// Set for diagnostics raised inside a referenced library
    pub file: Option<String>,
}

impl Diagnostic {
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
            file: None,
        }
    }

    pub fn in_file(mut self, path: &Path) -> Self {
        self.file = Some(path.display().to_string());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}", file)?;
        }
        write!(f, "{}: {}", self.pos, self.message)
    }
}

/// Everything the backend needs to compile one unit.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub source: &'a str,
    pub mode: ScriptMode,
    /// References not yet loaded by the session; their libraries are compiled in
    pub references: &'a [CompilationReference],
    /// Global names left behind by earlier submissions
    pub known_globals: &'a [String],
    /// Namespaces imported by earlier submissions
    pub usings: &'a [String],
}

/// A referenced library, compiled
#[derive(Debug, Clone)]
pub struct Library {
    pub path: PathBuf,
    pub program: Program,
    pub declared: Vec<String>,
}

/// The output of a successful compilation
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub program: Program,
    pub libraries: Vec<Library>,
    /// Top-level names declared by the unit itself
    pub declared: Vec<String>,
    /// Namespaces the unit imports
    pub usings: Vec<String>,
}

impl CompiledUnit {
    /// Declared names including those contributed by libraries.
    pub fn all_declared(&self) -> Vec<String> {
        let mut names: Vec<String> = self.libraries.iter()
            .flat_map(|lib| lib.declared.iter().cloned())
            .collect();
        for name in &self.declared {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// A compiler backend
pub trait Compiler: Send + Sync {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledUnit, Vec<Diagnostic>>;
}

/// The bundled backend
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompiler;

impl ScriptCompiler {
    pub fn new() -> Self {
        Self
    }

    fn library(path: &Path, scope: &mut Scope) -> Result<Library, Vec<Diagnostic>> {
        let in_file = |ds: Vec<Diagnostic>| ds.into_iter().map(|d| d.in_file(path)).collect::<Vec<_>>();
        let text = std::fs::read_to_string(path).map_err(|e| {
            vec![Diagnostic::new(Pos::new(1, 1), format!("Could not read referenced library: {}", e)).in_file(path)]
        })?;
        let program = parser::parse(&text, ScriptMode::Script).map_err(in_file)?;

        // library usings do not leak into the referencing unit
        let saved_usings = scope.usings.clone();
        let checked = check::check(&program, scope);
        scope.usings = saved_usings;

        let output = checked.map_err(in_file)?;
        Ok(Library {
            path: path.to_path_buf(),
            program,
            declared: output.declared,
        })
    }
}

impl Compiler for ScriptCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompiledUnit, Vec<Diagnostic>> {
        let mut scope = Scope::new(request.known_globals, request.usings);
        let mut diagnostics = Vec::new();
        let mut libraries = Vec::new();

        for path in request.references.iter().filter_map(|r| r.path()) {
            match Self::library(path, &mut scope) {
                Ok(lib) => libraries.push(lib),
                Err(ds) => diagnostics.extend(ds),
            }
        }

        let program = match parser::parse(request.source, request.mode) {
            Ok(program) => program,
            Err(ds) => {
                diagnostics.extend(ds);
                return Err(diagnostics);
            }
        };
        let output = match check::check(&program, &mut scope) {
            Ok(output) => output,
            Err(ds) => {
                diagnostics.extend(ds);
                return Err(diagnostics);
            }
        };
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        Ok(CompiledUnit {
            program,
            libraries,
            declared: output.declared,
            usings: output.usings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(source: &'a str, references: &'a [CompilationReference]) -> CompileRequest<'a> {
        CompileRequest {
            source,
            mode: ScriptMode::Script,
            references,
            known_globals: &[],
            usings: &[],
        }
    }

    #[test]
    fn test_compile_success() {
        let unit = ScriptCompiler::new().compile(&request("var a = 1;\nusing text;", &[])).unwrap();
        assert_eq!(unit.declared, vec!["a"]);
        assert_eq!(unit.usings, vec!["text"]);
        assert!(unit.libraries.is_empty());
    }

    #[test]
    fn test_compile_failure_lists_all_diagnostics() {
        let errors = ScriptCompiler::new().compile(&request("var a = b;\nreturn c;", &[])).unwrap_err();
        let rendered: Vec<String> = errors.iter().map(|d| d.to_string()).collect();
        assert_eq!(rendered, vec![
            "(1,9): The name 'b' does not exist in the current context",
            "(2,8): The name 'c' does not exist in the current context",
        ]);
    }

    #[test]
    fn test_library_declarations_visible() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("util.emxs");
        std::fs::write(&lib, "using math;\nfn hyp(a, b) { return sqrt(a * a + b * b); }\nvar unit = 1;").unwrap();
        let refs = vec![CompilationReference::from_path(&lib)];

        let unit = ScriptCompiler::new().compile(&request("return hyp(3, 4) + unit;", &refs)).unwrap();
        assert_eq!(unit.libraries.len(), 1);
        assert_eq!(unit.all_declared(), vec!["hyp", "unit"]);
        // the library's `using math;` stays inside the library
        let errors = ScriptCompiler::new().compile(&request("return sqrt(4);", &refs)).unwrap_err();
        assert!(errors[0].message.contains("'sqrt' does not exist"));
    }

    #[test]
    fn test_library_errors_carry_file() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("broken.emxs");
        std::fs::write(&lib, "var = 1;").unwrap();
        let refs = vec![CompilationReference::from_path(&lib)];
        let errors = ScriptCompiler::new().compile(&request("return 1;", &refs)).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with(&format!("{}(1,5): ", lib.display())));
    }

    #[test]
    fn test_reference_without_path_ignored() {
        let refs = vec![CompilationReference::new(None)];
        let unit = ScriptCompiler::new().compile(&request("return 1;", &refs)).unwrap();
        assert!(unit.libraries.is_empty());
    }
}
