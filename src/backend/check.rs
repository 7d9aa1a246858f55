//! Name checking
//!
//! Verifies that every referenced name is declared somewhere visible: in
//! the unit itself, in a loaded library, in prior session state, or as a
//! builtin. This is what makes a REPL submission that refers to a binding
//! from before a reset fail to compile.

use std::collections::HashSet;
use super::ast::*;
use super::builtins;
use super::Diagnostic;
use crate::stack::ensure_sufficient_stack;

/// Names visible to the unit being checked.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub globals: HashSet<String>,
    pub usings: Vec<String>,
}

impl Scope {
    pub fn new(globals: &[String], usings: &[String]) -> Self {
        Self {
            globals: globals.iter().cloned().collect(),
            usings: usings.to_vec(),
        }
    }
}

/// What a successfully checked program adds to the scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOutput {
    /// Top-level names in declaration order (functions first, they are hoisted)
    pub declared: Vec<String>,
    /// Namespaces imported by `using`
    pub usings: Vec<String>,
}

struct Checker<'s> {
    scope: &'s mut Scope,
    locals: Vec<HashSet<String>>,
    unit_names: HashSet<String>,
    output: CheckOutput,
    diagnostics: Vec<Diagnostic>,
}

/// Check `program` against `scope`. On success `scope` is extended with the
/// program's declarations and usings.
pub fn check(program: &Program, scope: &mut Scope) -> Result<CheckOutput, Vec<Diagnostic>> {
    let mut checker = Checker {
        scope,
        locals: Vec::new(),
        unit_names: HashSet::new(),
        output: CheckOutput::default(),
        diagnostics: Vec::new(),
    };

    for decl in program.functions() {
        checker.declare_top_level(&decl.name, decl.pos, "function");
    }
    for stmt in &program.stmts {
        checker.stmt(stmt);
    }

    if checker.diagnostics.is_empty() {
        Ok(checker.output)
    } else {
        Err(checker.diagnostics)
    }
}

impl<'s> Checker<'s> {
    fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(pos, message));
    }

    fn declare_top_level(&mut self, name: &str, pos: Pos, what: &str) {
        if !self.unit_names.insert(name.to_string()) {
            self.error(pos, format!("A {} named '{}' is already defined in this scope", what, name));
            return;
        }
        self.output.declared.push(name.to_string());
        self.scope.globals.insert(name.to_string());
    }

    fn is_visible(&self, name: &str) -> bool {
        self.locals.iter().rev().any(|frame| frame.contains(name)) || self.scope.globals.contains(name)
    }

    fn with_frame(&mut self, frame: HashSet<String>, body: &[Stmt]) {
        self.locals.push(frame);
        for stmt in body {
            self.stmt(stmt);
        }
        self.locals.pop();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        ensure_sufficient_stack(|| self.stmt_inner(stmt))
    }

    fn stmt_inner(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var { name, init, pos } => {
                self.expr(init);
                match self.locals.last_mut() {
                    Some(frame) => {
                        if !frame.insert(name.clone()) {
                            self.error(*pos, format!("A variable named '{}' is already defined in this scope", name));
                        }
                    }
                    None => self.declare_top_level(name, *pos, "variable"),
                }
            }
            Stmt::Assign { name, value, pos } => {
                if !self.is_visible(name) {
                    self.error(*pos, format!("The name '{}' does not exist in the current context", name));
                }
                self.expr(value);
            }
            Stmt::Fn(decl) => {
                let mut params = HashSet::new();
                for param in &decl.params {
                    if !params.insert(param.clone()) {
                        self.error(decl.pos, format!("The parameter name '{}' is a duplicate", param));
                    }
                }
                self.with_frame(params, &decl.body);
            }
            Stmt::Using { namespace, pos } => {
                if !builtins::is_namespace(namespace) {
                    self.error(*pos, format!("The type or namespace name '{}' could not be found", namespace));
                } else if !self.scope.usings.contains(namespace) {
                    self.scope.usings.push(namespace.clone());
                    self.output.usings.push(namespace.clone());
                }
            }
            Stmt::Return(value, _) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Stmt::If { cond, then_branch, else_branch } => {
                self.expr(cond);
                self.with_frame(HashSet::new(), then_branch);
                if let Some(else_branch) = else_branch {
                    self.with_frame(HashSet::new(), else_branch);
                }
            }
            Stmt::While { cond, body } => {
                self.expr(cond);
                self.with_frame(HashSet::new(), body);
            }
            Stmt::Throw(value, _) => self.expr(value),
            Stmt::Expr { expr, .. } => self.expr(expr),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        ensure_sufficient_stack(|| self.expr_inner(expr))
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(..) => {}
            Expr::Ident(name, pos) => {
                if !self.is_visible(name) {
                    self.error(*pos, format!("The name '{}' does not exist in the current context", name));
                }
            }
            Expr::List(items, _) => {
                for item in items {
                    self.expr(item);
                }
            }
            Expr::Record(fields, _) => {
                for (_, value) in fields {
                    self.expr(value);
                }
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            Expr::Call { callee, args, pos } => {
                self.callee(callee, *pos);
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Field { target, .. } => self.expr(target),
            Expr::Index { target, index, .. } => {
                self.expr(target);
                self.expr(index);
            }
        }
    }

    fn callee(&mut self, callee: &Callee, pos: Pos) {
        match callee {
            Callee::Name(name) => {
                let found = self.is_visible(name)
                    || builtins::is_global(name)
                    || self.scope.usings.iter().any(|ns| builtins::namespace_has(ns, name));
                if !found {
                    self.error(pos, format!("The name '{}' does not exist in the current context", name));
                }
            }
            Callee::Qualified(ns, name) => {
                if !builtins::is_namespace(ns) {
                    self.error(pos, format!("The type or namespace name '{}' could not be found", ns));
                } else if !builtins::namespace_has(ns, name) {
                    self.error(pos, format!("'{}' does not contain a definition for '{}'", ns, name));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::parser::parse;
    use crate::unit::ScriptMode;

    fn check_src(src: &str, scope: &mut Scope) -> Result<CheckOutput, Vec<String>> {
        let program = parse(src, ScriptMode::Repl).unwrap();
        check(&program, scope).map_err(|ds| ds.iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn test_declarations_extend_scope() {
        let mut scope = Scope::default();
        let out = check_src("var x = 1;\nfn f(a) { return a + x; }\nusing math;", &mut scope).unwrap();
        assert_eq!(out.declared, vec!["f", "x"]);
        assert_eq!(out.usings, vec!["math"]);
        assert!(scope.globals.contains("x"));
        assert!(scope.globals.contains("f"));
    }

    #[test]
    fn test_unknown_name() {
        let mut scope = Scope::default();
        let errors = check_src("x + 1", &mut scope).unwrap_err();
        assert_eq!(errors, vec!["(1,1): The name 'x' does not exist in the current context"]);
    }

    #[test]
    fn test_prior_globals_visible() {
        let mut scope = Scope::new(&["x".to_string()], &[]);
        assert!(check_src("x + 1", &mut scope).is_ok());
    }

    #[test]
    fn test_duplicate_in_unit() {
        let mut scope = Scope::default();
        let errors = check_src("var x = 1;\nvar x = 2;", &mut scope).unwrap_err();
        assert_eq!(errors, vec!["(2,1): A variable named 'x' is already defined in this scope"]);
    }

    #[test]
    fn test_redeclare_prior_global_allowed() {
        let mut scope = Scope::new(&["x".to_string()], &[]);
        assert!(check_src("var x = x + 1;", &mut scope).is_ok());
    }

    #[test]
    fn test_block_locals_do_not_leak() {
        let mut scope = Scope::default();
        let errors = check_src("if (true) { var y = 1; }\ny", &mut scope).unwrap_err();
        assert_eq!(errors, vec!["(2,1): The name 'y' does not exist in the current context"]);
    }

    #[test]
    fn test_namespaces() {
        let mut scope = Scope::default();
        assert!(check_src("math.sqrt(4)", &mut scope).is_ok());
        let errors = check_src("sqrt(4)", &mut scope).unwrap_err();
        assert_eq!(errors, vec!["(1,1): The name 'sqrt' does not exist in the current context"]);
        let errors = check_src("using System;", &mut scope).unwrap_err();
        assert_eq!(errors, vec!["(1,1): The type or namespace name 'System' could not be found"]);
        let errors = check_src("math.nope(1)", &mut scope).unwrap_err();
        assert_eq!(errors, vec!["(1,5): 'math' does not contain a definition for 'nope'"]);
        let mut scope = Scope::new(&[], &["math".to_string()]);
        assert!(check_src("sqrt(4)", &mut scope).is_ok());
    }

    #[test]
    fn test_hoisted_functions() {
        let mut scope = Scope::default();
        assert!(check_src("var r = twice(2);\nfn twice(n) { return n * 2; }", &mut scope).is_ok());
    }
}
