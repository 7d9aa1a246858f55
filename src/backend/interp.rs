//! Tree-walking evaluator
//!
//! Runs a checked unit against a set of global bindings. Faults unwind as
//! `Err(Unwind)`; the executor turns them into fault descriptors.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use super::ast::*;
use super::builtins;
use super::CompiledUnit;
use crate::bindings::Bindings;
use crate::cancel::CancellationToken;
use crate::format::{display_string, FormatOptions};
use crate::stack::ensure_sufficient_stack;
use crate::value::{Value, MAX_VALUE_DEPTH};

/// Runtime fault type names.
pub mod fault_names {
    pub const DIVIDE_BY_ZERO: &str = "emx.DivideByZeroError";
    pub const OVERFLOW: &str = "emx.OverflowError";
    pub const TYPE_ERROR: &str = "emx.TypeError";
    pub const INDEX_OUT_OF_RANGE: &str = "emx.IndexOutOfRangeError";
    pub const MISSING_MEMBER: &str = "emx.MissingMemberError";
    pub const STACK_OVERFLOW: &str = "emx.StackOverflowError";
    pub const UNDEFINED_NAME: &str = "emx.UndefinedNameError";
    pub const SCRIPT_EXCEPTION: &str = "emx.ScriptException";
    pub const IO_ERROR: &str = "emx.IOError";
}

/// A fault raised by running script code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFault {
    pub type_name: String,
    pub message: String,
}

impl RuntimeFault {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    fn type_error(message: impl Into<String>) -> Self {
        Self::new(fault_names::TYPE_ERROR, message)
    }
}

/// Why evaluation stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwind {
    Fault(RuntimeFault),
    Cancelled,
}

impl From<RuntimeFault> for Unwind {
    fn from(fault: RuntimeFault) -> Self {
        Unwind::Fault(fault)
    }
}

type Eval<T> = Result<T, Unwind>;

enum Flow {
    Next,
    Return(Value),
}

/// Evaluation context for one execution
pub struct Machine<'a> {
    globals: &'a mut Bindings,
    usings: Vec<String>,
    scopes: Vec<HashMap<String, Value>>,
    out: &'a mut dyn Write,
    cancel: &'a CancellationToken,
    options: &'a FormatOptions,
    depth: usize,
    max_depth: usize,
}

impl<'a> Machine<'a> {
    pub fn new(
        globals: &'a mut Bindings,
        usings: &[String],
        out: &'a mut dyn Write,
        cancel: &'a CancellationToken,
        options: &'a FormatOptions,
        max_depth: usize,
    ) -> Self {
        Self {
            globals,
            usings: usings.to_vec(),
            scopes: Vec::new(),
            out,
            cancel,
            options,
            depth: 0,
            max_depth,
        }
    }

    /// Run the unit's libraries, then the unit itself.
    pub fn run_unit(&mut self, unit: &CompiledUnit) -> Eval<Value> {
        for library in &unit.libraries {
            // library usings are file-local
            let saved = self.usings.clone();
            let result = self.run_program(&library.program);
            self.usings = saved;
            result?;
        }
        self.run_program(&unit.program)
    }

    fn run_program(&mut self, program: &Program) -> Eval<Value> {
        for decl in program.functions() {
            self.globals.set(decl.name.clone(), Value::Function(Arc::clone(decl)));
        }
        let mut last = Value::Unit;
        for stmt in &program.stmts {
            if let Stmt::Expr { expr, terminated: false } = stmt {
                self.poll_cancel()?;
                last = self.eval(expr)?;
                continue;
            }
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(value);
            }
        }
        Ok(last)
    }

    fn poll_cancel(&self) -> Eval<()> {
        if self.cancel.is_cancelled() {
            Err(Unwind::Cancelled)
        } else {
            Ok(())
        }
    }

    fn exec_all(&mut self, stmts: &[Stmt]) -> Eval<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Next)
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Eval<Flow> {
        self.scopes.push(HashMap::new());
        let result = self.exec_all(stmts);
        self.scopes.pop();
        result
    }

    fn exec(&mut self, stmt: &Stmt) -> Eval<Flow> {
        ensure_sufficient_stack(|| self.exec_inner(stmt))
    }

    fn exec_inner(&mut self, stmt: &Stmt) -> Eval<Flow> {
        self.poll_cancel()?;
        match stmt {
            Stmt::Var { name, init, .. } => {
                let value = self.eval(init)?;
                match self.scopes.last_mut() {
                    Some(frame) => {
                        frame.insert(name.clone(), value);
                    }
                    None => self.globals.set(name.clone(), value),
                }
            }
            Stmt::Assign { name, value, .. } => {
                let value = self.eval(value)?;
                self.assign(name, value)?;
            }
            // hoisted in run_program
            Stmt::Fn(_) => {}
            Stmt::Using { namespace, .. } => {
                if !self.usings.contains(namespace) {
                    self.usings.push(namespace.clone());
                }
            }
            Stmt::Return(value, _) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If { cond, then_branch, else_branch } => {
                if self.condition(cond)? {
                    return self.exec_block(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.exec_block(else_branch);
                }
            }
            Stmt::While { cond, body } => {
                while self.condition(cond)? {
                    self.poll_cancel()?;
                    if let Flow::Return(value) = self.exec_block(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Throw(value, _) => {
                let value = self.eval(value)?;
                return Err(Unwind::Fault(self.thrown(value)));
            }
            Stmt::Expr { expr, .. } => {
                self.eval(expr)?;
            }
        }
        Ok(Flow::Next)
    }

    /// Build the fault for `throw value;`.
    ///
    /// A record with a string `type` field sets the fault's type name; its
    /// `message` field (if any) becomes the message.
    fn thrown(&self, value: Value) -> RuntimeFault {
        if let Value::Record(_) = value {
            let message = value.field("message")
                .map(|m| display_string(m, self.options))
                .unwrap_or_default();
            return match value.field("type") {
                Some(Value::Str(type_name)) => RuntimeFault::new(type_name.clone(), message),
                _ => RuntimeFault::new(fault_names::SCRIPT_EXCEPTION, message),
            };
        }
        RuntimeFault::new(fault_names::SCRIPT_EXCEPTION, display_string(&value, self.options))
    }

    fn condition(&mut self, cond: &Expr) -> Eval<bool> {
        match self.eval(cond)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeFault::type_error(format!(
                "Cannot implicitly convert type '{}' to 'bool'",
                other.type_name()
            )).into()),
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev()
            .find_map(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }

    fn assign(&mut self, name: &str, value: Value) -> Eval<()> {
        for frame in self.scopes.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        match self.globals.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name).into()),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Eval<Value> {
        ensure_sufficient_stack(|| self.eval_inner(expr))
    }

    fn eval_inner(&mut self, expr: &Expr) -> Eval<Value> {
        match expr {
            Expr::Literal(lit, _) => Ok(match lit {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(n) => Value::Int(*n),
                Literal::Float(n) => Value::Float(*n),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Ident(name, _) => match self.lookup(name) {
                Some(value) => Ok(value.clone()),
                None => Err(undefined(name).into()),
            },
            Expr::List(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                nest(Value::List(values))
            }
            Expr::Record(fields, _) => {
                let mut values = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    values.push((name.clone(), self.eval(value)?));
                }
                nest(Value::Record(values))
            }
            Expr::Unary { op, operand, .. } => {
                let value = self.eval(operand)?;
                unary(*op, value).map_err(Unwind::from)
            }
            Expr::Binary { op: BinaryOp::And, lhs, rhs, .. } => {
                Ok(Value::Bool(self.condition(lhs)? && self.condition(rhs)?))
            }
            Expr::Binary { op: BinaryOp::Or, lhs, rhs, .. } => {
                Ok(Value::Bool(self.condition(lhs)? || self.condition(rhs)?))
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, lhs, rhs, self.options).map_err(Unwind::from)
            }
            Expr::Call { callee, args, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call(callee, values)
            }
            Expr::Field { target, name, .. } => {
                let target = self.eval(target)?;
                match target {
                    Value::Record(_) => target.field(name).cloned().ok_or_else(|| {
                        RuntimeFault::new(
                            fault_names::MISSING_MEMBER,
                            format!("'record' does not contain a definition for '{}'", name),
                        ).into()
                    }),
                    other => Err(RuntimeFault::type_error(format!(
                        "'{}' does not contain a definition for '{}'",
                        other.type_name(),
                        name
                    )).into()),
                }
            }
            Expr::Index { target, index, .. } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(target, index).map_err(Unwind::from)
            }
        }
    }

    fn call(&mut self, callee: &Callee, args: Vec<Value>) -> Eval<Value> {
        match callee {
            Callee::Name(name) => {
                if let Some(value) = self.lookup(name) {
                    return match value {
                        Value::Function(decl) => {
                            let decl = Arc::clone(decl);
                            self.call_function(&decl, args)
                        }
                        other => Err(RuntimeFault::type_error(format!(
                            "'{}' is a {} but is used like a method",
                            name,
                            other.type_name()
                        )).into()),
                    };
                }
                if builtins::is_global(name) {
                    return Ok(builtins::call(None, name, args, &mut *self.out, self.options)?);
                }
                let ns = self.usings.iter()
                    .find(|ns| builtins::namespace_has(ns, name))
                    .cloned();
                match ns {
                    Some(ns) => Ok(builtins::call(Some(&ns), name, args, &mut *self.out, self.options)?),
                    None => Err(undefined(name).into()),
                }
            }
            Callee::Qualified(ns, name) => {
                Ok(builtins::call(Some(ns), name, args, &mut *self.out, self.options)?)
            }
        }
    }

    fn call_function(&mut self, decl: &FnDecl, args: Vec<Value>) -> Eval<Value> {
        if args.len() != decl.params.len() {
            return Err(RuntimeFault::type_error(format!(
                "No overload for method '{}' takes {} arguments",
                decl.name,
                args.len()
            )).into());
        }
        if self.depth >= self.max_depth {
            return Err(RuntimeFault::new(
                fault_names::STACK_OVERFLOW,
                format!("Call depth exceeded {} in '{}'", self.max_depth, decl.name),
            ).into());
        }
        let frame: HashMap<String, Value> = decl.params.iter().cloned().zip(args).collect();
        let saved = std::mem::replace(&mut self.scopes, vec![frame]);
        self.depth += 1;
        let result = self.exec_all(&decl.body);
        self.depth -= 1;
        self.scopes = saved;
        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(Value::Unit),
        }
    }
}

fn undefined(name: &str) -> RuntimeFault {
    RuntimeFault::new(
        fault_names::UNDEFINED_NAME,
        format!("The name '{}' does not exist in the current context", name),
    )
}

/// Accept a freshly built list or record unless it nests too deeply.
fn nest(value: Value) -> Eval<Value> {
    if value.depth() > MAX_VALUE_DEPTH {
        return Err(RuntimeFault::new(
            fault_names::STACK_OVERFLOW,
            format!("Value nesting exceeds the maximum depth of {}", MAX_VALUE_DEPTH),
        ).into());
    }
    Ok(value)
}

fn overflow() -> RuntimeFault {
    RuntimeFault::new(fault_names::OVERFLOW, "Arithmetic operation resulted in an overflow.")
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, RuntimeFault> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, other) => {
            let sym = if op == UnaryOp::Neg { "-" } else { "!" };
            Err(RuntimeFault::type_error(format!(
                "Operator '{}' cannot be applied to operand of type '{}'",
                sym,
                other.type_name()
            )))
        }
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value, options: &FormatOptions) -> Result<Value, RuntimeFault> {
    use Value::*;
    let mismatch = |lhs: &Value, rhs: &Value| {
        RuntimeFault::type_error(format!(
            "Operator '{}' cannot be applied to operands of type '{}' and '{}'",
            op,
            lhs.type_name(),
            rhs.type_name()
        ))
    };
    match op {
        BinaryOp::Eq => return Ok(Bool(lhs == rhs)),
        BinaryOp::Ne => return Ok(Bool(lhs != rhs)),
        _ => {}
    }
    match (op, &lhs, &rhs) {
        (BinaryOp::Add, Str(_), _) | (BinaryOp::Add, _, Str(_)) => Ok(Str(format!(
            "{}{}",
            display_string(&lhs, options),
            display_string(&rhs, options)
        ))),
        (BinaryOp::Add, List(a), List(b)) => Ok(List(a.iter().chain(b.iter()).cloned().collect())),
        (_, Int(a), Int(b)) => int_arith(op, *a, *b).ok_or_else(|| mismatch(&lhs, &rhs))?,
        (_, Int(_) | Float(_), Int(_) | Float(_)) => {
            let (a, b) = (as_float(&lhs), as_float(&rhs));
            float_arith(op, a, b).ok_or_else(|| mismatch(&lhs, &rhs))
        }
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, Str(a), Str(b)) => {
            Ok(Bool(compare(op, a.cmp(b))))
        }
        _ => Err(mismatch(&lhs, &rhs)),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => f64::NAN,
    }
}

fn compare(op: BinaryOp, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinaryOp::Lt => ord == Less,
        BinaryOp::Le => ord != Greater,
        BinaryOp::Gt => ord == Greater,
        BinaryOp::Ge => ord != Less,
        _ => false,
    }
}

/// Integer arithmetic. `None` means the operator does not apply to ints.
fn int_arith(op: BinaryOp, a: i64, b: i64) -> Option<Result<Value, RuntimeFault>> {
    let divide_by_zero = || RuntimeFault::new(fault_names::DIVIDE_BY_ZERO, "Attempted to divide by zero.");
    let result = match op {
        BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Div if b == 0 => Err(divide_by_zero()),
        BinaryOp::Div => a.checked_div(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Rem if b == 0 => Err(divide_by_zero()),
        BinaryOp::Rem => a.checked_rem(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Ok(Value::Bool(compare(op, a.cmp(&b)))),
        _ => return None,
    };
    Some(result)
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Option<Value> {
    let value = match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Mul => Value::Float(a * b),
        BinaryOp::Div => Value::Float(a / b),
        BinaryOp::Rem => Value::Float(a % b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Ge => Value::Bool(a >= b),
        _ => return None,
    };
    Some(value)
}

fn index_value(target: Value, index: Value) -> Result<Value, RuntimeFault> {
    let out_of_range = || {
        RuntimeFault::new(
            fault_names::INDEX_OUT_OF_RANGE,
            "Index was outside the bounds of the array.",
        )
    };
    match (target, index) {
        (Value::List(items), Value::Int(i)) => usize::try_from(i)
            .ok()
            .and_then(|i| items.into_iter().nth(i))
            .ok_or_else(out_of_range),
        (Value::Str(s), Value::Int(i)) => usize::try_from(i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::Str(c.to_string()))
            .ok_or_else(out_of_range),
        (target, index) => Err(RuntimeFault::type_error(format!(
            "Cannot apply indexing with [] to an expression of type '{}' using '{}'",
            target.type_name(),
            index.type_name()
        ))),
    }
}
