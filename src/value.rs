//! Runtime values
//!
//! Values are plain owned data: lists and records are copied on assignment,
//! functions share their declaration through an `Arc` so compiled units can
//! be cached and shared between threads.

use std::sync::Arc;
use crate::backend::ast::FnDecl;

/// Deepest list/record nesting a script may build. Equality, cloning and
/// dropping recurse through values, so this keeps them bounded.
pub const MAX_VALUE_DEPTH: usize = 1000;

/// A value produced by a script
#[derive(Debug, Clone)]
pub enum Value {
    /// No value (statement-only scripts)
    Unit,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Named fields in declaration order
    Record(Vec<(String, Value)>),
    Function(Arc<FnDecl>),
}

impl Value {
    /// Name of the value's type as reported by `type(x)` and in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Function(_) => "function",
        }
    }

    /// Nesting depth: 0 for scalars, 1 for a flat list or record.
    pub fn depth(&self) -> usize {
        match self {
            Value::List(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
            Value::Record(fields) => 1 + fields.iter().map(|(_, v)| v.depth()).max().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Look up a record field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Error returned when a value cannot be converted to the requested Rust type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTypeError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl std::fmt::Display for ValueTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

impl std::error::Error for ValueTypeError {}

macro_rules! impl_try_from_value {
    ($ty:ty, $name:literal, $($pat:pat => $out:expr),+) => {
        impl TryFrom<Value> for $ty {
            type Error = ValueTypeError;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    $($pat => Ok($out),)+
                    other => Err(ValueTypeError { expected: $name, found: other.type_name() }),
                }
            }
        }
    };
}

impl_try_from_value!(i64, "int", Value::Int(n) => n);
impl_try_from_value!(f64, "float", Value::Float(n) => n, Value::Int(n) => n as f64);
impl_try_from_value!(bool, "bool", Value::Bool(b) => b);
impl_try_from_value!(String, "string", Value::Str(s) => s);
impl_try_from_value!((), "unit", Value::Unit => ());
impl_try_from_value!(Vec<Value>, "list", Value::List(items) => items);
