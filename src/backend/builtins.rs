//! Builtin functions and namespaces
//!
//! Global builtins are always callable. Namespace functions are called as
//! `ns.f(x)`, or bare after `using ns;`.

use std::io::Write;
use super::interp::{fault_names, RuntimeFault};
use crate::format::{display_string, FormatOptions};
use crate::value::Value;

const GLOBALS: &[&str] = &["print", "len", "str", "type"];

const NAMESPACES: &[(&str, &[&str])] = &[
    ("math", &["abs", "min", "max", "pow", "sqrt", "floor"]),
    ("text", &["upper", "lower", "trim", "contains", "split", "join"]),
];

pub fn is_global(name: &str) -> bool {
    GLOBALS.contains(&name)
}

pub fn is_namespace(ns: &str) -> bool {
    NAMESPACES.iter().any(|(n, _)| *n == ns)
}

pub fn namespace_has(ns: &str, name: &str) -> bool {
    NAMESPACES.iter().any(|(n, fns)| *n == ns && fns.contains(&name))
}

/// Names of all namespaces, for help output.
pub fn namespaces() -> impl Iterator<Item = (&'static str, &'static [&'static str])> {
    NAMESPACES.iter().copied()
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), RuntimeFault> {
    if args.len() != expected {
        return Err(RuntimeFault::new(
            fault_names::TYPE_ERROR,
            format!("No overload for method '{}' takes {} arguments", name, args.len()),
        ));
    }
    Ok(())
}

fn bad_arg(name: &str, value: &Value) -> RuntimeFault {
    RuntimeFault::new(
        fault_names::TYPE_ERROR,
        format!("Argument of type '{}' is not valid for '{}'", value.type_name(), name),
    )
}

fn as_str<'v>(name: &str, value: &'v Value) -> Result<&'v str, RuntimeFault> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(bad_arg(name, other)),
    }
}

fn as_f64(name: &str, value: &Value) -> Result<f64, RuntimeFault> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        other => Err(bad_arg(name, other)),
    }
}

/// Call a builtin. `ns` is `None` for global builtins.
pub fn call(
    ns: Option<&str>,
    name: &str,
    args: Vec<Value>,
    out: &mut dyn Write,
    options: &FormatOptions,
) -> Result<Value, RuntimeFault> {
    match (ns, name) {
        (None, "print") => {
            let line = args.iter()
                .map(|v| display_string(v, options))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "{}", line)
                .map_err(|e| RuntimeFault::new(fault_names::IO_ERROR, e.to_string()))?;
            Ok(Value::Unit)
        }
        (None, "len") => {
            arity(name, &args, 1)?;
            let n = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Record(fields) => fields.len(),
                other => return Err(bad_arg(name, other)),
            };
            Ok(Value::Int(n as i64))
        }
        (None, "str") => {
            arity(name, &args, 1)?;
            Ok(Value::Str(display_string(&args[0], options)))
        }
        (None, "type") => {
            arity(name, &args, 1)?;
            Ok(Value::Str(args[0].type_name().to_string()))
        }
        (Some("math"), "abs") => {
            arity(name, &args, 1)?;
            match &args[0] {
                Value::Int(n) => n.checked_abs().map(Value::Int).ok_or_else(|| {
                    RuntimeFault::new(fault_names::OVERFLOW, "Negating the minimum value of a twos complement number is invalid.")
                }),
                Value::Float(n) => Ok(Value::Float(n.abs())),
                other => Err(bad_arg(name, other)),
            }
        }
        (Some("math"), "min") | (Some("math"), "max") => {
            arity(name, &args, 2)?;
            let pick_first = {
                let (a, b) = (as_f64(name, &args[0])?, as_f64(name, &args[1])?);
                if name == "min" { a <= b } else { a >= b }
            };
            let mut args = args;
            Ok(if pick_first { args.swap_remove(0) } else { args.swap_remove(1) })
        }
        (Some("math"), "pow") => {
            arity(name, &args, 2)?;
            match (&args[0], &args[1]) {
                (Value::Int(base), Value::Int(exp)) if *exp >= 0 => {
                    let exp = u32::try_from(*exp).map_err(|_| {
                        RuntimeFault::new(fault_names::OVERFLOW, "Arithmetic operation resulted in an overflow.")
                    })?;
                    base.checked_pow(exp).map(Value::Int).ok_or_else(|| {
                        RuntimeFault::new(fault_names::OVERFLOW, "Arithmetic operation resulted in an overflow.")
                    })
                }
                (a, b) => Ok(Value::Float(as_f64(name, a)?.powf(as_f64(name, b)?))),
            }
        }
        (Some("math"), "sqrt") => {
            arity(name, &args, 1)?;
            Ok(Value::Float(as_f64(name, &args[0])?.sqrt()))
        }
        (Some("math"), "floor") => {
            arity(name, &args, 1)?;
            match &args[0] {
                Value::Int(n) => Ok(Value::Int(*n)),
                other => Ok(Value::Float(as_f64(name, other)?.floor())),
            }
        }
        (Some("text"), "upper") => {
            arity(name, &args, 1)?;
            Ok(Value::Str(as_str(name, &args[0])?.to_uppercase()))
        }
        (Some("text"), "lower") => {
            arity(name, &args, 1)?;
            Ok(Value::Str(as_str(name, &args[0])?.to_lowercase()))
        }
        (Some("text"), "trim") => {
            arity(name, &args, 1)?;
            Ok(Value::Str(as_str(name, &args[0])?.trim().to_string()))
        }
        (Some("text"), "contains") => {
            arity(name, &args, 2)?;
            let (haystack, needle) = (as_str(name, &args[0])?, as_str(name, &args[1])?);
            Ok(Value::Bool(haystack.contains(needle)))
        }
        (Some("text"), "split") => {
            arity(name, &args, 2)?;
            let (s, sep) = (as_str(name, &args[0])?, as_str(name, &args[1])?);
            if sep.is_empty() {
                return Err(RuntimeFault::new(fault_names::TYPE_ERROR, "The separator cannot be empty."));
            }
            Ok(Value::List(s.split(sep).map(|part| Value::Str(part.to_string())).collect()))
        }
        (Some("text"), "join") => {
            arity(name, &args, 2)?;
            let Value::List(items) = &args[0] else {
                return Err(bad_arg(name, &args[0]));
            };
            let sep = as_str(name, &args[1])?;
            let joined = items.iter()
                .map(|v| display_string(v, options))
                .collect::<Vec<_>>()
                .join(sep);
            Ok(Value::Str(joined))
        }
        (ns, name) => {
            let full = match ns {
                Some(ns) => format!("{}.{}", ns, name),
                None => name.to_string(),
            };
            Err(RuntimeFault::new(fault_names::UNDEFINED_NAME, format!("The name '{}' does not exist in the current context", full)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_ok(ns: Option<&str>, name: &str, args: Vec<Value>) -> Value {
        let mut out = Vec::new();
        call(ns, name, args, &mut out, &FormatOptions::default()).unwrap()
    }

    #[test]
    fn test_lookup_tables() {
        assert!(is_global("print"));
        assert!(is_namespace("math"));
        assert!(!is_namespace("System"));
        assert!(namespace_has("text", "upper"));
        assert!(!namespace_has("math", "upper"));
    }

    #[test]
    fn test_print_writes_display_strings() {
        let mut out = Vec::new();
        call(None, "print", vec![Value::from("a"), Value::Int(1)], &mut out, &FormatOptions::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a 1\n");
    }

    #[test]
    fn test_math() {
        assert_eq!(call_ok(Some("math"), "max", vec![Value::Int(2), Value::Int(5)]), Value::Int(5));
        assert_eq!(call_ok(Some("math"), "min", vec![Value::Int(2), Value::Float(1.5)]), Value::Float(1.5));
        assert_eq!(call_ok(Some("math"), "pow", vec![Value::Int(2), Value::Int(10)]), Value::Int(1024));
        assert_eq!(call_ok(Some("math"), "sqrt", vec![Value::Int(9)]), Value::Float(3.0));
        let mut out = Vec::new();
        let err = call(Some("math"), "pow", vec![Value::Int(10), Value::Int(40)], &mut out, &FormatOptions::default()).unwrap_err();
        assert_eq!(err.type_name, fault_names::OVERFLOW);
    }

    #[test]
    fn test_text() {
        assert_eq!(call_ok(Some("text"), "upper", vec![Value::from("ab")]), Value::from("AB"));
        assert_eq!(
            call_ok(Some("text"), "split", vec![Value::from("a,b"), Value::from(",")]),
            Value::List(vec![Value::from("a"), Value::from("b")]),
        );
        assert_eq!(
            call_ok(Some("text"), "join", vec![Value::List(vec![Value::Int(1), Value::from("x")]), Value::from("-")]),
            Value::from("1-x"),
        );
    }

    #[test]
    fn test_wrong_arity() {
        let mut out = Vec::new();
        let err = call(None, "len", vec![], &mut out, &FormatOptions::default()).unwrap_err();
        assert_eq!(err.type_name, fault_names::TYPE_ERROR);
        assert_eq!(err.message, "No overload for method 'len' takes 0 arguments");
    }
}
