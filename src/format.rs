//! Value and fault formatting
//!
//! Pure functions; all configuration travels in [`FormatOptions`]. The
//! output is what the REPL echoes, so the rules are exact:
//!
//! | Value | Rendering |
//! |-------|-----------|
//! | null | `null` |
//! | string | `"text"` (contents verbatim, no escaping) |
//! | bool | `true` / `false` |
//! | int | `42` |
//! | list | `[1, "a", null]` |
//! | record | `{ name = "x", n = 1 }` |
//! | function | `<fn add(a, b)>` |
//! | unit | empty |

use crate::stack::ensure_sufficient_stack;
use crate::result::FaultDescriptor;
use crate::value::Value;

/// Formatting configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Nesting depth after which lists/records render as `...`
    pub max_depth: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { max_depth: 8 }
    }
}

/// Render a value for REPL echo.
pub fn format_value(value: &Value, options: &FormatOptions) -> String {
    let mut out = String::new();
    write_value(&mut out, value, options, 0);
    out
}

/// Render a fault as `type: message`.
///
/// The message is kept verbatim, even when it is empty or spans lines.
pub fn format_fault(fault: &FaultDescriptor) -> String {
    format!("{}: {}", fault.type_name, fault.message)
}

/// Render a value the way `print` shows it: strings without quotes,
/// everything else as [`format_value`].
pub fn display_string(value: &Value, options: &FormatOptions) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => format_value(other, options),
    }
}

fn format_float(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else {
        n.to_string()
    }
}

fn write_value(out: &mut String, value: &Value, options: &FormatOptions, depth: usize) {
    ensure_sufficient_stack(|| write_value_inner(out, value, options, depth))
}

fn write_value_inner(out: &mut String, value: &Value, options: &FormatOptions, depth: usize) {
    match value {
        Value::Unit => {}
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(n) => out.push_str(&format_float(*n)),
        Value::Str(s) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Value::List(items) => {
            if depth >= options.max_depth {
                out.push_str("...");
                return;
            }
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, options, depth + 1);
            }
            out.push(']');
        }
        Value::Record(fields) => {
            if depth >= options.max_depth {
                out.push_str("...");
                return;
            }
            if fields.is_empty() {
                out.push_str("{ }");
                return;
            }
            out.push_str("{ ");
            for (i, (name, field)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push_str(" = ");
                write_value(out, field, options, depth + 1);
            }
            out.push_str(" }");
        }
        Value::Function(decl) => {
            out.push_str(&format!("<fn {}({})>", decl.name, decl.params.join(", ")));
        }
    }
}
