//! REPL command layer
//!
//! The [`Repl`] holds the command registry and routes each input line: a
//! line starting with `#name` where `name` is registered runs that command,
//! anything else is submitted to the [`Session`] as code and its value or
//! fault is echoed.

use std::collections::HashMap;
use std::io::Write;
use crate::error::{ErrorKind, ScriptError};
use crate::format::{format_fault, format_value, FormatOptions};
use crate::result::ExecutionResult;
use crate::session::Session;

/// Result returned by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdResult {
    /// Keep reading input
    Ok,
    /// Leave the REPL
    Exit,
}

/// Usage information for a command
pub struct CmdUsage {
    /// One-line summary
    pub summary: String,
    /// Argument syntax
    pub args: String,
}

/// What a command may touch: the session and the output sink, nothing else
pub struct CommandContext<'a> {
    pub session: &'a mut Session,
    pub out: &'a mut dyn Write,
}

/// A REPL command
pub trait Cmd: Send + Sync {
    /// Name the command is invoked by, without the leading `#`
    fn name(&self) -> &str;

    /// Execute the command
    fn run(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CmdResult, ScriptError>;

    /// Return usage information
    fn usage(&self) -> CmdUsage;
}

/// A boxed command
pub type BoxedCmd = Box<dyn Cmd>;

/// The command registry and line dispatcher
pub struct Repl {
    /// Registered commands
    pub commands: HashMap<String, BoxedCmd>,
    /// How echoed values are rendered
    pub format: FormatOptions,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    /// Create a REPL with the built-in commands
    pub fn new() -> Self {
        let mut repl = Self {
            commands: crate::commands::default_commands(),
            format: FormatOptions::default(),
        };
        repl.rebuild_help();
        repl
    }

    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    /// Register a custom command, replacing any command of the same name.
    pub fn register_command(&mut self, cmd: BoxedCmd) {
        self.commands.insert(cmd.name().to_string(), cmd);
        self.rebuild_help();
    }

    // help lists every other command, so it is rebuilt after each registration
    fn rebuild_help(&mut self) {
        let mut cmd_help: Vec<(String, String, String)> = self.commands.iter()
            .filter(|(name, _)| name.as_str() != crate::commands::HELP)
            .map(|(name, cmd)| {
                let u = cmd.usage();
                (name.clone(), u.args, u.summary)
            })
            .collect();
        let help = crate::commands::HelpCmd::new(Vec::new());
        let u = help.usage();
        cmd_help.push((crate::commands::HELP.to_string(), u.args, u.summary));
        cmd_help.sort_by(|a, b| a.0.cmp(&b.0));

        self.commands.insert(crate::commands::HELP.into(),
            Box::new(crate::commands::HelpCmd::new(cmd_help)));
    }

    /// Handle one complete input (possibly several lines of code).
    pub fn handle_line(
        &self,
        session: &mut Session,
        input: &str,
        out: &mut dyn Write,
    ) -> Result<CmdResult, ScriptError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(CmdResult::Ok);
        }

        if let Some(rest) = trimmed.strip_prefix('#') {
            let word = rest.split(char::is_whitespace).next().unwrap_or("");
            if let Some(cmd) = self.commands.get(word) {
                let args = split_args(&rest[word.len()..])
                    .map_err(|msg| ScriptError::new(ErrorKind::Usage, msg).with_command(word))?;
                let mut ctx = CommandContext { session, out };
                return cmd.run(&mut ctx, &args);
            }
            if word != "r" {
                return Err(ScriptError::new(
                    ErrorKind::Usage,
                    format!("unknown command '#{}'; type #help for a list", word),
                ));
            }
        }

        let result = session.submit(input, out);
        echo(&result, &self.format, out)?;
        Ok(CmdResult::Ok)
    }
}

/// Write a submission's value or fault the way the REPL shows it.
///
/// A unit value prints nothing.
pub fn echo(result: &ExecutionResult, format: &FormatOptions, out: &mut dyn Write) -> std::io::Result<()> {
    match result {
        ExecutionResult::Success { return_value, .. } if !return_value.is_unit() => {
            writeln!(out, "{}", format_value(return_value, format))
        }
        ExecutionResult::Success { .. } => Ok(()),
        ExecutionResult::Failure { fault } => writeln!(out, "{}", format_fault(fault)),
    }
}

/// Split command arguments on whitespace.
///
/// Single or double quotes group words; a doubled quote inside quotes is a
/// literal quote character.
pub fn split_args(s: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                in_arg = true;
                let quote = c;
                loop {
                    match chars.next() {
                        Some(q) if q == quote => {
                            if chars.peek() == Some(&quote) {
                                chars.next();
                                current.push(quote);
                            } else {
                                break;
                            }
                        }
                        Some(other) => current.push(other),
                        None => return Err("unterminated quoted argument".into()),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                in_arg = true;
                current.push(c);
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

/// True once every `(`, `[` and `{` in `text` is closed.
///
/// Brackets inside string literals and comments are ignored. An unmatched
/// closing bracket counts as complete so the compiler can report it.
pub fn is_complete(text: &str) -> bool {
    let mut depth: i64 = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                while let Some(s) = chars.next() {
                    match s {
                        '\\' => {
                            chars.next();
                        }
                        '"' | '\n' => break,
                        _ => {}
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for s in chars.by_ref() {
                    if s == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut closed = false;
                while let Some(s) = chars.next() {
                    if s == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return false;
                }
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Collects typed lines until they form one submission.
///
/// Code accumulates until [`is_complete`] says its brackets are balanced. A
/// line starting with `#` is always handled on its own; it discards any
/// unfinished code, so `#reset` gets out of a half-typed block.
#[derive(Debug, Default)]
pub struct InputBuffer {
    pending: String,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no unfinished code is waiting for more lines.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Add a line; returns the input to handle once one is ready.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if line.trim_start().starts_with('#') {
            self.pending.clear();
            return Some(format!("{}\n", line));
        }
        self.pending.push_str(line);
        self.pending.push('\n');
        if is_complete(&self.pending) {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use std::sync::Arc;

    fn run_lines(lines: &[&str]) -> String {
        let repl = Repl::new();
        let mut session = Session::new(Arc::new(Executor::default()));
        let mut out = Vec::new();
        for line in lines {
            repl.handle_line(&mut session, line, &mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_echo_values_and_faults() {
        let out = run_lines(&["var x = 41;", "x + 1", "\"hi\"", "x / 0", "x"]);
        assert_eq!(out, "42\n\"hi\"\nemx.DivideByZeroError: Attempted to divide by zero.\n41\n");
    }

    #[test]
    fn test_blank_line_is_noop() {
        assert_eq!(run_lines(&["", "   "]), "");
    }

    #[test]
    fn test_unknown_command() {
        let repl = Repl::new();
        let mut session = Session::new(Arc::new(Executor::default()));
        let err = repl.handle_line(&mut session, "#frobnicate", &mut Vec::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Usage);
        assert!(err.message.contains("#frobnicate"));
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("  a b  c ").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(split_args("'my file.emxs' x").unwrap(), vec!["my file.emxs", "x"]);
        assert_eq!(split_args("\"it\"\"s\"").unwrap(), vec!["it\"s"]);
        assert_eq!(split_args("''").unwrap(), vec![""]);
        assert!(split_args("'open").is_err());
        assert!(split_args("").unwrap().is_empty());
    }

    #[test]
    fn test_input_buffer_continuation() {
        let mut input = InputBuffer::new();
        assert_eq!(input.push_line("fn f(a) {"), None);
        assert!(!input.is_empty());
        assert_eq!(input.push_line("  return a;"), None);
        assert_eq!(input.push_line("}").as_deref(), Some("fn f(a) {\n  return a;\n}\n"));
        assert!(input.is_empty());
    }

    #[test]
    fn test_command_inside_open_block() {
        let repl = Repl::new();
        let mut session = Session::new(Arc::new(Executor::default()));
        let mut input = InputBuffer::new();
        let mut out = Vec::new();

        assert_eq!(input.push_line("fn f() {"), None);
        let line = input.push_line("#reset").unwrap();
        assert_eq!(line, "#reset\n");
        assert!(input.is_empty());
        assert_eq!(repl.handle_line(&mut session, &line, &mut out).unwrap(), CmdResult::Ok);
        assert_eq!(String::from_utf8(out).unwrap(), "Session reset.\n");

        // the dropped block does not leak into the next submission
        let line = input.push_line("1 + 1").unwrap();
        let mut out = Vec::new();
        repl.handle_line(&mut session, &line, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2\n");
    }

    #[test]
    fn test_is_complete() {
        assert!(is_complete("var x = 1;"));
        assert!(!is_complete("fn f(a) {"));
        assert!(is_complete("fn f(a) {\n  return a;\n}"));
        assert!(is_complete("\"{ not a brace\""));
        assert!(is_complete("// {"));
        assert!(!is_complete("/* unclosed"));
        assert!(is_complete("}"));
        assert!(!is_complete("[1,\n 2"));
    }
}
