//! Session commands: reset, vars, usings, refs, load

use std::path::Path;
use crate::error::{ErrorKind, ScriptError};
use crate::format::format_value;
use crate::repl::{echo, Cmd, CmdResult, CmdUsage, CommandContext};
use crate::unit::{ScriptMode, ScriptUnit};

// ──────────────────────────────────────────────────────────
// reset: discard accumulated session state
// ──────────────────────────────────────────────────────────

pub(super) struct ResetCmd;

impl Cmd for ResetCmd {
    fn name(&self) -> &str {
        "reset"
    }

    fn run(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CmdResult, ScriptError> {
        if !args.is_empty() {
            return Err(ScriptError::no_args("reset"));
        }
        ctx.session.reset();
        writeln!(ctx.out, "Session reset.")?;
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Clear variables, usings and references".into(),
            args: String::new(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// vars: list global bindings
// ──────────────────────────────────────────────────────────

pub(super) struct VarsCmd;

impl Cmd for VarsCmd {
    fn name(&self) -> &str {
        "vars"
    }

    fn run(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CmdResult, ScriptError> {
        if !args.is_empty() {
            return Err(ScriptError::no_args("vars"));
        }
        let format = ctx.session.executor().config().format;
        for (name, value) in ctx.session.bindings().iter() {
            writeln!(ctx.out, "{} = {}", name, format_value(value, &format))?;
        }
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "List session variables and functions".into(),
            args: String::new(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// usings: list imported namespaces
// ──────────────────────────────────────────────────────────

pub(super) struct UsingsCmd;

impl Cmd for UsingsCmd {
    fn name(&self) -> &str {
        "usings"
    }

    fn run(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CmdResult, ScriptError> {
        if !args.is_empty() {
            return Err(ScriptError::no_args("usings"));
        }
        for using in ctx.session.state().usings() {
            writeln!(ctx.out, "using {};", using)?;
        }
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "List namespaces imported with using".into(),
            args: String::new(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// refs: list references
// ──────────────────────────────────────────────────────────

pub(super) struct RefsCmd;

impl Cmd for RefsCmd {
    fn name(&self) -> &str {
        "refs"
    }

    fn run(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CmdResult, ScriptError> {
        if !args.is_empty() {
            return Err(ScriptError::no_args("refs"));
        }
        for reference in ctx.session.state().references() {
            writeln!(ctx.out, "{}", reference)?;
        }
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "List the session's references".into(),
            args: String::new(),
        }
    }
}

// ──────────────────────────────────────────────────────────
// load: submit a file's contents
// ──────────────────────────────────────────────────────────

pub(super) struct LoadCmd;

impl Cmd for LoadCmd {
    fn name(&self) -> &str {
        "load"
    }

    fn run(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CmdResult, ScriptError> {
        if args.len() != 1 {
            return Err(ScriptError::usage("load", "file"));
        }
        let path = ctx.session.working_directory().join(&args[0]);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            ScriptError::new(ErrorKind::Io, e.to_string())
                .with_command("load")
                .with_file(path.display().to_string())
        })?;

        // #r paths inside the file are relative to the file
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let unit = ScriptUnit::new(text, ScriptMode::Repl)
            .with_working_directory(dir)
            .with_references(ctx.session.state().baseline().to_vec());
        let result = ctx.session.submit_unit(Some(unit), &mut *ctx.out)?;
        let format = ctx.session.executor().config().format;
        echo(&result, &format, &mut *ctx.out)?;
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Run a script file in the session".into(),
            args: "file".into(),
        }
    }
}
