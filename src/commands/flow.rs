//! Flow control commands: exit, quit

use crate::error::ScriptError;
use crate::repl::{Cmd, CmdResult, CmdUsage, CommandContext};

// ──────────────────────────────────────────────────────────
// exit / quit: leave the REPL
// ──────────────────────────────────────────────────────────

pub(super) struct ExitCmd {
    name: &'static str,
}

impl ExitCmd {
    pub(super) fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Cmd for ExitCmd {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CmdResult, ScriptError> {
        if !args.is_empty() {
            return Err(ScriptError::no_args(self.name));
        }
        Ok(CmdResult::Exit)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Leave the REPL".into(),
            args: String::new(),
        }
    }
}
