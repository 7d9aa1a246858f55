//! Built-in REPL commands
//!
//! Every command gets a [`CommandContext`](crate::repl::CommandContext) and
//! nothing else: the session it acts on and the sink it writes to.

mod flow;
mod help;
mod session;

use std::collections::HashMap;
use crate::repl::BoxedCmd;

pub use help::HelpCmd;

/// Name `#help` is registered under.
pub const HELP: &str = "help";

/// Return the default set of built-in commands (help is added by the REPL)
pub fn default_commands() -> HashMap<String, BoxedCmd> {
    let cmds: Vec<BoxedCmd> = vec![
        Box::new(session::ResetCmd),
        Box::new(session::VarsCmd),
        Box::new(session::UsingsCmd),
        Box::new(session::RefsCmd),
        Box::new(session::LoadCmd),
        Box::new(flow::ExitCmd::new("exit")),
        Box::new(flow::ExitCmd::new("quit")),
    ];
    cmds.into_iter()
        .map(|cmd| (cmd.name().to_string(), cmd))
        .collect()
}
