//! help: display command help

use crate::error::ScriptError;
use crate::repl::{Cmd, CmdResult, CmdUsage, CommandContext};

pub struct HelpCmd {
    /// (name, args, summary) for each command
    cmd_info: Vec<(String, String, String)>,
}

impl HelpCmd {
    pub fn new(cmd_info: Vec<(String, String, String)>) -> Self {
        Self { cmd_info }
    }

    fn entry(output: &mut String, name: &str, args: &str, summary: &str) {
        if args.is_empty() {
            output.push_str(&format!("#{}\n    {}\n", name, summary));
        } else {
            output.push_str(&format!("#{} {}\n    {}\n", name, args, summary));
        }
    }
}

impl Cmd for HelpCmd {
    fn name(&self) -> &str {
        super::HELP
    }

    fn run(&self, ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CmdResult, ScriptError> {
        let mut output = String::new();

        if args.is_empty() {
            for (name, args_str, summary) in &self.cmd_info {
                Self::entry(&mut output, name, args_str, summary);
            }
            output.push_str("\nAnything else is compiled and run as code.\n");
        } else {
            for name in args {
                let name = name.trim_start_matches('#');
                match self.cmd_info.iter().find(|(n, _, _)| n == name) {
                    Some((_, args_str, summary)) => Self::entry(&mut output, name, args_str, summary),
                    None => output.push_str(&format!("#{}: unknown command\n", name)),
                }
            }
        }

        ctx.out.write_all(output.as_bytes())?;
        Ok(CmdResult::Ok)
    }

    fn usage(&self) -> CmdUsage {
        CmdUsage {
            summary: "Display help for commands".into(),
            args: "[command...]".into(),
        }
    }
}
