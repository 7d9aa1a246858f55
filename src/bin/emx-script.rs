//! emx-script CLI
//!
//! Run a script file, inline code, or an interactive REPL.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use anyhow::{bail, Context};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use signal_hook::consts::SIGINT;
use emx_script::{
    format_fault, init_tracing, CmdResult, DependencySpec, InputBuffer, Repl, RunOutcome,
    ScriptMode, ScriptRunner, ScriptRunnerBuilder,
};

#[derive(Parser, Debug)]
#[command(name = "emx-script")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Run emx scripts, or start an interactive REPL")]
struct Cli {
    /// Script file to run (`-` reads stdin); omit for the REPL
    file: Option<PathBuf>,

    /// Run this code instead of a file
    #[arg(short = 'e', long = "code", conflicts_with = "file")]
    code: Option<String>,

    /// Treat the code as a single expression and print its value
    #[arg(long)]
    eval: bool,

    /// Library file to load first (repeatable)
    #[arg(short = 'r', long = "reference")]
    references: Vec<PathBuf>,

    /// Package to load first, as NAME@VERSION (repeatable)
    #[arg(short = 'p', long = "package", value_parser = parse_package)]
    packages: Vec<DependencySpec>,

    /// Local package directory [env: EMX_SCRIPT_PACKAGES, default: ./packages]
    #[arg(long = "package-root")]
    package_root: Option<PathBuf>,

    /// Always recompile after a failed compilation
    #[arg(long = "no-cache-failures")]
    no_cache_failures: bool,

    /// Verbose output: debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn parse_package(s: &str) -> Result<DependencySpec, String> {
    DependencySpec::parse_package(s).ok_or_else(|| format!("expected NAME@VERSION, got '{}'", s))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let interactive = cli.file.is_none() && cli.code.is_none();

    let mut builder = ScriptRunnerBuilder::new()
        .working_directory(cwd)
        .mode(if cli.eval { ScriptMode::Eval } else { ScriptMode::Script })
        .echo_result(cli.eval || cli.code.is_some())
        .cache_failures(!cli.no_cache_failures)
        .dependencies(cli.packages);
    for reference in cli.references {
        builder = builder.reference(reference);
    }
    if let Some(root) = cli.package_root {
        builder = builder.package_root(root);
    }
    let runner = builder.build();

    if interactive {
        repl(&runner)?;
        return Ok(ExitCode::SUCCESS);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = match (cli.code, cli.file) {
        (Some(code), _) => runner.run_source(&code, &mut out)?,
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source).context("reading script from stdin")?;
            runner.run_source(&source, &mut out)?
        }
        (None, Some(path)) => runner.run_file(&path, &mut out)?,
        (None, None) => bail!("nothing to run"),
    };
    out.flush()?;
    Ok(report(&outcome))
}

fn report(outcome: &RunOutcome) -> ExitCode {
    match outcome.result.fault() {
        Some(fault) => {
            eprintln!("{}", format_fault(fault));
            ExitCode::from(outcome.exit_code() as u8)
        }
        None => ExitCode::SUCCESS,
    }
}

fn repl(runner: &ScriptRunner) -> anyhow::Result<()> {
    let mut session = runner.session()?;
    let repl = Repl::new().with_format(runner.config().format);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C at the prompt is a key rustyline sees; while code runs it is
    // SIGINT, which cancels the submission instead of the process
    let token = runner.executor().cancellation_token().clone();
    signal_hook::flag::register(SIGINT, Arc::clone(token.flag()))
        .context("installing the interrupt handler")?;

    println!("emx-script REPL ({})", env!("CARGO_PKG_VERSION"));
    println!("Type #help for commands, #exit or Ctrl+D to quit");

    let mut input = InputBuffer::new();
    loop {
        let prompt = if input.is_empty() { "> " } else { "* " };
        match rl.readline(prompt) {
            Ok(line) => {
                let Some(submission) = input.push_line(&line) else {
                    continue;
                };
                let _ = rl.add_history_entry(submission.trim_end());

                token.reset();
                let stdout = io::stdout();
                let mut out = stdout.lock();
                match repl.handle_line(&mut session, &submission, &mut out) {
                    Ok(CmdResult::Exit) => break,
                    Ok(CmdResult::Ok) => {}
                    Err(e) => eprintln!("{}", e),
                }
                out.flush()?;
            }
            Err(ReadlineError::Interrupted) => {
                // drop a half-typed submission
                input.clear();
                println!("^C");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
