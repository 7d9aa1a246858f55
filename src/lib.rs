//! emx-script: a script execution core with an interactive session
//!
//! A unit of source text goes in; its inline dependencies are resolved, it is
//! compiled (through a cache) against whatever the session has accumulated,
//! run with faults isolated, and reported as either a return value or a
//! fault descriptor.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use emx_script::{Executor, Session};
//!
//! let mut session = Session::new(Arc::new(Executor::default()));
//! let mut out = std::io::stdout();
//! session.submit("var x = 40;", &mut out);
//! let result = session.submit("x + 2", &mut out);
//! assert_eq!(result.value_as::<i64>(), Some(42));
//!
//! session.reset();
//! assert!(!session.submit("x", &mut out).is_success());
//! ```
//!
//! # Scripts
//!
//! ```text
//! #r "pkg:Geometry@1.2.0"
//! #r "lib/util.emxs"
//! using math;
//!
//! fn hyp(a, b) { return sqrt(a * a + b * b); }
//! print("hyp:", hyp(3, 4));
//! return new { ok = true, n = 5 };
//! ```
//!
//! # REPL commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `#reset` | Clear variables, usings and references |
//! | `#vars` | List session variables and functions |
//! | `#usings` | List imported namespaces |
//! | `#refs` | List references |
//! | `#load <file>` | Run a script file in the session |
//! | `#help [cmd...]` | Display help |
//! | `#exit`, `#quit` | Leave the REPL |

pub mod backend;
mod bindings;
mod cache;
mod cancel;
mod commands;
mod directives;
mod error;
mod executor;
mod format;
mod repl;
mod resolver;
mod result;
mod runner;
mod session;
mod stack;
mod unit;
mod value;

use std::sync::Once;

pub use bindings::Bindings;
pub use cache::{CacheConfig, CacheKey, CacheStats, CompilationCache};
pub use cancel::CancellationToken;
pub use commands::{default_commands, HelpCmd};
pub use directives::{extract as extract_directives, Directives};
pub use error::{ErrorKind, ScriptError};
pub use executor::{ExecutionOutcome, Executor, ExecutorConfig, DEFAULT_MAX_CALL_DEPTH};
pub use format::{display_string, format_fault, format_value, FormatOptions};
pub use repl::{
    echo, is_complete, split_args, BoxedCmd, Cmd, CmdResult, CmdUsage, CommandContext, InputBuffer, Repl,
};
pub use resolver::{DependencySpec, LocalPackageSource, PackageSource, ResolutionError, Resolver, PACKAGE_ROOT_ENV};
pub use result::{Effects, ExecutionResult, FaultDescriptor, FaultKind};
pub use runner::{RunConfig, RunOutcome, RunSummary, ScriptRunner, ScriptRunnerBuilder};
pub use session::{Session, SessionState};
pub use unit::{CompilationReference, ScriptMode, ScriptUnit};
pub use value::{Value, ValueTypeError};

// Convenience functions for cargo test integration
pub use runner::{run_and_assert, run_and_assert_with};

static TRACING_INIT: Once = Once::new();

/// Install a stderr `tracing` subscriber, once per process.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` if `verbose`,
/// else `warn`.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let default = if verbose { "emx_script=debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default));
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .init();
    });
}
