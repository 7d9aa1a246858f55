//! Host-level errors
//!
//! Script faults (compile errors, runtime exceptions) are *values* carried by
//! [`ExecutionResult`](crate::ExecutionResult). `ScriptError` is reserved for
//! failures the caller has to deal with directly: contract violations,
//! command misuse, and I/O around the core.

use std::fmt;

/// The kind of host error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required argument was absent (caller misuse)
    Precondition,
    /// A dependency could not be located
    Resolution,
    /// Source did not compile
    Compilation,
    /// Script raised a fault at runtime
    Runtime,
    /// Invalid operation on a session
    Session,
    /// Invalid usage of a command
    Usage,
    /// IO error
    Io,
}

/// A host error with optional command/file context
#[derive(Debug)]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub command: Option<String>,
    pub file: Option<String>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            command: None,
            file: None,
        }
    }

    pub fn with_command(mut self, cmd: impl Into<String>) -> Self {
        self.command = Some(cmd.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// A required argument was missing.
    pub fn precondition(what: &str) -> Self {
        Self::new(ErrorKind::Precondition, format!("{} must not be absent", what))
    }

    pub fn usage(cmd: &str, expected: &str) -> Self {
        Self::new(ErrorKind::Usage, format!("usage: #{} {}", cmd, expected))
            .with_command(cmd)
    }

    /// A command that takes no arguments got some.
    pub fn no_args(cmd: &str) -> Self {
        Self::new(ErrorKind::Usage, "takes no arguments").with_command(cmd)
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Session, msg)
    }

    pub fn is_precondition(&self) -> bool {
        self.kind == ErrorKind::Precondition
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref file) = self.file {
            write!(f, "{}: ", file)?;
        }
        if let Some(ref cmd) = self.command {
            write!(f, "#{}: ", cmd)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ScriptError {}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}
