//! Execution results and fault descriptors

use std::fmt;
use crate::backend::interp::RuntimeFault;
use crate::backend::Diagnostic;
use crate::resolver::ResolutionError;
use crate::unit::CompilationReference;
use crate::value::Value;

/// Type name reported for compile errors.
pub const COMPILATION_ERROR: &str = "emx.CompilationError";
/// Type name reported when a dependency cannot be resolved.
pub const RESOLUTION_ERROR: &str = "emx.ResolutionError";
/// Type name reported when execution was cancelled.
pub const CANCELLED_ERROR: &str = "emx.OperationCancelledError";

/// Fault category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    Resolution,
    Compilation,
    Runtime,
    Cancelled,
}

/// A structured failure, decoupled from whatever raised it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultDescriptor {
    pub kind: FaultKind,
    pub type_name: String,
    pub message: String,
}

impl FaultDescriptor {
    pub fn new(kind: FaultKind, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// One fault for a whole batch of diagnostics, one per line.
    pub fn compilation(diagnostics: &[Diagnostic]) -> Self {
        let message = diagnostics.iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(FaultKind::Compilation, COMPILATION_ERROR, message)
    }

    pub fn cancelled() -> Self {
        Self::new(FaultKind::Cancelled, CANCELLED_ERROR, "The operation was canceled.")
    }
}

impl fmt::Display for FaultDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format::format_fault(self))
    }
}

impl From<RuntimeFault> for FaultDescriptor {
    fn from(fault: RuntimeFault) -> Self {
        Self::new(FaultKind::Runtime, fault.type_name, fault.message)
    }
}

impl From<&ResolutionError> for FaultDescriptor {
    fn from(err: &ResolutionError) -> Self {
        Self::new(FaultKind::Resolution, RESOLUTION_ERROR, err.to_string())
    }
}

/// What a successful unit contributed, for the session to fold in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    pub declared: Vec<String>,
    pub usings: Vec<String>,
    pub references: Vec<CompilationReference>,
}

/// Outcome of one execution: a value or a fault, never both
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Success {
        return_value: Value,
        side_effects: Effects,
    },
    Failure {
        fault: FaultDescriptor,
    },
}

impl ExecutionResult {
    pub fn failure(fault: FaultDescriptor) -> Self {
        ExecutionResult::Failure { fault }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn return_value(&self) -> Option<&Value> {
        match self {
            ExecutionResult::Success { return_value, .. } => Some(return_value),
            ExecutionResult::Failure { .. } => None,
        }
    }

    pub fn fault(&self) -> Option<&FaultDescriptor> {
        match self {
            ExecutionResult::Failure { fault } => Some(fault),
            ExecutionResult::Success { .. } => None,
        }
    }

    pub fn side_effects(&self) -> Option<&Effects> {
        match self {
            ExecutionResult::Success { side_effects, .. } => Some(side_effects),
            ExecutionResult::Failure { .. } => None,
        }
    }

    /// Convert the return value to a Rust type. `None` on failure or type mismatch.
    pub fn value_as<T: TryFrom<Value>>(&self) -> Option<T> {
        self.return_value().and_then(|v| T::try_from(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_accessors() {
        let result = ExecutionResult::Success {
            return_value: Value::Int(42),
            side_effects: Effects::default(),
        };
        assert!(result.is_success());
        assert_eq!(result.value_as::<i64>(), Some(42));
        assert_eq!(result.value_as::<String>(), None);
        assert!(result.fault().is_none());
    }

    #[test]
    fn test_failure_accessors() {
        let result = ExecutionResult::failure(FaultDescriptor::cancelled());
        assert!(!result.is_success());
        assert!(result.return_value().is_none());
        assert_eq!(result.fault().map(|f| f.kind), Some(FaultKind::Cancelled));
        assert_eq!(result.fault().map(|f| f.to_string()).as_deref(),
            Some("emx.OperationCancelledError: The operation was canceled."));
    }

    #[test]
    fn test_runtime_fault_conversion() {
        let fault: FaultDescriptor = RuntimeFault::new("emx.TypeError", "bad").into();
        assert_eq!(fault.kind, FaultKind::Runtime);
        assert_eq!(fault.type_name, "emx.TypeError");
    }
}
