//! Failure containment at the interpreter boundary.
//!
//! The interpreter reports every failure as an error value or a panic
//! with free-form text. Nothing structured crosses the boundary, so the
//! bridge pattern-matches the text into a small set of kinds and reduces
//! every outcome — including panics — to a `Contained` value. No panic
//! ever escapes into the host's message dispatch or audio callback.

use crate::error::{BridgeError, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Error kinds recognized for user-facing guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UndefinedSymbol,
    StackUnderflow,
    StackOverflow,
    Syntax,
    Type,
    Range,
    Memory,
    Unknown,
}

impl ErrorKind {
    /// Detect the kind from the interpreter's error text.
    ///
    /// The match order mirrors the specificity of the patterns: symbol
    /// lookup first, stack faults before the generic categories.
    pub fn detect(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("undefined") {
            ErrorKind::UndefinedSymbol
        } else if lower.contains("stack underflow") || lower.contains("underflow") {
            ErrorKind::StackUnderflow
        } else if lower.contains("stack overflow") || lower.contains("overflow") {
            ErrorKind::StackOverflow
        } else if lower.contains("syntax") {
            ErrorKind::Syntax
        } else if lower.contains("type") {
            ErrorKind::Type
        } else if lower.contains("range") {
            ErrorKind::Range
        } else if lower.contains("memory") || lower.contains("alloc") {
            ErrorKind::Memory
        } else {
            ErrorKind::Unknown
        }
    }

    /// Short contextual hint shown alongside the error message.
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorKind::UndefinedSymbol => "Check function names - e.g. sinosc, play, +, -, *, /",
            ErrorKind::StackUnderflow => {
                "Not enough arguments for operation - '440 0 sinosc' needs both values first"
            }
            ErrorKind::StackOverflow => "Too many values on stack - simplify the expression",
            ErrorKind::Syntax => "Check parentheses, quotes, and operators",
            ErrorKind::Type => "Wrong argument type - check number vs audio vs sequence",
            ErrorKind::Range => "Value out of valid range - check indices and frequencies",
            ErrorKind::Memory => "Out of memory - try simpler code",
            ErrorKind::Unknown => "Try simpler expressions like '440 0 sinosc'",
        }
    }
}

/// A failure reduced to a typed outcome at the boundary.
#[derive(Debug, Clone)]
pub struct Contained {
    pub kind: ErrorKind,
    pub message: String,
}

impl Contained {
    fn new(message: String) -> Self {
        Self {
            kind: ErrorKind::detect(&message),
            message,
        }
    }
}

/// Run a control-path interpreter call with full containment.
///
/// Errors and panics both become a `Contained` outcome. `label` names
/// the pipeline stage for the panic message ("compile", "execute", ...).
pub fn run_contained<T>(
    label: &str,
    f: impl FnOnce() -> Result<T>,
) -> std::result::Result<T, Contained> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Contained::new(e.message())),
        Err(payload) => Err(Contained::new(format!(
            "panic during {}: {}",
            label,
            panic_message(&*payload)
        ))),
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Map a contained compile failure into the bridge error taxonomy.
pub fn compile_error(contained: &Contained) -> BridgeError {
    BridgeError::Compile {
        message: contained.message.clone(),
    }
}

/// Map a contained execution failure into the bridge error taxonomy.
pub fn execution_error(contained: &Contained) -> BridgeError {
    BridgeError::Execution {
        message: contained.message.clone(),
    }
}
