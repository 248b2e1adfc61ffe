//! Codegen error types and user-facing diagnostics.
//!
//! User errors (undeclared identifiers, arity mismatches, …) are collected as
//! [`Diagnostic`]s while lowering continues, so one bad statement does not
//! hide problems in the rest of the program. After the whole root has been
//! lowered, error-severity diagnostics are promoted to
//! [`CodegenError::CompileFailed`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowscript_parser::ParseError;

/// Diagnostic severity. Warnings never fail a compilation on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// A one-line, line-annotated user diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 1-based source line the diagnostic refers to.
    pub line: u32,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "line {}: {}", self.line, self.message),
            Severity::Warning => write!(f, "line {}: warning: {}", self.line, self.message),
        }
    }
}

/// Errors that can occur during code generation.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// One or more error-severity diagnostics were reported while lowering.
    /// Carries every diagnostic (warnings included) for rendering.
    #[error("code generation failed with {} error(s)", .0.iter().filter(|d| d.severity == Severity::Error).count())]
    CompileFailed(Vec<Diagnostic>),

    /// The AST handed to the generator had an unexpected shape.
    #[error("invalid AST: {0}")]
    InvalidAst(&'static str),

    /// Final module verification rejected the emitted IR.
    #[error("module verification failed: {0}")]
    Verification(String),
}

/// Umbrella error for the full source-to-IR pipeline.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_is_line_prefixed() {
        let d = Diagnostic {
            line: 7,
            severity: Severity::Error,
            message: "undeclared identifier 'x'".into(),
        };
        assert_eq!(d.to_string(), "line 7: undeclared identifier 'x'");
    }

    #[test]
    fn warning_display_is_marked() {
        let d = Diagnostic {
            line: 2,
            severity: Severity::Warning,
            message: "type mismatch in assignment to 'x'".into(),
        };
        assert_eq!(
            d.to_string(),
            "line 2: warning: type mismatch in assignment to 'x'"
        );
    }

    #[test]
    fn compile_failed_counts_only_errors() {
        let err = CodegenError::CompileFailed(vec![
            Diagnostic {
                line: 1,
                severity: Severity::Warning,
                message: "w".into(),
            },
            Diagnostic {
                line: 2,
                severity: Severity::Error,
                message: "e".into(),
            },
        ]);
        assert_eq!(err.to_string(), "code generation failed with 1 error(s)");
    }
}
