//! Operator tags for binary and unary expressions.
//!
//! Closed enums with classification helpers. The code generator matches on
//! these exhaustively, so an out-of-range operator tag is unrepresentable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary operator tags.
///
/// `And`/`Or` are short-circuiting and lower to control flow, not to a single
/// instruction; the rest map one-to-one onto signed integer arithmetic or
/// comparison instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Returns `true` for the four arithmetic operators.
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div)
    }

    /// Returns `true` for the six comparison operators (1-bit result).
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    /// Returns `true` for `and`/`or`, which must not evaluate their right
    /// operand eagerly.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Surface spelling, as written in source.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operator tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Logical negation: compares the operand against zero for equality.
    Not,
    /// Arithmetic negation.
    Neg,
}

impl UnaryOp {
    /// Surface spelling, as written in source.
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "-",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_a_partition() {
        let all = [
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Lt,
            BinaryOp::Gt,
            BinaryOp::Le,
            BinaryOp::Ge,
            BinaryOp::And,
            BinaryOp::Or,
        ];
        for op in all {
            let classes = [op.is_arithmetic(), op.is_comparison(), op.is_short_circuit()];
            assert_eq!(
                classes.iter().filter(|c| **c).count(),
                1,
                "{op} must fall in exactly one class"
            );
        }
    }

    #[test]
    fn display_matches_surface_spelling() {
        assert_eq!(BinaryOp::Le.to_string(), "<=");
        assert_eq!(BinaryOp::And.to_string(), "and");
        assert_eq!(UnaryOp::Not.to_string(), "not");
        assert_eq!(UnaryOp::Neg.to_string(), "-");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&BinaryOp::Ne).unwrap();
        let back: BinaryOp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BinaryOp::Ne);
    }
}
