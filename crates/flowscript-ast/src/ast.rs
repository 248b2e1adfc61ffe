//! The FlowScript AST node.
//!
//! A single tagged variant covering expressions, statements, and the pipeline
//! operator. The tree is single-owner parent-to-children (no cycles, no
//! sharing); the parser builds it, the driver owns it for the whole
//! compilation, and the code generator only borrows it.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ops::{BinaryOp, UnaryOp};

/// Ordered formal parameter names. Function arity is almost always tiny.
pub type ParamList = SmallVec<[String; 4]>;

/// One node of the FlowScript syntax tree.
///
/// Every variant carries the 1-based line of its first source token, exposed
/// uniformly through [`Node::line`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    /// Integer literal.
    Number { value: i32, line: u32 },

    /// Variable or function reference by name.
    Identifier { name: String, line: u32 },

    /// Binary operation, including comparisons and short-circuit `and`/`or`.
    BinaryOp {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
        line: u32,
    },

    /// Unary operation (`not`, arithmetic negation).
    UnaryOp {
        op: UnaryOp,
        operand: Box<Node>,
        line: u32,
    },

    /// Assignment to a name. First assignment in a scope declares the name;
    /// the expression's value is the right-hand side (assignments chain).
    Assignment {
        target: String,
        value: Box<Node>,
        line: u32,
    },

    /// Function definition. Parameters and the return value are all the
    /// scalar integer type.
    FunctionDef {
        name: String,
        params: ParamList,
        body: Vec<Node>,
        line: u32,
    },

    /// Direct call of a named function.
    FunctionCall {
        name: String,
        args: Vec<Node>,
        line: u32,
    },

    /// The pipe operator: `left |> right`. `right` must be a call,
    /// conditional, for-each loop, or print call; the code generator rejects
    /// other shapes.
    Pipeline {
        left: Box<Node>,
        right: Box<Node>,
        line: u32,
    },

    /// Conditional with optional else branch. Has no value.
    IfElse {
        condition: Box<Node>,
        then_body: Vec<Node>,
        else_body: Option<Vec<Node>>,
        line: u32,
    },

    /// Bounded for-each loop. `range` is absent when the loop expects a
    /// pipeline to supply one (`range(a,b) |> for each { … }`).
    ForLoop {
        range: Option<Box<Node>>,
        var: String,
        body: Vec<Node>,
        line: u32,
    },

    /// Half-open integer range `range(start, end)`. Structural: it has no
    /// scalar value and only appears as a loop bound or pipeline source.
    Range {
        start: Box<Node>,
        end: Box<Node>,
        line: u32,
    },

    /// Return from the enclosing function, optionally with a value.
    Return { value: Option<Box<Node>>, line: u32 },

    /// Ordered statement sequence; the root of every program.
    StatementList { statements: Vec<Node>, line: u32 },

    /// Print call. An absent argument means "print the piped value".
    PrintCall { arg: Option<Box<Node>>, line: u32 },
}

impl Node {
    /// The 1-based source line of this node's first token.
    pub fn line(&self) -> u32 {
        match self {
            Node::Number { line, .. }
            | Node::Identifier { line, .. }
            | Node::BinaryOp { line, .. }
            | Node::UnaryOp { line, .. }
            | Node::Assignment { line, .. }
            | Node::FunctionDef { line, .. }
            | Node::FunctionCall { line, .. }
            | Node::Pipeline { line, .. }
            | Node::IfElse { line, .. }
            | Node::ForLoop { line, .. }
            | Node::Range { line, .. }
            | Node::Return { line, .. }
            | Node::StatementList { line, .. }
            | Node::PrintCall { line, .. } => *line,
        }
    }

    /// Returns `true` if this node is a `Range`.
    pub fn is_range(&self) -> bool {
        matches!(self, Node::Range { .. })
    }

    /// Short human-readable tag for diagnostics ("function call", "range", …).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Number { .. } => "number",
            Node::Identifier { .. } => "identifier",
            Node::BinaryOp { .. } => "binary operation",
            Node::UnaryOp { .. } => "unary operation",
            Node::Assignment { .. } => "assignment",
            Node::FunctionDef { .. } => "function definition",
            Node::FunctionCall { .. } => "function call",
            Node::Pipeline { .. } => "pipeline",
            Node::IfElse { .. } => "conditional",
            Node::ForLoop { .. } => "for-each loop",
            Node::Range { .. } => "range",
            Node::Return { .. } => "return",
            Node::StatementList { .. } => "statement list",
            Node::PrintCall { .. } => "print call",
        }
    }

    /// Convenience constructor for integer literals.
    pub fn number(value: i32, line: u32) -> Node {
        Node::Number { value, line }
    }

    /// Convenience constructor for identifier references.
    pub fn identifier(name: impl Into<String>, line: u32) -> Node {
        Node::Identifier {
            name: name.into(),
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_uniform_across_variants() {
        let n = Node::BinaryOp {
            op: BinaryOp::Add,
            left: Box::new(Node::number(1, 3)),
            right: Box::new(Node::number(2, 3)),
            line: 3,
        };
        assert_eq!(n.line(), 3);
        assert_eq!(Node::identifier("x", 9).line(), 9);
    }

    #[test]
    fn range_detection() {
        let r = Node::Range {
            start: Box::new(Node::number(0, 1)),
            end: Box::new(Node::number(4, 1)),
            line: 1,
        };
        assert!(r.is_range());
        assert!(!Node::number(0, 1).is_range());
        assert_eq!(r.kind_name(), "range");
    }

    #[test]
    fn serde_roundtrip_preserves_structure() {
        let tree = Node::StatementList {
            statements: vec![Node::Assignment {
                target: "x".into(),
                value: Box::new(Node::number(12, 1)),
                line: 1,
            }],
            line: 1,
        };
        let json = serde_json::to_string(&tree).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
