//! The pipeline coordinator: lowering for `left |> right`.
//!
//! The left expression's value becomes an implicit input to the right
//! operator. The accepted right-hand shapes are function calls (the value
//! becomes the leading argument), conditionals (the value is available as
//! generator state but not auto-bound to a name), for-each loops (a `Range`
//! left operand is passed to the loop lowering as its range), and print calls
//! (the value is printed when no explicit argument was written). Anything
//! else is a compile error.
//!
//! `a |> b |> c` associates as `(a |> b) |> c`; the inner pipeline's value is
//! whatever operator `b` produced.

use inkwell::values::BasicValueEnum;
use tracing::debug;

use flowscript_ast::Node;

use crate::generator::Generator;

impl<'ctx> Generator<'_, 'ctx> {
    pub(crate) fn lower_pipeline(
        &mut self,
        left: &Node,
        right: &Node,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        debug!(rhs = right.kind_name(), line, "lowering pipeline");

        // Ranges are structural: they have no scalar value and flow into the
        // loop lowering as syntax, not as IR.
        let left_val = if left.is_range() {
            None
        } else {
            Some(self.lower_expr(left)?)
        };

        let saved_piped = self.piped;
        self.piped = left_val;

        let result = match right {
            Node::FunctionCall { name, args, line } => {
                // The threaded value is passed as an explicit leading
                // argument, not through the piped-value slot, which keeps the
                // threading deterministic.
                self.lower_call(name, args, left_val, *line)
            }
            Node::IfElse {
                condition,
                then_body,
                else_body,
                line,
            } => self.lower_conditional(condition, then_body, else_body.as_deref(), *line),
            Node::ForLoop {
                range,
                var,
                body,
                line,
            } => {
                // A loop without its own range receives the left operand;
                // the loop lowering validates that it is a range.
                let effective_range = match range {
                    Some(own) => Some(own.as_ref()),
                    None => Some(left),
                };
                self.lower_for_loop(effective_range, var, body, *line)
            }
            Node::PrintCall { arg, line } => self.lower_print(arg.as_deref(), *line),
            other => {
                self.error(
                    line,
                    format!(
                        "invalid pipeline right-hand side: expected a function call, \
                         conditional, for-each loop, or print call, found {}",
                        other.kind_name()
                    ),
                );
                None
            }
        };

        self.piped = saved_piped;
        result
    }
}
