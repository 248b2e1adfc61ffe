//! Expression lowering: one AST node in, one IR value out.
//!
//! Returns `None` when the expression failed to lower; a line-annotated
//! diagnostic has been recorded by then, and the failure cascades to any
//! enclosing expression without aborting the compilation.
//!
//! Short-circuit `and`/`or` materialize control flow instead of evaluating
//! both sides: the right operand lands in a block that is only reached when
//! the left operand demands it, and the merge phi's right-side predecessor is
//! the block current *after* lowering the right operand (lowering may have
//! introduced blocks of its own).

use inkwell::values::{BasicValueEnum, IntValue};
use inkwell::IntPredicate;

use flowscript_ast::{BinaryOp, Node, UnaryOp};

use crate::generator::Generator;
use crate::scope::Binding;

impl<'ctx> Generator<'_, 'ctx> {
    /// Lower an expression to a single typed IR value.
    pub(crate) fn lower_expr(&mut self, node: &Node) -> Option<BasicValueEnum<'ctx>> {
        match node {
            Node::Number { value, line: _ } => {
                Some(self.context.i32_type().const_int(*value as u64, true).into())
            }

            Node::Identifier { name, line } => self.lower_identifier(name, *line),

            Node::BinaryOp {
                op,
                left,
                right,
                line,
            } => {
                if op.is_short_circuit() {
                    self.lower_short_circuit(*op, left, right, *line)
                } else {
                    self.lower_binary(*op, left, right, *line)
                }
            }

            Node::UnaryOp { op, operand, line } => self.lower_unary(*op, operand, *line),

            Node::Assignment {
                target,
                value,
                line,
            } => self.lower_assignment(target, value, *line),

            Node::FunctionCall { name, args, line } => self.lower_call(name, args, None, *line),

            Node::Pipeline { left, right, line } => self.lower_pipeline(left, right, *line),

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
            } => self.lower_for_loop(range.as_deref(), var, body, *line),

            Node::PrintCall { arg, line } => self.lower_print(arg.as_deref(), *line),

            Node::Range { line, .. } => {
                self.error(
                    *line,
                    "a range has no value here; ranges feed loops and pipelines",
                );
                None
            }

            Node::FunctionDef { line, .. }
            | Node::Return { line, .. }
            | Node::StatementList { line, .. } => {
                self.error(
                    *line,
                    format!("{} is not valid in expression position", node.kind_name()),
                );
                None
            }
        }
    }

    fn lower_identifier(&mut self, name: &str, line: u32) -> Option<BasicValueEnum<'ctx>> {
        match self.scopes.lookup(name) {
            Some(Binding::Slot {
                ptr, element_type, ..
            }) => {
                let (ptr, element_type) = (*ptr, *element_type);
                self.llvm_at(line, self.builder.build_load(element_type, ptr, name))
            }
            // Function handles are returned unloaded.
            Some(Binding::Function { value }) => {
                Some(value.as_global_value().as_pointer_value().into())
            }
            None => {
                self.error(line, format!("undeclared identifier '{name}'"));
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Binary and unary operators
    // -----------------------------------------------------------------------

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        let lhs = self.lower_expr(left)?;
        let rhs = self.lower_expr(right)?;
        let lhs = self.expect_int(lhs, line)?;
        let rhs = self.expect_int(rhs, line)?;
        let (lhs, rhs) = self.unify_widths(lhs, rhs, line)?;

        let result = match op {
            BinaryOp::Add => self.llvm_at(line, self.builder.build_int_add(lhs, rhs, "addtmp"))?,
            BinaryOp::Sub => self.llvm_at(line, self.builder.build_int_sub(lhs, rhs, "subtmp"))?,
            BinaryOp::Mul => self.llvm_at(line, self.builder.build_int_mul(lhs, rhs, "multmp"))?,
            BinaryOp::Div => {
                self.llvm_at(line, self.builder.build_int_signed_div(lhs, rhs, "divtmp"))?
            }
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge => {
                let predicate = comparison_predicate(op);
                self.llvm_at(
                    line,
                    self.builder.build_int_compare(predicate, lhs, rhs, "cmptmp"),
                )?
            }
            BinaryOp::And | BinaryOp::Or => {
                unreachable!("short-circuit operators are lowered separately")
            }
        };
        Some(result.into())
    }

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        operand: &Node,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        let value = self.lower_expr(operand)?;
        let value = self.expect_int(value, line)?;
        let result = match op {
            UnaryOp::Not => {
                let zero = value.get_type().const_zero();
                self.llvm_at(
                    line,
                    self.builder
                        .build_int_compare(IntPredicate::EQ, value, zero, "nottmp"),
                )?
            }
            UnaryOp::Neg => self.llvm_at(line, self.builder.build_int_neg(value, "negtmp"))?,
        };
        Some(result.into())
    }

    /// Bring two integers to a common width (a 1-bit comparison result mixed
    /// into arithmetic gets zero-extended to the scalar type).
    fn unify_widths(
        &mut self,
        lhs: IntValue<'ctx>,
        rhs: IntValue<'ctx>,
        line: u32,
    ) -> Option<(IntValue<'ctx>, IntValue<'ctx>)> {
        let lw = lhs.get_type().get_bit_width();
        let rw = rhs.get_type().get_bit_width();
        if lw == rw {
            return Some((lhs, rhs));
        }
        let wide = if lw > rw { lhs.get_type() } else { rhs.get_type() };
        let lhs = if lw < wide.get_bit_width() {
            self.llvm_at(line, self.builder.build_int_z_extend(lhs, wide, "widen"))?
        } else {
            lhs
        };
        let rhs = if rw < wide.get_bit_width() {
            self.llvm_at(line, self.builder.build_int_z_extend(rhs, wide, "widen"))?
        } else {
            rhs
        };
        Some((lhs, rhs))
    }

    // -----------------------------------------------------------------------
    // Short-circuit and / or
    // -----------------------------------------------------------------------

    fn lower_short_circuit(
        &mut self,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        let function = self.require_function(line)?;
        let is_and = op == BinaryOp::And;

        let lhs = self.lower_expr(left)?;
        let lhs = self.expect_int(lhs, line)?;
        let lhs_bool = self.to_bool(lhs, line)?;
        let left_block = self.current_block()?;

        let rhs_block = self
            .context
            .append_basic_block(function, if is_and { "and_rhs" } else { "or_rhs" });
        let merge_block = self
            .context
            .append_basic_block(function, if is_and { "and_merge" } else { "or_merge" });

        // `and` only evaluates the right side when the left is true; `or`
        // only when it is false.
        if is_and {
            self.llvm_at(
                line,
                self.builder
                    .build_conditional_branch(lhs_bool, rhs_block, merge_block),
            )?;
        } else {
            self.llvm_at(
                line,
                self.builder
                    .build_conditional_branch(lhs_bool, merge_block, rhs_block),
            )?;
        }

        self.builder.position_at_end(rhs_block);
        let rhs = self.lower_expr(right);
        let Some(rhs) = rhs else {
            // Right side failed to lower. Keep the CFG well-formed so later
            // statements can still be checked.
            if !self.block_terminated() {
                let _ = self.llvm_at(line, self.builder.build_unconditional_branch(merge_block));
            }
            self.builder.position_at_end(merge_block);
            return None;
        };
        let rhs = self.expect_int(rhs, line)?;
        let rhs_bool = self.to_bool(rhs, line)?;

        // The phi predecessor is the block current *after* lowering the right
        // operand; nested short-circuits or calls may have moved us.
        let rhs_end = self.current_block()?;
        let rhs_terminated = rhs_end.get_terminator().is_some();
        if !rhs_terminated {
            self.llvm_at(line, self.builder.build_unconditional_branch(merge_block))?;
        }

        self.builder.position_at_end(merge_block);
        let short_val = self
            .context
            .bool_type()
            .const_int(if is_and { 0 } else { 1 }, false);

        if rhs_terminated {
            // Only the short-circuited path reaches the merge block.
            return Some(short_val.into());
        }

        let phi = self.llvm_at(
            line,
            self.builder.build_phi(
                self.context.bool_type(),
                if is_and { "and_result" } else { "or_result" },
            ),
        )?;
        phi.add_incoming(&[(&short_val, left_block), (&rhs_bool, rhs_end)]);
        Some(phi.as_basic_value())
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// Lower `target = value`. First assignment to a name declares it: a
    /// stack slot in the entry block when inside a function, a
    /// zero-initialized module cell otherwise. The expression's value is the
    /// right-hand side, so assignments chain.
    fn lower_assignment(
        &mut self,
        target: &str,
        value: &Node,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        let value = self.lower_expr(value)?;

        let ptr = match self.scopes.lookup(target) {
            Some(Binding::Slot {
                ptr, element_type, ..
            }) => {
                let (ptr, element_type) = (*ptr, *element_type);
                if element_type != value.get_type() {
                    // Best-effort: the verifier rejects genuinely invalid IR.
                    self.warning(
                        line,
                        format!(
                            "type mismatch in assignment to '{target}' ({:?} stored into {:?})",
                            value.get_type(),
                            element_type
                        ),
                    );
                }
                ptr
            }
            Some(Binding::Function { .. }) => {
                self.error(line, format!("cannot assign to function '{target}'"));
                return None;
            }
            None => {
                let ptr = match self.current_function {
                    Some(function) => {
                        self.entry_alloca(function, value.get_type(), target, line)?
                    }
                    None => {
                        // Module top level outside the synthetic entry
                        // function: a zero-initialized global cell.
                        let global = self.module.add_global(value.get_type(), None, target);
                        global.set_initializer(&value.get_type().const_zero());
                        global.as_pointer_value()
                    }
                };
                self.scopes.define(
                    target,
                    Binding::Slot {
                        ptr,
                        element_type: value.get_type(),
                        is_param: false,
                    },
                );
                ptr
            }
        };

        self.llvm_at(line, self.builder.build_store(ptr, value))?;
        Some(value)
    }
}

fn comparison_predicate(op: BinaryOp) -> IntPredicate {
    match op {
        BinaryOp::Eq => IntPredicate::EQ,
        BinaryOp::Ne => IntPredicate::NE,
        BinaryOp::Lt => IntPredicate::SLT,
        BinaryOp::Gt => IntPredicate::SGT,
        BinaryOp::Le => IntPredicate::SLE,
        BinaryOp::Ge => IntPredicate::SGE,
        _ => unreachable!("not a comparison operator"),
    }
}
