//! Control-flow lowering: conditionals and bounded for-each loops.
//!
//! Both constructs keep the one-terminator-per-block invariant: a branch to
//! the merge/increment block is only emitted when the body did not already
//! terminate its final block (e.g. with a `return`).

use inkwell::values::BasicValueEnum;
use inkwell::IntPredicate;
use tracing::debug;

use flowscript_ast::Node;

use crate::generator::Generator;
use crate::scope::Binding;

impl<'ctx> Generator<'_, 'ctx> {
    /// Lower `if cond { … } else { … }`. The conditional has no value; the
    /// builder ends up positioned at the merge block.
    pub(crate) fn lower_conditional(
        &mut self,
        condition: &Node,
        then_body: &[Node],
        else_body: Option<&[Node]>,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        let function = self.require_function(line)?;

        let cond = self.lower_expr(condition)?;
        let cond = self.expect_int(cond, line)?;
        let cond = self.to_bool(cond, line)?;

        // Blocks appended in this order: then, else (only if present), merge.
        let then_block = self.context.append_basic_block(function, "then");
        let else_block = else_body.map(|_| self.context.append_basic_block(function, "else"));
        let merge_block = self.context.append_basic_block(function, "merge");

        self.llvm_at(
            line,
            self.builder.build_conditional_branch(
                cond,
                then_block,
                else_block.unwrap_or(merge_block),
            ),
        )?;

        self.builder.position_at_end(then_block);
        self.lower_statement_list(then_body);
        if !self.block_terminated() {
            self.llvm_at(line, self.builder.build_unconditional_branch(merge_block))?;
        }

        if let (Some(else_block), Some(else_body)) = (else_block, else_body) {
            self.builder.position_at_end(else_block);
            self.lower_statement_list(else_body);
            if !self.block_terminated() {
                self.llvm_at(line, self.builder.build_unconditional_branch(merge_block))?;
            }
        }

        self.builder.position_at_end(merge_block);
        None
    }

    /// Lower `for each var { … }` over a half-open ascending range.
    ///
    /// `range_node` is the loop's own range when written inline, or the range
    /// a pipeline supplied; it must be a `Range`. Iteration covers
    /// `start <= i < end`, stepping by one; `start >= end` runs zero times.
    /// Inside the body, the piped value is the current index, so loop bodies
    /// can consume it as a pipe source.
    pub(crate) fn lower_for_loop(
        &mut self,
        range_node: Option<&Node>,
        var: &str,
        body: &[Node],
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        let function = self.require_function(line)?;

        let Some(range_node) = range_node else {
            self.error(line, "for-loop is missing a range");
            return None;
        };
        let Node::Range { start, end, .. } = range_node else {
            self.error(
                line,
                format!(
                    "for-loop range must be range(start, end), found {}",
                    range_node.kind_name()
                ),
            );
            return None;
        };

        // Bounds are evaluated once, in the block preceding the loop.
        let start_val = self.lower_expr(start)?;
        let start_val = self.expect_int(start_val, line)?;
        let start_val = self.promote_to_i32(start_val.into(), line)?.into_int_value();
        let end_val = self.lower_expr(end)?;
        let end_val = self.expect_int(end_val, line)?;
        let end_val = self.promote_to_i32(end_val.into(), line)?.into_int_value();

        debug!(var, line, "lowering for-each loop");

        let slot = self.entry_alloca(function, self.context.i32_type().into(), var, line)?;

        // The loop variable lives in its own scope; loop targets are saved
        // around the body and restored on the way out, errors included.
        self.scopes.push();
        self.scopes.define(
            var,
            Binding::Slot {
                ptr: slot,
                element_type: self.context.i32_type().into(),
                is_param: false,
            },
        );
        let saved_continue = self.continue_block.take();
        let saved_break = self.break_block.take();

        let result = self.emit_loop_blocks(function, slot, start_val, end_val, var, body, line);

        self.scopes.pop();
        self.continue_block = saved_continue;
        self.break_block = saved_break;

        // The loop produces no value whether or not the body lowered cleanly.
        let _ = result;
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_loop_blocks(
        &mut self,
        function: inkwell::values::FunctionValue<'ctx>,
        slot: inkwell::values::PointerValue<'ctx>,
        start_val: inkwell::values::IntValue<'ctx>,
        end_val: inkwell::values::IntValue<'ctx>,
        var: &str,
        body: &[Node],
        line: u32,
    ) -> Option<()> {
        let i32t = self.context.i32_type();

        self.llvm_at(line, self.builder.build_store(slot, start_val))?;

        let cond_block = self.context.append_basic_block(function, "loop_cond");
        let body_block = self.context.append_basic_block(function, "loop_body");
        let inc_block = self.context.append_basic_block(function, "loop_inc");
        let end_block = self.context.append_basic_block(function, "loop_end");
        self.continue_block = Some(inc_block);
        self.break_block = Some(end_block);

        self.llvm_at(line, self.builder.build_unconditional_branch(cond_block))?;

        // cond: i < end ?
        self.builder.position_at_end(cond_block);
        let current = self.llvm_at(line, self.builder.build_load(i32t, slot, var))?;
        let in_range = self.llvm_at(
            line,
            self.builder.build_int_compare(
                IntPredicate::SLT,
                current.into_int_value(),
                end_val,
                "loopcond",
            ),
        )?;
        self.llvm_at(
            line,
            self.builder
                .build_conditional_branch(in_range, body_block, end_block),
        )?;

        // body: the current index becomes the piped value for the duration.
        self.builder.position_at_end(body_block);
        let index = self.llvm_at(line, self.builder.build_load(i32t, slot, var))?;
        let saved_piped = self.piped.replace(index);
        self.lower_statement_list(body);
        self.piped = saved_piped;
        if !self.block_terminated() {
            self.llvm_at(line, self.builder.build_unconditional_branch(inc_block))?;
        }

        // inc: i = i + 1
        self.builder.position_at_end(inc_block);
        let current = self.llvm_at(line, self.builder.build_load(i32t, slot, var))?;
        let one = i32t.const_int(1, false);
        let next = self.llvm_at(
            line,
            self.builder
                .build_int_add(current.into_int_value(), one, "loopinc"),
        )?;
        self.llvm_at(line, self.builder.build_store(slot, next))?;
        self.llvm_at(line, self.builder.build_unconditional_branch(cond_block))?;

        self.builder.position_at_end(end_block);
        Some(())
    }
}
