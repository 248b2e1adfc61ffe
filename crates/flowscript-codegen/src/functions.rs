//! Function definition and direct-call lowering.
//!
//! Functions live in a flat namespace: the handle is registered in the global
//! scope no matter where the definition appears, and calls resolve against
//! the global scope only. A function body's scope is parented at the global
//! scope, never the caller's locals.

use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue};
use tracing::debug;

use flowscript_ast::Node;

use crate::generator::Generator;
use crate::scope::Binding;

impl<'ctx> Generator<'_, 'ctx> {
    /// Lower `func name(params) { body }`.
    ///
    /// Parameters and the return value are all the scalar integer type. The
    /// builder insertion point, enclosing function, scope chain, piped value,
    /// and loop targets are saved up front and restored on every path out.
    pub(crate) fn lower_function_def(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Node],
        line: u32,
    ) -> Option<()> {
        debug!(name, params = params.len(), line, "lowering function definition");

        // 1. Signature: i32(i32 × arity), added under the surface name.
        let i32t = self.context.i32_type();
        let param_types = vec![i32t.into(); params.len()];
        let fn_type = i32t.fn_type(&param_types, false);

        let function = match self.module.get_function(name) {
            Some(existing) if existing.count_basic_blocks() > 0 => {
                self.error(line, format!("function '{name}' is already defined"));
                return None;
            }
            // Reuse a forward declaration if one exists.
            Some(existing) => existing,
            None => self.module.add_function(name, fn_type, None),
        };

        // 2. The handle goes into the global scope regardless of where the
        //    definition textually appears.
        self.scopes
            .define_global(name, Binding::Function { value: function });

        // 3. Save generator state.
        let saved_block = self.builder.get_insert_block();
        let saved_fn = self.current_function.replace(function);
        let saved_piped = self.piped.take();
        let saved_continue = self.continue_block.take();
        let saved_break = self.break_block.take();
        // 4. The body's scope chain is [global, function scope].
        let saved_frames = self.scopes.isolate();
        self.scopes.push();

        let result = self.emit_function_body(function, name, params, body, line);

        // 9. Restore everything, error paths included.
        self.scopes.pop();
        self.scopes.restore(saved_frames);
        self.break_block = saved_break;
        self.continue_block = saved_continue;
        self.piped = saved_piped;
        self.current_function = saved_fn;
        if let Some(block) = saved_block {
            self.builder.position_at_end(block);
        }

        result
    }

    fn emit_function_body(
        &mut self,
        function: FunctionValue<'ctx>,
        name: &str,
        params: &[String],
        body: &[Node],
        line: u32,
    ) -> Option<()> {
        let i32t = self.context.i32_type();

        // 5. Entry block; every parameter gets a stack slot so it is mutable
        //    like any other variable.
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        for (index, param_name) in params.iter().enumerate() {
            let Some(param) = function.get_nth_param(index as u32) else {
                self.error(
                    line,
                    format!("internal: parameter {index} missing on '{name}'"),
                );
                return None;
            };
            param.set_name(param_name);
            let slot = self.llvm_at(line, self.builder.build_alloca(i32t, param_name))?;
            self.llvm_at(line, self.builder.build_store(slot, param))?;
            self.scopes.define(
                param_name,
                Binding::Slot {
                    ptr: slot,
                    element_type: i32t.into(),
                    is_param: true,
                },
            );
        }

        // 6. The body.
        self.lower_statement_list(body);

        // 7. Fall off the end: return 0 (the return type is never void here).
        if !self.block_terminated() {
            let zero = i32t.const_int(0, false);
            self.llvm_at(line, self.builder.build_return(Some(&zero)))?;
        }

        // 8. Per-function verification is a non-fatal diagnostic; the module
        //    can still be emitted and the final module verify has the last
        //    word.
        if !function.verify(false) {
            self.warning(line, format!("function '{name}' failed IR verification"));
        }

        Some(())
    }

    /// Lower a direct call. `leading` is the pipeline-threaded value, which
    /// becomes the first actual argument; the actual count (explicit plus
    /// leading) must exactly match the callee's arity.
    pub(crate) fn lower_call(
        &mut self,
        name: &str,
        args: &[Node],
        leading: Option<BasicValueEnum<'ctx>>,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        // Flat function namespace: the global scope only.
        let callee = match self.scopes.lookup_global(name) {
            Some(Binding::Function { value }) => *value,
            Some(Binding::Slot { .. }) => {
                self.error(line, format!("'{name}' is not a function"));
                return None;
            }
            None => {
                self.error(line, format!("unknown function '{name}'"));
                return None;
            }
        };

        let expected = callee.count_params() as usize;
        let actual = args.len() + usize::from(leading.is_some());
        if actual != expected {
            self.error(
                line,
                format!(
                    "function '{name}' expects {expected} argument(s), got {actual}"
                ),
            );
            return None;
        }

        let mut call_args: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(actual);
        if let Some(value) = leading {
            let value = self.promote_to_i32(value, line)?;
            call_args.push(value.into());
        }
        for arg in args {
            let value = self.lower_expr(arg)?;
            let value = self.promote_to_i32(value, line)?;
            call_args.push(value.into());
        }

        let call = self.llvm_at(
            line,
            self.builder.build_call(callee, &call_args, "calltmp"),
        )?;
        call.try_as_basic_value().basic()
    }
}
