//! Generator state and top-level lowering driver.
//!
//! [`Generator`] owns everything that varies while walking the AST: the scope
//! stack, the current function, the piped value carried across `|>`, the loop
//! target blocks, collected diagnostics, and the format-string cache. Every
//! routine that changes one of these slots saves the prior value on its own
//! call frame and restores it before returning, error paths included.
//!
//! The driver ([`Generator::generate`]) wraps the program root in a synthetic
//! `main` returning i32, lowers the root statement list into it, and verifies
//! the module. Statements after a terminator are silently dropped rather than
//! emitted into a fresh block.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{BasicValueEnum, FunctionValue, IntValue, PointerValue};
use tracing::debug;

use flowscript_ast::Node;

use crate::error::{CodegenError, Diagnostic, Severity};
use crate::runtime::PrintFormat;
use crate::scope::ScopeStack;

/// Mutable state for one compilation. Single-threaded and non-reentrant.
pub struct Generator<'a, 'ctx> {
    pub(crate) context: &'ctx Context,
    pub(crate) module: &'a Module<'ctx>,
    pub(crate) builder: &'a Builder<'ctx>,

    pub(crate) scopes: ScopeStack<'ctx>,
    pub(crate) current_function: Option<FunctionValue<'ctx>>,
    /// The implicit value threaded left-to-right across `|>`.
    pub(crate) piped: Option<BasicValueEnum<'ctx>>,
    /// Loop targets. `break`/`continue` are not in the surface grammar yet;
    /// the slots exist so loop lowering already maintains them.
    pub(crate) continue_block: Option<BasicBlock<'ctx>>,
    pub(crate) break_block: Option<BasicBlock<'ctx>>,

    pub(crate) format_strings: HashMap<PrintFormat, PointerValue<'ctx>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, 'ctx> Generator<'a, 'ctx> {
    pub fn new(
        context: &'ctx Context,
        module: &'a Module<'ctx>,
        builder: &'a Builder<'ctx>,
    ) -> Self {
        Generator {
            context,
            module,
            builder,
            scopes: ScopeStack::new(),
            current_function: None,
            piped: None,
            continue_block: None,
            break_block: None,
            format_strings: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Top-level driver
    // -----------------------------------------------------------------------

    /// Lower a whole program rooted at a statement list.
    ///
    /// Creates the synthetic entry function `main` (i32, no parameters),
    /// lowers the root into it with an implicit `return 0`, then verifies the
    /// module. Error-severity diagnostics collected along the way are
    /// promoted to [`CodegenError::CompileFailed`]; the module is only
    /// verified when lowering itself reported no errors.
    pub fn generate(&mut self, root: &Node) -> Result<(), CodegenError> {
        let Node::StatementList { statements, .. } = root else {
            return Err(CodegenError::InvalidAst(
                "program root must be a statement list",
            ));
        };

        debug!(statements = statements.len(), "generating module");

        // 1. Synthetic entry function.
        let i32t = self.context.i32_type();
        let fn_type = i32t.fn_type(&[], false);
        let main_fn = self.module.add_function("main", fn_type, None);
        let entry = self.context.append_basic_block(main_fn, "entry");
        self.builder.position_at_end(entry);

        // 2. Current function + fresh function-level scope parented at global.
        let saved_fn = self.current_function.replace(main_fn);
        let saved_frames = self.scopes.isolate();
        self.scopes.push();

        // 3. The program body.
        self.lower_statement_list(statements);

        // 4. Fall off the end of main: return 0.
        if !self.block_terminated() {
            let zero = i32t.const_int(0, false);
            let _ = self.llvm_at(root.line(), self.builder.build_return(Some(&zero)));
        }

        // 5. Restore state.
        self.scopes.pop();
        self.scopes.restore(saved_frames);
        self.current_function = saved_fn;

        if self.has_errors() {
            return Err(CodegenError::CompileFailed(self.diagnostics.clone()));
        }

        self.module
            .verify()
            .map_err(|msg| CodegenError::Verification(msg.to_string()))?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Statement lowering
    // -----------------------------------------------------------------------

    /// Lower statements in source order. Once the current block is
    /// terminated, the remaining statements are unreachable and are dropped.
    pub(crate) fn lower_statement_list(&mut self, statements: &[Node]) {
        for stmt in statements {
            if self.block_terminated() {
                break;
            }
            self.lower_statement(stmt);
        }
    }

    fn lower_statement(&mut self, stmt: &Node) {
        match stmt {
            Node::FunctionDef {
                name,
                params,
                body,
                line,
            } => {
                self.lower_function_def(name, params, body, *line);
            }
            Node::Return { value, line } => {
                self.lower_return(value.as_deref(), *line);
            }
            Node::StatementList { statements, .. } => {
                self.lower_statement_list(statements);
            }
            expr => {
                // Expression statement; the value, if any, is discarded.
                let _ = self.lower_expr(expr);
            }
        }
    }

    fn lower_return(&mut self, value: Option<&Node>, line: u32) {
        let ret_val = match value {
            Some(expr) => {
                let Some(v) = self.lower_expr(expr) else {
                    // Diagnostic already recorded; leave the block open so
                    // later statements still get a chance.
                    return;
                };
                let Some(v) = self.promote_to_i32(v, line) else {
                    return;
                };
                v
            }
            // Functions return the scalar type; a bare `return` yields 0.
            None => self.context.i32_type().const_int(0, false).into(),
        };
        let _ = self.llvm_at(line, self.builder.build_return(Some(&ret_val)));
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Record an error-severity diagnostic. Lowering continues; the error is
    /// promoted to a failure once the whole root has been processed.
    pub(crate) fn error(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            line,
            severity: Severity::Error,
            message: message.into(),
        });
    }

    /// Record a warning; never fails the compilation.
    pub(crate) fn warning(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            line,
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Unwrap an inkwell builder result, converting the (not user-caused)
    /// failure into a diagnostic so callers can bail with `?`.
    pub(crate) fn llvm_at<T>(&mut self, line: u32, result: Result<T, BuilderError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.error(line, format!("internal LLVM builder error: {e}"));
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Block and value helpers
    // -----------------------------------------------------------------------

    /// The block the builder is currently positioned in, if any.
    pub(crate) fn current_block(&self) -> Option<BasicBlock<'ctx>> {
        self.builder.get_insert_block()
    }

    /// `true` when there is no insertion block or it already has its one
    /// terminator.
    pub(crate) fn block_terminated(&self) -> bool {
        self.current_block()
            .is_none_or(|b| b.get_terminator().is_some())
    }

    /// The function lowering is currently emitting into; reports a diagnostic
    /// when there is none.
    pub(crate) fn require_function(&mut self, line: u32) -> Option<FunctionValue<'ctx>> {
        let f = self.current_function;
        if f.is_none() {
            self.error(line, "statement requires an enclosing function");
        }
        f
    }

    /// Narrow a lowered value to an integer, diagnosing non-integer values
    /// (e.g. a function handle used in arithmetic).
    pub(crate) fn expect_int(
        &mut self,
        value: BasicValueEnum<'ctx>,
        line: u32,
    ) -> Option<IntValue<'ctx>> {
        match value {
            BasicValueEnum::IntValue(v) => Some(v),
            other => {
                self.error(
                    line,
                    format!("expected an integer value, found {:?}", other.get_type()),
                );
                None
            }
        }
    }

    /// Convert an integer to 1-bit by comparing it against zero, unless it
    /// already is 1-bit.
    pub(crate) fn to_bool(&mut self, value: IntValue<'ctx>, line: u32) -> Option<IntValue<'ctx>> {
        if value.get_type().get_bit_width() == 1 {
            return Some(value);
        }
        let zero = value.get_type().const_zero();
        self.llvm_at(
            line,
            self.builder.build_int_compare(
                inkwell::IntPredicate::NE,
                value,
                zero,
                "tobool",
            ),
        )
    }

    /// Zero-extend sub-32-bit integers (1-bit comparison results) to the
    /// scalar type; used where a full-width value is required (call
    /// arguments, returns, stores into scalar slots).
    pub(crate) fn promote_to_i32(
        &mut self,
        value: BasicValueEnum<'ctx>,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        match value {
            BasicValueEnum::IntValue(v) if v.get_type().get_bit_width() < 32 => {
                let widened = self.llvm_at(
                    line,
                    self.builder
                        .build_int_z_extend(v, self.context.i32_type(), "widen"),
                )?;
                Some(widened.into())
            }
            other => Some(other),
        }
    }

    /// Create a stack slot of `ty` in the entry block of `function`, before
    /// all existing instructions, so the allocation dominates every use on
    /// every path.
    pub(crate) fn entry_alloca(
        &mut self,
        function: FunctionValue<'ctx>,
        ty: inkwell::types::BasicTypeEnum<'ctx>,
        name: &str,
        line: u32,
    ) -> Option<PointerValue<'ctx>> {
        let Some(entry) = function.get_first_basic_block() else {
            self.error(line, "internal: function has no entry block");
            return None;
        };
        let tmp = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => tmp.position_before(&first),
            None => tmp.position_at_end(entry),
        }
        self.llvm_at(line, tmp.build_alloca(ty, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowscript_parser::parse;

    fn with_generator(source: &str, check: impl FnOnce(&Generator<'_, '_>, Result<(), CodegenError>)) {
        let ast = parse(source).expect("test source must parse");
        let context = Context::create();
        let module = context.create_module("generator_test");
        let builder = context.create_builder();
        let mut generator = Generator::new(&context, &module, &builder);
        let result = generator.generate(&ast);
        check(&generator, result);
    }

    #[test]
    fn scope_depth_is_restored_after_generation() {
        with_generator("x = 1; range(0, 3) |> for each { item |> print(); }", |g, result| {
            assert!(result.is_ok(), "{result:?}");
            assert_eq!(g.scopes.depth(), 1, "only the global frame may remain");
        });
    }

    #[test]
    fn piped_value_is_restored_after_pipelines() {
        with_generator("5 |> print(); 6 |> print();", |g, result| {
            assert!(result.is_ok(), "{result:?}");
            assert!(g.piped.is_none(), "piped slot must be clear after lowering");
        });
    }

    #[test]
    fn loop_targets_are_restored_after_loops() {
        with_generator("range(1, 4) |> for each { item |> print(); }", |g, result| {
            assert!(result.is_ok(), "{result:?}");
            assert!(g.continue_block.is_none());
            assert!(g.break_block.is_none());
        });
    }

    #[test]
    fn statements_after_a_terminator_are_dropped() {
        with_generator("return 5; x = 1;", |g, result| {
            assert!(result.is_ok(), "{result:?}");
            assert!(g.diagnostics().is_empty());
        });
    }

    #[test]
    fn errors_are_collected_not_fatal_per_statement() {
        // Both bad statements must be diagnosed in one run.
        with_generator("a = missing1; b = missing2;", |g, result| {
            assert!(matches!(result, Err(CodegenError::CompileFailed(_))));
            let messages: Vec<_> = g.diagnostics().iter().map(|d| d.message.clone()).collect();
            assert!(messages.iter().any(|m| m.contains("missing1")));
            assert!(messages.iter().any(|m| m.contains("missing2")));
        });
    }

    #[test]
    fn type_mismatch_in_assignment_is_a_warning() {
        with_generator("x = 1 < 2; x = 5; x |> print();", |g, result| {
            assert!(result.is_ok(), "{result:?}");
            assert!(g
                .diagnostics()
                .iter()
                .any(|d| d.severity == Severity::Warning && d.message.contains("type mismatch")));
        });
    }

    #[test]
    fn assignment_outside_any_function_creates_a_module_cell() {
        // Drive the generator below the public driver: position the builder
        // in a scratch function but leave `current_function` unset, the state
        // module-top-level lowering runs in.
        let ast = parse("cell = 7").expect("parses");
        let Node::StatementList { statements, .. } = &ast else {
            panic!("root must be a statement list");
        };

        let context = Context::create();
        let module = context.create_module("global_cell_test");
        let builder = context.create_builder();
        let i32t = context.i32_type();
        let scratch = module.add_function("scratch", i32t.fn_type(&[], false), None);
        builder.position_at_end(context.append_basic_block(scratch, "entry"));

        let mut generator = Generator::new(&context, &module, &builder);
        generator.lower_statement_list(statements);

        assert!(!generator.has_errors(), "{:?}", generator.diagnostics());
        let global = module.get_global("cell").expect("module cell must exist");
        assert!(global.get_initializer().is_some(), "cell is zero-initialized");
    }
}
