//! Lexical scope stack mapping names to IR bindings.
//!
//! The stack always has the global scope at the bottom. Lookup walks from the
//! innermost scope outward; definition targets the innermost scope and
//! overwrites in place on redefinition. Function bodies see the global scope
//! as their parent and never the caller's locals: entering a function swaps
//! the local frames out wholesale ([`ScopeStack::isolate`]) and restores them
//! on exit, which is what makes scoping lexical rather than dynamic.

use indexmap::IndexMap;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, PointerValue};

/// What a name resolves to.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'ctx> {
    /// A mutable storage cell: stack slot or module global. `element_type` is
    /// the stored type, i.e. what a load of `ptr` yields.
    Slot {
        ptr: PointerValue<'ctx>,
        element_type: BasicTypeEnum<'ctx>,
        is_param: bool,
    },
    /// A function handle. Immutable; never loaded.
    Function { value: FunctionValue<'ctx> },
}

/// One lexical frame. Insertion order is preserved so emitted allocas follow
/// source order.
type Scope<'ctx> = IndexMap<String, Binding<'ctx>>;

/// The scope chain, innermost last. Index 0 is always the global scope.
#[derive(Debug, Default)]
pub struct ScopeStack<'ctx> {
    scopes: Vec<Scope<'ctx>>,
}

impl<'ctx> ScopeStack<'ctx> {
    /// A stack holding only the global scope.
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![Scope::new()],
        }
    }

    /// Number of frames, the global scope included.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Push a fresh innermost scope.
    pub fn push(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pop the innermost scope. The global scope is never popped.
    pub fn pop(&mut self) {
        debug_assert!(self.scopes.len() > 1, "attempted to pop the global scope");
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Define or overwrite `name` in the innermost scope.
    pub fn define(&mut self, name: impl Into<String>, binding: Binding<'ctx>) {
        self.scopes
            .last_mut()
            .expect("scope stack always has a global frame")
            .insert(name.into(), binding);
    }

    /// Define or overwrite `name` in the global scope, regardless of nesting.
    pub fn define_global(&mut self, name: impl Into<String>, binding: Binding<'ctx>) {
        self.scopes[0].insert(name.into(), binding);
    }

    /// Resolve `name`, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Binding<'ctx>> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Resolve `name` in the global scope only (the flat function namespace).
    pub fn lookup_global(&self, name: &str) -> Option<&Binding<'ctx>> {
        self.scopes[0].get(name)
    }

    /// Detach every non-global frame, leaving `[global]`. The returned frames
    /// must be handed back to [`ScopeStack::restore`] when the function being
    /// lowered is done.
    pub fn isolate(&mut self) -> Vec<Scope<'ctx>> {
        self.scopes.split_off(1)
    }

    /// Reattach frames previously detached by [`ScopeStack::isolate`].
    pub fn restore(&mut self, frames: Vec<Scope<'ctx>>) {
        debug_assert_eq!(self.scopes.len(), 1, "restore expects only the global frame");
        self.scopes.extend(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::builder::Builder;
    use inkwell::context::Context;
    use inkwell::module::Module;
    use proptest::prelude::*;

    /// Minimal IR scaffolding kept alive for the whole test so the bindings'
    /// pointer values stay valid.
    struct TestIr<'ctx> {
        context: &'ctx Context,
        _module: Module<'ctx>,
        builder: Builder<'ctx>,
    }

    impl<'ctx> TestIr<'ctx> {
        fn new(context: &'ctx Context) -> Self {
            let module = context.create_module("scope_test");
            let builder = context.create_builder();
            let i32t = context.i32_type();
            let f = module.add_function("scratch", i32t.fn_type(&[], false), None);
            let bb = context.append_basic_block(f, "entry");
            builder.position_at_end(bb);
            TestIr {
                context,
                _module: module,
                builder,
            }
        }

        fn slot(&self, name: &str) -> Binding<'ctx> {
            let i32t = self.context.i32_type();
            let ptr = self.builder.build_alloca(i32t, name).unwrap();
            Binding::Slot {
                ptr,
                element_type: i32t.into(),
                is_param: false,
            }
        }
    }

    fn slot_name(binding: &Binding<'_>) -> String {
        match binding {
            Binding::Slot { ptr, .. } => ptr.get_name().to_str().unwrap().to_string(),
            Binding::Function { .. } => panic!("expected slot"),
        }
    }

    #[test]
    fn innermost_definition_shadows_outer() {
        let context = Context::create();
        let ir = TestIr::new(&context);
        let mut stack = ScopeStack::new();

        stack.define("x", ir.slot("outer_x"));
        stack.push();
        stack.define("x", ir.slot("inner_x"));
        assert_eq!(slot_name(stack.lookup("x").unwrap()), "inner_x");
        stack.pop();
        assert_eq!(slot_name(stack.lookup("x").unwrap()), "outer_x");
    }

    #[test]
    fn redefinition_overwrites_in_place() {
        let context = Context::create();
        let ir = TestIr::new(&context);
        let mut stack = ScopeStack::new();

        stack.define("x", ir.slot("first"));
        stack.define("x", ir.slot("second"));
        assert_eq!(slot_name(stack.lookup("x").unwrap()), "second");
    }

    #[test]
    fn isolate_hides_locals_and_restore_brings_them_back() {
        let context = Context::create();
        let ir = TestIr::new(&context);
        let mut stack = ScopeStack::new();

        stack.push();
        stack.define("local", ir.slot("local"));
        stack.define_global("g", ir.slot("g"));

        let saved = stack.isolate();
        assert_eq!(stack.depth(), 1);
        assert!(stack.lookup("local").is_none(), "locals must be invisible");
        assert!(stack.lookup("g").is_some(), "globals stay visible");

        stack.restore(saved);
        assert!(stack.lookup("local").is_some());
    }

    #[test]
    fn lookup_global_ignores_inner_shadows() {
        let context = Context::create();
        let ir = TestIr::new(&context);
        let mut stack = ScopeStack::new();

        stack.define_global("x", ir.slot("global_x"));
        stack.push();
        stack.define("x", ir.slot("local_x"));
        assert_eq!(slot_name(stack.lookup_global("x").unwrap()), "global_x");
        assert_eq!(slot_name(stack.lookup("x").unwrap()), "local_x");
    }

    proptest! {
        /// Lookup is stable as long as no intervening define touches the name.
        #[test]
        fn lookup_is_idempotent(names in proptest::collection::vec("[a-z]{1,6}", 1..8)) {
            let context = Context::create();
            let ir = TestIr::new(&context);
            let mut stack = ScopeStack::new();
            for name in &names {
                stack.define(name.clone(), ir.slot(name));
            }
            for name in &names {
                let first = stack.lookup(name).map(slot_name);
                let second = stack.lookup(name).map(slot_name);
                prop_assert_eq!(&first, &second);
                prop_assert!(first.is_some());
            }
        }
    }
}
