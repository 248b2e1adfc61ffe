//! Host-runtime bridge for the print operator.
//!
//! `print` is a variadic bridge to the C library's `printf`, declared lazily
//! on first use with the signature `(ptr, ...) -> i32`. The format string is
//! chosen from the argument's IR type: a closed dispatch on type kinds, not
//! runtime reflection. Format strings are materialized as read-only globals
//! once per kind and cached for the rest of the compilation.

use inkwell::module::Linkage;
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue, PointerValue};
use inkwell::AddressSpace;

use flowscript_ast::Node;

use crate::generator::Generator;

/// Name of the host print function.
const PRINTF: &str = "printf";

/// The closed set of print formats, keyed by the argument's IR type kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PrintFormat {
    /// Any integer (comparison results are widened to the scalar type first).
    Int,
    /// 64-bit float; 32-bit floats are extended before the call.
    Float,
    /// A pointer, printed as a C string. Pointers are opaque, so there is no
    /// pointee type to inspect.
    Str,
    /// Fallback line for types print cannot render; takes no extra argument.
    Unhandled,
}

impl PrintFormat {
    fn text(self) -> &'static str {
        match self {
            PrintFormat::Int => "%d\n",
            PrintFormat::Float => "%f\n",
            PrintFormat::Str => "%s\n",
            PrintFormat::Unhandled => "Value(type_unhandled_by_print)\n",
        }
    }

    fn global_name(self) -> &'static str {
        match self {
            PrintFormat::Int => ".fmt.int",
            PrintFormat::Float => ".fmt.float",
            PrintFormat::Str => ".fmt.str",
            PrintFormat::Unhandled => ".fmt.unhandled",
        }
    }
}

impl<'ctx> Generator<'_, 'ctx> {
    /// Lower a print call. The argument is the explicit expression or, when
    /// absent, the current piped value; having neither is a compile error.
    /// The expression's value is the `printf` call's i32 result.
    pub(crate) fn lower_print(
        &mut self,
        arg: Option<&Node>,
        line: u32,
    ) -> Option<BasicValueEnum<'ctx>> {
        let value = match arg {
            Some(expr) => self.lower_expr(expr)?,
            None => match self.piped {
                Some(piped) => piped,
                None => {
                    self.error(line, "print has no explicit or piped argument");
                    return None;
                }
            },
        };

        let (format, call_arg): (PrintFormat, Option<BasicMetadataValueEnum<'ctx>>) = match value {
            BasicValueEnum::IntValue(_) => {
                // C default argument promotion: sub-32-bit integers widen.
                let widened = self.promote_to_i32(value, line)?;
                (PrintFormat::Int, Some(widened.into()))
            }
            BasicValueEnum::FloatValue(v) => {
                let f64t = self.context.f64_type();
                let widened = if v.get_type() == f64t {
                    v
                } else {
                    self.llvm_at(line, self.builder.build_float_ext(v, f64t, "fpext"))?
                };
                (PrintFormat::Float, Some(widened.into()))
            }
            BasicValueEnum::PointerValue(v) => (PrintFormat::Str, Some(v.into())),
            other => {
                self.warning(
                    line,
                    format!("print cannot render a value of type {:?}", other.get_type()),
                );
                (PrintFormat::Unhandled, None)
            }
        };

        let format_ptr = self.format_string(format, line)?;
        let printf = self.printf_function();

        let mut args: Vec<BasicMetadataValueEnum<'ctx>> = vec![format_ptr.into()];
        if let Some(arg) = call_arg {
            args.push(arg);
        }

        let call = self.llvm_at(line, self.builder.build_call(printf, &args, "printtmp"))?;
        call.try_as_basic_value().basic()
    }

    /// Declare `printf` on first use: `(ptr, ...) -> i32`, external linkage.
    fn printf_function(&mut self) -> FunctionValue<'ctx> {
        if let Some(existing) = self.module.get_function(PRINTF) {
            return existing;
        }
        let ptr_type = self.context.ptr_type(AddressSpace::default());
        let fn_type = self
            .context
            .i32_type()
            .fn_type(&[ptr_type.into()], true);
        self.module
            .add_function(PRINTF, fn_type, Some(Linkage::External))
    }

    /// The read-only global holding `format`'s text, created on first use.
    fn format_string(&mut self, format: PrintFormat, line: u32) -> Option<PointerValue<'ctx>> {
        if let Some(cached) = self.format_strings.get(&format) {
            return Some(*cached);
        }
        let global = self.llvm_at(
            line,
            self.builder
                .build_global_string_ptr(format.text(), format.global_name()),
        )?;
        let ptr = global.as_pointer_value();
        self.format_strings.insert(format, ptr);
        Some(ptr)
    }
}
