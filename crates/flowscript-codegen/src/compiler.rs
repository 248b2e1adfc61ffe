//! Top-level compilation pipeline: parse -> generate -> verify -> emit.
//!
//! The [`compile_file`] function is the driver's entry point: it reads a
//! source file and writes the verified textual IR to a `.ll` file next to the
//! source (or into a configured output directory). [`compile_to_ir`] is the
//! variant that returns the IR as a string, used by tests and `--print-ir`.
//!
//! Each compilation creates a fresh LLVM `Context` that is dropped at
//! function exit, so no LLVM types escape the compilation boundary.

use std::path::Path;
use std::time::Instant;

use inkwell::context::Context;

use crate::error::{CompileError, Diagnostic};
use crate::generator::Generator;
use crate::{CompileOptions, CompileResult};

/// Compile FlowScript source text to verified textual LLVM IR.
pub fn compile_to_ir(source: &str) -> Result<String, CompileError> {
    let (ir, _warnings) = generate_ir(source)?;
    Ok(ir)
}

/// Compile a source file and write `<stem>.ll` next to it (or into
/// `options.output_dir`). Returns the machine-readable result.
pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<CompileResult, CompileError> {
    let start = Instant::now();

    // 1. Read the source.
    let source = std::fs::read_to_string(path)?;

    // 2. Parse, generate, verify.
    let (ir, warnings) = generate_ir(&source)?;

    // 3. Pick the output location: the configured directory, or next to the
    //    source file.
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "program".to_string());
    let out_dir = match &options.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
    };

    // 4. Emit.
    let ir_path = out_dir.join(format!("{stem}.ll"));
    std::fs::write(&ir_path, &ir)?;

    Ok(CompileResult {
        ir_path,
        module_name: stem,
        compile_time_ms: start.elapsed().as_millis() as u64,
        warnings: warnings.iter().map(ToString::to_string).collect(),
    })
}

/// Shared pipeline body: source text in, (IR text, warnings) out.
fn generate_ir(source: &str) -> Result<(String, Vec<Diagnostic>), CompileError> {
    // 1. Parse.
    let ast = flowscript_parser::parse(source)?;

    // 2. Fresh Context; dropped at function exit so no LLVM types escape.
    let context = Context::create();
    let module = context.create_module("flowscript_program");
    let builder = context.create_builder();

    // 3. Lower the AST; verification runs inside generate().
    let mut generator = Generator::new(&context, &module, &builder);
    generator.generate(&ast)?;
    let warnings = generator.diagnostics().to_vec();

    // 4. Serialize.
    Ok((module.print_to_string().to_string(), warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodegenError;
    use flowscript_parser::ParseError;

    #[test]
    fn minimal_program_compiles_to_ir() {
        let ir = compile_to_ir("5 |> print();").unwrap();
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("@printf"));
    }

    #[test]
    fn parse_errors_surface_as_compile_errors() {
        let err = compile_to_ir("func (").unwrap_err();
        assert!(matches!(err, CompileError::Parse(ParseError::UnexpectedToken { .. })));
    }

    #[test]
    fn codegen_errors_carry_diagnostics() {
        let err = compile_to_ir("missing |> print();").unwrap_err();
        let CompileError::Codegen(CodegenError::CompileFailed(diags)) = err else {
            panic!("expected promoted diagnostics, got {err:?}");
        };
        assert!(diags.iter().any(|d| d.message.contains("missing")));
    }

    #[test]
    fn compile_file_writes_ll_next_to_source() {
        let dir = std::env::temp_dir().join(format!("flowscript_compile_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let src_path = dir.join("hello.fs");
        std::fs::write(&src_path, "result = 10 + 2\nresult |> print()\n").unwrap();

        let result = compile_file(&src_path, &CompileOptions::default()).unwrap();
        assert_eq!(result.ir_path, dir.join("hello.ll"));
        assert_eq!(result.module_name, "hello");
        let emitted = std::fs::read_to_string(&result.ir_path).unwrap();
        assert!(emitted.contains("@printf"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn compile_file_honors_output_dir() {
        let dir = std::env::temp_dir().join(format!("flowscript_outdir_{}", std::process::id()));
        let out = dir.join("build");
        std::fs::create_dir_all(&dir).unwrap();
        let src_path = dir.join("prog.fs");
        std::fs::write(&src_path, "x = 1\n").unwrap();

        let options = CompileOptions {
            output_dir: Some(out.clone()),
            ..Default::default()
        };
        let result = compile_file(&src_path, &options).unwrap();
        assert_eq!(result.ir_path, out.join("prog.ll"));
        assert!(result.ir_path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
