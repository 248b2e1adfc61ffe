//! FlowScript compiler CLI.
//!
//! Provides the `flowscript` binary. `compile` runs the full pipeline and
//! writes the verified LLVM IR to a `.ll` file next to the source (or into
//! `--output-dir`); `check` runs the same pipeline without writing output.
//!
//! Uses the same `flowscript_codegen` entry points as the test suite, so both
//! surfaces compile identically.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use flowscript_codegen::{
    compile_file, compile_to_ir, CodegenError, CompileError, CompileOptions,
};

/// FlowScript compiler and tools.
#[derive(Parser)]
#[command(name = "flowscript", about = "FlowScript compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile a source file to LLVM IR.
    Compile {
        /// Path to the FlowScript source file.
        file: PathBuf,

        /// Output directory (default: next to the source file).
        #[arg(short = 'O', long)]
        output_dir: Option<PathBuf>,

        /// Also print the textual IR to stdout.
        #[arg(long)]
        print_ir: bool,
    },

    /// Parse and generate without writing any output.
    Check {
        /// Path to the FlowScript source file.
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Compile {
            file,
            output_dir,
            print_ir,
        } => run_compile(&file, output_dir, print_ir),
        Commands::Check { file } => run_check(&file),
    };
    process::exit(exit_code);
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = codegen diagnostics promoted to
/// failure, 2 = parse error, 3 = I/O error.
fn run_compile(file: &Path, output_dir: Option<PathBuf>, print_ir: bool) -> i32 {
    let options = CompileOptions {
        output_dir,
        print_ir,
    };

    match compile_file(file, &options) {
        Ok(result) => {
            for warning in &result.warnings {
                eprintln!("{warning}");
            }
            if options.print_ir {
                match std::fs::read_to_string(&result.ir_path) {
                    Ok(ir) => print!("{ir}"),
                    Err(e) => {
                        eprintln!("Error: failed to re-read emitted IR: {e}");
                        return 3;
                    }
                }
            }
            // Machine-readable result on stdout, as JSON.
            let json = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                format!("{{\"error\": \"failed to serialize result: {e}\"}}")
            });
            println!("{json}");
            0
        }
        Err(e) => report_failure(e),
    }
}

/// Execute the check subcommand: compile to IR in memory, discard it.
fn run_check(file: &Path) -> i32 {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {e}", file.display());
            return 3;
        }
    };
    match compile_to_ir(&source) {
        Ok(_) => 0,
        Err(e) => report_failure(e),
    }
}

/// Render a pipeline failure to stderr and map it to an exit code.
fn report_failure(error: CompileError) -> i32 {
    match error {
        CompileError::Codegen(CodegenError::CompileFailed(diags)) => {
            for diag in &diags {
                eprintln!("{diag}");
            }
            1
        }
        CompileError::Codegen(e) => {
            eprintln!("Compilation error: {e}");
            1
        }
        CompileError::Parse(e) => {
            eprintln!("Parse error: {e}");
            2
        }
        CompileError::Io(e) => {
            eprintln!("I/O error: {e}");
            3
        }
    }
}
