//! Thusly's command-line entry point: file runner, line REPL, and
//! `--debug` bytecode disassembly.

mod disasm;
mod repl;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use thusly_core::ErrorReport;
use thusly_vm::{DebugFlags, Vm};

/// Sysexits-style exit codes (see
/// <https://man.freebsd.org/cgi/man.cgi?query=sysexits>).
mod exit_code {
    pub const USAGE_ERROR: u8 = 64;
    pub const INPUT_DATA_ERROR: u8 = 65;
    pub const INTERNAL_SOFTWARE_ERROR: u8 = 70;
    pub const IO_OP_ERROR: u8 = 74;
}

#[derive(Parser)]
#[command(name = "thusly", about = "Run or explore Thusly programs", long_about = None)]
struct Cli {
    /// Source file to run. Starts the REPL if omitted.
    path: Option<PathBuf>,

    /// Show compiler output (bytecode) and VM execution trace.
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Show compiler output (bytecode).
    #[arg(long = "debug-comp", alias = "dcomp")]
    debug_comp: bool,

    /// Show VM execution trace.
    #[arg(long = "debug-exec", alias = "dexec")]
    debug_exec: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{err}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprint!("{err}");
            return ExitCode::from(exit_code::USAGE_ERROR);
        }
    };
    let debug = DebugFlags {
        compilation: cli.debug || cli.debug_comp,
        execution: cli.debug || cli.debug_exec,
    };

    match cli.path {
        Some(path) => run_file(&path, debug),
        None => {
            let mut vm = Vm::with_debug_flags(debug);
            repl::run(&mut vm, debug.compilation);
            ExitCode::SUCCESS
        }
    }
}

fn run_file(path: &PathBuf, debug: DebugFlags) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("The file could not be opened. (File name: \"{}\"): {err}", path.display());
            return ExitCode::from(exit_code::IO_OP_ERROR);
        }
    };

    let mut vm = Vm::with_debug_flags(debug);
    if debug.compilation {
        if let Ok(program) = vm.compile_only(&source) {
            disasm::disassemble_program(&program, &path.display().to_string());
        }
    }

    let report = vm.interpret(&source);
    if !report.is_ok() {
        eprint!("{report}");
    }

    match report {
        ErrorReport::NoError => ExitCode::SUCCESS,
        ErrorReport::CompileError(_) => ExitCode::from(exit_code::INPUT_DATA_ERROR),
        ErrorReport::RuntimeError(_) => ExitCode::from(exit_code::INTERNAL_SOFTWARE_ERROR),
    }
}
