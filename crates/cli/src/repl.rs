//! A line-at-a-time read-eval-print loop.
//!
//! Thusly statements are newline-terminated, so each line the user
//! enters is interpreted as a standalone program sharing the VM's
//! `Environment` with every line before it — variables declared in
//! this session's own scope stay live for the rest of the session,
//! matching the original's `fgets`-per-line loop.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use thusly_core::ErrorReport;
use thusly_vm::Vm;

use crate::disasm;

pub fn run(vm: &mut Vm, show_bytecode: bool) {
    let mut editor = DefaultEditor::new().expect("failed to initialize the line editor");

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                let mut source = line;
                source.push('\n');

                if show_bytecode {
                    if let Ok(program) = vm.compile_only(&source) {
                        disasm::disassemble_program(&program, "repl");
                    }
                }

                report(vm.interpret(&source));
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                eprintln!("Input error: {err}");
                break;
            }
        }
    }
}

fn report(result: ErrorReport) {
    if !result.is_ok() {
        eprint!("{result}");
    }
}
