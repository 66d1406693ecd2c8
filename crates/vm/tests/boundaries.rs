//! Limits the compiler enforces: at most 256 live variables and 256
//! constants per program, and a 65535-byte cap on any single jump.

use thusly_core::ErrorReport;
use thusly_vm::Vm;

fn interpret(source: &str) -> ErrorReport {
    Vm::new().interpret(source)
}

fn n_variable_declarations(count: usize) -> String {
    let mut source = String::new();
    for i in 0..count {
        source.push_str(&format!("var v{i} : {i}\n"));
    }
    source
}

#[test]
fn exactly_256_variables_compiles() {
    let source = n_variable_declarations(256);
    assert!(interpret(&source).is_ok());
}

#[test]
fn a_257th_variable_is_a_compile_error() {
    let source = n_variable_declarations(257);
    assert!(matches!(interpret(&source), ErrorReport::CompileError(_)));
}

#[test]
fn exactly_256_constants_compiles() {
    let mut source = String::new();
    for i in 0..256 {
        source.push_str(&format!("out {i}\n"));
    }
    // Each numeric literal is its own constant-pool entry (the compiler
    // doesn't dedupe numbers the way the TextPool dedupes text), so 256
    // distinct literals land exactly at the limit.
    assert!(interpret(&source).is_ok());
}

#[test]
fn a_257th_constant_is_a_compile_error() {
    let mut source = String::new();
    for i in 0..257 {
        source.push_str(&format!("out {i}\n"));
    }
    assert!(matches!(interpret(&source), ErrorReport::CompileError(_)));
}

#[test]
fn a_loop_body_over_65535_bytes_is_a_compile_error() {
    let mut body = String::from("var s : 0\nforeach i in 1..2\n");
    // Each `s +: 1\n` line compiles to a handful of bytes; a few thousand
    // repetitions comfortably exceeds the 65535-byte jump limit without
    // needing to construct a literal 65KB source file by hand.
    for _ in 0..20_000 {
        body.push_str("s +: 1\n");
    }
    body.push_str("end\nout s\n");
    assert!(matches!(interpret(&body), ErrorReport::CompileError(_)));
}
