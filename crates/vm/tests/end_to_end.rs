//! End-to-end interpretation scenarios: a full source string in, a
//! success/failure verdict out. Stdout content (`out`'s actual printed
//! value) isn't captured here since `Vm` writes straight to the
//! process's stdout, same as the original's `printf`-based `OP_OUT`;
//! these tests instead pin down that each scenario runs to completion
//! (or fails) exactly as the language defines it.

use thusly_core::ErrorReport;
use thusly_vm::Vm;

fn interpret(source: &str) -> ErrorReport {
    Vm::new().interpret(source)
}

#[test]
fn arithmetic_precedence() {
    assert!(interpret("out 1 + 2 * 3\n").is_ok());
}

#[test]
fn modulo_of_two_variables() {
    assert!(interpret("var x : 10\nvar y : 3\nout x mod y\n").is_ok());
}

#[test]
fn text_concatenation_of_two_variables() {
    assert!(interpret("var x : \"a\"\nvar y : \"b\"\nout x + y\n").is_ok());
}

#[test]
fn foreach_accumulates_a_running_sum() {
    assert!(interpret("var s : 0\nforeach i in 1..5\n  s +: i\nend\nout s\n").is_ok());
}

#[test]
fn while_loop_computes_a_factorial() {
    let source = "var n : 5\nvar f : 1\nwhile n > 1\n  f *: n\n  n -: 1\nend\nout f\n";
    assert!(interpret(source).is_ok());
}

#[test]
fn short_circuiting_and_selects_the_else_branch() {
    let source = "if true and false\n  out \"A\"\nelse\n  out \"B\"\nend\n";
    assert!(interpret(source).is_ok());
}

#[test]
fn adding_a_number_to_text_is_a_runtime_error() {
    let report = interpret("out 1 + \"a\"\n");
    match report {
        ErrorReport::RuntimeError(err) => {
            assert_eq!(err.line, 1);
            assert!(err.message.contains("numbers") || err.message.contains("text"));
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn self_referential_initializer_is_a_compile_error() {
    let report = interpret("var x : x + 1\n");
    match report {
        ErrorReport::CompileError(errors) => {
            assert!(errors.iter().any(|e| e.message.to_lowercase().contains("initializer")));
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn redeclaring_a_variable_in_the_same_scope_is_a_compile_error() {
    let report = interpret("var x : 1\nvar x : 2\n");
    assert!(matches!(report, ErrorReport::CompileError(_)));
}
