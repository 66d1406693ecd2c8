//! Exercises the `thusly` binary as a subprocess: file-running,
//! sysexits-style exit codes, and the `--debug-comp` disassembly dump.

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

fn thusly_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_thusly"))
}

fn source_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create a temp file");
    file.write_all(contents.as_bytes()).expect("failed to write source");
    file
}

#[test]
fn running_a_valid_program_exits_successfully_and_prints_its_output() {
    let file = source_file("out 1 + 2\n");
    let output = thusly_bin().arg(file.path()).output().expect("failed to run thusly");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "3");
}

#[test]
fn a_compile_error_exits_65_and_reports_on_stderr() {
    let file = source_file("var x : 1\nvar x : 2\n");
    let output = thusly_bin().arg(file.path()).output().expect("failed to run thusly");

    assert_eq!(output.status.code(), Some(65));
    assert!(!output.stderr.is_empty());
}

#[test]
fn a_runtime_error_exits_70_and_reports_on_stderr() {
    let file = source_file("out 1 + \"a\"\n");
    let output = thusly_bin().arg(file.path()).output().expect("failed to run thusly");

    assert_eq!(output.status.code(), Some(70));
    assert!(!output.stderr.is_empty());
}

#[test]
fn a_missing_file_exits_74() {
    let output = thusly_bin()
        .arg("/nonexistent/path/to/a/file/that/does/not.exist")
        .output()
        .expect("failed to run thusly");

    assert_eq!(output.status.code(), Some(74));
}

#[test]
fn help_exits_successfully() {
    let output = thusly_bin().arg("--help").output().expect("failed to run thusly");

    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}

#[test]
fn an_unrecognized_flag_is_a_usage_error_exiting_64() {
    let output = thusly_bin()
        .arg("--not-a-real-flag")
        .output()
        .expect("failed to run thusly");

    assert_eq!(output.status.code(), Some(64));
    assert!(!output.stderr.is_empty());
}

#[test]
fn debug_comp_dumps_a_disassembly_before_running() {
    let file = source_file("out 1\n");
    let output = thusly_bin()
        .arg(file.path())
        .arg("--debug-comp")
        .output()
        .expect("failed to run thusly");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=========="));
    assert!(stdout.contains("op["));
}
