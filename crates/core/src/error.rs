//! Compile-time and run-time error types, and the framed text used to
//! report them on stderr.

use std::fmt;

/// Where, within a line, a compile error was detected.
#[derive(Debug, Clone)]
pub enum ErrorLocation {
    /// The error was detected at end of file.
    EndOfFile,
    /// The error was detected at a newline.
    EndOfLine,
    /// The error was detected at a specific lexeme.
    Lexeme(String),
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::EndOfFile => write!(f, "at end of file"),
            ErrorLocation::EndOfLine => write!(f, "at end of line"),
            ErrorLocation::Lexeme(lexeme) => write!(f, "at '{lexeme}'"),
        }
    }
}

/// A tokenizing or parsing failure.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub line: u32,
    pub location: ErrorLocation,
    pub message: String,
}

impl CompileError {
    pub fn new(line: u32, location: ErrorLocation, message: impl Into<String>) -> Self {
        Self {
            line,
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error")?;
        writeln!(f, "Line: {}", self.line)?;
        writeln!(f, "Where: {}", self.location)?;
        write!(f, "What's wrong: {}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// A failure raised while executing an already-compiled program.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub line: u32,
    pub message: String,
}

impl RuntimeError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error")?;
        writeln!(f, "Line: {}", self.line)?;
        write!(f, "What's wrong: {}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// The outcome of a call to `interpret()`: either everything ran fine,
/// or compilation failed (possibly with more than one reported error),
/// or compilation succeeded but execution raised a runtime error.
#[derive(Debug, Clone)]
pub enum ErrorReport {
    NoError,
    CompileError(Vec<CompileError>),
    RuntimeError(RuntimeError),
}

impl ErrorReport {
    pub fn is_ok(&self) -> bool {
        matches!(self, ErrorReport::NoError)
    }

    /// The sysexits-style exit code this report maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorReport::NoError => 0,
            ErrorReport::CompileError(_) => 65,
            ErrorReport::RuntimeError(_) => 70,
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReport::NoError => Ok(()),
            ErrorReport::CompileError(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    writeln!(f, "{err}")?;
                }
                Ok(())
            }
            ErrorReport::RuntimeError(err) => writeln!(f, "{err}"),
        }
    }
}
