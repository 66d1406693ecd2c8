//! The stack-based bytecode interpreter.

use thusly_core::program::OpCode;
use thusly_core::{CompileError, ErrorReport, Program, RuntimeError, Value};

use crate::environment::Environment;

const STACK_MAX: usize = 256;

/// Debug flags controlling whether the compiler/VM emit disassembly.
/// Replaces the original's process-wide `flag_debug_compilation` /
/// `flag_debug_execution` globals with a plain config struct threaded
/// through the constructor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFlags {
    pub compilation: bool,
    pub execution: bool,
}

/// The Thusly virtual machine: an operand stack plus the heap
/// (`Environment`) values on it may point into.
pub struct Vm {
    stack: Vec<Value>,
    environment: Environment,
    debug: DebugFlags,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_debug_flags(DebugFlags::default())
    }

    pub fn with_debug_flags(debug: DebugFlags) -> Self {
        Self {
            stack: Vec::with_capacity(STACK_MAX),
            environment: Environment::new(),
            debug,
        }
    }

    /// Compiles and runs `source`, returning the combined result. Each
    /// call shares the VM's `Environment`, so text interned by one
    /// `interpret` call is still shared with the next (this is what
    /// makes a REPL's successive lines behave like one continuing
    /// program as far as text identity goes).
    pub fn interpret(&mut self, source: &str) -> ErrorReport {
        let program = match self.compile_only(source) {
            Ok(program) => program,
            Err(errors) => return ErrorReport::CompileError(errors),
        };

        if self.debug.compilation {
            tracing::debug!(instructions = program.instructions.len(), "compiled program");
        }

        match self.run(&program) {
            Ok(()) => ErrorReport::NoError,
            Err(err) => ErrorReport::RuntimeError(err),
        }
    }

    /// Compiles `source` without running it. Exposed so the CLI can
    /// produce a bytecode disassembly (under `--debug`/`--debug-comp`)
    /// without `Vm` itself depending on any disassembly formatting.
    pub fn compile_only(&mut self, source: &str) -> Result<Program, Vec<CompileError>> {
        thuslyc::compile(source, self.environment.pool())
    }

    fn push(&mut self, value: Value, line: u32) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::new(line, "Stack overflow."));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("compiler guarantees balanced stack effects")
    }

    fn peek(&self, distance_from_top: usize) -> &Value {
        let index = self.stack.len() - 1 - distance_from_top;
        &self.stack[index]
    }

    fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        let mut ip = 0usize;

        macro_rules! line_at {
            ($offset:expr) => {
                program.line_at($offset)
            };
        }

        loop {
            let offset = ip;
            let byte = program.instructions[ip];
            ip += 1;
            let op = OpCode::from_byte(byte)
                .unwrap_or_else(|| panic!("the compiler never emits an unknown opcode byte"));

            if self.debug.execution {
                tracing::trace!(op = op.name(), offset, "executing");
            }

            match op {
                OpCode::Constant => {
                    let index = program.instructions[ip];
                    ip += 1;
                    let value = program.constants[index as usize].clone();
                    self.push(value, line_at!(offset))?;
                }
                OpCode::ConstantTrue => self.push(Value::Boolean(true), line_at!(offset))?,
                OpCode::ConstantFalse => self.push(Value::Boolean(false), line_at!(offset))?,
                OpCode::ConstantNone => self.push(Value::None, line_at!(offset))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::PopN => {
                    let count = program.instructions[ip] as usize + 1;
                    ip += 1;
                    let new_len = self.stack.len() - count;
                    self.stack.truncate(new_len);
                }
                OpCode::GetVar => {
                    let slot = program.instructions[ip] as usize;
                    ip += 1;
                    let value = self.stack[slot].clone();
                    self.push(value, line_at!(offset))?;
                }
                OpCode::SetVar => {
                    let slot = program.instructions[ip] as usize;
                    ip += 1;
                    self.stack[slot] = self.peek(0).clone();
                }
                OpCode::Equals => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Boolean(a == b), line_at!(offset))?;
                }
                OpCode::NotEquals => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Boolean(a != b), line_at!(offset))?;
                }
                OpCode::LessThan => self.binary_comparison(line_at!(offset), |a, b| a < b)?,
                OpCode::LessEquals => self.binary_comparison(line_at!(offset), |a, b| a <= b)?,
                OpCode::GreaterThan => self.binary_comparison(line_at!(offset), |a, b| a > b)?,
                OpCode::GreaterEquals => self.binary_comparison(line_at!(offset), |a, b| a >= b)?,
                OpCode::Add => self.add(line_at!(offset))?,
                OpCode::Subtract => self.binary_arithmetic(line_at!(offset), |a, b| a - b)?,
                OpCode::Multiply => self.binary_arithmetic(line_at!(offset), |a, b| a * b)?,
                OpCode::Divide => self.binary_arithmetic(line_at!(offset), |a, b| a / b)?,
                OpCode::Modulo => self.binary_arithmetic(line_at!(offset), |a, b| a % b)?,
                OpCode::Negate => {
                    let Value::Number(n) = self.pop() else {
                        return Err(RuntimeError::new(line_at!(offset), "The operand must be a number."));
                    };
                    self.push(Value::Number(-n), line_at!(offset))?;
                }
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Boolean(!value.is_truthy()), line_at!(offset))?;
                }
                OpCode::Out => {
                    let value = self.pop();
                    println!("{value}");
                }
                OpCode::JumpFwd => {
                    let jump = read_u16(program, ip);
                    ip += 2 + jump as usize;
                }
                OpCode::JumpFwdIfFalse => {
                    let jump = read_u16(program, ip);
                    ip += 2;
                    if !self.peek(0).is_truthy() {
                        ip += jump as usize;
                    }
                }
                OpCode::JumpFwdIfTrue => {
                    let jump = read_u16(program, ip);
                    ip += 2;
                    if self.peek(0).is_truthy() {
                        ip += jump as usize;
                    }
                }
                OpCode::JumpBwd => {
                    let jump = read_u16(program, ip);
                    ip = ip + 2 - jump as usize;
                }
                OpCode::Return => return Ok(()),
            }
        }
    }

    fn binary_arithmetic(&mut self, line: u32, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        let (Value::Number(a), Value::Number(b)) = (a, b) else {
            return Err(RuntimeError::new(line, "Both operands must be numbers."));
        };
        self.push(Value::Number(op(a, b)), line)
    }

    fn binary_comparison(&mut self, line: u32, op: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        let (Value::Number(a), Value::Number(b)) = (a, b) else {
            return Err(RuntimeError::new(line, "Both operands must be numbers."));
        };
        self.push(Value::Boolean(op(a, b)), line)
    }

    fn add(&mut self, line: u32) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => self.push(Value::Number(a + b), line),
            (Value::Text(a), Value::Text(b)) => {
                let mut combined = String::with_capacity(a.chars.len() + b.chars.len());
                combined.push_str(&a.chars);
                combined.push_str(&b.chars);
                let interned = self.environment.intern(&combined);
                self.push(Value::Text(interned), line)
            }
            _ => Err(RuntimeError::new(
                line,
                "Operands must be two numbers or two pieces of text.",
            )),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

fn read_u16(program: &Program, at: usize) -> u16 {
    ((program.instructions[at] as u16) << 8) | program.instructions[at + 1] as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> ErrorReport {
        let mut vm = Vm::new();
        vm.interpret(source)
    }

    #[test]
    fn out_prints_a_value() {
        assert!(run("out 1 + 2\n").is_ok());
    }

    #[test]
    fn division_by_zero_follows_ieee_semantics() {
        assert!(run("out 1 / 0\n").is_ok());
    }

    #[test]
    fn negating_text_is_a_runtime_error() {
        let report = run("out -\"hi\"\n");
        assert!(matches!(report, ErrorReport::RuntimeError(_)));
    }

    #[test]
    fn text_concatenation_interns_the_result() {
        assert!(run("var a: \"foo\" +: \"bar\"\nout a\n").is_ok());
    }

    #[test]
    fn foreach_loop_runs_without_error() {
        assert!(run("foreach i in 0..3\n  out i\nend\n").is_ok());
    }

    #[test]
    fn undeclared_variable_is_a_compile_error() {
        assert!(matches!(run("out x\n"), ErrorReport::CompileError(_)));
    }
}
