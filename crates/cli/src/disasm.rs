//! A disassembler for compiled [`Program`]s, used by `--debug-comp`.
//!
//! Purely a read-only formatter over `thusly-core` types: this module
//! never feeds back into compilation or execution.

use thusly_core::program::OpCode;
use thusly_core::Program;

pub fn disassemble_program(program: &Program, name: &str) {
    println!("========== {name} ==========");
    let mut offset = 0;
    while offset < program.instructions.len() {
        offset = disassemble_instruction(program, offset);
    }
    println!();
}

/// Disassembles the instruction at `offset`, printing one line, and
/// returns the offset of the next instruction.
pub fn disassemble_instruction(program: &Program, offset: usize) -> usize {
    print!("offset[{offset:04}] ");

    let same_line_as_previous = offset > 0 && program.source_lines[offset] == program.source_lines[offset - 1];
    if same_line_as_previous {
        print!("           ");
    } else {
        print!("line[{:4}] ", program.source_lines[offset]);
    }

    let Some(op) = OpCode::from_byte(program.instructions[offset]) else {
        println!("Unsupported opcode {}", program.instructions[offset]);
        return offset + 1;
    };

    match op {
        OpCode::PopN => print_pop_n(program, offset),
        OpCode::GetVar | OpCode::SetVar => print_variable(op, program, offset),
        OpCode::Constant => print_constant(program, offset),
        OpCode::JumpFwd | OpCode::JumpFwdIfFalse | OpCode::JumpFwdIfTrue => print_jump(op, program, 1, offset),
        OpCode::JumpBwd => print_jump(op, program, -1, offset),
        _ => print_opcode(op, offset),
    }
}

fn print_opcode(op: OpCode, offset: usize) -> usize {
    println!("op[{}]", op.name());
    offset + 1
}

fn print_pop_n(program: &Program, offset: usize) -> usize {
    let count = program.instructions[offset + 1];
    // See `discard_scope` for why the encoded operand is `count - 1`.
    println!("op[OP_POPN] count[{}]", count as u16 + 1);
    offset + 2
}

fn print_constant(program: &Program, offset: usize) -> usize {
    let index = program.instructions[offset + 1];
    print!("op[OP_CONSTANT] index[{index}] value[");
    print!("{}", program.constants[index as usize]);
    println!("]");
    offset + 2
}

fn print_variable(op: OpCode, program: &Program, offset: usize) -> usize {
    let slot = program.instructions[offset + 1];
    println!("op[{}] slot[{slot}]", op.name());
    offset + 2
}

fn print_jump(op: OpCode, program: &Program, sign: i32, offset: usize) -> usize {
    let jump = ((program.instructions[offset + 1] as u16) << 8) | program.instructions[offset + 2] as u16;
    let target = offset as i32 + 3 + sign * jump as i32;
    println!("op[{}] from[{offset}] to[{target}]", op.name());
    offset + 3
}
