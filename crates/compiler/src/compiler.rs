//! The single-pass Pratt parser, resolver, and bytecode emitter.
//!
//! Parsing and code generation happen in the same pass: each grammar
//! production both consumes tokens and writes bytecode directly into the
//! [`Program`] under construction. There is no intermediate AST.

use thusly_core::program::{CONSTANTS_MAX, JUMP_MAX, VARIABLES_MAX};
use thusly_core::{CompileError, ErrorLocation, OpCode, Program, TextPool, Value};

use crate::lexer::Lexer;
use crate::token::{Token, TokenType};

const PLACEHOLDER_JUMP_BYTE: u8 = 0xff;
const UNINITIALIZED: i32 = -1;

/// Precedence levels, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Ignore,
    Assignment,
    Disjunction,
    Conjunction,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
}

impl Precedence {
    fn one_higher(self) -> Precedence {
        match self {
            Precedence::Ignore => Precedence::Assignment,
            Precedence::Assignment => Precedence::Disjunction,
            Precedence::Disjunction => Precedence::Conjunction,
            Precedence::Conjunction => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor | Precedence::Unary => Precedence::Unary,
        }
    }
}

/// Returns the (prefix-rule-exists, infix precedence) pair for a token
/// type — the same information the original's `ParseRule` table holds,
/// expressed as two small dispatch functions instead of a literal array
/// of function pointers.
fn has_prefix_rule(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::Minus
            | TokenType::Not
            | TokenType::OpenParen
            | TokenType::False
            | TokenType::True
            | TokenType::None
            | TokenType::Identifier
            | TokenType::Number
            | TokenType::Text
    )
}

fn infix_precedence(kind: TokenType) -> Precedence {
    match kind {
        TokenType::Equals | TokenType::ExclamationEquals => Precedence::Equality,
        TokenType::GreaterThan
        | TokenType::GreaterThanEquals
        | TokenType::LessThan
        | TokenType::LessThanEquals => Precedence::Comparison,
        TokenType::Minus | TokenType::Plus => Precedence::Term,
        TokenType::Slash | TokenType::Star | TokenType::Mod => Precedence::Factor,
        TokenType::And => Precedence::Conjunction,
        TokenType::Or => Precedence::Disjunction,
        _ => Precedence::Ignore,
    }
}

fn is_assignment_operator(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::Colon | TokenType::PlusColon | TokenType::MinusColon | TokenType::StarColon | TokenType::SlashColon
    )
}

/// A variable declared in the source, tracked purely at compile time.
/// Its position in `Compiler::variables` is exactly the stack slot the
/// VM will hold its value in.
struct Variable<'src> {
    name: &'src str,
    /// `UNINITIALIZED` while the initializer is still being compiled.
    depth: i32,
}

/// Drives the tokenizer, resolves variables to stack slots, and emits
/// bytecode into a [`Program`] in a single left-to-right pass.
pub struct Compiler<'src> {
    lexer: Lexer<'src>,
    pool: &'src mut TextPool,
    program: Program,
    current: Token<'src>,
    previous: Token<'src>,
    variables: Vec<Variable<'src>>,
    scope_depth: i32,
    errors: Vec<CompileError>,
    panic_mode: bool,
}

impl<'src> Compiler<'src> {
    fn new(source: &'src str, pool: &'src mut TextPool) -> Self {
        let mut lexer = Lexer::new(source);
        let first = lexer.tokenize();
        Self {
            lexer,
            pool,
            program: Program::new(),
            current: first,
            previous: first,
            variables: Vec::new(),
            scope_depth: 0,
            errors: Vec::new(),
            panic_mode: false,
        }
    }

    // --- token stream plumbing -------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        self.current = self.lexer.tokenize();
        while self.current.kind == TokenType::LexicalError {
            let message = self.current.lexeme.to_string();
            self.error_at_current(&message);
            self.current = self.lexer.tokenize();
        }
    }

    fn check(&self, kind: TokenType) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenType) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenType, message: &str) {
        if self.check(kind) {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn consume_newline(&mut self) {
        self.consume(
            TokenType::Newline,
            "The line has not been terminated. Add a newline at the end of the line.",
        );
    }

    fn consume_end_of_block(&mut self) {
        self.consume(
            TokenType::End,
            "The block has not been terminated. Use 'end' at the end of the block.",
        );
        self.consume_newline();
    }

    fn is_at_end_of_file(&self) -> bool {
        self.current.kind == TokenType::Eof
    }

    fn is_at_end_of_block(&self) -> bool {
        self.check(TokenType::End)
    }

    fn is_at_start_of_statement(&self) -> bool {
        matches!(
            self.current.kind,
            TokenType::Var | TokenType::Out | TokenType::If | TokenType::Block | TokenType::Foreach | TokenType::While
        )
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !(self.is_at_start_of_statement() || self.is_at_end_of_block() || self.is_at_end_of_file()) {
            self.advance();
        }
    }

    // --- error reporting ---------------------------------------------

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        let location = match token.kind {
            TokenType::Eof => ErrorLocation::EndOfFile,
            TokenType::Newline => ErrorLocation::EndOfLine,
            _ => ErrorLocation::Lexeme(token.lexeme.to_string()),
        };
        self.errors.push(CompileError::new(token.line, location, message));
    }

    // --- bytecode emission -------------------------------------------

    fn current_offset(&self) -> usize {
        self.program.instructions.len()
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.program.write_byte(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_op_byte(&mut self, op: OpCode, operand: u8) {
        self.emit_op(op);
        self.emit_byte(operand);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.program.add_constant(value);
        if index > CONSTANTS_MAX - 1 {
            self.error("Too many constants have been used.");
            return 0;
        }
        index as u8
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_op_byte(OpCode::Constant, index);
    }

    fn emit_jump_backward(&mut self, target_offset: usize) {
        self.emit_op(OpCode::JumpBwd);
        let jump_operand_bytes = 2;
        let jump_size = self.current_offset() - target_offset + jump_operand_bytes;
        if jump_size > JUMP_MAX {
            self.error("The amount of code to jump over is more than what is currently supported.");
        }
        self.emit_byte(((jump_size >> 8) & 0xff) as u8);
        self.emit_byte((jump_size & 0xff) as u8);
    }

    fn emit_jump_forward(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(PLACEHOLDER_JUMP_BYTE);
        self.emit_byte(PLACEHOLDER_JUMP_BYTE);
        self.current_offset() - 2
    }

    fn patch_jump_forward(&mut self, placeholder_start: usize) {
        let jump_operand_bytes = 2;
        let jump_size = self.current_offset() - placeholder_start - jump_operand_bytes;
        if jump_size > JUMP_MAX {
            self.error("The amount of code to jump over is more than what is currently supported.");
        }
        self.program.instructions[placeholder_start] = ((jump_size >> 8) & 0xff) as u8;
        self.program.instructions[placeholder_start + 1] = (jump_size & 0xff) as u8;
    }

    // --- scope/variable bookkeeping ------------------------------------

    fn create_scope(&mut self) {
        self.scope_depth += 1;
    }

    fn discard_scope(&mut self) {
        let before = self.variables.len();
        while self
            .variables
            .last()
            .is_some_and(|v| v.depth == self.scope_depth)
        {
            self.variables.pop();
        }
        let discarded = before - self.variables.len();
        if discarded > 1 {
            self.emit_op_byte(OpCode::PopN, (discarded - 1) as u8);
        } else if discarded == 1 {
            self.emit_op(OpCode::Pop);
        }
        self.scope_depth -= 1;
    }

    fn add_variable(&mut self, name: &'src str) {
        if self.variables.len() == VARIABLES_MAX {
            self.error("Too many variables are currently in scope.");
            return;
        }
        self.variables.push(Variable {
            name,
            depth: UNINITIALIZED,
        });
    }

    fn mark_initialized(&mut self) {
        if let Some(last) = self.variables.last_mut() {
            last.depth = self.scope_depth;
        }
    }

    fn declare_variable(&mut self) {
        let name = self.previous.lexeme;
        for existing in self.variables.iter().rev() {
            let declared_in_different_scope = existing.depth != UNINITIALIZED && existing.depth < self.scope_depth;
            if declared_in_different_scope {
                break;
            }
            if existing.name == name {
                self.error("A variable with the same name has already been declared in this scope.");
                break;
            }
        }
        self.add_variable(name);
    }

    fn define_variable(&mut self) {
        self.mark_initialized();
    }

    fn resolve(&mut self, name: &str) -> Option<u8> {
        for (i, existing) in self.variables.iter().enumerate().rev() {
            if existing.name == name {
                if existing.depth == UNINITIALIZED {
                    self.error("You cannot use the variable's name being declared in its initializer.");
                }
                return Some(i as u8);
            }
        }
        None
    }

    // --- statements -----------------------------------------------------

    fn parse_statement(&mut self) {
        if self.matches(TokenType::Var) {
            self.parse_var_statement();
        } else if self.matches(TokenType::Out) {
            self.parse_out_statement();
        } else if self.matches(TokenType::If) {
            self.parse_if_statement();
        } else if self.matches(TokenType::Block) {
            self.parse_block_statement();
        } else if self.matches(TokenType::Foreach) {
            self.parse_foreach_statement();
        } else if self.matches(TokenType::While) {
            self.parse_while_statement();
        } else {
            self.parse_expression_statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn parse_standard_block_without_scope(&mut self) {
        self.consume_newline();
        while !self.is_at_end_of_block() && !self.is_at_end_of_file() {
            self.parse_statement();
        }
        self.consume_end_of_block();
    }

    fn parse_standard_block_with_scope(&mut self) {
        self.create_scope();
        self.parse_standard_block_without_scope();
        self.discard_scope();
    }

    /// A selection block (`if`/`else`) does not consume `end`/newline —
    /// the caller does, since `if` and `else` share one terminator.
    fn parse_selection_block(&mut self) {
        self.create_scope();
        self.consume_newline();
        while !self.check(TokenType::Else) && !self.is_at_end_of_block() && !self.is_at_end_of_file() {
            self.parse_statement();
        }
        self.discard_scope();
    }

    fn parse_block_statement(&mut self) {
        self.parse_standard_block_with_scope();
    }

    fn parse_expression_statement(&mut self) {
        self.parse_expression();
        self.consume_newline();
        self.emit_op(OpCode::Pop);
    }

    /// `"foreach" IDENTIFIER "in" expression ".." expression ( "step" expression )? standardBlock`
    fn parse_foreach_statement(&mut self) {
        self.create_scope();

        self.consume(
            TokenType::Identifier,
            "A name for the variable in the loop is missing. Add a name between 'foreach' and 'in'.",
        );
        self.declare_variable();
        let loop_variable_name = self.previous.lexeme;

        self.consume(TokenType::In, "You must use the 'in' keyword after the variable name.");
        self.parse_expression();
        // Defined only after the initializer is parsed, so the range start
        // cannot reference the loop variable itself.
        self.define_variable();
        let loop_variable_slot = self.resolve(loop_variable_name).unwrap_or(0);
        self.consume(
            TokenType::DotDot,
            "You must use '..' with two surrounding expressions for the loop range. (E.g. '0..3')",
        );

        let condition_start = self.current_offset();
        self.emit_op_byte(OpCode::GetVar, loop_variable_slot);
        self.parse_expression();
        self.emit_op(OpCode::LessEquals);
        let jump_to_body = self.emit_jump_forward(OpCode::JumpFwdIfTrue);
        let jump_to_end = self.emit_jump_forward(OpCode::JumpFwdIfFalse);

        let step_start = self.current_offset();
        self.emit_op_byte(OpCode::GetVar, loop_variable_slot);
        if self.matches(TokenType::Step) {
            self.parse_expression();
        } else {
            self.emit_constant(Value::Number(1.0));
        }
        self.emit_op(OpCode::Add);
        self.emit_op_byte(OpCode::SetVar, loop_variable_slot);
        self.emit_op(OpCode::Pop);
        self.emit_jump_backward(condition_start);

        self.patch_jump_forward(jump_to_body);
        self.emit_op(OpCode::Pop);
        self.parse_standard_block_without_scope();
        self.emit_jump_backward(step_start);

        self.patch_jump_forward(jump_to_end);
        self.emit_op(OpCode::Pop);
        self.discard_scope();
    }

    fn parse_if_statement(&mut self) {
        self.parse_expression();
        let jump_over_if = self.emit_jump_forward(OpCode::JumpFwdIfFalse);

        self.emit_op(OpCode::Pop);
        self.parse_selection_block();
        let jump_over_else = self.emit_jump_forward(OpCode::JumpFwd);

        self.patch_jump_forward(jump_over_if);
        self.emit_op(OpCode::Pop);
        if self.matches(TokenType::Else) {
            self.parse_selection_block();
        }
        self.consume_end_of_block();

        self.patch_jump_forward(jump_over_else);
    }

    fn parse_out_statement(&mut self) {
        self.parse_expression();
        self.consume_newline();
        self.emit_op(OpCode::Out);
    }

    fn parse_var_statement(&mut self) {
        self.consume(TokenType::Identifier, "A name for the variable is missing.");
        self.declare_variable();

        self.consume(
            TokenType::Colon,
            "The variable is missing an initializer. Use ':' to initialize it with a value.",
        );
        self.parse_expression();
        self.consume_newline();
        self.define_variable();
    }

    /// `"while" expression ( "{" expression "}" )? standardBlock`
    fn parse_while_statement(&mut self) {
        let condition_start = self.current_offset();
        self.parse_expression();
        let jump_to_body = self.emit_jump_forward(OpCode::JumpFwdIfTrue);
        let jump_to_end = self.emit_jump_forward(OpCode::JumpFwdIfFalse);

        let modification_start = self.current_offset();
        let has_modification = self.matches(TokenType::OpenBrace);
        if has_modification {
            self.parse_expression();
            self.emit_op(OpCode::Pop);
            self.consume(
                TokenType::CloseBrace,
                "The expression must be enclosed in `{ }`. Add `}` to terminate it.",
            );
            self.emit_jump_backward(condition_start);
        }

        self.patch_jump_forward(jump_to_body);
        self.emit_op(OpCode::Pop);
        self.parse_standard_block_with_scope();
        self.emit_jump_backward(if has_modification {
            modification_start
        } else {
            condition_start
        });

        self.patch_jump_forward(jump_to_end);
        self.emit_op(OpCode::Pop);
    }

    // --- expressions ------------------------------------------------------

    fn parse_precedence(&mut self, min_precedence: Precedence) {
        self.advance();

        if !has_prefix_rule(self.previous.kind) {
            self.error("You must provide an expression.");
            return;
        }

        // Assignments are the lowest-precedence expression; only treat the
        // target as assignable when the surrounding expression allows it.
        // `x : y : 1` parses as `x : (y : 1)`, but `x + y : 1` parses as
        // `(x + y) : 1` because `+` binds tighter.
        let is_assignable = is_assignment_operator(self.current.kind) && min_precedence <= Precedence::Assignment;
        self.parse_prefix(self.previous.kind, is_assignable);

        while infix_precedence(self.current.kind) >= min_precedence {
            self.advance();
            self.parse_infix(self.previous.kind, is_assignable);
        }

        if !is_assignable && is_assignment_operator(self.current.kind) {
            self.advance();
            self.error("You are trying to assign a value to an invalid target.");
        }
    }

    fn parse_expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_prefix(&mut self, kind: TokenType, is_assignable: bool) {
        match kind {
            TokenType::Minus | TokenType::Not => self.parse_unary(kind),
            TokenType::OpenParen => self.parse_grouping(),
            TokenType::False | TokenType::True => self.parse_boolean(kind),
            TokenType::None => self.emit_op(OpCode::ConstantNone),
            TokenType::Identifier => self.parse_variable(is_assignable),
            TokenType::Number => self.parse_number(),
            TokenType::Text => self.parse_text(),
            _ => self.error("You must provide an expression."),
        }
    }

    fn parse_infix(&mut self, kind: TokenType, is_assignable: bool) {
        match kind {
            TokenType::And => self.parse_and(),
            TokenType::Or => self.parse_or(),
            _ => self.parse_binary(kind, is_assignable),
        }
    }

    fn parse_and(&mut self) {
        let jump_over_and = self.emit_jump_forward(OpCode::JumpFwdIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Conjunction);
        self.patch_jump_forward(jump_over_and);
    }

    fn parse_or(&mut self) {
        let jump_over_or = self.emit_jump_forward(OpCode::JumpFwdIfTrue);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Disjunction);
        self.patch_jump_forward(jump_over_or);
    }

    fn parse_binary(&mut self, operator: TokenType, _is_assignable: bool) {
        let precedence = infix_precedence(operator);
        // Parse the right-hand operand one precedence level higher to
        // enforce left-associativity: `5 + 6 + 7` is `(5 + 6) + 7`.
        self.parse_precedence(precedence.one_higher());

        let op = match operator {
            TokenType::Equals => OpCode::Equals,
            TokenType::ExclamationEquals => OpCode::NotEquals,
            TokenType::GreaterThan => OpCode::GreaterThan,
            TokenType::GreaterThanEquals => OpCode::GreaterEquals,
            TokenType::LessThan => OpCode::LessThan,
            TokenType::LessThanEquals => OpCode::LessEquals,
            TokenType::Plus => OpCode::Add,
            TokenType::Minus => OpCode::Subtract,
            TokenType::Star => OpCode::Multiply,
            TokenType::Slash => OpCode::Divide,
            TokenType::Mod => OpCode::Modulo,
            _ => return,
        };
        self.emit_op(op);
    }

    fn parse_boolean(&mut self, kind: TokenType) {
        match kind {
            TokenType::False => self.emit_op(OpCode::ConstantFalse),
            TokenType::True => self.emit_op(OpCode::ConstantTrue),
            _ => {}
        }
    }

    fn parse_grouping(&mut self) {
        self.parse_expression();
        self.consume(TokenType::CloseParen, "A closing parenthesis ')' is missing.");
    }

    fn parse_number(&mut self) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(value));
    }

    fn parse_text(&mut self) {
        // Strip the surrounding double quotes.
        let raw = self.previous.lexeme;
        let content = &raw[1..raw.len() - 1];
        let interned = self.pool.intern(content);
        self.emit_constant(Value::Text(interned));
    }

    fn parse_unary(&mut self, operator: TokenType) {
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenType::Minus => self.emit_op(OpCode::Negate),
            TokenType::Not => self.emit_op(OpCode::Not),
            _ => {}
        }
    }

    fn parse_variable(&mut self, is_assignable: bool) {
        let name = self.previous;
        self.access_or_assign_variable(name, is_assignable);
    }

    fn access_or_assign_variable(&mut self, name: Token<'src>, is_assignable: bool) {
        let slot = self.resolve(name.lexeme);
        let Some(slot) = slot else {
            self.error_at(
                name,
                "The variable has not been declared. Use 'var <name> : <value>' to declare it first.",
            );
            return;
        };

        if is_assignable {
            self.assign_variable(slot);
        } else {
            self.emit_op_byte(OpCode::GetVar, slot);
        }
    }

    fn assign_variable(&mut self, slot: u8) {
        self.advance();
        let operator = self.previous.kind;
        if operator == TokenType::Colon {
            self.parse_expression();
        } else {
            // Augmented assignment: push the current value first so the
            // operand order is `variable op rhs`.
            self.emit_op_byte(OpCode::GetVar, slot);
            self.parse_expression();
            match operator {
                TokenType::PlusColon => self.emit_op(OpCode::Add),
                TokenType::MinusColon => self.emit_op(OpCode::Subtract),
                TokenType::StarColon => self.emit_op(OpCode::Multiply),
                TokenType::SlashColon => self.emit_op(OpCode::Divide),
                _ => self.error("Internal error. Expected an assignment operator."),
            }
        }
        self.emit_op_byte(OpCode::SetVar, slot);
    }

    fn finish(mut self) -> Result<Program, Vec<CompileError>> {
        self.emit_op(OpCode::Return);
        if self.errors.is_empty() {
            Ok(self.program)
        } else {
            Err(self.errors)
        }
    }
}

/// Compiles `source` into a [`Program`], interning every text literal into
/// `pool` along the way. Returns every compile error collected rather than
/// stopping at the first one, using panic-mode recovery to avoid cascades.
pub fn compile(source: &str, pool: &mut TextPool) -> Result<Program, Vec<CompileError>> {
    let mut compiler = Compiler::new(source, pool);

    while !compiler.matches(TokenType::Eof) {
        compiler.parse_statement();
    }

    compiler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(source: &str) -> Program {
        let mut pool = TextPool::new();
        compile(source, &mut pool).expect("expected compilation to succeed")
    }

    fn compile_err(source: &str) -> Vec<CompileError> {
        let mut pool = TextPool::new();
        compile(source, &mut pool).expect_err("expected compilation to fail")
    }

    #[test]
    fn compiles_a_var_declaration_and_out() {
        let program = compile_ok("var x: 1\nout x\n");
        assert!(program.instructions.contains(&(OpCode::Out as u8)));
    }

    #[test]
    fn redeclaring_a_variable_in_the_same_scope_is_an_error() {
        let errors = compile_err("var x: 1\nvar x: 2\n");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("already been declared"));
    }

    #[test]
    fn referencing_an_undeclared_variable_is_an_error() {
        let errors = compile_err("out y\n");
        assert!(errors[0].message.contains("has not been declared"));
    }

    #[test]
    fn self_reference_in_initializer_is_an_error() {
        let errors = compile_err("var x: x + 1\n");
        assert!(errors[0].message.contains("being declared in its initializer"));
    }

    #[test]
    fn assignment_to_non_assignable_target_is_an_error() {
        let errors = compile_err("var x: 1\n1 + 1 : x\n");
        assert!(errors[0].message.contains("invalid target"));
    }

    #[test]
    fn text_literals_are_interned() {
        let mut pool = TextPool::new();
        let program = compile("out \"hi\"\nout \"hi\"\n", &mut pool).unwrap();
        assert_eq!(program.constants.len(), 2);
        let (Value::Text(a), Value::Text(b)) = (&program.constants[0], &program.constants[1]) else {
            panic!("expected interned text constants");
        };
        assert!(std::rc::Rc::ptr_eq(a, b));
    }
}
