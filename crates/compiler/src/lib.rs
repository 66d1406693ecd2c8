//! Thusly Compiler: tokenizer, Pratt parser, and bytecode emitter.
//!
//! [`compile`] is the single entry point: given source text and a text
//! pool to intern literals into, it produces a [`thusly_core::Program`]
//! or the list of compile errors encountered.

pub mod compiler;
pub mod lexer;
pub mod token;

pub use compiler::compile;
pub use lexer::Lexer;
pub use token::{Token, TokenType};
