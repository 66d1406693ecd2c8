//! Thusly VM: the `Environment` heap and the stack machine that executes
//! compiled [`thusly_core::Program`]s.
//!
//! [`Vm::interpret`] is the single entry point used by the CLI: it
//! compiles source text with [`thuslyc::compile`] and then runs the
//! result, sharing one [`Environment`] (and therefore one `TextPool`)
//! across every call made on the same `Vm`.

pub mod environment;
pub mod vm;

pub use environment::Environment;
pub use vm::{DebugFlags, Vm};
