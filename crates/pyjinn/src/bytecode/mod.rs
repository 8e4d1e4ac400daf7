//! Compiled execution path (§3.2, §4.3, §4.4, §4.5).

pub mod compiler;
pub mod instr;
pub mod vm;

pub use compiler::Compiler;
pub use instr::{ClauseKind, Code, ExceptionRange, Instruction, LineEntry, NestedFunction};
