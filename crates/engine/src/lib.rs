//! Hierarchical field resolution.
//!
//! A [`Program`] is a list of typed instructions that look a named field up on
//! a content node and, failing that, on its descendants, ancestors, linked
//! type pages or explicit defaults. The [`Interpreter`] runs it against a
//! [`ContentStore`](fieldsearch_core::ContentStore) and a
//! [`LinkStore`](fieldsearch_core::LinkStore) and can write the values it finds
//! into an output document.

pub mod asm;
mod date;
mod error;
mod instruction;
mod interpreter;
mod limits;
mod program;
mod save;
mod traverse;

pub use asm::{AsmError, Bindings, assemble};
pub use date::{DateFormatter, UtcDateFormatter};
pub use error::FieldSearchError;
pub use instruction::{Instruction, Opcode, Operand, OperandKind, ResultSlot, SearchMode};
pub use interpreter::{DomMarkupImporter, Interpreter, MarkupImporter, RunOutcome, Warning};
pub use limits::ExecutionLimits;
pub use program::Program;
