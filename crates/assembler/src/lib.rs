//! Two-pass assembler for the vm64 instruction set.
//!
//! Mnemonics, operand shapes and opcode values come from
//! [`vm64_core::OPCODE_TABLE`], so assembled programs always match the core's
//! dispatch table.

/// Top-level two-pass assembler pipeline.
pub mod assembler;
/// Instruction and directive encoding.
pub mod encoder;
/// Unified assembler error type.
pub mod errors;
/// Mnemonic and register resolution against the core's tables.
pub mod mnemonic;
/// Assembly parser for instructions, labels, and directives.
pub mod parser;
/// Symbol table and pass-1 address assignment.
pub mod symbols;

pub use assembler::{assemble, assemble_source, Assembly, ListingEntry};
pub use errors::AssembleError;

#[cfg(test)]
use tempfile as _;
