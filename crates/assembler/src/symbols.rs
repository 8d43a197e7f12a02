//! Symbol table and pass-1 address assignment.
//!
//! Pass 1 walks the parsed lines, assigns every statement its absolute
//! address and records label definitions. The image origin is the first
//! `.org` when it precedes all emitted bytes, and 0 otherwise; `.org` may
//! only move the output position forward.

use std::collections::HashMap;

use thiserror::Error;

use crate::parser::{Directive, ParsedLine, Statement};

/// Largest flat image, in bytes, between the origin and the last emitted
/// byte. Gaps left by `.org` count towards it.
pub const MAX_IMAGE_SIZE: u64 = 16 * 1024 * 1024;

/// A label with its assigned address and definition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Absolute address of the label.
    pub address: u64,
    /// Source line where the label was defined.
    pub defined_at: usize,
}

/// Symbol table mapping label names to their definitions.
pub type SymbolTable = HashMap<String, Symbol>;

/// Error during address assignment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct SymbolError {
    /// Source line where the error occurred.
    pub line: usize,
    /// What went wrong.
    pub kind: SymbolErrorKind,
}

/// Classification of symbol errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolErrorKind {
    /// Label defined twice.
    #[error("duplicate label '{name}' (first defined at line {first_definition})")]
    DuplicateLabel {
        /// The label name.
        name: String,
        /// Line of the first definition.
        first_definition: usize,
    },
    /// Output would run past the end of the address space.
    #[error("address overflow: {size} bytes at {address:#x} exceed the 64-bit address space")]
    AddressOverflow {
        /// Start of the statement.
        address: u64,
        /// Its size in bytes.
        size: u64,
    },
    /// Gaps left by `.org` would make the flat image too large to write.
    #[error("image spans {origin:#x}..{end:#x}, more than the {limit} byte limit")]
    ImageTooLarge {
        /// Image origin.
        origin: u64,
        /// One past the offending statement.
        end: u64,
        /// Largest allowed image size.
        limit: u64,
    },
    /// `.org` would move the output position backwards.
    #[error(".org would move address backwards: current={current:#x}, requested={requested:#x}")]
    OrgBackwards {
        /// Current address.
        current: u64,
        /// Requested address.
        requested: u64,
    },
}

/// A statement with its assigned address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedLine {
    /// Address where the statement's bytes begin.
    pub address: u64,
    /// Bytes the statement emits.
    pub size: u64,
    /// The statement itself.
    pub statement: Statement,
    /// Source line number.
    pub source_line: usize,
}

/// Result of pass-1 address assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Statements in source order with their addresses.
    pub lines: Vec<AddressedLine>,
    /// Label definitions.
    pub symbols: SymbolTable,
    /// Address of the first byte of the image.
    pub origin: u64,
    /// One past the last emitted byte.
    pub end_address: u64,
}

/// Assigns addresses to `(line number, parsed line)` pairs in source order.
///
/// # Errors
///
/// Returns a [`SymbolError`] for duplicate labels, backwards `.org`
/// directives, output past the end of the address space and images larger
/// than [`MAX_IMAGE_SIZE`].
pub fn assign_addresses(lines: Vec<(usize, ParsedLine)>) -> Result<Assignment, SymbolError> {
    let mut symbols = SymbolTable::new();
    let mut pending: Vec<(String, usize)> = Vec::new();
    let mut addressed = Vec::new();
    let mut address = 0_u64;
    let mut origin = None;

    for (line, parsed) in lines {
        if let Some(name) = parsed.label {
            let first_definition = symbols.get(&name).map(|symbol| symbol.defined_at).or_else(|| {
                pending
                    .iter()
                    .find(|(label, _)| *label == name)
                    .map(|(_, defined_at)| *defined_at)
            });
            if let Some(first_definition) = first_definition {
                return Err(SymbolError {
                    line,
                    kind: SymbolErrorKind::DuplicateLabel {
                        name,
                        first_definition,
                    },
                });
            }
            pending.push((name, line));
        }

        let Some(statement) = parsed.statement else {
            continue;
        };

        if let Statement::Directive(Directive::Org(requested)) = statement {
            match origin {
                None => origin = Some(requested),
                Some(_) if requested < address => {
                    return Err(SymbolError {
                        line,
                        kind: SymbolErrorKind::OrgBackwards {
                            current: address,
                            requested,
                        },
                    });
                }
                Some(_) => {}
            }
            address = requested;
            continue;
        }

        let size = statement.size();
        let next = address.checked_add(size).ok_or(SymbolError {
            line,
            kind: SymbolErrorKind::AddressOverflow { address, size },
        })?;
        if origin.is_none() {
            origin = Some(address);
        }
        let base = origin.unwrap_or(address);
        if next - base > MAX_IMAGE_SIZE {
            return Err(SymbolError {
                line,
                kind: SymbolErrorKind::ImageTooLarge {
                    origin: base,
                    end: next,
                    limit: MAX_IMAGE_SIZE,
                },
            });
        }

        bind_pending(&mut symbols, &mut pending, address);
        addressed.push(AddressedLine {
            address,
            size,
            statement,
            source_line: line,
        });
        address = next;
    }

    bind_pending(&mut symbols, &mut pending, address);
    Ok(Assignment {
        lines: addressed,
        symbols,
        origin: origin.unwrap_or(0),
        end_address: address,
    })
}

/// Labels take the address of the next emitting statement, so a label
/// followed by `.org` names the new position.
fn bind_pending(symbols: &mut SymbolTable, pending: &mut Vec<(String, usize)>, address: u64) {
    for (name, defined_at) in pending.drain(..) {
        symbols.insert(
            name,
            Symbol {
                address,
                defined_at,
            },
        );
    }
}
