//! Top-level assembler pipeline.
//!
//! 1. **Pass 1**: parse every line and assign addresses and labels
//!    (`symbols::assign_addresses`).
//! 2. **Pass 2**: encode each statement with labels resolved and lay the
//!    bytes out into a flat image starting at the origin.

use std::fs;
use std::path::Path;

use crate::encoder::encode_statement;
use crate::errors::AssembleError;
use crate::parser::parse_line;
use crate::symbols::{assign_addresses, SymbolError, SymbolErrorKind, SymbolTable};

/// An entry in the address-to-source listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Address of the first byte.
    pub address: u64,
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// Trimmed source text.
    pub source: String,
    /// 1-based source line.
    pub line: usize,
}

/// Assembled image and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    /// Load address of `binary[0]`.
    pub origin: u64,
    /// Flat image; gaps left by `.org` are zero-filled.
    pub binary: Vec<u8>,
    /// Label definitions.
    pub symbols: SymbolTable,
    /// One entry per emitting statement, in source order.
    pub listing: Vec<ListingEntry>,
}

/// Reads and assembles the file at `path`.
///
/// # Errors
///
/// Returns [`AssembleError::Io`] when the file cannot be read, or the first
/// parse, symbol or encoding error.
pub fn assemble(path: &Path) -> Result<Assembly, AssembleError> {
    let source = fs::read_to_string(path).map_err(|source| AssembleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    assemble_source(&source)
}

/// Assembles source text.
///
/// # Errors
///
/// Returns the first parse, symbol or encoding error.
pub fn assemble_source(source: &str) -> Result<Assembly, AssembleError> {
    let texts: Vec<&str> = source.lines().collect();
    let parsed = texts
        .iter()
        .enumerate()
        .map(|(index, text)| parse_line(text, index + 1).map(|line| (index + 1, line)))
        .collect::<Result<Vec<_>, _>>()?;

    let assignment = assign_addresses(parsed)?;
    let origin = assignment.origin;

    let mut binary = Vec::new();
    let mut listing = Vec::with_capacity(assignment.lines.len());
    for line in &assignment.lines {
        let bytes = encode_statement(&line.statement, line.source_line, &assignment.symbols)?;
        if bytes.is_empty() {
            continue;
        }

        let offset = usize::try_from(line.address - origin).map_err(|_| SymbolError {
            line: line.source_line,
            kind: SymbolErrorKind::AddressOverflow {
                address: line.address,
                size: line.size,
            },
        })?;
        binary.resize(offset, 0);
        binary.extend_from_slice(&bytes);

        listing.push(ListingEntry {
            address: line.address,
            bytes,
            source: texts
                .get(line.source_line - 1)
                .map_or_else(String::new, |text| text.trim().to_owned()),
            line: line.source_line,
        });
    }

    Ok(Assembly {
        origin,
        binary,
        symbols: assignment.symbols,
        listing,
    })
}
