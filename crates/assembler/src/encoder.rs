//! Pass-2 encoding of instructions and data directives.
//!
//! Instructions encode as the little-endian 16-bit opcode followed by each
//! operand in stream order: one selector byte per register, and immediates
//! and addresses little-endian at their operand width.

use thiserror::Error;

use crate::parser::{Directive, Operand, ParsedInstruction, Statement, Value};
use crate::symbols::SymbolTable;

/// Error during encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct EncodeError {
    /// Source line of the statement.
    pub line: usize,
    /// What went wrong.
    pub kind: EncodeErrorKind,
}

/// Classification of encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeErrorKind {
    /// Label referenced but never defined.
    #[error("undefined label: {0}")]
    UndefinedLabel(String),
    /// Value does not fit the operand or datum width.
    #[error("value {value:#x} does not fit in {bytes} byte(s)")]
    ValueOutOfRange {
        /// The resolved value.
        value: u64,
        /// Available width in bytes.
        bytes: u8,
    },
}

/// Encodes one statement. `.org` encodes to no bytes.
///
/// # Errors
///
/// Returns an [`EncodeError`] for undefined labels and values too wide for
/// their operand.
pub fn encode_statement(
    statement: &Statement,
    line: usize,
    symbols: &SymbolTable,
) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    let result = match statement {
        Statement::Instruction(instruction) => encode_instruction(instruction, symbols, &mut out),
        Statement::Directive(Directive::Org(_)) => Ok(()),
        Statement::Directive(Directive::Data { width, values }) => values
            .iter()
            .try_for_each(|value| emit(&mut out, resolve(value, symbols)?, width.bytes())),
    };
    result.map(|()| out).map_err(|kind| EncodeError { line, kind })
}

fn encode_instruction(
    instruction: &ParsedInstruction,
    symbols: &SymbolTable,
    out: &mut Vec<u8>,
) -> Result<(), EncodeErrorKind> {
    out.extend_from_slice(&instruction.info.opcode.value().to_le_bytes());
    let kinds = instruction.info.shape.operands();
    for (operand, kind) in instruction.operands.iter().zip(kinds) {
        let value = match operand {
            Operand::Register(register) => register.index() as u64,
            Operand::Value(value) => resolve(value, symbols)?,
        };
        emit(out, value, kind.bytes())?;
    }
    Ok(())
}

fn resolve(value: &Value, symbols: &SymbolTable) -> Result<u64, EncodeErrorKind> {
    match value {
        Value::Literal(literal) => Ok(*literal),
        Value::Label(name) => symbols
            .get(name)
            .map(|symbol| symbol.address)
            .ok_or_else(|| EncodeErrorKind::UndefinedLabel(name.clone())),
    }
}

/// Returns `true` when `value` fits in `bytes` bytes either as an unsigned
/// value or as a sign-extended negative one.
fn fits(value: u64, bytes: u8) -> bool {
    if bytes >= 8 {
        return true;
    }
    let bits = u32::from(bytes) * 8;
    value >> bits == 0 || value >> (bits - 1) == u64::MAX >> (bits - 1)
}

fn emit(out: &mut Vec<u8>, value: u64, bytes: u8) -> Result<(), EncodeErrorKind> {
    if !fits(value, bytes) {
        return Err(EncodeErrorKind::ValueOutOfRange { value, bytes });
    }
    out.extend_from_slice(&value.to_le_bytes()[..usize::from(bytes)]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{encode_statement, fits, EncodeError, EncodeErrorKind};
    use crate::parser::parse_line;
    use crate::symbols::{Symbol, SymbolTable};

    fn encode(line: &str, symbols: &SymbolTable) -> Result<Vec<u8>, EncodeError> {
        let statement = parse_line(line, 5).unwrap().statement.unwrap();
        encode_statement(&statement, 5, symbols)
    }

    fn table() -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols.insert(
            "target".into(),
            Symbol {
                address: 0x1234,
                defined_at: 1,
            },
        );
        symbols
    }

    #[test]
    fn opcode_and_register_operands() {
        assert_eq!(encode("HLT", &table()).unwrap(), vec![0xff, 0xff]);
        assert_eq!(encode("TF ACC, R8", &table()).unwrap(), vec![0x04, 0x00, 1, 9]);
        assert_eq!(encode("PUSH IM", &table()).unwrap(), vec![0x91, 0x00, 13]);
    }

    #[test]
    fn immediates_are_little_endian_at_operand_width() {
        assert_eq!(
            encode("LDI R1, 0x0102030405060708", &table()).unwrap(),
            vec![0x01, 0x00, 2, 8, 7, 6, 5, 4, 3, 2, 1]
        );
        assert_eq!(
            encode("LDWI R2, 0xBEEF", &table()).unwrap(),
            vec![0x06, 0x00, 3, 0xef, 0xbe]
        );
        assert_eq!(encode("INT 3", &table()).unwrap(), vec![0xc1, 0x00, 3, 0]);
    }

    #[test]
    fn labels_resolve_to_absolute_addresses() {
        assert_eq!(
            encode("JMP target", &table()).unwrap(),
            vec![0x61, 0x00, 0x34, 0x12, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            encode(".word target, 7", &table()).unwrap(),
            vec![0x34, 0x12, 7, 0]
        );
    }

    #[test]
    fn undefined_label_is_reported_with_its_line() {
        assert_eq!(
            encode("CALL nowhere", &table()),
            Err(EncodeError {
                line: 5,
                kind: EncodeErrorKind::UndefinedLabel("nowhere".into())
            })
        );
    }

    #[test]
    fn narrow_operands_reject_wide_values() {
        assert_eq!(
            encode("LDBI R1, 256", &table()).unwrap_err().kind,
            EncodeErrorKind::ValueOutOfRange {
                value: 256,
                bytes: 1
            }
        );
        assert_eq!(encode("LDBI R1, -1", &table()).unwrap(), vec![0x05, 0, 2, 0xff]);
        assert!(encode(".byte target", &table()).is_err());
    }

    #[test]
    fn width_fit() {
        let cases = [
            (0xff, 1, true),
            (0x100, 1, false),
            (u64::MAX, 1, true),
            (0xffff_ffff_ffff_ff7f, 1, false),
            (0xffff_ffff, 4, true),
            (0x1_0000_0000, 4, false),
            (u64::MAX, 8, true),
        ];
        for (value, bytes, expected) in cases {
            assert_eq!(fits(value, bytes), expected, "{value:#x} in {bytes}");
        }
    }
}
