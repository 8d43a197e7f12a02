//! Instruction disassembly.
//!
//! Converts instruction bytes on the bus into assembly text using the shared
//! opcode table, so the output always reads back through the assembler.

use std::fmt::Write as _;

use crate::encoding::{Opcode, OperandKind};
use crate::memory::{MemoryBus, Width};
use crate::state::Register;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// The starting address of this instruction.
    pub address: u64,
    /// Length in bytes, opcode included.
    pub len_bytes: u64,
    /// The raw 16-bit opcode.
    pub opcode: u16,
    /// The instruction mnemonic (e.g., "ADD", "LDI", "NOP").
    pub mnemonic: String,
    /// The formatted operands (e.g., "R1, R2" or "R1, 0x10").
    pub operands: String,
    /// Whether the opcode is outside the instruction set.
    pub is_invalid: bool,
}

impl DisassemblyRow {
    /// Assembly text of the row, e.g. `ADDI R1, 0x1`.
    #[must_use]
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Disassembles the instruction at `address`.
///
/// Returns `None` when the opcode or one of its operands cannot be read.
/// Invalid opcodes produce a two-byte `.word` row flagged `is_invalid`.
#[must_use]
pub fn disassemble_one(bus: &MemoryBus, address: u64) -> Option<DisassemblyRow> {
    let opcode = u16::try_from(bus.read(address, Width::Word).ok()?).ok()?;

    let Some(op) = Opcode::from_u16(opcode) else {
        return Some(DisassemblyRow {
            address,
            len_bytes: 2,
            opcode,
            mnemonic: ".word".to_owned(),
            operands: format!("{opcode:#06x} ; INVALID"),
            is_invalid: true,
        });
    };

    let mut cursor = address.wrapping_add(2);
    let mut operands = String::new();
    for (index, kind) in op.shape().operands().iter().enumerate() {
        let value = bus.read(cursor, operand_width(*kind)).ok()?;
        if index > 0 {
            operands.push_str(", ");
        }
        match kind {
            OperandKind::Register => {
                #[allow(clippy::cast_possible_truncation)]
                let selector = value as u8;
                operands.push_str(Register::from_selector(selector).name());
            }
            _ => {
                let _ = write!(operands, "{value:#x}");
            }
        }
        cursor = cursor.wrapping_add(u64::from(kind.bytes()));
    }

    Some(DisassemblyRow {
        address,
        len_bytes: op.info().encoded_len(),
        opcode,
        mnemonic: op.mnemonic().to_owned(),
        operands,
        is_invalid: false,
    })
}

/// Disassembles up to `count` consecutive instructions starting at
/// `address`, stopping at the first unreadable one.
#[must_use]
pub fn disassemble_window(bus: &MemoryBus, address: u64, count: usize) -> Vec<DisassemblyRow> {
    let mut rows = Vec::with_capacity(count);
    let mut cursor = address;
    for _ in 0..count {
        let Some(row) = disassemble_one(bus, cursor) else {
            break;
        };
        cursor = cursor.wrapping_add(row.len_bytes);
        rows.push(row);
    }
    rows
}

const fn operand_width(kind: OperandKind) -> Width {
    match kind {
        OperandKind::Register | OperandKind::Imm8 => Width::Byte,
        OperandKind::Imm16 => Width::Word,
        OperandKind::Imm32 => Width::Dword,
        OperandKind::Imm64 | OperandKind::Address => Width::Qword,
    }
}
