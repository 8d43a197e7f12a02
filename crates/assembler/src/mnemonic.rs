//! Mnemonic and register-name resolution against the core's tables.

use vm64_core::{lookup_mnemonic, OpcodeInfo, OperandKind, Register};

/// Resolves a mnemonic, ignoring ASCII case.
#[must_use]
pub fn resolve_mnemonic(name: &str) -> Option<&'static OpcodeInfo> {
    lookup_mnemonic(name)
}

/// Resolves a register name, ignoring ASCII case.
#[must_use]
pub fn resolve_register(name: &str) -> Option<Register> {
    Register::from_name(name).ok()
}

const fn operand_placeholder(kind: OperandKind) -> &'static str {
    match kind {
        OperandKind::Register => "reg",
        OperandKind::Imm8 => "imm8",
        OperandKind::Imm16 => "imm16",
        OperandKind::Imm32 => "imm32",
        OperandKind::Imm64 => "imm64",
        OperandKind::Address => "addr",
    }
}

/// Operand syntax for an opcode, e.g. `LDI reg, imm64`.
#[must_use]
pub fn usage(info: &OpcodeInfo) -> String {
    let operands: Vec<_> = info
        .shape
        .operands()
        .iter()
        .map(|kind| operand_placeholder(*kind))
        .collect();
    if operands.is_empty() {
        info.mnemonic.to_owned()
    } else {
        format!("{} {}", info.mnemonic, operands.join(", "))
    }
}
