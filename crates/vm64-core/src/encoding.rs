//! Opcode values, mnemonics and operand shapes.
//!
//! [`OPCODE_TABLE`] is the single source of truth shared by the executor,
//! the disassembler and the assembler. Any 16-bit value not listed is an
//! invalid opcode.

/// Kind of a single operand in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// One selector byte, wrapped modulo the register count.
    Register,
    /// 8-bit immediate.
    Imm8,
    /// 16-bit immediate.
    Imm16,
    /// 32-bit immediate.
    Imm32,
    /// 64-bit immediate.
    Imm64,
    /// 64-bit absolute address.
    Address,
}

impl OperandKind {
    /// Encoded size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u8 {
        match self {
            Self::Register | Self::Imm8 => 1,
            Self::Imm16 => 2,
            Self::Imm32 => 4,
            Self::Imm64 | Self::Address => 8,
        }
    }
}

/// Operand layout following the 16-bit opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OperandShape {
    None,
    Register,
    RegisterRegister,
    RegisterImm8,
    RegisterImm16,
    RegisterImm32,
    RegisterImm64,
    RegisterAddress,
    Address,
    Imm16,
    Imm64,
}

impl OperandShape {
    /// Operands in stream order.
    #[must_use]
    pub const fn operands(self) -> &'static [OperandKind] {
        use OperandKind as K;
        match self {
            Self::None => &[],
            Self::Register => &[K::Register],
            Self::RegisterRegister => &[K::Register, K::Register],
            Self::RegisterImm8 => &[K::Register, K::Imm8],
            Self::RegisterImm16 => &[K::Register, K::Imm16],
            Self::RegisterImm32 => &[K::Register, K::Imm32],
            Self::RegisterImm64 => &[K::Register, K::Imm64],
            Self::RegisterAddress => &[K::Register, K::Address],
            Self::Address => &[K::Address],
            Self::Imm16 => &[K::Imm16],
            Self::Imm64 => &[K::Imm64],
        }
    }

    /// Total operand bytes after the opcode.
    #[must_use]
    pub fn operand_bytes(self) -> u64 {
        self.operands()
            .iter()
            .map(|kind| u64::from(kind.bytes()))
            .sum()
    }
}

/// One row of [`OPCODE_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeInfo {
    /// Opcode.
    pub opcode: Opcode,
    /// Upper-case assembly mnemonic.
    pub mnemonic: &'static str,
    /// Operand layout.
    pub shape: OperandShape,
}

impl OpcodeInfo {
    /// Full encoded length including the 2-byte opcode.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        2 + self.shape.operand_bytes()
    }
}

macro_rules! opcode_table {
    ($($variant:ident = $value:literal, $mnemonic:literal, $shape:ident;)*) => {
        /// Every opcode of the instruction set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        #[allow(missing_docs)]
        pub enum Opcode {
            $($variant = $value,)*
        }

        /// Assigned opcode table, in numeric order within each family.
        pub const OPCODE_TABLE: &[OpcodeInfo] = &[
            $(OpcodeInfo {
                opcode: Opcode::$variant,
                mnemonic: $mnemonic,
                shape: OperandShape::$shape,
            },)*
        ];

        impl Opcode {
            /// Decodes a raw opcode value; `None` for values outside the set.
            #[must_use]
            pub const fn from_u16(value: u16) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Upper-case assembly mnemonic.
            #[must_use]
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$variant => $mnemonic,)*
                }
            }

            /// Operand layout.
            #[must_use]
            pub const fn shape(self) -> OperandShape {
                match self {
                    $(Self::$variant => OperandShape::$shape,)*
                }
            }
        }
    };
}

opcode_table! {
    Nop = 0x0000, "NOP", None;

    Ldi = 0x0001, "LDI", RegisterImm64;
    Ldm = 0x0002, "LDM", RegisterAddress;
    St = 0x0003, "ST", RegisterAddress;
    Tf = 0x0004, "TF", RegisterRegister;
    Ldbi = 0x0005, "LDBI", RegisterImm8;
    Ldwi = 0x0006, "LDWI", RegisterImm16;
    Lddi = 0x0007, "LDDI", RegisterImm32;
    Ldbm = 0x0008, "LDBM", RegisterAddress;
    Ldwm = 0x0009, "LDWM", RegisterAddress;
    Lddm = 0x000A, "LDDM", RegisterAddress;
    Stb = 0x000B, "STB", RegisterAddress;
    Stw = 0x000C, "STW", RegisterAddress;
    Std = 0x000D, "STD", RegisterAddress;

    Addi = 0x0011, "ADDI", RegisterImm64;
    Subi = 0x0012, "SUBI", RegisterImm64;
    Muli = 0x0013, "MULI", RegisterImm64;
    Divi = 0x0014, "DIVI", RegisterImm64;
    Modi = 0x0015, "MODI", RegisterImm64;
    Mulis = 0x0016, "MULIS", RegisterImm64;
    Divis = 0x0017, "DIVIS", RegisterImm64;

    Add = 0x0021, "ADD", RegisterRegister;
    Sub = 0x0022, "SUB", RegisterRegister;
    Mul = 0x0023, "MUL", RegisterRegister;
    Div = 0x0024, "DIV", RegisterRegister;
    Mod = 0x0025, "MOD", RegisterRegister;
    Muls = 0x0026, "MULS", RegisterRegister;
    Divs = 0x0027, "DIVS", RegisterRegister;

    Andi = 0x0031, "ANDI", RegisterImm64;
    Ori = 0x0032, "ORI", RegisterImm64;
    Xori = 0x0033, "XORI", RegisterImm64;
    Noti = 0x0034, "NOTI", RegisterImm64;
    Shli = 0x0035, "SHLI", RegisterImm64;
    Shri = 0x0036, "SHRI", RegisterImm64;
    Rori = 0x0037, "RORI", RegisterImm64;
    Roli = 0x0038, "ROLI", RegisterImm64;

    And = 0x0041, "AND", RegisterRegister;
    Or = 0x0042, "OR", RegisterRegister;
    Xor = 0x0043, "XOR", RegisterRegister;
    Not = 0x0044, "NOT", RegisterRegister;
    Shl = 0x0045, "SHL", RegisterRegister;
    Shr = 0x0046, "SHR", RegisterRegister;
    Ror = 0x0047, "ROR", RegisterRegister;
    Rol = 0x0048, "ROL", RegisterRegister;

    Cmp = 0x0051, "CMP", RegisterRegister;
    Cmpi = 0x0052, "CMPI", RegisterImm64;

    Jmp = 0x0061, "JMP", Address;
    Jeq = 0x0062, "JEQ", Address;
    Jne = 0x0063, "JNE", Address;
    Jgt = 0x0064, "JGT", Address;
    Jlt = 0x0065, "JLT", Address;
    Jge = 0x0066, "JGE", Address;
    Jle = 0x0067, "JLE", Address;

    Bra = 0x0071, "BRA", Address;
    Beq = 0x0072, "BEQ", Address;
    Bne = 0x0073, "BNE", Address;
    Bgt = 0x0074, "BGT", Address;
    Blt = 0x0075, "BLT", Address;
    Bge = 0x0076, "BGE", Address;
    Ble = 0x0077, "BLE", Address;

    Jmpr = 0x0161, "JMPR", Register;
    Jeqr = 0x0162, "JEQR", Register;
    Jner = 0x0163, "JNER", Register;
    Jgtr = 0x0164, "JGTR", Register;
    Jltr = 0x0165, "JLTR", Register;
    Jger = 0x0166, "JGER", Register;
    Jler = 0x0167, "JLER", Register;

    Brar = 0x0171, "BRAR", Register;
    Beqr = 0x0172, "BEQR", Register;
    Bner = 0x0173, "BNER", Register;
    Bgtr = 0x0174, "BGTR", Register;
    Bltr = 0x0175, "BLTR", Register;
    Bger = 0x0176, "BGER", Register;
    Bler = 0x0177, "BLER", Register;

    Ret = 0x0081, "RET", None;

    Push = 0x0091, "PUSH", Register;
    Pushi = 0x0092, "PUSHI", Imm64;
    Pop = 0x0093, "POP", Register;

    Call = 0x00A1, "CALL", Address;
    Callr = 0x00A2, "CALLR", Register;
    Rtc = 0x00A3, "RTC", None;

    Clc = 0x00B1, "CLC", None;
    Sec = 0x00B2, "SEC", None;
    Clz = 0x00B3, "CLZ", None;
    Sez = 0x00B4, "SEZ", None;
    Cln = 0x00B5, "CLN", None;
    Sen = 0x00B6, "SEN", None;
    Clv = 0x00B7, "CLV", None;
    Sev = 0x00B8, "SEV", None;
    Cli = 0x00B9, "CLI", None;
    Sei = 0x00BA, "SEI", None;

    Int = 0x00C1, "INT", Imm16;
    Rti = 0x00C2, "RTI", None;

    Hlt = 0xFFFF, "HLT", None;
}

impl Opcode {
    /// Raw 16-bit value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self as u16
    }

    /// Table row for this opcode.
    #[must_use]
    pub const fn info(self) -> OpcodeInfo {
        OpcodeInfo {
            opcode: self,
            mnemonic: self.mnemonic(),
            shape: self.shape(),
        }
    }
}

/// Finds the table row for `mnemonic`, ignoring ASCII case.
#[must_use]
pub fn lookup_mnemonic(mnemonic: &str) -> Option<&'static OpcodeInfo> {
    OPCODE_TABLE
        .iter()
        .find(|info| info.mnemonic.eq_ignore_ascii_case(mnemonic))
}
