use crate::memory::{Device, Memory, Width};
use crate::Fault;

/// Number of architecturally visible 64-bit registers.
pub const REGISTER_COUNT: usize = 14;

/// Display name of the device backing the register file.
pub const REGISTER_FILE_DEVICE_NAME: &str = "Registers";

const REGISTER_FILE_BYTES: usize = REGISTER_COUNT * 8;

/// Architecturally visible register identifier, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Register {
    /// Instruction pointer.
    Ip = 0,
    /// Accumulator.
    Acc = 1,
    /// General register 1.
    R1 = 2,
    /// General register 2.
    R2 = 3,
    /// General register 3.
    R3 = 4,
    /// General register 4.
    R4 = 5,
    /// General register 5.
    R5 = 6,
    /// General register 6.
    R6 = 7,
    /// General register 7.
    R7 = 8,
    /// General register 8.
    R8 = 9,
    /// Stack pointer.
    Sp = 10,
    /// Frame pointer.
    Fp = 11,
    /// Memory-bank register.
    Mb = 12,
    /// Interrupt-mask register; bit `n` enables interrupt line `n`.
    Im = 13,
}

impl Register {
    /// Ordered list of all registers.
    pub const ALL: [Self; REGISTER_COUNT] = [
        Self::Ip,
        Self::Acc,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::Sp,
        Self::Fp,
        Self::Mb,
        Self::Im,
    ];

    /// General registers saved and restored by a call frame, in push order.
    pub const GENERAL: [Self; 8] = [
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
    ];

    /// Storage index (`0..14`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Byte offset of this register inside the register file.
    #[must_use]
    pub const fn offset(self) -> u64 {
        self as u64 * 8
    }

    /// Decodes a raw selector byte. Every byte is valid: the index wraps
    /// modulo [`REGISTER_COUNT`].
    #[must_use]
    pub const fn from_selector(selector: u8) -> Self {
        Self::ALL[selector as usize % REGISTER_COUNT]
    }

    /// Canonical upper-case assembly name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ip => "IP",
            Self::Acc => "ACC",
            Self::R1 => "R1",
            Self::R2 => "R2",
            Self::R3 => "R3",
            Self::R4 => "R4",
            Self::R5 => "R5",
            Self::R6 => "R6",
            Self::R7 => "R7",
            Self::R8 => "R8",
            Self::Sp => "SP",
            Self::Fp => "FP",
            Self::Mb => "MB",
            Self::Im => "IM",
        }
    }

    /// Resolves a register name, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnknownRegisterName`] for names outside the register set.
    pub fn from_name(name: &str) -> Result<Self, Fault> {
        Self::ALL
            .into_iter()
            .find(|register| register.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Fault::UnknownRegisterName(name.to_owned()))
    }
}

/// Register bank stored in a small byte-backed device, so register traffic
/// shares the bounds-checked primitives of every other device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    storage: Memory,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Creates a register file with every register cleared.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Memory::with_name(REGISTER_FILE_DEVICE_NAME, REGISTER_FILE_BYTES),
        }
    }

    /// Reads a full register.
    ///
    /// # Errors
    ///
    /// Propagates the backing device's fault.
    pub fn get(&self, register: Register) -> Result<u64, Fault> {
        self.storage.read64(register.offset())
    }

    /// Overwrites a full register.
    ///
    /// # Errors
    ///
    /// Propagates the backing device's fault.
    pub fn set(&mut self, register: Register, value: u64) -> Result<(), Fault> {
        self.storage.write64(register.offset(), value)
    }

    /// Reads `width` bytes at a raw byte offset into the file.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::OutOfBounds`] when the access leaves the file.
    pub fn read(&self, offset: u64, width: Width) -> Result<u64, Fault> {
        self.storage.read(offset, width)
    }

    /// Writes `width` bytes at a raw byte offset into the file.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::OutOfBounds`] when the access leaves the file.
    pub fn write(&mut self, offset: u64, width: Width, value: u64) -> Result<(), Fault> {
        self.storage.write(offset, width, value)
    }
}
