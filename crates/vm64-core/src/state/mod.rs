//! Architectural CPU state model primitives.

/// Flags register bits.
pub mod flags;
/// Register identifiers and the device-backed register file.
pub mod registers;

pub use flags::{Flag, Flags, FLAGS_ACTIVE_MASK};
pub use registers::{Register, RegisterFile, REGISTER_COUNT, REGISTER_FILE_DEVICE_NAME};
