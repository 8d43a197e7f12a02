//! Memory-mapped device contract, plain RAM and the region bus.

/// Bounds-checked access primitives and access widths.
pub mod access;
/// Region map routing global addresses to devices.
pub mod map;
/// Zero-initialised RAM device.
pub mod ram;

pub use access::{checked_span, Width};
pub use map::{MemoryBus, Region};
pub use ram::{Memory, MEMORY_DEVICE_NAME};

use crate::{CoreLink, Fault};

/// Contract every memory-mapped peripheral exposes to the bus.
///
/// Addresses handed to a device are device-local when its region is mapped
/// with rebasing, and global otherwise. Each access must satisfy
/// `address + width <= size`; implementations report violations as
/// [`Fault::OutOfBounds`].
pub trait Device {
    /// Display name used in diagnostics.
    fn name(&self) -> &str;

    /// Backing size in bytes.
    fn size(&self) -> u64;

    /// Reads an 8-bit value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn read8(&self, address: u64) -> Result<u8, Fault>;

    /// Reads a 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn read16(&self, address: u64) -> Result<u16, Fault>;

    /// Reads a 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn read32(&self, address: u64) -> Result<u32, Fault>;

    /// Reads a 64-bit value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn read64(&self, address: u64) -> Result<u64, Fault>;

    /// Writes an 8-bit value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn write8(&mut self, address: u64, value: u8) -> Result<(), Fault>;

    /// Writes a 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn write16(&mut self, address: u64, value: u16) -> Result<(), Fault>;

    /// Writes a 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn write32(&mut self, address: u64, value: u32) -> Result<(), Fault>;

    /// Writes a 64-bit value.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn write64(&mut self, address: u64, value: u64) -> Result<(), Fault>;

    /// Receives a non-owning handle to the core that owns the bus.
    ///
    /// Called every time the bus propagates its owner, so it must tolerate
    /// repeated calls.
    fn attach_core(&mut self, _link: CoreLink) {}

    /// Teardown hook run when the owning bus is dropped.
    ///
    /// Returns `false` when the device has no hook of its own, in which case
    /// the bus releases it generically and logs a warning.
    fn destroy(&mut self) -> bool {
        false
    }

    /// Reads a value of the given width, zero-extended to 64 bits.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    fn read(&self, address: u64, width: Width) -> Result<u64, Fault> {
        match width {
            Width::Byte => self.read8(address).map(u64::from),
            Width::Word => self.read16(address).map(u64::from),
            Width::Dword => self.read32(address).map(u64::from),
            Width::Qword => self.read64(address),
        }
    }

    /// Writes the low `width` bytes of `value`.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the access is out of bounds.
    #[allow(clippy::cast_possible_truncation)]
    fn write(&mut self, address: u64, width: Width, value: u64) -> Result<(), Fault> {
        match width {
            Width::Byte => self.write8(address, value as u8),
            Width::Word => self.write16(address, value as u16),
            Width::Dword => self.write32(address, value as u32),
            Width::Qword => self.write64(address, value),
        }
    }
}
