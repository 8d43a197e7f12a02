use crate::memory::{checked_span, Device, Width};
use crate::Fault;

/// Default display name of a RAM device.
pub const MEMORY_DEVICE_NAME: &str = "Memory";

/// Fixed-size, zero-initialised byte storage.
///
/// Multi-byte values are stored little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    name: String,
    data: Box<[u8]>,
}

impl Memory {
    /// Allocates `size` zeroed bytes named [`MEMORY_DEVICE_NAME`].
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self::with_name(MEMORY_DEVICE_NAME, size)
    }

    /// Allocates `size` zeroed bytes under a custom display name.
    #[must_use]
    pub fn with_name(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            data: vec![0; size].into_boxed_slice(),
        }
    }

    /// Raw view of the backing bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn bytes<const N: usize>(&self, address: u64, width: Width) -> Result<[u8; N], Fault> {
        let span = checked_span(&self.name, address, width, self.size())?;
        let mut out = [0; N];
        out.copy_from_slice(&self.data[span]);
        Ok(out)
    }

    fn store(&mut self, address: u64, width: Width, bytes: &[u8]) -> Result<(), Fault> {
        let span = checked_span(&self.name, address, width, self.size())?;
        self.data[span].copy_from_slice(bytes);
        Ok(())
    }
}

impl Device for Memory {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read8(&self, address: u64) -> Result<u8, Fault> {
        self.bytes::<1>(address, Width::Byte).map(u8::from_le_bytes)
    }

    fn read16(&self, address: u64) -> Result<u16, Fault> {
        self.bytes::<2>(address, Width::Word).map(u16::from_le_bytes)
    }

    fn read32(&self, address: u64) -> Result<u32, Fault> {
        self.bytes::<4>(address, Width::Dword).map(u32::from_le_bytes)
    }

    fn read64(&self, address: u64) -> Result<u64, Fault> {
        self.bytes::<8>(address, Width::Qword).map(u64::from_le_bytes)
    }

    fn write8(&mut self, address: u64, value: u8) -> Result<(), Fault> {
        self.store(address, Width::Byte, &value.to_le_bytes())
    }

    fn write16(&mut self, address: u64, value: u16) -> Result<(), Fault> {
        self.store(address, Width::Word, &value.to_le_bytes())
    }

    fn write32(&mut self, address: u64, value: u32) -> Result<(), Fault> {
        self.store(address, Width::Dword, &value.to_le_bytes())
    }

    fn write64(&mut self, address: u64, value: u64) -> Result<(), Fault> {
        self.store(address, Width::Qword, &value.to_le_bytes())
    }

    fn destroy(&mut self) -> bool {
        self.data = Box::default();
        true
    }
}
