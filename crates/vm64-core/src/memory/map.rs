//! Region map routing every global access to the device that claims it.
//!
//! Lookup is a linear scan in search order. Region counts are expected to
//! stay small; a faster structure must keep first-match-wins semantics.

use std::fmt;

use log::{Level, LevelFilter};

use crate::memory::{Device, Width};
use crate::{CoreLink, Fault};

/// A contiguous, inclusive address range bound to one device.
pub struct Region {
    device: Box<dyn Device>,
    start: u64,
    end: u64,
    rebase: bool,
}

impl Region {
    /// Inclusive start address.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Inclusive end address.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Whether global addresses are translated by subtracting `start`.
    #[must_use]
    pub const fn rebase(&self) -> bool {
        self.rebase
    }

    /// The device serving this region.
    #[must_use]
    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    /// Returns `true` when `address` falls inside `[start, end]`.
    #[must_use]
    pub const fn contains(&self, address: u64) -> bool {
        address >= self.start && address <= self.end
    }

    /// Returns `true` when this region shares at least one address with `[start, end]`.
    #[must_use]
    pub const fn intersects(&self, start: u64, end: u64) -> bool {
        start <= self.end && self.start <= end
    }

    /// Translates a global address to the address delivered to the device.
    #[must_use]
    pub const fn local_address(&self, address: u64) -> u64 {
        if self.rebase {
            address.wrapping_sub(self.start)
        } else {
            address
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("device", &self.device.name())
            .field("start", &format_args!("{:#x}", self.start))
            .field("end", &format_args!("{:#x}", self.end))
            .field("rebase", &self.rebase)
            .finish()
    }
}

/// Ordered collection of non-overlapping regions. Owns every mapped device.
#[derive(Debug)]
pub struct MemoryBus {
    regions: Vec<Region>,
    log_level: LevelFilter,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    /// Creates an empty bus.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
            log_level: LevelFilter::Warn,
        }
    }

    /// Sets the verbosity of diagnostics emitted by the bus.
    pub fn set_log_level(&mut self, level: LevelFilter) {
        self.log_level = level;
    }

    /// Maps `device` at `[start, end]`, ahead of every existing region in
    /// search order.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::InvalidRange`] when `start > end` and
    /// [`Fault::OverlappingRegion`] when the range intersects a mapped one.
    pub fn map(
        &mut self,
        device: Box<dyn Device>,
        start: u64,
        end: u64,
        rebase: bool,
    ) -> Result<(), Fault> {
        if start > end {
            return Err(Fault::InvalidRange { start, end });
        }

        if let Some(existing) = self.regions.iter().find(|r| r.intersects(start, end)) {
            return Err(Fault::OverlappingRegion {
                start,
                end,
                existing_start: existing.start,
                existing_end: existing.end,
                existing_device: existing.device.name().to_owned(),
            });
        }

        diag!(
            self.log_level,
            Level::Debug,
            "mapped `{}` at {start:#x}-{end:#x} (rebase: {rebase})",
            device.name()
        );
        self.regions.insert(
            0,
            Region {
                device,
                start,
                end,
                rebase,
            },
        );
        Ok(())
    }

    /// Returns the first region containing `address`, if any.
    #[must_use]
    pub fn find_region(&self, address: u64) -> Option<&Region> {
        self.regions.iter().find(|region| region.contains(address))
    }

    /// Iterates regions in search order (most recently mapped first).
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Hands `link` to every mapped device. Safe to repeat as devices attach.
    pub fn set_owning_core(&mut self, link: &CoreLink) {
        for region in &mut self.regions {
            region.device.attach_core(link.clone());
        }
    }

    fn route(&self, address: u64) -> Result<(&dyn Device, u64), Fault> {
        match self.find_region(address) {
            Some(region) => Ok((region.device.as_ref(), region.local_address(address))),
            None => {
                diag!(
                    self.log_level,
                    Level::Debug,
                    "no region found for address {address:#x}"
                );
                Err(Fault::UnmappedAddress { address })
            }
        }
    }

    fn route_mut(&mut self, address: u64) -> Result<(&mut dyn Device, u64), Fault> {
        let log_level = self.log_level;
        match self
            .regions
            .iter_mut()
            .find(|region| region.contains(address))
        {
            Some(region) => {
                let local = region.local_address(address);
                Ok((region.device.as_mut(), local))
            }
            None => {
                diag!(
                    log_level,
                    Level::Debug,
                    "no region found for address {address:#x}"
                );
                Err(Fault::UnmappedAddress { address })
            }
        }
    }

    /// Reads an 8-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn read8(&self, address: u64) -> Result<u8, Fault> {
        let (device, local) = self.route(address)?;
        device.read8(local)
    }

    /// Reads a 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn read16(&self, address: u64) -> Result<u16, Fault> {
        let (device, local) = self.route(address)?;
        device.read16(local)
    }

    /// Reads a 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn read32(&self, address: u64) -> Result<u32, Fault> {
        let (device, local) = self.route(address)?;
        device.read32(local)
    }

    /// Reads a 64-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn read64(&self, address: u64) -> Result<u64, Fault> {
        let (device, local) = self.route(address)?;
        device.read64(local)
    }

    /// Writes an 8-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn write8(&mut self, address: u64, value: u8) -> Result<(), Fault> {
        let (device, local) = self.route_mut(address)?;
        device.write8(local, value)
    }

    /// Writes a 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn write16(&mut self, address: u64, value: u16) -> Result<(), Fault> {
        let (device, local) = self.route_mut(address)?;
        device.write16(local, value)
    }

    /// Writes a 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn write32(&mut self, address: u64, value: u32) -> Result<(), Fault> {
        let (device, local) = self.route_mut(address)?;
        device.write32(local, value)
    }

    /// Writes a 64-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn write64(&mut self, address: u64, value: u64) -> Result<(), Fault> {
        let (device, local) = self.route_mut(address)?;
        device.write64(local, value)
    }

    /// Reads a value of any width, zero-extended to 64 bits.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn read(&self, address: u64, width: Width) -> Result<u64, Fault> {
        let (device, local) = self.route(address)?;
        device.read(local, width)
    }

    /// Writes the low `width` bytes of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::UnmappedAddress`] or the device's fault.
    pub fn write(&mut self, address: u64, width: Width, value: u64) -> Result<(), Fault> {
        let (device, local) = self.route_mut(address)?;
        device.write(local, width, value)
    }

    /// Copies `bytes` into consecutive addresses starting at `address`.
    ///
    /// # Errors
    ///
    /// Fails on the first byte that is unmapped or out of bounds; earlier
    /// bytes stay written.
    pub fn load(&mut self, address: u64, bytes: &[u8]) -> Result<(), Fault> {
        for (target, byte) in (address..).zip(bytes) {
            self.write8(target, *byte)?;
        }
        Ok(())
    }

    /// Reads `len` consecutive bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Fails on the first byte that is unmapped or out of bounds.
    pub fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>, Fault> {
        (address..)
            .take(len)
            .map(|source| self.read8(source))
            .collect()
    }
}

impl Drop for MemoryBus {
    fn drop(&mut self) {
        for region in &mut self.regions {
            if !region.device.destroy() {
                diag!(
                    self.log_level,
                    Level::Warn,
                    "no destroy hook for device `{}`; releasing it generically",
                    region.device.name()
                );
            }
        }
    }
}
