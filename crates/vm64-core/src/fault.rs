use thiserror::Error;

/// Fault classes used for diagnostics aggregation and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// A device or bus access touched memory it may not.
    Memory,
    /// The host tried to build an invalid memory map.
    Mapping,
    /// The core fetched an opcode outside the closed instruction set.
    Decode,
    /// A register was looked up by a name the core does not know.
    Register,
}

/// Whole-machine faults. Every variant halts execution; none is retried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum Fault {
    /// `address + width` exceeds the backing size of a device.
    #[error("{width}-byte access at {address:#x} is out of bounds for device `{device}` of {size} bytes")]
    OutOfBounds {
        /// Display name of the device.
        device: String,
        /// Device-local address of the access.
        address: u64,
        /// Access width in bytes.
        width: u8,
        /// Backing size of the device in bytes.
        size: u64,
    },
    /// No mapped region claims the address.
    #[error("no region is mapped at address {address:#x}")]
    UnmappedAddress {
        /// Global address of the access.
        address: u64,
    },
    /// A new region intersects one that is already mapped.
    #[error("region {start:#x}-{end:#x} overlaps region {existing_start:#x}-{existing_end:#x} mapped to `{existing_device}`")]
    OverlappingRegion {
        /// Inclusive start of the rejected region.
        start: u64,
        /// Inclusive end of the rejected region.
        end: u64,
        /// Inclusive start of the conflicting region.
        existing_start: u64,
        /// Inclusive end of the conflicting region.
        existing_end: u64,
        /// Display name of the device behind the conflicting region.
        existing_device: String,
    },
    /// A region was requested with `start > end`.
    #[error("invalid region range {start:#x}-{end:#x}")]
    InvalidRange {
        /// Requested inclusive start.
        start: u64,
        /// Requested inclusive end.
        end: u64,
    },
    /// The fetched opcode is not part of the instruction set.
    #[error("invalid opcode {opcode:#06x} at {address:#x}")]
    InvalidOpcode {
        /// Raw 16-bit opcode value.
        opcode: u16,
        /// Address the opcode was fetched from.
        address: u64,
    },
    /// A register name lookup failed.
    #[error("unknown register name `{0}`")]
    UnknownRegisterName(String),
}

impl Fault {
    /// Returns the stable diagnostic code for this fault.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::OutOfBounds { .. } => 0x01,
            Self::UnmappedAddress { .. } => 0x02,
            Self::OverlappingRegion { .. } => 0x03,
            Self::InvalidRange { .. } => 0x04,
            Self::InvalidOpcode { .. } => 0x05,
            Self::UnknownRegisterName(_) => 0x06,
        }
    }

    /// Returns the diagnostics fault class for this fault.
    #[must_use]
    pub const fn class(&self) -> FaultClass {
        match self {
            Self::OutOfBounds { .. } | Self::UnmappedAddress { .. } => FaultClass::Memory,
            Self::OverlappingRegion { .. } | Self::InvalidRange { .. } => FaultClass::Mapping,
            Self::InvalidOpcode { .. } => FaultClass::Decode,
            Self::UnknownRegisterName(_) => FaultClass::Register,
        }
    }

    /// Address most relevant to the fault, used to centre memory views.
    #[must_use]
    pub const fn address(&self) -> Option<u64> {
        match self {
            Self::UnmappedAddress { address } | Self::InvalidOpcode { address, .. } => {
                Some(*address)
            }
            Self::OverlappingRegion { start, .. } | Self::InvalidRange { start, .. } => {
                Some(*start)
            }
            Self::OutOfBounds { .. } | Self::UnknownRegisterName(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{Fault, FaultClass};

    fn every_fault() -> Vec<Fault> {
        vec![
            Fault::OutOfBounds {
                device: "Memory".into(),
                address: 0x10,
                width: 8,
                size: 0x10,
            },
            Fault::UnmappedAddress { address: 0xdead },
            Fault::OverlappingRegion {
                start: 0,
                end: 0xff,
                existing_start: 0x80,
                existing_end: 0x1ff,
                existing_device: "Memory".into(),
            },
            Fault::InvalidRange { start: 2, end: 1 },
            Fault::InvalidOpcode {
                opcode: 0x1234,
                address: 0x40,
            },
            Fault::UnknownRegisterName("R9".into()),
        ]
    }

    #[test]
    fn codes_are_unique() {
        let faults = every_fault();
        let codes: HashSet<_> = faults.iter().map(Fault::code).collect();
        assert_eq!(codes.len(), faults.len());
    }

    #[test]
    fn class_mapping_matches_fault_taxonomy() {
        let classes: Vec<_> = every_fault().iter().map(Fault::class).collect();
        assert_eq!(
            classes,
            [
                FaultClass::Memory,
                FaultClass::Memory,
                FaultClass::Mapping,
                FaultClass::Mapping,
                FaultClass::Decode,
                FaultClass::Register,
            ]
        );
    }

    #[test]
    fn messages_carry_context() {
        let fault = Fault::InvalidOpcode {
            opcode: 0x1234,
            address: 0x40,
        };
        assert_eq!(fault.to_string(), "invalid opcode 0x1234 at 0x40");
        assert_eq!(fault.address(), Some(0x40));

        let fault = Fault::UnknownRegisterName("R9".into());
        assert_eq!(fault.to_string(), "unknown register name `R9`");
        assert_eq!(fault.address(), None);
    }
}
