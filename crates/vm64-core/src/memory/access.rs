//! Bounds-checked access primitives shared by every byte-backed device.

use std::ops::Range;

use crate::Fault;

/// Access width of a single load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// 8-bit access.
    Byte,
    /// 16-bit access.
    Word,
    /// 32-bit access.
    Dword,
    /// 64-bit access.
    Qword,
}

impl Width {
    /// Every width in ascending size order.
    pub const ALL: [Self; 4] = [Self::Byte, Self::Word, Self::Dword, Self::Qword];

    /// Size of the access in bytes.
    #[must_use]
    pub const fn bytes(self) -> u8 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Dword => 4,
            Self::Qword => 8,
        }
    }

    /// Truncates `value` to this width.
    #[must_use]
    pub const fn truncate(self, value: u64) -> u64 {
        match self {
            Self::Qword => value,
            _ => value & ((1_u64 << (self.bytes() as u32 * 8)) - 1),
        }
    }
}

/// Validates an access of `width` bytes at `address` against a device of
/// `size` bytes and returns the byte range it covers.
///
/// # Errors
///
/// Returns [`Fault::OutOfBounds`] when `address + width > size`, including
/// when the sum overflows.
pub fn checked_span(
    device: &str,
    address: u64,
    width: Width,
    size: u64,
) -> Result<Range<usize>, Fault> {
    let out_of_bounds = || Fault::OutOfBounds {
        device: device.to_owned(),
        address,
        width: width.bytes(),
        size,
    };

    let end = address
        .checked_add(u64::from(width.bytes()))
        .filter(|end| *end <= size)
        .ok_or_else(out_of_bounds)?;
    let start = usize::try_from(address).map_err(|_| out_of_bounds())?;
    let end = usize::try_from(end).map_err(|_| out_of_bounds())?;
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{checked_span, Width};
    use crate::Fault;

    #[rstest]
    #[case(Width::Byte)]
    #[case(Width::Word)]
    #[case(Width::Dword)]
    #[case(Width::Qword)]
    fn last_fitting_access_is_accepted(#[case] width: Width) {
        let size = 64;
        let address = size - u64::from(width.bytes());
        let span = checked_span("Memory", address, width, size).expect("fits exactly");
        assert_eq!(span.len(), usize::from(width.bytes()));
        assert_eq!(span.end, 64);
    }

    #[rstest]
    #[case(Width::Byte)]
    #[case(Width::Word)]
    #[case(Width::Dword)]
    #[case(Width::Qword)]
    fn one_past_the_end_is_rejected(#[case] width: Width) {
        let size = 64;
        let address = size - u64::from(width.bytes()) + 1;
        assert_eq!(
            checked_span("Memory", address, width, size),
            Err(Fault::OutOfBounds {
                device: "Memory".into(),
                address,
                width: width.bytes(),
                size,
            })
        );
    }

    #[test]
    fn address_overflow_is_out_of_bounds() {
        assert!(matches!(
            checked_span("Memory", u64::MAX - 1, Width::Qword, u64::MAX),
            Err(Fault::OutOfBounds { .. })
        ));
    }

    #[test]
    fn truncate_keeps_low_bits() {
        assert_eq!(Width::Byte.truncate(0x1234), 0x34);
        assert_eq!(Width::Word.truncate(0x1_2345), 0x2345);
        assert_eq!(Width::Dword.truncate(0x1_2345_6789), 0x2345_6789);
        assert_eq!(Width::Qword.truncate(u64::MAX), u64::MAX);
    }
}
