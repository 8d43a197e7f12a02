/// Single condition bit of the flags register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Flag {
    /// Unsigned wraparound heuristic.
    Carry = 0x01,
    /// Result was zero.
    Zero = 0x02,
    /// Result was negative.
    Negative = 0x04,
    /// Same heuristic as carry, kept as a separate bit.
    Overflow = 0x08,
    /// Interrupt enable.
    Interrupt = 0x10,
}

/// Mask of the five architectural flag bits.
pub const FLAGS_ACTIVE_MASK: u8 = 0x1f;

impl Flag {
    /// Every flag in bit order.
    pub const ALL: [Self; 5] = [
        Self::Carry,
        Self::Zero,
        Self::Negative,
        Self::Overflow,
        Self::Interrupt,
    ];

    /// Bit mask of this flag.
    #[must_use]
    pub const fn bit(self) -> u8 {
        self as u8
    }

    /// One-letter mnemonic used in register views.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Carry => 'C',
            Self::Zero => 'Z',
            Self::Negative => 'N',
            Self::Overflow => 'V',
            Self::Interrupt => 'I',
        }
    }
}

/// The flags register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    /// Builds a flags value, dropping bits outside [`FLAGS_ACTIVE_MASK`].
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & FLAGS_ACTIVE_MASK)
    }

    /// Raw bit pattern.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when `flag` is set.
    #[must_use]
    pub const fn get(self, flag: Flag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Sets or clears `flag`.
    pub const fn set(&mut self, flag: Flag, enabled: bool) {
        if enabled {
            self.0 |= flag.bit();
        } else {
            self.0 &= !flag.bit();
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Flag, Flags};

    #[rstest]
    #[case(Flag::Carry, 0x01)]
    #[case(Flag::Zero, 0x02)]
    #[case(Flag::Negative, 0x04)]
    #[case(Flag::Overflow, 0x08)]
    #[case(Flag::Interrupt, 0x10)]
    fn flags_toggle_independently(#[case] flag: Flag, #[case] bit: u8) {
        let mut flags = Flags::from_bits(0x1f);
        flags.set(flag, false);
        assert_eq!(flags.bits(), 0x1f & !bit);
        assert!(!flags.get(flag));
        flags.set(flag, true);
        assert_eq!(flags.bits(), 0x1f);
    }

    #[test]
    fn inactive_bits_are_dropped() {
        assert_eq!(Flags::from_bits(0xff).bits(), 0x1f);
    }
}
