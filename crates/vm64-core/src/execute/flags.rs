//! Flag updates produced by the ALU families.

use crate::state::{Flag, Flags};

/// Per-flag outcome of one instruction; `None` leaves the flag untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagsUpdate {
    /// Carry flag.
    pub carry: Option<bool>,
    /// Zero flag.
    pub zero: Option<bool>,
    /// Negative flag.
    pub negative: Option<bool>,
    /// Overflow flag.
    pub overflow: Option<bool>,
}

impl FlagsUpdate {
    /// Zero and Negative only.
    #[must_use]
    pub const fn zero_negative(result: u64) -> Self {
        Self {
            carry: None,
            zero: Some(result == 0),
            negative: Some((result as i64) < 0),
            overflow: None,
        }
    }

    /// Zero and Negative plus a shared Carry/Overflow wrap bit.
    #[must_use]
    pub const fn arithmetic(result: u64, wrapped: bool) -> Self {
        let mut update = Self::zero_negative(result);
        update.carry = Some(wrapped);
        update.overflow = Some(wrapped);
        update
    }

    /// Zero and Negative plus a Carry bit; Overflow is left alone.
    #[must_use]
    pub const fn with_carry(result: u64, carry: bool) -> Self {
        let mut update = Self::zero_negative(result);
        update.carry = Some(carry);
        update
    }

    /// Writes every `Some` flag into `flags`.
    pub fn apply(self, flags: &mut Flags) {
        let updates = [
            (Flag::Carry, self.carry),
            (Flag::Zero, self.zero),
            (Flag::Negative, self.negative),
            (Flag::Overflow, self.overflow),
        ];
        for (flag, value) in updates {
            if let Some(value) = value {
                flags.set(flag, value);
            }
        }
    }
}
