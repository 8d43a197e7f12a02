//! Helper functions for instruction execution.

#![allow(clippy::pedantic, clippy::nursery, unknown_lints, missing_docs)]

use super::flags::FlagsUpdate;
use crate::state::{Flag, Flags};

/// Branch condition shared by the jump and branch families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl Condition {
    /// Signed ordering is approximated from Zero and Negative alone.
    #[must_use]
    pub const fn holds(self, flags: Flags) -> bool {
        let zero = flags.get(Flag::Zero);
        let negative = flags.get(Flag::Negative);
        match self {
            Self::Always => true,
            Self::Equal => zero,
            Self::NotEqual => !zero,
            Self::Greater => !zero && !negative,
            Self::Less => negative,
            Self::GreaterOrEqual => !negative,
            Self::LessOrEqual => zero || negative,
        }
    }
}

/// Two-operand ALU operation behind the arithmetic and bitwise families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    MulSigned,
    DivSigned,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Ror,
    Rol,
}

impl AluOp {
    /// Computes `lhs op rhs` with wrapping semantics and the resulting flags.
    ///
    /// Division and modulo by zero yield 0. Carry/Overflow follow the
    /// wraparound heuristic: set when the result fell below `lhs` for
    /// add/mul/shl/rol, or rose above it for sub/div/mod/shr/ror.
    #[must_use]
    pub const fn apply(self, lhs: u64, rhs: u64) -> (u64, FlagsUpdate) {
        let amount = (rhs % 64) as u32;
        match self {
            Self::Add => {
                let result = lhs.wrapping_add(rhs);
                (result, FlagsUpdate::arithmetic(result, result < lhs))
            }
            Self::Sub => {
                let result = lhs.wrapping_sub(rhs);
                (result, FlagsUpdate::arithmetic(result, result > lhs))
            }
            Self::Mul => {
                let result = lhs.wrapping_mul(rhs);
                (result, FlagsUpdate::arithmetic(result, result < lhs))
            }
            Self::Div => {
                let result = match lhs.checked_div(rhs) {
                    Some(result) => result,
                    None => 0,
                };
                (result, FlagsUpdate::arithmetic(result, result > lhs))
            }
            Self::Mod => {
                let result = match lhs.checked_rem(rhs) {
                    Some(result) => result,
                    None => 0,
                };
                (result, FlagsUpdate::arithmetic(result, result > lhs))
            }
            Self::MulSigned => {
                let result = (lhs as i64).wrapping_mul(rhs as i64) as u64;
                (result, FlagsUpdate::arithmetic(result, result < lhs))
            }
            Self::DivSigned => {
                let result = if rhs == 0 {
                    0
                } else {
                    (lhs as i64).wrapping_div(rhs as i64) as u64
                };
                (result, FlagsUpdate::arithmetic(result, result > lhs))
            }
            Self::And => {
                let result = lhs & rhs;
                (result, FlagsUpdate::zero_negative(result))
            }
            Self::Or => {
                let result = lhs | rhs;
                (result, FlagsUpdate::zero_negative(result))
            }
            Self::Xor => {
                let result = lhs ^ rhs;
                (result, FlagsUpdate::zero_negative(result))
            }
            Self::Not => {
                let result = !rhs;
                (result, FlagsUpdate::zero_negative(result))
            }
            Self::Shl => {
                let result = lhs.wrapping_shl(amount);
                (result, FlagsUpdate::with_carry(result, result < lhs))
            }
            Self::Shr => {
                let result = lhs.wrapping_shr(amount);
                (result, FlagsUpdate::with_carry(result, result > lhs))
            }
            Self::Ror => {
                let result = lhs.rotate_right(amount);
                (result, FlagsUpdate::with_carry(result, result > lhs))
            }
            Self::Rol => {
                let result = lhs.rotate_left(amount);
                (result, FlagsUpdate::with_carry(result, result < lhs))
            }
        }
    }
}

/// Flags for `CMP`: Carry, Zero and Negative as `SUB` would set them.
#[must_use]
pub const fn compare(lhs: u64, rhs: u64) -> FlagsUpdate {
    let result = lhs.wrapping_sub(rhs);
    FlagsUpdate::with_carry(result, result > lhs)
}
