use thiserror::Error;

use super::memory::MemoryError;
use crate::constants::Address;

/// Everything that can go wrong while executing one instruction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("unimplemented instruction {mnemonic} (opcode {opcode:03o}) at {pc:o}")]
    UnimplementedOpcode {
        opcode: u16,
        mnemonic: String,
        pc: Address,
    },

    #[error("address {address:o} is out of range")]
    AddressOutOfRange { address: Address },

    #[error("indirection chain longer than {limit} words")]
    IndirectionLimitExceeded { limit: usize },

    #[error("illegal indirect word at {address:o}")]
    IllegalIndirectWord { address: Address },

    #[error("too many nested XCT instructions")]
    ExecuteLimitExceeded,

    #[error("stack overflow (pointer {pointer})")]
    StackOverflow { pointer: super::Word },

    #[error("stack underflow (pointer {pointer})")]
    StackUnderflow { pointer: super::Word },

    #[error("arithmetic fault")]
    ArithmeticFault,
}

impl Fault {
    /// Whether the fault stops the machine
    ///
    /// An arithmetic fault only raises flags and lets execution continue.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::ArithmeticFault)
    }
}

impl From<MemoryError> for Fault {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::InvalidAddress(address) => Self::AddressOutOfRange { address },
        }
    }
}
