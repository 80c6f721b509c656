use bitflags::bitflags;

use super::word::Word;
use crate::constants::{Address, ADDRESS_MASK, AC_COUNT, HALF_MASK, SECTION_SHIFT};

bitflags! {
    /// Processor flags, in the order they appear in bits 0-12 of a saved PC word
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u32 {
        /// OV
        const OVERFLOW                = 1 << 12;
        /// CRY0
        const CARRY0                  = 1 << 11;
        /// CRY1
        const CARRY1                  = 1 << 10;
        /// FOV
        const FLOATING_OVERFLOW       = 1 << 9;
        /// FPD
        const FIRST_PART_DONE         = 1 << 8;
        /// USR
        const USER                    = 1 << 7;
        /// UIO, previous context user in exec mode
        const USER_IO                 = 1 << 6;
        /// PUB
        const PUBLIC                  = 1 << 5;
        /// AFI
        const ADDRESS_FAILURE_INHIBIT = 1 << 4;
        /// TRAP2
        const TRAP2                   = 1 << 3;
        /// TRAP1
        const TRAP1                   = 1 << 2;
        /// FXU
        const FLOATING_UNDERFLOW      = 1 << 1;
        /// NDV
        const NO_DIVIDE               = 1 << 0;
    }
}

impl Flags {
    /// Flags cleared by the subroutine calls (`JSR`, `JSP`)
    pub const CALL_CLEARED: Self = Self::FIRST_PART_DONE
        .union(Self::ADDRESS_FAILURE_INHIBIT)
        .union(Self::TRAP1)
        .union(Self::TRAP2);

    /// Flags placed in bits 0-12 of a saved PC word
    #[must_use]
    pub const fn pc_word_bits(self) -> u64 {
        (self.bits() as u64) << 23
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#015b}", self.bits())
    }
}

/// Program counter: a section number above an 18-bit local offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramCounter(Address);

impl ProgramCounter {
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self(address & ADDRESS_MASK)
    }

    #[must_use]
    pub const fn address(self) -> Address {
        self.0
    }

    #[must_use]
    pub const fn section(self) -> Address {
        self.0 >> SECTION_SHIFT
    }

    #[must_use]
    pub const fn offset(self) -> Address {
        self.0 & HALF_MASK
    }

    #[must_use]
    pub const fn is_section0(self) -> bool {
        self.section() == 0
    }

    /// Same section, offset advanced by `count` (wrapping within the section)
    #[must_use]
    pub const fn advance(self, count: u64) -> Self {
        Self((self.section() << SECTION_SHIFT) | ((self.offset() + count) & HALF_MASK))
    }

    #[must_use]
    pub const fn next(self) -> Self {
        self.advance(1)
    }

    #[must_use]
    pub const fn skip(self) -> Self {
        self.advance(2)
    }

    /// The word saved by `JSR`/`JSP`/`PUSHJ`
    ///
    /// In section 0 it holds the flags in its left half and the offset in its right half. In any
    /// other section it is the full 30-bit address, without flags.
    #[must_use]
    pub const fn pc_word(self, flags: Flags) -> Word {
        if self.is_section0() {
            Word::new(flags.pc_word_bits() | self.offset())
        } else {
            Word::new(self.0)
        }
    }
}

impl std::fmt::Display for ProgramCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:o},,{:06o}", self.section(), self.offset())
    }
}

/// The 16 accumulators
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Accumulators([Word; AC_COUNT]);

impl Accumulators {
    #[must_use]
    pub fn get(&self, index: usize) -> Word {
        self.0[index % AC_COUNT]
    }

    pub fn set(&mut self, index: usize, value: Word) {
        self.0[index % AC_COUNT] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Word> {
        self.0.iter()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    /// Accumulators, aliased onto addresses `0..16`
    pub ac: Accumulators,

    /// Program counter
    pub pc: ProgramCounter,

    /// Processor flags
    pub flags: Flags,
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pc = {} | flags = {:?}", self.pc, self.flags)?;
        for (index, value) in self.ac.iter().enumerate() {
            if !value.is_zero() {
                write!(f, " | {index:o} = {value}")?;
            }
        }
        Ok(())
    }
}
