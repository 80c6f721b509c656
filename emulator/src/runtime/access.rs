//! Reads and writes through the unified address space: addresses below 16 are accumulators

use tracing::trace;

use super::address::{local, EffectiveAddress};
use super::exception::Fault;
use super::word::{DoubleWord, Half, Word};
use super::Computer;
use crate::constants::{Address, AC_COUNT, SECTION_SHIFT};

const fn is_accumulator(address: Address) -> bool {
    address < AC_COUNT as Address
}

/// The address of the second word of a pair
///
/// Accumulator pairs wrap around from 17 to 0, memory pairs stay in the same section.
const fn next_address(address: Address) -> Address {
    if is_accumulator(address) {
        (address + 1) % AC_COUNT as Address
    } else {
        local(address >> SECTION_SHIFT, address + 1)
    }
}

impl Computer {
    /// Read the word at an address
    ///
    /// # Errors
    ///
    /// Fails if the address is past the end of the memory.
    pub fn read(&self, address: Address) -> Result<Word, Fault> {
        let value = if is_accumulator(address) {
            self.registers.ac.get(address as usize)
        } else {
            self.memory.get(address)?
        };
        trace!(address, value = %value, "read");
        Ok(value)
    }

    /// Write a word at an address
    ///
    /// # Errors
    ///
    /// Fails if the address is past the end of the memory.
    pub fn write(&mut self, address: Address, value: Word) -> Result<(), Fault> {
        trace!(address, value = %value, "write");
        if is_accumulator(address) {
            self.registers.ac.set(address as usize, value);
        } else {
            self.memory.set(address, value)?;
        }
        Ok(())
    }

    /// The immediate operand `0,,E`, without any memory access
    #[must_use]
    pub const fn read_immediate(ea: &EffectiveAddress) -> Word {
        Word::from_halves(0, ea.offset())
    }

    /// Read one half of the word at an address
    ///
    /// # Errors
    ///
    /// Fails if the address is past the end of the memory.
    pub fn read_half(&self, address: Address, half: Half) -> Result<u64, Fault> {
        Ok(self.read(address)?.half(half))
    }

    /// Replace one half of the word at an address, keeping the other
    ///
    /// # Errors
    ///
    /// Fails if the address is past the end of the memory.
    pub fn write_half(&mut self, address: Address, half: Half, value: u64) -> Result<(), Fault> {
        let word = self.read(address)?;
        self.write(address, word.with_half(half, value))
    }

    /// Read the pair of words starting at an address
    ///
    /// # Errors
    ///
    /// Fails if either word is past the end of the memory.
    pub fn read_double(&self, address: Address) -> Result<DoubleWord, Fault> {
        let hi = self.read(address)?;
        let lo = self.read(next_address(address))?;
        Ok(DoubleWord::new(hi, lo))
    }

    /// Write a pair of words starting at an address
    ///
    /// # Errors
    ///
    /// Fails if either word is past the end of the memory. Nothing is written in that case.
    pub fn write_double(&mut self, address: Address, value: DoubleWord) -> Result<(), Fault> {
        let next = next_address(address);
        if !is_accumulator(next) {
            // Check the second word first so a failing write leaves memory untouched
            self.memory.get(next)?;
        }
        self.write(address, value.hi)?;
        self.write(next, value.lo)
    }
}
