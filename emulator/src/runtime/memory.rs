use thiserror::Error;

use super::word::Word;
use crate::constants::Address;

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address was invalid
    #[error("invalid address {0:o}")]
    InvalidAddress(Address),
}

/// Holds the memory words of the computer.
///
/// Addresses are physical word numbers. The first 16 words are shadowed by the accumulators and
/// only reachable through [`Memory::get`]/[`Memory::set`] directly.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    inner: Box<[Word]>,
}

impl Memory {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            inner: vec![Word::ZERO; size].into_boxed_slice(),
        }
    }

    fn index(&self, address: Address) -> Result<usize, MemoryError> {
        usize::try_from(address)
            .ok()
            .filter(|index| *index < self.inner.len())
            .ok_or(MemoryError::InvalidAddress(address))
    }

    /// Get the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<Word, MemoryError> {
        let index = self.index(address)?;
        Ok(self.inner[index])
    }

    /// Set the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn set(&mut self, address: Address, value: Word) -> Result<(), MemoryError> {
        let index = self.index(address)?;
        self.inner[index] = value;
        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(crate::constants::MEMORY_SIZE)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Memory {{ len: {} }}", self.inner.len())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn bounds_test() {
        let mut memory = Memory::new(0o100);
        memory.set(0o77, Word::ONES).unwrap();
        assert_eq!(memory.get(0o77), Ok(Word::ONES));
        assert_eq!(memory.get(0o100), Err(MemoryError::InvalidAddress(0o100)));
        assert_eq!(
            memory.set(0o100, Word::ZERO),
            Err(MemoryError::InvalidAddress(0o100))
        );
    }
}
