//! Effective address calculation
//!
//! In section 0 every address is an 18-bit local address. When the program counter is in any
//! other section, index registers and indirect words may produce 30-bit global addresses.

use parse_display::Display;
use tracing::trace;

use super::exception::Fault;
use super::word::{extend_half, Word};
use super::Computer;
use crate::constants::{Address, ADDRESS_MASK, AC_COUNT, HALF_MASK, SECTION_SHIFT};

/// How the effective address was formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AddressingMode {
    /// Section number taken from the context, 18-bit arithmetic
    #[display("local")]
    Local,
    /// Full 30-bit address arithmetic
    #[display("global")]
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveAddress {
    /// The address as computed, section included
    pub address: Address,
    /// The last word of the indirection chain
    pub word: Word,
    pub mode: AddressingMode,
}

impl EffectiveAddress {
    /// Where operands are read from and written to
    ///
    /// References to the accumulators, whatever section they were made from, are folded to
    /// `0..16`.
    #[must_use]
    pub const fn location(&self) -> Address {
        canonical(self.address, self.mode)
    }

    #[must_use]
    pub const fn section(&self) -> Address {
        self.address >> SECTION_SHIFT
    }

    #[must_use]
    pub const fn offset(&self) -> Address {
        self.address & HALF_MASK
    }

    /// The word after this address, in the same section
    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            address: local(self.section(), self.offset() + 1),
            ..*self
        }
    }
}

/// Build a local address
pub(crate) const fn local(section: Address, offset: Address) -> Address {
    (section << SECTION_SHIFT) | (offset & HALF_MASK)
}

/// Fold accumulator references to `0..16`
///
/// A local address whose offset is below 16 is an accumulator in any section. A global address
/// reaches the accumulators only through section 1.
pub(crate) const fn canonical(address: Address, mode: AddressingMode) -> Address {
    let offset = address & HALF_MASK;
    let section = address >> SECTION_SHIFT;
    let is_ac = offset < AC_COUNT as Address
        && match mode {
            AddressingMode::Local => true,
            AddressingMode::Global => section <= 1,
        };

    if is_ac {
        offset
    } else {
        address
    }
}

/// Whether an index register holds a global index: positive, with a non-zero section
pub(crate) const fn is_global_index(index: Word) -> bool {
    !index.is_negative() && index.left() & 0o7777 != 0
}

impl Computer {
    /// Compute the effective address of an instruction
    ///
    /// Indirection chains are followed up to [`Config::indirection_limit`] words.
    ///
    /// # Errors
    ///
    /// Fails if an indirect word is out of range or malformed, or if the chain is too long.
    ///
    /// [`Config::indirection_limit`]: crate::config::Config::indirection_limit
    #[tracing::instrument(skip(self), fields(word = %instruction), level = "trace", err)]
    pub fn resolve(&self, instruction: Word) -> Result<EffectiveAddress, Fault> {
        let limit = self.config.indirection_limit();
        let mut depth = 0;
        let mut section = self.registers.pc.section();
        let mut word = instruction;

        loop {
            let (address, mode) = self.index(word, section);
            if !word.indirect() {
                return Ok(EffectiveAddress {
                    address,
                    word,
                    mode,
                });
            }

            depth += 1;
            if depth > limit {
                return Err(Fault::IndirectionLimitExceeded { limit });
            }

            let mut location = address;
            let mut indirect = self.read(canonical(location, mode))?;
            trace!(address = location, word = %indirect, "Following indirect word");

            // Extended format indirect words chain among themselves
            loop {
                section = location >> SECTION_SHIFT;
                if section == 0 || is_instruction_format(indirect) {
                    break;
                }
                if indirect.bits() & (1 << 35) != 0 {
                    return Err(Fault::IllegalIndirectWord { address: location });
                }

                let x = ((indirect.bits() >> 30) & 0o17) as usize;
                let mut address = indirect.bits() & ADDRESS_MASK;
                if x != 0 {
                    address = (address + self.registers.ac.get(x).bits()) & ADDRESS_MASK;
                }

                if indirect.bits() & (1 << 34) == 0 {
                    return Ok(EffectiveAddress {
                        address,
                        word: indirect,
                        mode: AddressingMode::Global,
                    });
                }

                depth += 1;
                if depth > limit {
                    return Err(Fault::IndirectionLimitExceeded { limit });
                }

                location = address;
                indirect = self.read(canonical(location, AddressingMode::Global))?;
                trace!(address = location, word = %indirect, "Following indirect word");
            }

            word = indirect;
        }
    }

    /// Apply the index register of an instruction-format word
    fn index(&self, word: Word, section: Address) -> (Address, AddressingMode) {
        let y = word.y();
        let x = word.index() as usize;

        if x == 0 {
            return (local(section, y), AddressingMode::Local);
        }

        let index = self.registers.ac.get(x);
        if section != 0 && is_global_index(index) {
            let address = (index.bits() as i64 + extend_half(y)) as u64 & ADDRESS_MASK;
            (address, AddressingMode::Global)
        } else {
            (local(section, index.right() + y), AddressingMode::Local)
        }
    }
}

/// Bit 0 set and bit 1 clear
const fn is_instruction_format(word: Word) -> bool {
    word.bits() >> 34 == 0b10
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;
    use crate::runtime::ProgramCounter;

    fn ea(computer: &Computer, word: Word) -> Address {
        computer.resolve(word).unwrap().address
    }

    #[test]
    fn direct_test() {
        let computer = Computer::default();
        for y in [0, 0o17, 0o20, 0o1234, 0o777_777] {
            let word = Word::instruction(0o200, 1, false, 0, y);
            let resolved = computer.resolve(word).unwrap();
            assert_eq!(resolved.address, y);
            assert_eq!(resolved.word, word);
            assert_eq!(resolved.mode, AddressingMode::Local);
        }
    }

    #[test]
    fn indexed_test() {
        let mut computer = Computer::default();
        computer.registers.ac.set(3, Word::from_halves(0o777_777, 0o000_010));
        assert_eq!(ea(&computer, Word::instruction(0o200, 1, false, 3, 0o100)), 0o110);

        // Only the right half is added, and the sum wraps at 18 bits
        computer.registers.ac.set(3, Word::from_halves(0o1, 0o777_770));
        assert_eq!(ea(&computer, Word::instruction(0o200, 1, false, 3, 0o20)), 0o10);
    }

    #[test]
    fn indirect_chain_test() {
        let mut computer = Computer::default();
        computer.registers.ac.set(2, Word::new(5));
        computer.memory.set(0o100, Word::instruction(0, 0, true, 0, 0o200)).unwrap();
        computer.memory.set(0o200, Word::instruction(0, 0, true, 2, 0o300)).unwrap();
        computer.memory.set(0o305, Word::instruction(0o777, 0o17, false, 0, 0o400)).unwrap();

        let resolved = computer
            .resolve(Word::instruction(0o200, 1, true, 0, 0o100))
            .unwrap();
        assert_eq!(resolved.address, 0o400);
        assert_eq!(resolved.word, Word::instruction(0o777, 0o17, false, 0, 0o400));

        // Same as resolving each step by hand
        let mut word = Word::instruction(0o200, 1, true, 0, 0o100);
        while word.indirect() {
            let direct = Word::new(word.bits() & !(1 << 22));
            let address = computer.resolve(direct).unwrap().address;
            word = computer.memory.get(address).unwrap();
        }
        assert_eq!(ea(&computer, word), resolved.address);
    }

    #[test]
    fn indirect_through_accumulator_test() {
        let mut computer = Computer::default();
        computer.registers.ac.set(7, Word::new(0o1234));
        assert_eq!(ea(&computer, Word::instruction(0o200, 1, true, 0, 7)), 0o1234);
    }

    #[test]
    fn indirection_limit_test() {
        let mut computer = Computer::new(Config::default().with_indirection_limit(4));
        // A word pointing at itself
        computer.memory.set(0o100, Word::instruction(0, 0, true, 0, 0o100)).unwrap();

        assert_eq!(
            computer.resolve(Word::instruction(0o200, 1, true, 0, 0o100)),
            Err(Fault::IndirectionLimitExceeded { limit: 4 })
        );
    }

    #[test]
    fn indirect_out_of_range_test() {
        let computer = Computer::new(Config::default().with_memory_words(0o1000));
        assert_eq!(
            computer.resolve(Word::instruction(0o200, 1, true, 0, 0o2000)),
            Err(Fault::AddressOutOfRange { address: 0o2000 })
        );
    }

    fn extended() -> Computer {
        let mut computer = Computer::new(Config::default().with_memory_words(4 << 18));
        computer.registers.pc = ProgramCounter::new(0o2_001_000);
        computer
    }

    #[test]
    fn extended_local_test() {
        let mut computer = extended();
        let resolved = computer
            .resolve(Word::instruction(0o200, 1, false, 0, 0o100))
            .unwrap();
        assert_eq!(resolved.address, 0o2_000_100);
        assert_eq!(resolved.mode, AddressingMode::Local);

        // Local accumulator references
        let resolved = computer
            .resolve(Word::instruction(0o200, 1, false, 0, 0o5))
            .unwrap();
        assert_eq!(resolved.address, 0o2_000_005);
        assert_eq!(resolved.location(), 0o5);

        // A negative index is a local index
        computer.registers.ac.set(1, Word::from_halves(0o777_777, 0o10));
        let resolved = computer
            .resolve(Word::instruction(0o200, 1, false, 1, 0o777_777))
            .unwrap();
        assert_eq!(resolved.address, 0o2_000_007);
        assert_eq!(resolved.mode, AddressingMode::Local);
    }

    #[test]
    fn global_index_test() {
        let mut computer = extended();
        computer.registers.ac.set(1, Word::new(0o3_000_010));

        let resolved = computer
            .resolve(Word::instruction(0o200, 2, false, 1, 0o777_776))
            .unwrap();
        assert_eq!(resolved.address, 0o3_000_006);
        assert_eq!(resolved.mode, AddressingMode::Global);

        // Global accumulator references only exist in section 1
        computer.registers.ac.set(1, Word::new(0o1_000_000));
        let resolved = computer
            .resolve(Word::instruction(0o200, 2, false, 1, 0o4))
            .unwrap();
        assert_eq!(resolved.location(), 0o4);
    }

    #[test]
    fn extended_format_indirect_test() {
        let mut computer = extended();
        computer.registers.ac.set(4, Word::new(0o10));
        // EFIW with index 4 and address 3,,100
        computer
            .memory
            .set(0o2_000_100, Word::new((4 << 30) | 0o3_000_100))
            .unwrap();

        let resolved = computer
            .resolve(Word::instruction(0o200, 1, true, 0, 0o100))
            .unwrap();
        assert_eq!(resolved.address, 0o3_000_110);
        assert_eq!(resolved.mode, AddressingMode::Global);

        // Chained EFIW, then an IFIW in section 3
        computer
            .memory
            .set(0o2_000_100, Word::new((1 << 34) | 0o3_000_200))
            .unwrap();
        computer
            .memory
            .set(0o3_000_200, Word::new((1 << 35) | 0o500))
            .unwrap();
        let resolved = computer
            .resolve(Word::instruction(0o200, 1, true, 0, 0o100))
            .unwrap();
        assert_eq!(resolved.address, 0o3_000_500);
        assert_eq!(resolved.mode, AddressingMode::Local);
    }

    #[test]
    fn illegal_indirect_word_test() {
        let mut computer = extended();
        computer
            .memory
            .set(0o2_000_100, Word::new(0o600_000_000_000))
            .unwrap();

        assert_eq!(
            computer.resolve(Word::instruction(0o200, 1, true, 0, 0o100)),
            Err(Fault::IllegalIndirectWord {
                address: 0o2_000_100
            })
        );
    }
}
