//! Instructions which do not fit the stage pipeline

use tracing::debug;

use super::address::{canonical, is_global_index, local, AddressingMode};
use super::exception::Fault;
use super::registers::Flags;
use super::stages::{rotate, shift_arithmetic, shift_count, shift_logical, SINGLE};
use super::word::{extend_half, DoubleWord, Half, Word, DOUBLE_BITS};
use super::{Computer, Effect, Instruction};
use crate::constants::{Address, ADDRESS_MASK, AC_COUNT, HALF_MASK, WORD_BITS, WORD_MASK};

type Result<T> = std::result::Result<T, Fault>;

/// The accumulator after the one selected by the instruction
const fn next_ac(inst: &Instruction) -> Address {
    (inst.ac() + 1) % AC_COUNT as Address
}

pub(crate) fn exch(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let e = inst.ea.location();
    let ac = cpu.read(inst.ac())?;
    let memory = cpu.read(e)?;
    cpu.write(e, ac)?;
    cpu.write(inst.ac(), memory)?;
    Ok(Effect::Continue)
}

/// Block transfer
///
/// The accumulator holds `source,,destination`. Words are copied up to E included, and the
/// accumulator is left pointing past the last words moved, unless it was itself overwritten.
pub(crate) fn blt(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let section = inst.ea.section();
    let pointer = cpu.read(inst.ac())?;
    let (mut source, mut destination) = (pointer.left(), pointer.right());
    let end = inst.ea.offset();
    let start = destination;
    let count = if end >= destination {
        end - destination + 1
    } else {
        1
    };
    debug!(source, destination, count, "Block transfer");

    for _ in 0..count {
        let value = cpu.read(canonical(local(section, source), AddressingMode::Local))?;
        cpu.write(
            canonical(local(section, destination), AddressingMode::Local),
            value,
        )?;
        source = (source + 1) & HALF_MASK;
        destination = (destination + 1) & HALF_MASK;
    }

    let ac = inst.ac();
    if !(start..start + count).contains(&ac) {
        cpu.write(ac, Word::from_halves(source, destination))?;
    }
    Ok(Effect::Continue)
}

fn add_one_to_both_halves(cpu: &mut Computer, inst: &Instruction) -> Result<Word> {
    let ac = cpu.read(inst.ac())?;
    let updated = Word::from_halves(ac.left() + 1, ac.right() + 1);
    cpu.write(inst.ac(), updated)?;
    Ok(updated)
}

pub(crate) fn aobjp(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let updated = add_one_to_both_halves(cpu, inst)?;
    Ok(if updated.is_negative() {
        Effect::Continue
    } else {
        Effect::Jump(inst.ea.address)
    })
}

pub(crate) fn aobjn(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let updated = add_one_to_both_halves(cpu, inst)?;
    Ok(if updated.is_negative() {
        Effect::Jump(inst.ea.address)
    } else {
        Effect::Continue
    })
}

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn jrst(_cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    Ok(Effect::Jump(inst.ea.address))
}

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn halt(_cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    Ok(Effect::Halt(inst.ea.address))
}

/// Jump if any of the flags selected by the accumulator field is set, clearing them
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn jfcl(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    // AC bits 9-12 line up with OV, CRY0, CRY1 and FOV
    let mask = Flags::from_bits_truncate(u32::from(inst.word.ac()) << 9);
    if cpu.registers.flags.intersects(mask) {
        cpu.registers.flags.remove(mask);
        Ok(Effect::Jump(inst.ea.address))
    } else {
        Ok(Effect::Continue)
    }
}

/// Execute the instruction at E as if it was here
pub(crate) fn xct(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    if inst.depth >= cpu.config.execute_limit {
        return Err(Fault::ExecuteLimitExceeded);
    }

    let word = cpu.read(inst.ea.location())?;
    let ea = cpu.resolve(word)?;
    debug!(word = %word, "Executing instruction at {:o}", inst.ea.address);

    let target = Instruction {
        pc: inst.pc,
        word,
        ea,
        depth: inst.depth + 1,
    };
    cpu.execute(&target)
}

/// The saved PC word of a subroutine call
fn return_word(cpu: &Computer, inst: &Instruction) -> Word {
    inst.pc.next().pc_word(cpu.registers.flags)
}

pub(crate) fn jsr(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let saved = return_word(cpu, inst);
    cpu.write(inst.ea.location(), saved)?;
    cpu.registers.flags.remove(Flags::CALL_CLEARED);
    Ok(Effect::Jump(inst.ea.next().address))
}

pub(crate) fn jsp(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let saved = return_word(cpu, inst);
    cpu.write(inst.ac(), saved)?;
    cpu.registers.flags.remove(Flags::CALL_CLEARED);
    Ok(Effect::Jump(inst.ea.address))
}

/// Save the accumulator at E, then put `E,,PC+1` in it
pub(crate) fn jsa(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let ac = cpu.read(inst.ac())?;
    cpu.write(inst.ea.location(), ac)?;
    let link = Word::from_halves(inst.ea.offset(), inst.pc.next().offset());
    cpu.write(inst.ac(), link)?;
    Ok(Effect::Jump(inst.ea.next().address))
}

/// Return from `JSA`: restore the accumulator from where its left half points
pub(crate) fn jra(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let saved = cpu.read_half(inst.ac(), Half::Left)?;
    let address = canonical(local(inst.pc.section(), saved), AddressingMode::Local);
    let value = cpu.read(address)?;
    cpu.write(inst.ac(), value)?;
    Ok(Effect::Jump(inst.ea.address))
}

/// A stack pointer, as found in an accumulator
///
/// Local pointers are `-count,,address`, both halves moving together. Outside section 0 a pointer
/// with a positive non-zero section in its left half is a global 30-bit address with no count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StackPointer {
    word: Word,
    section: Address,
    global: bool,
}

impl StackPointer {
    fn load(cpu: &Computer, inst: &Instruction) -> Result<Self> {
        let word = cpu.read(inst.ac())?;
        let section = inst.pc.section();
        Ok(Self {
            word,
            section,
            global: section != 0 && is_global_index(word),
        })
    }

    /// Where the pointer points
    const fn address(self) -> Address {
        if self.global {
            canonical(self.word.bits() & ADDRESS_MASK, AddressingMode::Global)
        } else {
            canonical(local(self.section, self.word.right()), AddressingMode::Local)
        }
    }

    fn adjust(self, count: i64) -> Self {
        let word = if self.global {
            Word::new((self.word.bits() as i64 + count) as u64 & ADDRESS_MASK)
        } else {
            Word::from_halves(
                (self.word.left() as i64 + count) as u64,
                (self.word.right() as i64 + count) as u64,
            )
        };
        Self { word, ..self }
    }

    fn increment(self) -> Result<Self> {
        if !self.global && self.word.left() == HALF_MASK {
            return Err(Fault::StackOverflow { pointer: self.word });
        }
        Ok(self.adjust(1))
    }

    fn decrement(self) -> Result<Self> {
        if !self.global && self.word.left() == 0 {
            return Err(Fault::StackUnderflow { pointer: self.word });
        }
        Ok(self.adjust(-1))
    }
}

fn push_word(cpu: &mut Computer, inst: &Instruction, value: Word) -> Result<()> {
    let pointer = StackPointer::load(cpu, inst)?.increment()?;
    cpu.write(pointer.address(), value)?;
    cpu.write(inst.ac(), pointer.word)
}

/// Read the top of the stack, returning it with the updated pointer
fn pop_word(cpu: &Computer, inst: &Instruction) -> Result<(Word, StackPointer)> {
    let pointer = StackPointer::load(cpu, inst)?;
    let updated = pointer.decrement()?;
    let value = cpu.read(pointer.address())?;
    Ok((value, updated))
}

pub(crate) fn push(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let value = cpu.read(inst.ea.location())?;
    push_word(cpu, inst, value)?;
    Ok(Effect::Continue)
}

pub(crate) fn pop(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let (value, pointer) = pop_word(cpu, inst)?;
    cpu.write(inst.ac(), pointer.word)?;
    cpu.write(inst.ea.location(), value)?;
    Ok(Effect::Continue)
}

pub(crate) fn pushj(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let saved = return_word(cpu, inst);
    push_word(cpu, inst, saved)?;
    cpu.registers.flags.remove(Flags::CALL_CLEARED);
    Ok(Effect::Jump(inst.ea.address))
}

pub(crate) fn popj(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let (saved, pointer) = pop_word(cpu, inst)?;
    cpu.write(inst.ac(), pointer.word)?;
    let target = if inst.pc.is_section0() {
        saved.right()
    } else {
        saved.bits() & ADDRESS_MASK
    };
    Ok(Effect::Jump(target))
}

/// Move a stack pointer by the signed right half of E
pub(crate) fn adjsp(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let pointer = StackPointer::load(cpu, inst)?.adjust(extend_half(inst.ea.offset()));
    cpu.write(inst.ac(), pointer.word)?;
    Ok(Effect::Continue)
}

pub(crate) fn ash(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let value = cpu.read(inst.ac())?;
    let (result, lost) = shift_arithmetic(u128::from(value.bits()), shift_count(inst), SINGLE);
    if lost {
        cpu.registers.flags |= Flags::OVERFLOW | Flags::TRAP1;
    }
    cpu.write(inst.ac(), Word::new(result as u64))?;
    Ok(Effect::Continue)
}

pub(crate) fn rot(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let value = cpu.read(inst.ac())?;
    let result = rotate(u128::from(value.bits()), shift_count(inst), SINGLE);
    cpu.write(inst.ac(), Word::new(result as u64))?;
    Ok(Effect::Continue)
}

pub(crate) fn lsh(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let value = cpu.read(inst.ac())?;
    let result = shift_logical(u128::from(value.bits()), shift_count(inst), SINGLE);
    cpu.write(inst.ac(), Word::new(result as u64))?;
    Ok(Effect::Continue)
}

/// Find the first one: put its position in AC+1, and jump if there is one
pub(crate) fn jffo(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let value = cpu.read(inst.ac())?;
    if value.is_zero() {
        cpu.write(next_ac(inst), Word::ZERO)?;
        return Ok(Effect::Continue);
    }

    let position = value.bits().leading_zeros() - (u64::BITS - WORD_BITS);
    cpu.write(next_ac(inst), Word::new(u64::from(position)))?;
    Ok(Effect::Jump(inst.ea.address))
}

/// Both accumulators of the pair as one 72-bit value
fn read_pair_bits(cpu: &Computer, inst: &Instruction) -> Result<u128> {
    let pair = cpu.read_double(inst.ac())?;
    Ok((u128::from(pair.hi.bits()) << WORD_BITS) | u128::from(pair.lo.bits()))
}

fn write_pair_bits(cpu: &mut Computer, inst: &Instruction, bits: u128) -> Result<()> {
    let hi = Word::new((bits >> WORD_BITS) as u64);
    let lo = Word::new(bits as u64 & WORD_MASK);
    cpu.write_double(inst.ac(), DoubleWord::new(hi, lo))
}

pub(crate) fn ashc(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let count = shift_count(inst);
    if count == 0 {
        return Ok(Effect::Continue);
    }

    let pair = cpu.read_double(inst.ac())?;
    let (result, lost) = shift_arithmetic(pair.combined(), count, DOUBLE_BITS);
    if lost {
        cpu.registers.flags |= Flags::OVERFLOW | Flags::TRAP1;
    }
    cpu.write_double(inst.ac(), DoubleWord::from_combined(result))?;
    Ok(Effect::Continue)
}

pub(crate) fn rotc(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let bits = read_pair_bits(cpu, inst)?;
    write_pair_bits(cpu, inst, rotate(bits, shift_count(inst), 2 * WORD_BITS))?;
    Ok(Effect::Continue)
}

pub(crate) fn lshc(cpu: &mut Computer, inst: &Instruction) -> Result<Effect> {
    let bits = read_pair_bits(cpu, inst)?;
    write_pair_bits(cpu, inst, shift_logical(bits, shift_count(inst), 2 * WORD_BITS))?;
    Ok(Effect::Continue)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;
    use crate::runtime::tests::computer;
    use crate::runtime::{ProcessorError, ProgramCounter};

    #[test]
    fn exch_test() {
        let mut cpu = computer(indoc! {"
            1000: 250040,,000100
            100:  000000,,000042
        "});
        cpu.registers.ac.set(1, Word::new(0o17));

        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(1), Word::new(0o42));
        assert_eq!(cpu.memory.get(0o100), Ok(Word::new(0o17)));
    }

    #[test]
    fn blt_test() {
        let mut cpu = computer(indoc! {"
            1000: 251040,,000202
            100:  000000,,000001
            101:  000000,,000002
            102:  000000,,000003
        "});
        cpu.registers.ac.set(1, Word::from_halves(0o100, 0o200));

        cpu.step().unwrap();
        for offset in 0..3 {
            assert_eq!(cpu.memory.get(0o200 + offset), Ok(Word::new(offset + 1)));
        }
        assert_eq!(cpu.registers.ac.get(1), Word::from_halves(0o103, 0o203));
    }

    #[test]
    fn blt_clear_test() {
        // Clear 200-204 by copying each word onto the next one
        let mut cpu = computer(indoc! {"
            1000: 251040,,000204
            201:  777777,,777777
            204:  777777,,777777
        "});
        cpu.registers.ac.set(1, Word::from_halves(0o200, 0o201));

        cpu.step().unwrap();
        for address in 0o200..=0o204 {
            assert_eq!(cpu.memory.get(address), Ok(Word::ZERO));
        }
    }

    #[test]
    fn aobjn_loop_test() {
        // Run AC 1 from -3,,100 up to 0,,103
        let mut cpu = computer(indoc! {"
            1000: 253040,,001000
            1001: 254200,,001002
        "});
        cpu.registers.ac.set(1, Word::from_halves(0o777_775, 0o100));

        cpu.run().unwrap();
        assert_eq!(cpu.registers.ac.get(1), Word::from_halves(0, 0o103));
        assert_eq!(cpu.cycles, 4);
    }

    #[test]
    fn aobjp_test() {
        let mut cpu = computer(indoc! {"
            1000: 252040,,002000
        "});
        cpu.registers.ac.set(1, Word::ONES);

        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(1), Word::ZERO);
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2000));
    }

    #[test]
    fn jfcl_test() {
        let mut cpu = computer(indoc! {"
            1000: 255200,,002000
            2000: 255400,,003000
        "});
        // JFCL 4, tests CRY0
        cpu.registers.flags = Flags::CARRY1 | Flags::CARRY0;

        cpu.step().unwrap();
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2000));
        assert_eq!(cpu.registers.flags, Flags::CARRY1);

        // JFCL 10, tests OV
        cpu.step().unwrap();
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2001));
        assert_eq!(cpu.registers.flags, Flags::CARRY1);
    }

    #[test]
    fn xct_test() {
        let mut cpu = computer(indoc! {"
            1000: 256000,,000100
            100:  352040,,000200
            200:  777777,,777777
        "});

        // XCT of AOSE 1,200: the skip is relative to the XCT
        cpu.step().unwrap();
        assert_eq!(cpu.memory.get(0o200), Ok(Word::ZERO));
        assert_eq!(cpu.registers.ac.get(1), Word::ZERO);
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o1002));
    }

    #[test]
    fn xct_limit_test() {
        let mut cpu = Computer::new(Config::default().with_execute_limit(3));
        cpu.write(0o1000, Word::instruction(0o256, 0, false, 0, 0o1000))
            .unwrap();
        cpu.registers.pc = ProgramCounter::new(0o1000);

        assert_eq!(
            cpu.step(),
            Err(ProcessorError::Fault {
                pc: ProgramCounter::new(0o1000),
                fault: Fault::ExecuteLimitExceeded,
            })
        );
    }

    #[test]
    fn jsr_test() {
        let mut cpu = computer(indoc! {"
            1000: 264000,,002000
        "});
        cpu.registers.flags = Flags::OVERFLOW | Flags::FIRST_PART_DONE;

        cpu.step().unwrap();
        assert_eq!(cpu.memory.get(0o2000), Ok(Word::new(0o420_000_001_001)));
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2001));
        assert_eq!(cpu.registers.flags, Flags::OVERFLOW);
    }

    #[test]
    fn jsp_test() {
        let mut cpu = computer(indoc! {"
            1000: 265140,,002000
        "});
        cpu.registers.flags = Flags::CARRY0 | Flags::TRAP2;

        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(3), Word::new(0o200_400_001_001));
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2000));
        assert_eq!(cpu.registers.flags, Flags::CARRY0);
    }

    #[test]
    fn jsa_jra_test() {
        let mut cpu = computer(indoc! {"
            1000: 266040,,002000
            2001: 267040,,002000
        "});
        cpu.registers.ac.set(1, Word::new(0o42));

        cpu.step().unwrap();
        assert_eq!(cpu.memory.get(0o2000), Ok(Word::new(0o42)));
        assert_eq!(cpu.registers.ac.get(1), Word::from_halves(0o2000, 0o1001));
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2001));

        // JRA restores AC 1 from the word its left half points to
        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(1), Word::new(0o42));
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2000));
    }

    #[test]
    fn push_pop_test() {
        let mut cpu = computer(indoc! {"
            1000: 261740,,000100
            1001: 261740,,000101
            1002: 262740,,000102
            1003: 262740,,000103
            100:  000000,,000001
            101:  000000,,000002
        "});
        cpu.registers.ac.set(0o17, Word::from_halves(0o777_770, 0o377));

        cpu.run_steps(2).unwrap();
        assert_eq!(cpu.registers.ac.get(0o17), Word::from_halves(0o777_772, 0o401));
        assert_eq!(cpu.memory.get(0o400), Ok(Word::new(1)));
        assert_eq!(cpu.memory.get(0o401), Ok(Word::new(2)));

        cpu.run_steps(2).unwrap();
        assert_eq!(cpu.memory.get(0o102), Ok(Word::new(2)));
        assert_eq!(cpu.memory.get(0o103), Ok(Word::new(1)));
        assert_eq!(cpu.registers.ac.get(0o17), Word::from_halves(0o777_770, 0o377));
    }

    #[test]
    fn pop_into_stack_accumulator_test() {
        let mut cpu = computer(indoc! {"
            1000: 262740,,000017
            400:  000000,,000042
        "});
        cpu.registers.ac.set(0o17, Word::from_halves(0o777_770, 0o400));

        // The popped word lands after the pointer update
        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(0o17), Word::new(0o42));
    }

    #[test]
    fn pushj_popj_test() {
        let mut cpu = computer(indoc! {"
            1000: 260740,,002000
            1001: 254200,,001001
            2000: 263740,,000000
        "});
        cpu.registers.ac.set(0o17, Word::from_halves(0o777_770, 0o377));
        cpu.registers.flags = Flags::CARRY1 | Flags::TRAP1;

        cpu.step().unwrap();
        assert_eq!(cpu.memory.get(0o400), Ok(Word::new(0o100_200_001_001)));
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2000));
        assert_eq!(cpu.registers.flags, Flags::CARRY1);

        cpu.run().unwrap();
        assert_eq!(cpu.registers.ac.get(0o17), Word::from_halves(0o777_770, 0o377));
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o1001));
    }

    #[test]
    fn stack_overflow_test() {
        let mut cpu = computer(indoc! {"
            1000: 261740,,000100
        "});
        let pointer = Word::from_halves(0o777_777, 0o400);
        cpu.registers.ac.set(0o17, pointer);

        assert_eq!(
            cpu.step(),
            Err(ProcessorError::Fault {
                pc: ProgramCounter::new(0o1000),
                fault: Fault::StackOverflow { pointer },
            })
        );
        assert_eq!(cpu.registers.ac.get(0o17), pointer);
        assert_eq!(cpu.memory.get(0o401), Ok(Word::ZERO));
    }

    #[test]
    fn stack_underflow_test() {
        let mut cpu = computer(indoc! {"
            1000: 263740,,000000
        "});
        let pointer = Word::from_halves(0, 0o400);
        cpu.registers.ac.set(0o17, pointer);

        assert_eq!(
            cpu.step(),
            Err(ProcessorError::Fault {
                pc: ProgramCounter::new(0o1000),
                fault: Fault::StackUnderflow { pointer },
            })
        );
        assert_eq!(cpu.registers.ac.get(0o17), pointer);
    }

    #[test]
    fn global_stack_test() {
        let mut cpu = Computer::new(Config::default().with_memory_words(4 << 18));
        cpu.write(0o2_001_000, Word::instruction(0o261, 0o17, false, 0, 0o100))
            .unwrap();
        cpu.write(0o2_000_100, Word::new(0o42)).unwrap();
        cpu.registers.pc = ProgramCounter::new(0o2_001_000);
        // A global pointer into section 3, with no count
        cpu.registers.ac.set(0o17, Word::new(0o3_000_777));

        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(0o17), Word::new(0o3_001_000));
        assert_eq!(cpu.memory.get(0o3_001_000), Ok(Word::new(0o42)));
    }

    #[test]
    fn adjsp_test() {
        let mut cpu = computer(indoc! {"
            1000: 105740,,000003
            1001: 105740,,777776
        "});
        cpu.registers.ac.set(0o17, Word::from_halves(0o777_770, 0o377));

        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(0o17), Word::from_halves(0o777_773, 0o402));
        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(0o17), Word::from_halves(0o777_771, 0o400));
    }

    #[test]
    fn shift_instructions_test() {
        let mut cpu = computer(indoc! {"
            1000: 240040,,000003
            1001: 241100,,777777
            1002: 242140,,000044
            1003: 240200,,000001
        "});
        cpu.registers.ac.set(1, Word::from_signed(-5));
        cpu.registers.ac.set(2, Word::new(1));
        cpu.registers.ac.set(3, Word::ONES);
        cpu.registers.ac.set(4, Word::new(0o200_000_000_000));

        cpu.run_steps(4).unwrap();
        assert_eq!(cpu.registers.ac.get(1), Word::from_signed(-40));
        assert_eq!(cpu.registers.ac.get(2), Word::MAX_NEGATIVE);
        assert_eq!(cpu.registers.ac.get(3), Word::ZERO);
        assert_eq!(cpu.registers.ac.get(4), Word::ZERO);
        assert_eq!(cpu.registers.flags, Flags::OVERFLOW | Flags::TRAP1);
    }

    #[test]
    fn jffo_test() {
        let mut cpu = computer(indoc! {"
            1000: 243040,,002000
            2000: 243140,,003000
        "});
        cpu.registers.ac.set(1, Word::new(0o000_400_000_000));
        cpu.registers.ac.set(4, Word::ONES);

        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(2), Word::new(9));
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2000));

        cpu.step().unwrap();
        assert_eq!(cpu.registers.ac.get(4), Word::ZERO);
        assert_eq!(cpu.registers.pc, ProgramCounter::new(0o2001));
    }

    #[test]
    fn double_shift_test() {
        let mut cpu = computer(indoc! {"
            1000: 246040,,000044
            1001: 245140,,777777
            1002: 244240,,000001
        "});
        cpu.registers.ac.set(1, Word::ZERO);
        cpu.registers.ac.set(2, Word::new(0o123));
        cpu.registers.ac.set(3, Word::new(1));
        cpu.registers.ac.set(4, Word::ZERO);
        cpu.registers.ac.set(5, Word::ZERO);
        cpu.registers.ac.set(6, Word::new(0o200_000_000_000));

        cpu.run_steps(3).unwrap();
        // LSHC 1,44 moves AC 2 into AC 1
        assert_eq!(cpu.registers.ac.get(1), Word::new(0o123));
        assert_eq!(cpu.registers.ac.get(2), Word::ZERO);
        // ROTC 3,-1 moves the low bit of AC 3 into the top of AC 4
        assert_eq!(cpu.registers.ac.get(3), Word::ZERO);
        assert_eq!(cpu.registers.ac.get(4), Word::MAX_NEGATIVE);
        // ASHC 5,1 carries from AC 6 into AC 5, skipping the low sign bit
        assert_eq!(cpu.registers.ac.get(5), Word::new(1));
        assert_eq!(cpu.registers.ac.get(6), Word::ZERO);
    }
}
