//! The building blocks most instructions are made of
//!
//! An instruction fetches up to two operands, computes flags from them, combines them, stores the
//! result and finally decides whether to skip or jump. Every stage is a small tagged enum, and an
//! opcode is one [`Pipeline`] value in the opcode table.

use parse_display::Display;

use super::exception::Fault;
use super::registers::Flags;
use super::word::{sign_fill, DoubleWord, Half, Sum, Word, DOUBLE_BITS};
use super::{Computer, Effect, Instruction};
use crate::constants::{AC_COUNT, HALF_MASK, WORD_BITS};

/// Where an operand comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fetch {
    /// The accumulator selected by the instruction
    Ac,
    /// The word at E
    Memory,
    /// `0,,E`
    Immediate,
    /// `E,,0`
    ImmediateSwapped,
    /// The word at E, halves exchanged
    MemorySwapped,
    /// E itself, section included when outside section 0
    Address,
    /// The constant 1
    One,
}

impl Fetch {
    pub fn apply(self, cpu: &Computer, inst: &Instruction) -> Result<Word, Fault> {
        let ea = &inst.ea;
        match self {
            Self::Ac => cpu.read(inst.ac()),
            Self::Memory => cpu.read(ea.location()),
            Self::Immediate => Ok(Computer::read_immediate(ea)),
            Self::ImmediateSwapped => Ok(Computer::read_immediate(ea).swap()),
            Self::MemorySwapped => Ok(cpu.read(ea.location())?.swap()),
            Self::Address => Ok(if inst.pc.is_section0() {
                Computer::read_immediate(ea)
            } else if ea.location() < AC_COUNT as u64 {
                // Accumulators are given their global address
                Word::from_halves(1, ea.location())
            } else {
                Word::new(ea.address)
            }),
            Self::One => Ok(Word::new(1)),
        }
    }
}

/// Flags raised by an adder of the given width
fn adder_flags(sum: Sum) -> Flags {
    let mut flags = Flags::empty();
    if sum.carry0 {
        flags |= Flags::CARRY0;
    }
    if sum.carry1 {
        flags |= Flags::CARRY1;
    }
    if sum.overflow() {
        flags |= Flags::OVERFLOW | Flags::TRAP1;
    }
    flags
}

/// How arithmetic flags are computed from the operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlagRule {
    Add,
    Subtract,
    Negate,
    /// Same as [`FlagRule::Negate`], for negative values only
    Magnitude,
}

impl FlagRule {
    pub fn apply(self, src: Word, src2: Word) -> Flags {
        match self {
            Self::Add => adder_flags(Sum::add_words(src, src2)),
            Self::Subtract => adder_flags(Sum::subtract_words(src, src2)),
            Self::Negate => adder_flags(Sum::subtract_words(Word::ZERO, src)),
            Self::Magnitude if src.is_negative() => {
                adder_flags(Sum::subtract_words(Word::ZERO, src))
            }
            Self::Magnitude => Flags::empty(),
        }
    }
}

/// The 16 boolean functions of two operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub enum BooleanFunction {
    SetZ,
    And,
    AndCA,
    SetM,
    AndCM,
    SetA,
    Xor,
    Ior,
    AndCB,
    Eqv,
    SetCA,
    OrCA,
    SetCM,
    OrCM,
    OrCB,
    SetO,
}

impl BooleanFunction {
    pub const ALL: [Self; 16] = [
        Self::SetZ,
        Self::And,
        Self::AndCA,
        Self::SetM,
        Self::AndCM,
        Self::SetA,
        Self::Xor,
        Self::Ior,
        Self::AndCB,
        Self::Eqv,
        Self::SetCA,
        Self::OrCA,
        Self::SetCM,
        Self::OrCM,
        Self::OrCB,
        Self::SetO,
    ];

    /// Truth table: bit 0 for A and M, bit 1 for not A and M, bit 2 for A and not M, bit 3 for
    /// neither
    const fn table(self) -> u8 {
        self as u8
    }

    /// Whether the result depends on the accumulator
    pub const fn uses_ac(self) -> bool {
        let t = self.table();
        (t & 1 != 0) != (t & 2 != 0) || (t & 4 != 0) != (t & 8 != 0)
    }

    /// Whether the result depends on the memory operand
    pub const fn uses_memory(self) -> bool {
        let t = self.table();
        (t & 1 != 0) != (t & 4 != 0) || (t & 2 != 0) != (t & 8 != 0)
    }

    pub const fn apply(self, a: Word, m: Word) -> Word {
        let (a, m) = (a.bits(), m.bits());
        let t = self.table();
        let mut result = 0;
        if t & 1 != 0 {
            result |= a & m;
        }
        if t & 2 != 0 {
            result |= !a & m;
        }
        if t & 4 != 0 {
            result |= a & !m;
        }
        if t & 8 != 0 {
            result |= !a & !m;
        }
        Word::new(result)
    }
}

/// What happens to the half of the destination which does not receive the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Fill {
    /// Left unchanged
    #[display("")]
    None,
    /// Cleared
    #[display("Z")]
    Zeros,
    /// Set
    #[display("O")]
    Ones,
    /// Copies of the sign bit of the transferred half
    #[display("E")]
    Extend,
}

/// One of the half-word transfers `H{L,R}{L,R}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("H{from}{to}{fill}")]
pub struct HalfTransfer {
    pub from: Half,
    pub to: Half,
    pub fill: Fill,
}

impl HalfTransfer {
    /// Move one half of `src` into `dst`
    ///
    /// The other half is filled from the transferred half only. `dst` matters only when nothing
    /// is filled in.
    pub const fn apply(self, src: Word, dst: Word) -> Word {
        let value = src.half(self.from);
        let base = match self.fill {
            Fill::None => dst,
            Fill::Zeros => Word::ZERO,
            Fill::Ones => Word::ONES,
            Fill::Extend => Word::from_halves(sign_fill(value), sign_fill(value)),
        };
        base.with_half(self.to, value)
    }
}

/// What the test instructions do to the masked bits of the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Modifier {
    /// No modification
    #[display("N")]
    None,
    #[display("Z")]
    Zeros,
    #[display("C")]
    Complement,
    #[display("O")]
    Ones,
}

impl Modifier {
    pub const fn apply(self, value: Word, mask: Word) -> Word {
        let (value, mask) = (value.bits(), mask.bits());
        Word::new(match self {
            Self::None => value,
            Self::Zeros => value & !mask,
            Self::Complement => value ^ mask,
            Self::Ones => value | mask,
        })
    }
}

/// How the result is computed from the operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operate {
    Swap,
    Negate,
    Magnitude,
    Add,
    Subtract,
    Boolean(BooleanFunction),
    Half(HalfTransfer),
    Mask(Modifier),
}

impl Operate {
    pub const fn apply(self, src: Word, src2: Word) -> Word {
        match self {
            Self::Swap => src.swap(),
            Self::Negate => Sum::subtract_words(Word::ZERO, src).word(),
            Self::Magnitude if src.is_negative() => Sum::subtract_words(Word::ZERO, src).word(),
            Self::Magnitude => src,
            Self::Add => Sum::add_words(src, src2).word(),
            Self::Subtract => Sum::subtract_words(src, src2).word(),
            Self::Boolean(function) => function.apply(src, src2),
            Self::Half(transfer) => transfer.apply(src, src2),
            Self::Mask(modifier) => modifier.apply(src, src2),
        }
    }
}

/// Where the result goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Store {
    Ac,
    Memory,
    /// Memory and accumulator
    Both,
    /// Memory, and the accumulator unless it is AC 0
    SelfNonZero,
    /// The accumulator unless it is AC 0
    AcIfNonZero,
}

impl Store {
    pub fn apply(self, cpu: &mut Computer, inst: &Instruction, value: Word) -> Result<(), Fault> {
        let memory = inst.ea.location();
        match self {
            Self::Ac => cpu.write(inst.ac(), value),
            Self::Memory => cpu.write(memory, value),
            Self::Both => {
                cpu.write(memory, value)?;
                cpu.write(inst.ac(), value)
            }
            Self::SelfNonZero => {
                cpu.write(memory, value)?;
                if inst.ac() != 0 {
                    cpu.write(inst.ac(), value)?;
                }
                Ok(())
            }
            Self::AcIfNonZero if inst.ac() != 0 => cpu.write(inst.ac(), value),
            Self::AcIfNonZero => Ok(()),
        }
    }
}

/// Signed comparison of two words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Condition {
    #[display("")]
    Never,
    L,
    E,
    LE,
    A,
    GE,
    N,
    G,
}

impl Condition {
    pub const ALL: [Self; 8] = [
        Self::Never,
        Self::L,
        Self::E,
        Self::LE,
        Self::A,
        Self::GE,
        Self::N,
        Self::G,
    ];

    pub const fn holds(self, left: Word, right: Word) -> bool {
        let (left, right) = (left.to_signed(), right.to_signed());
        match self {
            Self::Never => false,
            Self::L => left < right,
            Self::E => left == right,
            Self::LE => left <= right,
            Self::A => true,
            Self::GE => left >= right,
            Self::N => left != right,
            Self::G => left > right,
        }
    }
}

/// Skip conditions of the test instructions, on the masked bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MaskSkip {
    #[display("")]
    Never,
    /// All masked bits are zero
    E,
    A,
    /// Some masked bit is set
    N,
}

impl MaskSkip {
    pub const fn holds(self, masked: Word) -> bool {
        match self {
            Self::Never => false,
            Self::E => masked.is_zero(),
            Self::A => true,
            Self::N => !masked.is_zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Test {
    /// First operand against the second one
    Compare(Condition),
    /// The result against zero
    Value(Condition),
    /// The bits of the first operand selected by the second one, before modification
    Masked(MaskSkip),
}

impl Test {
    pub const fn holds(self, src: Word, src2: Word, result: Word) -> bool {
        match self {
            Self::Compare(condition) => condition.holds(src, src2),
            Self::Value(condition) => condition.holds(result, Word::ZERO),
            Self::Masked(skip) => skip.holds(Word::new(src.bits() & src2.bits())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Skip,
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Branch {
    pub test: Test,
    pub action: Action,
}

fn fetch(stage: Option<Fetch>, cpu: &Computer, inst: &Instruction) -> Result<Word, Fault> {
    stage.map_or(Ok(Word::ZERO), |f| f.apply(cpu, inst))
}

/// A composed single-word instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Pipeline {
    pub src: Option<Fetch>,
    pub src2: Option<Fetch>,
    pub flags: Option<FlagRule>,
    pub operate: Option<Operate>,
    pub store: Option<Store>,
    pub branch: Option<Branch>,
}

impl Pipeline {
    pub const fn fetch(src: Fetch) -> Self {
        Self {
            src: Some(src),
            src2: None,
            flags: None,
            operate: None,
            store: None,
            branch: None,
        }
    }

    pub const fn with_src2(mut self, src2: Fetch) -> Self {
        self.src2 = Some(src2);
        self
    }

    pub const fn with_flags(mut self, rule: FlagRule) -> Self {
        self.flags = Some(rule);
        self
    }

    pub const fn with_operate(mut self, operate: Operate) -> Self {
        self.operate = Some(operate);
        self
    }

    pub const fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub const fn with_branch(mut self, test: Test, action: Action) -> Self {
        self.branch = Some(Branch { test, action });
        self
    }

    pub fn execute(&self, cpu: &mut Computer, inst: &Instruction) -> Result<Effect, Fault> {
        let src = fetch(self.src, cpu, inst)?;
        let src2 = fetch(self.src2, cpu, inst)?;

        let flags = self.flags.map(|rule| rule.apply(src, src2));
        let result = self.operate.map_or(src, |op| op.apply(src, src2));
        let taken = self
            .branch
            .filter(|branch| branch.test.holds(src, src2, result));

        if let Some(store) = self.store {
            store.apply(cpu, inst, result)?;
        }
        if let Some(flags) = flags {
            cpu.registers.flags |= flags;
        }

        Ok(match taken {
            Some(Branch {
                action: Action::Skip,
                ..
            }) => Effect::Skip,
            Some(Branch {
                action: Action::Jump,
                ..
            }) => Effect::Jump(inst.ea.address),
            None => Effect::Continue,
        })
    }
}

/// Where a double word comes from or goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pair {
    /// AC and AC+1
    Ac,
    /// E and E+1
    Memory,
}

impl Pair {
    const fn address(self, inst: &Instruction) -> u64 {
        match self {
            Self::Ac => inst.ac(),
            Self::Memory => inst.ea.location(),
        }
    }

    pub fn read(self, cpu: &Computer, inst: &Instruction) -> Result<DoubleWord, Fault> {
        cpu.read_double(self.address(inst))
    }

    pub fn write(
        self,
        cpu: &mut Computer,
        inst: &Instruction,
        value: DoubleWord,
    ) -> Result<(), Fault> {
        cpu.write_double(self.address(inst), value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DoubleOperate {
    Negate,
    Add,
    Subtract,
}

impl DoubleOperate {
    /// The result with the flags it raises
    pub fn apply(self, src: DoubleWord, src2: DoubleWord) -> (DoubleWord, Flags) {
        let (a, b) = (src.combined(), src2.combined());
        let sum = match self {
            Self::Negate => Sum::subtract(0, a, DOUBLE_BITS),
            Self::Add => Sum::add(a, b, 0, DOUBLE_BITS),
            Self::Subtract => Sum::subtract(a, b, DOUBLE_BITS),
        };
        (DoubleWord::from_combined(sum.value), adder_flags(sum))
    }
}

/// A composed double-word instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DoublePipeline {
    pub src: Pair,
    pub src2: Option<Pair>,
    pub operate: Option<DoubleOperate>,
    pub store: Pair,
}

impl DoublePipeline {
    pub fn execute(self, cpu: &mut Computer, inst: &Instruction) -> Result<Effect, Fault> {
        let src = self.src.read(cpu, inst)?;
        let src2 = match self.src2 {
            Some(pair) => pair.read(cpu, inst)?,
            None => DoubleWord::default(),
        };

        let (result, flags) = match self.operate {
            Some(op) => op.apply(src, src2),
            None => (src, Flags::empty()),
        };

        self.store.write(cpu, inst, result)?;
        cpu.registers.flags |= flags;
        Ok(Effect::Continue)
    }
}

/// Logical shift of a `width`-bit value, left for positive counts
pub(crate) fn shift_logical(value: u128, count: i64, width: u32) -> u128 {
    let mask = (1u128 << width) - 1;
    let distance = count.unsigned_abs();
    if distance >= u64::from(width) {
        0
    } else if count >= 0 {
        (value << distance) & mask
    } else {
        (value & mask) >> distance
    }
}

/// Rotation of a `width`-bit value, left for positive counts
pub(crate) fn rotate(value: u128, count: i64, width: u32) -> u128 {
    let mask = (1u128 << width) - 1;
    let distance = count.rem_euclid(i64::from(width)) as u32;
    let value = value & mask;
    if distance == 0 {
        value
    } else {
        ((value << distance) | (value >> (width - distance))) & mask
    }
}

/// Arithmetic shift of a `width`-bit two's-complement value, left for positive counts
///
/// Returns the shifted value and whether a bit different from the sign was shifted out.
pub(crate) fn shift_arithmetic(value: u128, count: i64, width: u32) -> (u128, bool) {
    let mask = (1u128 << width) - 1;
    let sign = 1u128 << (width - 1);
    let magnitude = sign - 1;
    let value = value & mask;
    let negative = value & sign != 0;

    if count >= 0 {
        let expected = if negative { magnitude } else { 0 };
        if count.unsigned_abs() >= u64::from(width - 1) {
            return (value & sign, value & magnitude != expected);
        }

        // The bits shifted out of the magnitude must all be copies of the sign
        let kept = width - 1 - count as u32;
        let lost = (value & magnitude) >> kept != expected >> kept;
        (((value << count) & magnitude) | (value & sign), lost)
    } else {
        let distance = count.unsigned_abs().min(u64::from(width)) as u32;
        // Sign-extend to 128 bits first
        let signed = if negative {
            (value | !mask) as i128
        } else {
            value as i128
        };
        ((signed >> distance) as u128 & mask, false)
    }
}

/// Width of a single word for the shift helpers
pub(crate) const SINGLE: u32 = WORD_BITS;

/// The right half of E, as a signed shift count
pub(crate) const fn shift_count(inst: &Instruction) -> i64 {
    super::word::extend_half(inst.ea.address & HALF_MASK)
}
