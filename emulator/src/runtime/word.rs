//! 36-bit words, their halves, and the 72-bit double word

use parse_display::Display;

use crate::constants::{HALF_MASK, MAGNITUDE_MASK, SIGN_BIT, WORD_BITS, WORD_MASK};

/// One of the two 18-bit halves of a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Half {
    #[display("L")]
    Left,
    #[display("R")]
    Right,
}

impl Half {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// A 36-bit machine word
///
/// The value is always kept masked to 36 bits. Bit 0 (the most significant bit) is the sign bit
/// when the word is interpreted as a two's-complement integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Word(u64);

impl Word {
    pub const ZERO: Self = Self(0);
    pub const ONES: Self = Self(WORD_MASK);
    /// `400000,,000000`, the only value which cannot be negated
    pub const MAX_NEGATIVE: Self = Self(SIGN_BIT);

    #[must_use]
    pub const fn new(bits: u64) -> Self {
        Self(bits & WORD_MASK)
    }

    #[must_use]
    pub const fn from_halves(left: u64, right: u64) -> Self {
        Self(((left & HALF_MASK) << 18) | (right & HALF_MASK))
    }

    /// Two's-complement encoding of `value`, wrapped to 36 bits
    #[must_use]
    pub const fn from_signed(value: i64) -> Self {
        Self::new(value as u64)
    }

    /// Assemble an instruction word from its fields
    #[must_use]
    pub const fn instruction(opcode: u16, ac: u8, indirect: bool, index: u8, y: u64) -> Self {
        Self::new(
            ((opcode as u64 & 0o777) << 27)
                | ((ac as u64 & 0o17) << 23)
                | ((indirect as u64) << 22)
                | ((index as u64 & 0o17) << 18)
                | (y & HALF_MASK),
        )
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn left(self) -> u64 {
        self.0 >> 18
    }

    #[must_use]
    pub const fn right(self) -> u64 {
        self.0 & HALF_MASK
    }

    #[must_use]
    pub const fn half(self, half: Half) -> u64 {
        match half {
            Half::Left => self.left(),
            Half::Right => self.right(),
        }
    }

    /// Replace one half, keeping the other
    #[must_use]
    pub const fn with_half(self, half: Half, value: u64) -> Self {
        match half {
            Half::Left => Self::from_halves(value, self.right()),
            Half::Right => Self::from_halves(self.left(), value),
        }
    }

    #[must_use]
    pub const fn swap(self) -> Self {
        Self::from_halves(self.right(), self.left())
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 & SIGN_BIT != 0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn to_signed(self) -> i64 {
        if self.is_negative() {
            (self.0 | !WORD_MASK) as i64
        } else {
            self.0 as i64
        }
    }

    /// Opcode field, bits 0-8
    #[must_use]
    pub const fn opcode(self) -> u16 {
        (self.0 >> 27) as u16
    }

    /// Accumulator field, bits 9-12
    #[must_use]
    pub const fn ac(self) -> u8 {
        ((self.0 >> 23) & 0o17) as u8
    }

    /// Indirect bit, bit 13
    #[must_use]
    pub const fn indirect(self) -> bool {
        self.0 & (1 << 22) != 0
    }

    /// Index register field, bits 14-17
    #[must_use]
    pub const fn index(self) -> u8 {
        ((self.0 >> 18) & 0o17) as u8
    }

    /// Displacement field, bits 18-35
    #[must_use]
    pub const fn y(self) -> u64 {
        self.right()
    }
}

impl From<Word> for u64 {
    fn from(word: Word) -> Self {
        word.0
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o},,{:06o}", self.left(), self.right())
    }
}

impl std::fmt::Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Word({self})")
    }
}

/// All ones if bit 0 of the 18-bit `half` is set, zero otherwise
#[must_use]
pub const fn sign_fill(half: u64) -> u64 {
    if half & 0o400_000 != 0 {
        HALF_MASK
    } else {
        0
    }
}

/// Sign-extend an 18-bit quantity
#[must_use]
pub const fn extend_half(half: u64) -> i64 {
    let half = half & HALF_MASK;
    if half & 0o400_000 != 0 {
        half as i64 - (1 << 18)
    } else {
        half as i64
    }
}

/// Two consecutive words, most significant first
///
/// As a double-precision integer the value has 71 significant bits: the whole high word followed
/// by the 35 magnitude bits of the low word. The low word's sign bit is not part of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DoubleWord {
    pub hi: Word,
    pub lo: Word,
}

/// Width of a double word taken as an integer
pub(crate) const DOUBLE_BITS: u32 = 71;

impl DoubleWord {
    #[must_use]
    pub const fn new(hi: Word, lo: Word) -> Self {
        Self { hi, lo }
    }

    /// The 71-bit two's-complement value
    #[must_use]
    pub const fn combined(self) -> u128 {
        ((self.hi.bits() as u128) << 35) | (self.lo.bits() & MAGNITUDE_MASK) as u128
    }

    /// Split a 71-bit value, copying the high sign into the low word's sign bit
    #[must_use]
    pub const fn from_combined(value: u128) -> Self {
        let value = value & ((1 << DOUBLE_BITS) - 1);
        let hi = Word::new((value >> 35) as u64);
        let sign = if hi.is_negative() { SIGN_BIT } else { 0 };
        let lo = Word::new(value as u64 & MAGNITUDE_MASK | sign);
        Self { hi, lo }
    }

    #[must_use]
    pub const fn is_max_negative(self) -> bool {
        self.combined() == 1 << (DOUBLE_BITS - 1)
    }
}

/// Result of adding two values of `width` bits with the hardware adder
///
/// `carry0` is the carry out of the sign bit, `carry1` the carry into it. They are computed from
/// the untruncated sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Sum {
    pub value: u128,
    pub carry0: bool,
    pub carry1: bool,
}

impl Sum {
    pub const fn add(a: u128, b: u128, carry_in: u128, width: u32) -> Self {
        let mask = (1 << width) - 1;
        let low = mask >> 1;
        let (a, b) = (a & mask, b & mask);
        let total = a + b + carry_in;

        Self {
            value: total & mask,
            carry0: total > mask,
            carry1: (a & low) + (b & low) + carry_in > low,
        }
    }

    /// `a - b`, computed as `a + !b + 1`
    pub const fn subtract(a: u128, b: u128, width: u32) -> Self {
        let mask = (1 << width) - 1;
        Self::add(a, !b & mask, 1, width)
    }

    pub const fn overflow(self) -> bool {
        self.carry0 != self.carry1
    }

    pub const fn add_words(a: Word, b: Word) -> Self {
        Self::add(a.bits() as u128, b.bits() as u128, 0, WORD_BITS)
    }

    pub const fn subtract_words(a: Word, b: Word) -> Self {
        Self::subtract(a.bits() as u128, b.bits() as u128, WORD_BITS)
    }

    pub const fn word(self) -> Word {
        Word::new(self.value as u64)
    }
}
