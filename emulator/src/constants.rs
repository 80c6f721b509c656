/// A physical or virtual address: section number above an 18-bit local offset.
pub type Address = u64;

/// Number of bits in a machine word
pub const WORD_BITS: u32 = 36;

/// All 36 bits of a word
pub const WORD_MASK: u64 = (1 << WORD_BITS) - 1;

/// All 18 bits of a half-word
pub const HALF_MASK: u64 = 0o777_777;

/// Bit 0, the sign bit of a word
pub const SIGN_BIT: u64 = 1 << 35;

/// The 35 magnitude bits of a word
pub const MAGNITUDE_MASK: u64 = SIGN_BIT - 1;

/// Local offsets are the low 18 bits of an address
pub const SECTION_SHIFT: u32 = 18;

/// Widest address an extended-format indirect word can express (30 bits)
pub const ADDRESS_MASK: Address = (1 << 30) - 1;

/// Number of accumulators, aliased onto addresses `0..16`
pub const AC_COUNT: usize = 16;

/// Default size of the memory, in words (one full section)
pub const MEMORY_SIZE: usize = 1 << 18;

/// Default limit on nested `XCT` instructions
pub const EXECUTE_LIMIT: usize = 64;
