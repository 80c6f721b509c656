use crate::constants::{EXECUTE_LIMIT, MEMORY_SIZE};

/// Sizes and limits of an emulated machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of words of memory, accumulators excluded
    pub memory_words: usize,

    /// Longest indirection chain followed during address calculation
    indirection_limit: Option<usize>,

    /// Deepest nesting of `XCT` instructions
    pub execute_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_words: MEMORY_SIZE,
            indirection_limit: None,
            execute_limit: EXECUTE_LIMIT,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn with_memory_words(mut self, words: usize) -> Self {
        self.memory_words = words;
        self
    }

    #[must_use]
    pub const fn with_indirection_limit(mut self, limit: usize) -> Self {
        self.indirection_limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_execute_limit(mut self, limit: usize) -> Self {
        self.execute_limit = limit;
        self
    }

    /// The indirection limit, which defaults to one word per memory location
    ///
    /// A longer chain has to visit some word twice, so it never ends.
    #[must_use]
    pub const fn indirection_limit(&self) -> usize {
        match self.indirection_limit {
            Some(limit) => limit,
            None => self.memory_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_test() {
        let config = Config::default();
        assert_eq!(config.memory_words, 0o1_000_000);
        assert_eq!(config.indirection_limit(), 0o1_000_000);
        assert_eq!(config.execute_limit, 64);
    }

    #[test]
    fn indirection_limit_follows_memory_test() {
        let config = Config::default().with_memory_words(0o2000);
        assert_eq!(config.indirection_limit(), 0o2000);

        let config = config.with_indirection_limit(10).with_memory_words(0o4000);
        assert_eq!(config.indirection_limit(), 10);
    }
}
