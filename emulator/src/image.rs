//! Program images, as handed over by a loader

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::constants::Address;
use crate::runtime::{Computer, ProgramCounter, Word};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("image cell at {address:o} is out of memory")]
    CellOutOfRange { address: Address },

    #[error("start address {address:o} is out of memory")]
    StartOutOfRange { address: Address },
}

/// The initial content of the memory and where to start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub start: Address,
    pub cells: Vec<(Address, Word)>,
}

impl Image {
    #[must_use]
    pub const fn new(start: Address) -> Self {
        Self {
            start,
            cells: Vec::new(),
        }
    }

    /// Add a word to the image
    #[must_use]
    pub fn with_cell(mut self, address: Address, value: Word) -> Self {
        self.cells.push((address, value));
        self
    }

    /// Lowest and highest populated addresses
    #[must_use]
    pub fn bounds(&self) -> Option<(Address, Address)> {
        let addresses = self.cells.iter().map(|&(address, _)| address);
        let low = addresses.clone().min()?;
        let high = addresses.max()?;
        Some((low, high))
    }
}

/// Build a computer ready to run an image
///
/// Cells below 16 go to the accumulators.
///
/// # Errors
///
/// Fails if a cell or the start address does not fit in the configured memory.
pub fn load(image: &Image, config: &Config) -> Result<Computer, LoadError> {
    let mut computer = Computer::new(*config);

    for &(address, value) in &image.cells {
        computer
            .write(address, value)
            .map_err(|_| LoadError::CellOutOfRange { address })?;
    }

    if image.start >= config.memory_words as Address {
        return Err(LoadError::StartOutOfRange {
            address: image.start,
        });
    }
    computer.registers.pc = ProgramCounter::new(image.start);

    if let Some((low, high)) = image.bounds() {
        debug!("Image spans {:o} to {:o}", low, high);
    }
    info!(cells = image.cells.len(), "Loaded image, starting at {:o}", image.start);
    Ok(computer)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn bounds_test() {
        assert_eq!(Image::new(0o1000).bounds(), None);

        let image = Image::new(0o1000)
            .with_cell(0o1000, Word::ONES)
            .with_cell(0o20, Word::ZERO)
            .with_cell(0o2000, Word::ZERO);
        assert_eq!(image.bounds(), Some((0o20, 0o2000)));
    }

    #[test]
    fn load_and_run_test() {
        // MOVEI 1,42 then HALT, with AC 2 preset by the image
        let image = Image::new(0o1000)
            .with_cell(0o1000, Word::instruction(0o201, 1, false, 0, 0o42))
            .with_cell(0o1001, Word::instruction(0o254, 4, false, 0, 0o1001))
            .with_cell(2, Word::new(0o7));

        let mut computer = load(&image, &Config::default()).unwrap();
        assert_eq!(computer.registers.pc, ProgramCounter::new(0o1000));
        assert_eq!(computer.registers.ac.get(2), Word::new(0o7));

        computer.run().unwrap();
        assert_eq!(computer.registers.ac.get(1), Word::new(0o42));
        assert!(computer.halted());
    }

    #[test]
    fn out_of_range_test() {
        let config = Config::default().with_memory_words(0o1000);

        let image = Image::new(0o100).with_cell(0o1000, Word::ONES);
        assert_eq!(
            load(&image, &config).unwrap_err(),
            LoadError::CellOutOfRange { address: 0o1000 }
        );

        let image = Image::new(0o1000).with_cell(0o100, Word::ONES);
        assert_eq!(
            load(&image, &config).unwrap_err(),
            LoadError::StartOutOfRange { address: 0o1000 }
        );
    }
}
