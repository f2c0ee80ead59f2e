//! Address-to-word backing store used by fetch (instruction memory) and by
//! host-side pre-population of data memory (`inject_data`). Byte-addressed,
//! but every access in the opcode set this core models is word-aligned.

use ahash::AHashMap;

use crate::error::{ScoreError, ScoreResult};

pub type Address = u64;

/// Words held per bank before an access faults as out of range, matching the
/// banked memory device this core models.
pub const WORDS_PER_BANK: u64 = 64;

#[derive(Debug)]
pub struct MemoryBuffer {
    words: AHashMap<Address, u32>,
    capacity_words: u64,
}

impl MemoryBuffer {
    /// `num_banks` determines the device's total addressable range:
    /// `num_banks * WORDS_PER_BANK` words, laid out so bank assignment
    /// (`address % num_banks`) stays meaningful right up to the boundary.
    pub fn new(num_banks: usize) -> Self {
        Self {
            words: AHashMap::default(),
            capacity_words: num_banks.max(1) as u64 * WORDS_PER_BANK,
        }
    }

    fn check_aligned(addr: Address) -> ScoreResult<()> {
        if addr % 4 != 0 {
            return Err(ScoreError::Unaligned(addr));
        }
        Ok(())
    }

    pub fn check_in_range(&self, addr: Address) -> ScoreResult<()> {
        if addr / 4 >= self.capacity_words {
            return Err(ScoreError::OutOfRange(addr));
        }
        Ok(())
    }

    pub fn load_word(&self, addr: Address) -> ScoreResult<u32> {
        Self::check_aligned(addr)?;
        self.check_in_range(addr)?;
        Ok(*self.words.get(&addr).unwrap_or(&0))
    }

    pub fn store_word(&mut self, addr: Address, value: u32) -> ScoreResult<()> {
        Self::check_aligned(addr)?;
        self.check_in_range(addr)?;
        self.words.insert(addr, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_words_read_as_zero() {
        let mem = MemoryBuffer::new(8);
        assert_eq!(mem.load_word(0x40).unwrap(), 0);
    }

    #[test]
    fn misaligned_access_fails() {
        let mem = MemoryBuffer::new(8);
        assert!(mem.load_word(0x41).is_err());
    }

    #[test]
    fn round_trips_a_stored_word() {
        let mut mem = MemoryBuffer::new(8);
        mem.store_word(0x100, 0xdead_beef).unwrap();
        assert_eq!(mem.load_word(0x100).unwrap(), 0xdead_beef);
    }

    #[test]
    fn access_past_bank_capacity_is_out_of_range() {
        // 8 banks * 64 words/bank = 512 words = 0x800 bytes of range.
        let mem = MemoryBuffer::new(8);
        assert!(mem.load_word(0x800).is_err());
        assert!(mem.load_word(0x7FC).is_ok());
    }
}
