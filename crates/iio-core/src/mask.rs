//! Channel-enable masks.
//!
//! A mask is a bit-set addressed by channel index and stored as fixed-width `u32` words:
//! bit `i` lives in word `i / 32` under `1 << (i % 32)`. This is the layout transports put
//! on the wire, so it is kept independent of any native bit-vector type.

use crate::error::{IioError, Result};

/// Number of channel bits stored per mask word.
pub const WORD_BITS: usize = 32;

#[inline]
const fn bit_word(bit: usize) -> usize {
    bit / WORD_BITS
}

#[inline]
const fn bit_mask(bit: usize) -> u32 {
    1 << (bit % WORD_BITS)
}

/// Bit-set of channel indices selected for streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ChannelMask {
    words: Vec<u32>,
}

impl ChannelMask {
    /// Number of words needed to address `nb_bits` channel indices.
    pub const fn words_for(nb_bits: usize) -> usize {
        nb_bits.div_ceil(WORD_BITS)
    }

    /// Create an all-zero mask able to address `nb_bits` channel indices.
    pub fn with_bits(nb_bits: usize) -> Self {
        Self {
            words: vec![0; Self::words_for(nb_bits)],
        }
    }

    /// Create a mask from raw words.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Raw words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Mutable raw words, for transports that fill the granted mask directly.
    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    /// Grow the mask so it can address at least `nb_bits` bits. Never shrinks.
    pub fn ensure_bits(&mut self, nb_bits: usize) {
        let words = Self::words_for(nb_bits);
        if words > self.words.len() {
            self.words.resize(words, 0);
        }
    }

    /// Number of words in the mask.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Number of addressable bits.
    pub fn capacity_bits(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    /// Set `bit`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `bit` is beyond the mask's capacity.
    pub fn set(&mut self, bit: usize) -> Result<()> {
        let word = self.word_mut(bit)?;
        *word |= bit_mask(bit);
        Ok(())
    }

    /// Clear `bit`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `bit` is beyond the mask's capacity.
    pub fn clear(&mut self, bit: usize) -> Result<()> {
        let word = self.word_mut(bit)?;
        *word &= !bit_mask(bit);
        Ok(())
    }

    /// Test `bit`. Bits beyond the capacity read as cleared.
    pub fn test(&self, bit: usize) -> bool {
        self.words
            .get(bit_word(bit))
            .is_some_and(|word| word & bit_mask(bit) != 0)
    }

    /// True when no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Clear every bit.
    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Iterate over set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..WORD_BITS)
                .filter(move |b| word & (1 << b) != 0)
                .map(move |b| i * WORD_BITS + b)
        })
    }

    fn word_mut(&mut self, bit: usize) -> Result<&mut u32> {
        let capacity = self.capacity_bits();
        self.words.get_mut(bit_word(bit)).ok_or_else(|| {
            IioError::invalid_argument(format!(
                "mask bit {} out of range (mask holds {} bits)",
                bit, capacity
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_for() {
        assert_eq!(ChannelMask::words_for(0), 0);
        assert_eq!(ChannelMask::words_for(1), 1);
        assert_eq!(ChannelMask::words_for(32), 1);
        assert_eq!(ChannelMask::words_for(33), 2);
    }

    #[test]
    fn test_set_clear_test_every_bit() {
        let mut mask = ChannelMask::with_bits(96);
        for i in 0..96 {
            mask.set(i).unwrap();
            assert!(mask.test(i));
            mask.clear(i).unwrap();
            assert!(!mask.test(i));
        }
        assert!(mask.is_empty());
    }

    #[test]
    fn test_bit_does_not_leak_across_words() {
        let mut mask = ChannelMask::with_bits(96);
        mask.set(33).unwrap();
        for j in (0..32).chain(64..96) {
            assert!(!mask.test(j), "bit {} unexpectedly set", j);
        }
        assert_eq!(mask.words(), &[0, 1 << 1, 0]);

        mask.set(0).unwrap();
        mask.set(95).unwrap();
        mask.clear(33).unwrap();
        assert!(mask.test(0));
        assert!(mask.test(95));
        assert_eq!(mask.words()[1], 0);
    }

    #[test]
    fn test_out_of_range() {
        let mut mask = ChannelMask::with_bits(8);
        assert_eq!(mask.capacity_bits(), 32);
        assert!(mask.set(32).unwrap_err().is_invalid_argument());
        assert!(!mask.test(1000));

        mask.ensure_bits(40);
        assert_eq!(mask.word_count(), 2);
        mask.set(32).unwrap();
        mask.ensure_bits(1);
        assert_eq!(mask.word_count(), 2);
    }

    #[test]
    fn test_iter_ascending() {
        let mut mask = ChannelMask::with_bits(70);
        for bit in [65, 3, 31, 32] {
            mask.set(bit).unwrap();
        }
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![3, 31, 32, 65]);
        assert_eq!(mask.count(), 4);
    }
}
