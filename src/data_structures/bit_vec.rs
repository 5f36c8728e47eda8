//! A dynamically sized compact bit vector with a fixed block size of 64 bits.
//!
//! Used for the dense handle-keyed sets of the island manager: live islands,
//! kinematic nodes, nodes with sleep state changes, and the per-update work sets.

use core::ops::BitOrAssign;
use core::slice;

/// A dynamically sized compact bit vector with a fixed block size of 64 bits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BitVec {
    blocks: Vec<u64>,
    block_count: usize,
}

#[inline]
fn bits_to_blocks(bits: usize) -> usize {
    bits.div_ceil(u64::BITS as usize)
}

impl BitVec {
    /// Creates a new [`BitVec`] with room for `bit_count` bits, all unset.
    #[inline]
    pub fn new(bit_count: usize) -> Self {
        let block_count = bits_to_blocks(bit_count);

        Self {
            blocks: vec![0; block_count],
            block_count,
        }
    }

    /// Sets the bit count of the [`BitVec`] and clears all bits.
    ///
    /// If the new bit count exceeds the current block capacity, the block capacity is increased.
    #[inline]
    pub fn set_bit_count_and_clear(&mut self, bit_count: usize) {
        let block_count = bits_to_blocks(bit_count);

        if self.blocks.len() < block_count {
            self.blocks.resize(block_count, 0);
        }

        self.block_count = block_count;
        self.blocks.iter_mut().for_each(|b| *b = 0);
    }

    /// Grows the [`BitVec`] to hold at least `bit_count` bits, preserving existing bits.
    ///
    /// Never shrinks.
    #[inline]
    pub fn grow(&mut self, bit_count: usize) {
        let block_count = bits_to_blocks(bit_count);

        if self.block_count >= block_count {
            return;
        }

        if self.blocks.len() < block_count {
            self.blocks.resize(block_count, 0);
        }

        // Blocks past the old count may hold stale bits from a previous clear-resize.
        self.blocks[self.block_count..block_count]
            .iter_mut()
            .for_each(|b| *b = 0);
        self.block_count = block_count;
    }

    /// Sets the bit at the specified index.
    ///
    /// # Panics
    ///
    /// Panics if the index exceeds the bit count with `debug_assertions` enabled.
    #[inline]
    pub fn set(&mut self, index: usize) {
        let block_index = index / 64;
        debug_assert!(
            block_index < self.block_count,
            "bit {index} is out of bounds for a `BitVec` with {} blocks",
            self.block_count
        );
        let bit_index = index % 64;
        let mask = 1 << bit_index;
        self.blocks[block_index] |= mask;
    }

    /// Unsets the bit at the specified index.
    #[inline]
    pub fn unset(&mut self, index: usize) {
        let block_index = index / 64;
        if block_index >= self.block_count {
            return;
        }
        let bit_index = index % 64;
        let mask = 1 << bit_index;
        self.blocks[block_index] &= !mask;
    }

    /// Flips the bit at the specified index.
    #[inline]
    pub fn toggle(&mut self, index: usize) {
        let block_index = index / 64;
        debug_assert!(block_index < self.block_count);
        let bit_index = index % 64;
        let mask = 1 << bit_index;
        self.blocks[block_index] ^= mask;
    }

    /// Gets the bit at the specified index.
    ///
    /// Returns `false` if the index is out of bounds or the bit is unset.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        let block_index = index / 64;
        if block_index >= self.block_count {
            return false;
        }
        let bit_index = index % 64;
        let mask = 1 << bit_index;
        (self.blocks[block_index] & mask) != 0
    }

    /// Returns the number of bits the [`BitVec`] can currently address.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.block_count * 64
    }

    /// Returns the block count of the [`BitVec`].
    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Clears all bits in the [`BitVec`].
    #[inline]
    pub fn clear(&mut self) {
        self.blocks.iter_mut().for_each(|b| *b = 0);
    }

    /// Returns the number of set bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.blocks().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks().all(|b| b == 0)
    }

    /// Returns the index of the highest set bit, if any.
    #[inline]
    pub fn find_last(&self) -> Option<usize> {
        self.blocks()
            .enumerate()
            .rev()
            .find(|(_, block)| *block != 0)
            .map(|(i, block)| i * 64 + 63 - block.leading_zeros() as usize)
    }

    /// Returns an iterator over the blocks of the [`BitVec`].
    #[inline]
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            iter: self.blocks[..self.block_count].iter(),
        }
    }

    /// Returns an iterator over the indices of all set bits, in ascending order.
    #[inline]
    pub fn ones(&self) -> Ones<'_> {
        Ones {
            blocks: self.blocks(),
            block_index: 0,
            current: 0,
            started: false,
        }
    }

    /// Performs an in-place bitwise OR operation with another [`BitVec`].
    ///
    /// Bits of `other` past the bit count of `self` are ignored.
    #[inline]
    pub fn or(&mut self, other: &Self) {
        let count = self.block_count.min(other.block_count);
        for i in 0..count {
            self.blocks[i] |= other.blocks[i];
        }
    }
}

impl BitOrAssign<&BitVec> for BitVec {
    #[inline]
    fn bitor_assign(&mut self, rhs: &BitVec) {
        self.or(rhs);
    }
}

/// An iterator over the blocks of a [`BitVec`].
#[derive(Clone)]
pub struct Blocks<'a> {
    iter: slice::Iter<'a, u64>,
}

impl Iterator for Blocks<'_> {
    type Item = u64;

    #[inline]
    fn next(&mut self) -> Option<u64> {
        self.iter.next().cloned()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl DoubleEndedIterator for Blocks<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<u64> {
        self.iter.next_back().cloned()
    }
}

impl ExactSizeIterator for Blocks<'_> {}

/// An iterator over the indices of the set bits of a [`BitVec`].
#[derive(Clone)]
pub struct Ones<'a> {
    blocks: Blocks<'a>,
    block_index: usize,
    current: u64,
    started: bool,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        while self.current == 0 {
            self.current = self.blocks.next()?;
            if self.started {
                self.block_index += 1;
            }
            self.started = true;
        }

        let bit = self.current.trailing_zeros() as usize;
        // Clear the lowest set bit.
        self.current &= self.current - 1;
        Some(self.block_index * 64 + bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_unset() {
        let mut bits = BitVec::new(100);
        assert_eq!(bits.block_count(), 2);

        bits.set(3);
        bits.set(64);
        bits.set(99);
        assert!(bits.get(3));
        assert!(bits.get(64));
        assert!(!bits.get(65));
        assert!(!bits.get(10_000));

        bits.unset(64);
        assert!(!bits.get(64));
        assert_eq!(bits.count_ones(), 2);
    }

    #[test]
    fn ones_in_order() {
        let mut bits = BitVec::new(256);
        for i in [0, 1, 63, 64, 130, 255] {
            bits.set(i);
        }
        let ones: Vec<usize> = bits.ones().collect();
        assert_eq!(ones, vec![0, 1, 63, 64, 130, 255]);
        assert_eq!(bits.find_last(), Some(255));
    }

    #[test]
    fn ones_skips_empty_leading_blocks() {
        let mut bits = BitVec::new(256);
        bits.set(200);
        assert_eq!(bits.ones().collect::<Vec<_>>(), vec![200]);
        assert_eq!(BitVec::new(64).ones().count(), 0);
        assert_eq!(BitVec::new(64).find_last(), None);
    }

    #[test]
    fn grow_preserves_bits() {
        let mut bits = BitVec::new(64);
        bits.set(5);
        bits.grow(1000);
        assert!(bits.get(5));
        assert!(bits.bit_count() >= 1000);
        bits.set(999);
        assert!(bits.get(999));
    }

    #[test]
    fn grow_clears_stale_blocks() {
        let mut bits = BitVec::new(256);
        bits.set(200);
        bits.set_bit_count_and_clear(64);
        bits.set(1);
        // Re-growing must not resurrect bit 200 from the larger allocation.
        bits.blocks[3] = u64::MAX;
        bits.grow(256);
        assert!(!bits.get(200));
        assert!(bits.get(1));
    }

    #[test]
    fn toggle_and_or() {
        let mut a = BitVec::new(128);
        let mut b = BitVec::new(128);
        a.toggle(7);
        a.toggle(7);
        assert!(!a.get(7));
        a.set(1);
        b.set(100);
        a |= &b;
        assert!(a.get(1) && a.get(100));
    }
}
