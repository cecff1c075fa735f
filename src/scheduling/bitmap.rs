//! Occupancy bitmap for ring slots.
const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-width bitset answering "which slots are non-empty".
#[derive(Debug, Clone)]
pub struct SlotMap {
    words: Box<[u64]>,
    bits: usize,
}

impl SlotMap {
    pub fn new(bits: usize) -> Self {
        let words = vec![0u64; bits.div_ceil(WORD_BITS).max(1)].into_boxed_slice();
        Self { words, bits }
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    #[inline(always)]
    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.bits);
        self.words[bit / WORD_BITS] |= 1u64 << (bit % WORD_BITS);
    }

    #[inline(always)]
    pub fn clear(&mut self, bit: usize) {
        debug_assert!(bit < self.bits);
        self.words[bit / WORD_BITS] &= !(1u64 << (bit % WORD_BITS));
    }

    #[inline(always)]
    pub fn test(&self, bit: usize) -> bool {
        bit < self.bits && self.words[bit / WORD_BITS] & (1u64 << (bit % WORD_BITS)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest set bit at or after `from`, wrapping past the end back to bit 0.
    ///
    /// The starting word is visited twice: masked first, then whole after the
    /// wrap, so bits below `from` in that word are still found.
    pub fn find_next_wrapping(&self, from: usize) -> Option<usize> {
        let nwords = self.words.len();
        let mut i = (from / WORD_BITS) % nwords;
        let mut mask = !0u64 << (from % WORD_BITS);
        for _ in 0..=nwords {
            let v = self.words[i] & mask;
            if v != 0 {
                return Some(i * WORD_BITS + v.trailing_zeros() as usize);
            }
            i = (i + 1) % nwords;
            mask = !0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clear_test() {
        let mut map = SlotMap::new(256);
        assert!(map.is_empty());
        map.set(0);
        map.set(63);
        map.set(64);
        map.set(255);
        assert_eq!(map.count(), 4);
        assert!(map.test(63) && map.test(64));
        map.clear(63);
        assert!(!map.test(63));
        assert!(!map.test(1000));
        assert_eq!(map.count(), 3);
    }

    #[test]
    fn scans_forward_from_position() {
        let mut map = SlotMap::new(256);
        map.set(10);
        map.set(130);
        assert_eq!(map.find_next_wrapping(0), Some(10));
        assert_eq!(map.find_next_wrapping(10), Some(10));
        assert_eq!(map.find_next_wrapping(11), Some(130));
        assert_eq!(map.find_next_wrapping(131), Some(10));
    }

    #[test]
    fn wraps_into_bits_below_start_of_same_word() {
        // a single word, scan starts above the only set bit
        let mut map = SlotMap::new(8);
        map.set(2);
        assert_eq!(map.find_next_wrapping(5), Some(2));

        let mut wide = SlotMap::new(256);
        wide.set(65);
        assert_eq!(wide.find_next_wrapping(70), Some(65));
    }

    #[test]
    fn empty_map_finds_nothing() {
        let map = SlotMap::new(128);
        assert_eq!(map.find_next_wrapping(77), None);
    }
}
