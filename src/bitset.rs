//! Compact bitset representation for sets of tree nodes.
//!
//! # Overview
//! Lineage paths are compared only through the size of their overlap, so each
//! path is stored as a bitset over node ids. Bit `i` is set when node `i` lies
//! on the path.
//!
//! # Example
//! For a tree whose nodes have ids `0..6`:
//! - Path through nodes {1, 2, 4} → bitset `0b010110`
//! - Path through nodes {2, 4, 5} → bitset `0b110100`
//! - Shared nodes {2, 4} → overlap of 2

/// A compact bitset over node ids.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily large trees.
/// Each u64 word holds 64 node ids.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Creates a new bitset with all bits set to 0.
    ///
    /// # Parameters
    /// - `words`: Number of u64 words needed. Use [`Bitset::words_for`].
    ///
    /// # Example
    /// ```
    /// # use gene_tree_binarizer::bitset::Bitset;
    /// // A tree with 100 nodes needs 2 words (128 bits)
    /// let bs = Bitset::zeros(Bitset::words_for(100));
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Number of words needed to hold `n` ids.
    #[inline]
    pub fn words_for(n: usize) -> usize {
        n.div_ceil(64)
    }

    /// Sets the bit at the given index to 1.
    ///
    /// # Example
    /// ```
    /// # use gene_tree_binarizer::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(5);
    /// assert_eq!(bs.0[0], 0b00100001);
    /// ```
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;
        let bit = idx & 63;
        self.0[word] |= 1u64 << bit;
    }

    /// Counts the number of set bits (population count).
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Size of `self ∩ other` without allocating.
    ///
    /// # Example
    /// ```
    /// # use gene_tree_binarizer::bitset::Bitset;
    /// let mut a = Bitset::zeros(1);
    /// let mut b = Bitset::zeros(1);
    /// for i in [1, 2, 4] { a.set(i); }
    /// for i in [2, 4, 5] { b.set(i); }
    /// assert_eq!(a.intersection_count(&b), 2);
    /// ```
    #[inline]
    pub fn intersection_count(&self, other: &Bitset) -> usize {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }
}
