//! Seeded pseudo-random source.
//!
//! Every random draw in the pipeline (keyword start offsets, facet bundles,
//! template choices) comes from a generator keyed by a stable seed string,
//! usually a page id with a purpose prefix (`kw:cats/001.html`,
//! `facet:cats/001.html:title`). The same seed always yields the same
//! sequence, on every platform and every release, so re-running the
//! pipeline regenerates identical text without storing it.
//!
//! The generator state comes from the first 8 bytes (big-endian) of the
//! SHA-256 digest of the seed, advanced with SplitMix64. Both steps are
//! fixed here rather than borrowed from a general-purpose RNG crate whose
//! output stream may change between versions.

use sha2::{Digest, Sha256};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Deterministic generator for one seed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn for_seed(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self {
            state: u64::from_be_bytes(head),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform-ish index in `0..n` (multiply-shift). Returns 0 for `n == 0`.
    pub fn below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        ((u128::from(self.next_u64()) * n as u128) >> 64) as usize
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let i = self.below(items.len());
        items.get(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SeededRng::for_seed("facet:cats/001.html:title");
        let mut b = SeededRng::for_seed("facet:cats/001.html:title");
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SeededRng::for_seed("facet:cats/001.html:title");
        let mut b = SeededRng::for_seed("facet:cats/001.html:desc");
        let xs: Vec<u64> = (0..4).map(|_| a.next_u64()).collect();
        let ys: Vec<u64> = (0..4).map(|_| b.next_u64()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn output_stream_is_pinned() {
        // Changing these values changes every previously generated page.
        let mut r = SeededRng::for_seed("kw:cats/001.html");
        assert_eq!(r.next_u64(), 0xd386_054b_f534_9386);
        assert_eq!(r.next_u64(), 0x3b80_99ea_0f2f_956f);
        assert_eq!(r.next_u64(), 0x2c98_54ca_57d8_62b8);

        let mut empty = SeededRng::for_seed("");
        assert_eq!(empty.next_u64(), 0xd600_8a00_4150_0483);
    }

    #[test]
    fn below_stays_in_range() {
        let mut r = SeededRng::for_seed("range");
        for n in [1usize, 2, 3, 7, 100] {
            for _ in 0..200 {
                assert!(r.below(n) < n);
            }
        }
        assert_eq!(r.below(0), 0);
    }

    #[test]
    fn choose_empty_is_none() {
        let mut r = SeededRng::for_seed("x");
        let empty: [u8; 0] = [];
        assert!(r.choose(&empty).is_none());
        assert_eq!(r.choose(&["only"]), Some(&"only"));
    }
}
