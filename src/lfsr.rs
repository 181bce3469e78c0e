//! Linear feedback shift register random source for backoff selection
//
// https://github.com/rust-iot/csma-cd
// Copyright 2021 Ryan Kurte

use byteorder::{ByteOrder, LittleEndian};
use rand_core::{impls, Error, RngCore, SeedableRng};

/// Feedback taps for a maximal length 32-bit Galois LFSR
/// (x^32 + x^22 + x^2 + x + 1)
pub const TAPS: u32 = 0x8020_0003;

/// State used in place of a zero seed, which would lock up the register
pub const DEFAULT_SEED: u32 = 0xACE1_ACE1;

/// 32-bit Galois LFSR, cheap enough to step every clock in hardware
/// and deterministic for a given seed.
#[derive(Debug, Clone, PartialEq)]
pub struct Lfsr {
    state: u32,
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl Lfsr {
    pub fn new(seed: u32) -> Self {
        let state = match seed {
            0 => DEFAULT_SEED,
            s => s,
        };
        Self{ state }
    }

    /// Current register contents
    pub fn state(&self) -> u32 {
        self.state
    }

    /// Shift once, returning the output bit
    pub fn step(&mut self) -> bool {
        let out = self.state & 1 != 0;
        self.state >>= 1;
        if out {
            self.state ^= TAPS;
        }
        out
    }
}

impl RngCore for Lfsr {
    fn next_u32(&mut self) -> u32 {
        let mut v = 0;
        for _ in 0..32 {
            v = (v << 1) | self.step() as u32;
        }
        v
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Lfsr {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(LittleEndian::read_u32(&seed))
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn zero_seed_replaced() {
        let l = Lfsr::new(0);
        assert_eq!(l.state(), DEFAULT_SEED);

        let l = Lfsr::from_seed([0; 4]);
        assert_eq!(l.state(), DEFAULT_SEED);
    }

    #[test]
    fn seeded_sequences_repeat() {
        let mut a = Lfsr::from_seed([1, 2, 3, 4]);
        let mut b = Lfsr::new(0x0403_0201);

        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn state_never_locks_up() {
        let mut l = Lfsr::new(1);
        let mut seen = HashSet::new();

        for _ in 0..10_000 {
            l.step();
            assert_ne!(l.state(), 0);
            assert!(seen.insert(l.state()), "state repeated early");
        }
    }

    #[test]
    fn covers_small_ranges() {
        let mut l = Lfsr::default();
        let mut seen = [false; 8];

        for _ in 0..256 {
            seen[(l.next_u32() % 8) as usize] = true;
        }

        assert!(seen.iter().all(|s| *s));
    }
}
