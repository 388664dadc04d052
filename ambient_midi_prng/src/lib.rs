// Seedable pseudo-random source for song generation.
//
// xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding. Every random
// decision in a generation run (chord picks, chord durations, melody spans,
// accent caps and lengths, octave re-rolls, rest/repeat decisions) draws from
// one `SongRng`, so a run is fully reproducible from its `u64` seed.
//
// The sampling helpers are expressed in the inclusive ranges the generator
// thinks in ("a whole number of bars from 1 to n", "an octave shift from -2
// to 2") so callers never have to remember to add one to an upper bound.
//
// Output must not depend on platform or optimization level: no floating
// point in the core generator, only in `next_f64`.

use serde::{Deserialize, Serialize};

/// xoshiro256++ state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SongRng {
    s: [u64; 4],
}

impl SongRng {
    /// Seed a generator. Equal seeds give equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f64` in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[0, bound)` by rejection sampling (no modulo bias).
    ///
    /// Panics if `bound == 0`.
    pub fn below(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "below: bound must be positive");
        if bound.is_power_of_two() {
            return self.next_u64() & (bound - 1);
        }
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return r % bound;
            }
        }
    }

    /// Uniform `u32` in `[low, high]`, both ends included.
    ///
    /// Panics if `low > high`.
    pub fn range_u32(&mut self, low: u32, high: u32) -> u32 {
        assert!(low <= high, "range_u32: low must be <= high");
        low + self.below(u64::from(high - low) + 1) as u32
    }

    /// Uniform `i32` in `[low, high]`, both ends included.
    ///
    /// Panics if `low > high`.
    pub fn range_i32(&mut self, low: i32, high: i32) -> i32 {
        assert!(low <= high, "range_i32: low must be <= high");
        let span = (i64::from(high) - i64::from(low)) as u64 + 1;
        (i64::from(low) + self.below(span) as i64) as i32
    }

    /// Pick one element uniformly, or `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.below(items.len() as u64) as usize;
        items.get(idx)
    }

    /// `true` with probability `p`. `p <= 0.0` never fires, `p >= 1.0` always does.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// SplitMix64 step, used only to expand a seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
