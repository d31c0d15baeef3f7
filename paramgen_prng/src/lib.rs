// Seeded, forkable random streams for paramgen.
//
// One algorithm, xoshiro256++, with its 256-bit state expanded from a single
// `u64` seed by SplitMix64. The factory owns a master stream and forks a
// child for every generator or selector that draws random numbers; nothing
// else in the workspace produces randomness.
//
// Output depends only on the prior state, identically on every platform, so
// a seed plus a generator literal fully determines what gets produced. The
// state serializes with serde, which lets a caller capture a stream mid-run.

use serde::{Deserialize, Serialize};

/// A xoshiro256++ stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRng {
    s: [u64; 4],
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        let mut mix = seed;
        Self {
            s: std::array::from_fn(|_| splitmix64(&mut mix)),
        }
    }

    /// Split off a child stream seeded from this stream's next output.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64())
    }

    pub fn next_u64(&mut self) -> u64 {
        let [a, b, c, d] = self.s;
        let out = a.wrapping_add(d).rotate_left(23).wrapping_add(a);
        let c = c ^ a;
        let d = d ^ b;
        let b = b ^ c;
        let a = a ^ d;
        self.s = [a, b, c ^ (self.s[1] << 17), d.rotate_left(45)];
        out
    }

    /// Uniform in [0, 1), from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / (1u64 << 53) as f64;
        (self.next_u64() >> 11) as f64 * SCALE
    }

    /// Uniform integer in `[low, high)`; an empty range returns `low`.
    ///
    /// Multiply-and-shift with rejection of the biased low products
    /// (Lemire, 2019).
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        let mut wide = u128::from(self.next_u64()) * u128::from(span);
        if (wide as u64) < span {
            let floor = span.wrapping_neg() % span;
            while (wide as u64) < floor {
                wide = u128::from(self.next_u64()) * u128::from(span);
            }
        }
        low + (wide >> 64) as usize
    }

    /// True with probability `p` (never below 0, always at or above 1).
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_seeds_give_equal_streams() {
        let (mut a, mut b) = (SeededRng::new(42), SeededRng::new(42));
        assert!((0..1000).all(|_| a.next_u64() == b.next_u64()));
        assert_ne!(SeededRng::new(42).next_u64(), SeededRng::new(43).next_u64());
    }

    #[test]
    fn unit_draws_stay_below_one() {
        let mut rng = SeededRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn range_covers_both_ends_and_nothing_else() {
        let mut rng = SeededRng::new(999);
        let mut seen = [false; 7];
        for _ in 0..10_000 {
            let v = rng.range_usize(3, 10);
            assert!((3..10).contains(&v), "out of range: {v}");
            seen[v - 3] = true;
        }
        assert!(seen.iter().all(|s| *s), "missing values: {seen:?}");
    }

    #[test]
    fn range_of_odd_span_is_unbiased() {
        let mut rng = SeededRng::new(8);
        let mut counts = [0usize; 3];
        for _ in 0..30_000 {
            counts[rng.range_usize(0, 3)] += 1;
        }
        for c in counts {
            assert!((9_400..10_600).contains(&c), "skewed count: {c}");
        }
    }

    #[test]
    fn empty_range_returns_low() {
        let mut rng = SeededRng::new(1);
        assert_eq!(rng.range_usize(4, 4), 4);
        assert_eq!(rng.range_usize(9, 2), 9);
    }

    #[test]
    fn forks_repeat_from_equal_parents() {
        let (mut a, mut b) = (SeededRng::new(7), SeededRng::new(7));
        let (mut child_a, mut child_b) = (a.fork(), b.fork());
        assert!((0..100).all(|_| child_a.next_u64() == child_b.next_u64()));
        assert_ne!(a.next_u64(), child_a.next_u64());
    }

    #[test]
    fn coin_flips() {
        let mut rng = SeededRng::new(42);
        let heads = (0..10_000).filter(|_| rng.random_bool(0.5)).count();
        assert!((4_500..5_500).contains(&heads), "random_bool(0.5) gave {heads} of 10000");
        assert!((0..100).all(|_| !rng.random_bool(0.0) && rng.random_bool(1.0)));
    }

    #[test]
    fn serialized_state_resumes_the_stream() {
        let mut rng = SeededRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SeededRng = serde_json::from_str(&json).unwrap();
        assert!((0..100).all(|_| rng.next_u64() == restored.next_u64()));
    }
}
