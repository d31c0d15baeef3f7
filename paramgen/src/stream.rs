// Resettable random stream.
//
// Pairs a live `SeededRng` with a snapshot of its state at construction time.
// Every generator or selector that draws random numbers owns one of these,
// forked from the factory's master RNG; `reset()` restores the snapshot so a
// reset generator replays exactly what it produced the first time.

use paramgen_prng::SeededRng;

/// A random stream that can rewind to where it started.
#[derive(Clone, Debug)]
pub struct RngStream {
    origin: SeededRng,
    live: SeededRng,
}

impl RngStream {
    pub fn new(rng: SeededRng) -> Self {
        Self {
            origin: rng.clone(),
            live: rng,
        }
    }

    /// Rewind to the construction-time state.
    pub fn reset(&mut self) {
        self.live = self.origin.clone();
    }

    pub fn rng(&mut self) -> &mut SeededRng {
        &mut self.live
    }

    /// Uniform draw in [0, 1).
    pub fn unit(&mut self) -> f64 {
        self.live.next_f64()
    }
}
