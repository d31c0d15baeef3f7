// Chaotic maps and recursive integer series.
//
// The logistic map, the Hénon map, and the Lorenz attractor (forward Euler),
// plus the two integer series the series generators draw from: Fibonacci
// terms and prime segments. The maps are plain state machines; the
// generators in `generators::chaotic` decide when to step them.

use crate::unit;

/// Logistic-map presets by name, with their growth parameter.
pub const LOGISTIC_PRESETS: &[(&str, f64)] = &[
    ("bi", 3.2),
    ("quad", 3.44951),
    ("chaos", 3.5699461),
    ("periodic01", 3.57),
];

/// Growth parameter for a logistic preset name, any case.
pub fn logistic_preset(name: &str) -> Option<f64> {
    let key = name.trim().to_ascii_lowercase();
    LOGISTIC_PRESETS
        .iter()
        .find(|(preset, _)| *preset == key)
        .map(|(_, p)| *p)
}

/// One step of the logistic map.
pub fn logistic(p: f64, x: f64) -> f64 {
    p * x * (1.0 - x)
}

/// The Hénon map `(x, y) <- (1 - a x^2 + y, b x)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HenonMap {
    pub a: f64,
    pub b: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for HenonMap {
    fn default() -> Self {
        Self {
            a: 1.4,
            b: 0.3,
            x: 0.63135448,
            y: 0.18940634,
        }
    }
}

impl HenonMap {
    pub fn new(a: f64, b: f64, x: f64, y: f64) -> Self {
        Self { a, b, x, y }
    }

    /// Advance one step with the given coefficients. A result that leaves
    /// the finite range is clamped to 0.
    pub fn step(&mut self, a: f64, b: f64) -> (f64, f64) {
        self.a = a;
        self.b = b;
        let x = finite_or_zero(1.0 - a * self.x * self.x + self.y);
        let y = finite_or_zero(b * self.x);
        self.x = x;
        self.y = y;
        (x, y)
    }
}

/// The Lorenz attractor integrated with forward Euler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LorenzMap {
    pub r: f64,
    pub s: f64,
    pub b: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dt: f64,
}

impl LorenzMap {
    pub fn new(x: f64, y: f64, z: f64, dt: f64) -> Self {
        Self {
            r: 28.0,
            s: 10.0,
            b: 8.0 / 3.0,
            x,
            y,
            z,
            dt,
        }
    }

    pub fn step(&mut self, r: f64, s: f64, b: f64) -> (f64, f64, f64) {
        self.r = r;
        self.s = s;
        self.b = b;
        let dx = s * (self.y - self.x);
        let dy = r * self.x - self.y - self.x * self.z;
        let dz = self.x * self.y - b * self.z;
        self.x = finite_or_zero(self.x + self.dt * dx);
        self.y = finite_or_zero(self.y + self.dt * dy);
        self.z = finite_or_zero(self.z + self.dt * dz);
        (self.x, self.y, self.z)
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Fibonacci terms `start..start + length`, where term `i` is F(i+1):
/// 1, 1, 2, 3, 5, ...
/// Terms of the Fibonacci sequence representable as finite `f64`.
pub const FIBONACCI_FINITE_TERMS: usize = 1476;

pub fn fibonacci_series(start: usize, length: usize) -> Vec<f64> {
    let (mut a, mut b) = (1.0_f64, 1.0_f64);
    for _ in 0..start {
        (a, b) = (b, a + b);
    }
    let mut out = Vec::with_capacity(length);
    for _ in 0..length {
        out.push(a);
        (a, b) = (b, a + b);
    }
    out
}

/// Deterministic Miller-Rabin for the full `u64` range.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    for p in WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }
    let mut d = n - 1;
    let mut r = 0;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }
    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}

/// Output form of a prime segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimeFormat {
    /// The primes themselves.
    Int,
    /// Gaps between consecutive primes.
    Width,
    /// Primes normalized against the first and last.
    Unit,
    /// Membership over the span from first to last prime.
    Binary,
}

impl PrimeFormat {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(PrimeFormat::Int),
            "wid" | "width" => Some(PrimeFormat::Width),
            "unit" => Some(PrimeFormat::Unit),
            "bin" | "binary" => Some(PrimeFormat::Binary),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimeFormat::Int => "int",
            PrimeFormat::Width => "wid",
            PrimeFormat::Unit => "unit",
            PrimeFormat::Binary => "bin",
        }
    }
}

/// A run of consecutive primes.
///
/// A negative start walks down from `|start|` toward 0 and negates what it
/// finds; if that runs out before `length` primes, the segment continues
/// upward from 0.
#[derive(Clone, Debug)]
pub struct PrimeSegment {
    primes: Vec<i64>,
}

impl PrimeSegment {
    pub fn new(start: i64, length: usize) -> Self {
        let mut primes = Vec::with_capacity(length);
        if start < 0 {
            let mut n = start.unsigned_abs();
            while primes.len() < length && n > 0 {
                if is_prime(n) {
                    primes.push(-(n as i64));
                }
                n -= 1;
            }
            scan_up(0, length, &mut primes);
        } else {
            scan_up(start as u64, length, &mut primes);
        }
        Self { primes }
    }

    pub fn primes(&self) -> &[i64] {
        &self.primes
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    pub fn render(&self, format: PrimeFormat) -> Vec<f64> {
        let (Some(&first), Some(&last)) = (self.primes.first(), self.primes.last()) else {
            return Vec::new();
        };
        match format {
            PrimeFormat::Int => self.primes.iter().map(|&p| p as f64).collect(),
            PrimeFormat::Width => self.primes.windows(2).map(|w| (w[1] - w[0]) as f64).collect(),
            PrimeFormat::Unit => {
                let series: Vec<f64> = self.primes.iter().map(|&p| p as f64).collect();
                unit::unit_norm_range(&series, Some((first as f64, last as f64)))
            }
            PrimeFormat::Binary => {
                let mut sorted = self.primes.clone();
                sorted.sort_unstable();
                sorted.dedup();
                unit::discrete_binary_pad(&sorted, first.min(last), first.max(last))
            }
        }
    }
}

fn scan_up(from: u64, length: usize, primes: &mut Vec<i64>) {
    let mut n = from;
    while primes.len() < length && n <= i64::MAX as u64 {
        if is_prime(n) {
            primes.push(n as i64);
        }
        n += if n > 2 { 1 + (n & 1) } else { 1 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn henon_stays_bounded_from_stable_seed() {
        let mut map = HenonMap::default();
        for i in 0..10_000 {
            let (x, y) = map.step(1.4, 0.3);
            assert!(x.abs() <= 1.5, "x out of range at step {i}: {x}");
            assert!(y.abs() <= 0.45, "y out of range at step {i}: {y}");
        }
    }

    #[test]
    fn henon_overflow_clamps_to_zero() {
        let mut map = HenonMap::new(1.4, 0.3, 1e200, 0.0);
        let (x, _) = map.step(1.4, 0.3);
        assert_eq!(x, 0.0);
    }

    #[test]
    fn logistic_presets() {
        assert_eq!(logistic_preset("CHAOS"), Some(3.5699461));
        assert_eq!(logistic_preset("bi"), Some(3.2));
        assert_eq!(logistic_preset("nope"), None);
        assert_eq!(logistic(4.0, 0.5), 1.0);
    }

    #[test]
    fn lorenz_moves_off_the_seed() {
        let mut map = LorenzMap::new(1.0, 1.0, 1.0, 0.01);
        let (x, y, z) = map.step(28.0, 10.0, 8.0 / 3.0);
        assert_eq!(x, 1.0);
        assert!((y - 1.26).abs() < 1e-12, "y out of range: {y}");
        assert!((z - (1.0 + 0.01 * (1.0 - 8.0 / 3.0))).abs() < 1e-12, "z out of range: {z}");
    }

    #[test]
    fn fibonacci_terms() {
        assert_eq!(fibonacci_series(0, 6), vec![1.0, 1.0, 2.0, 3.0, 5.0, 8.0]);
        assert_eq!(fibonacci_series(10, 3), vec![89.0, 144.0, 233.0]);
        assert!(fibonacci_series(4, 0).is_empty());
    }

    #[test]
    fn fibonacci_terms_stay_finite_up_to_the_ceiling() {
        let terms = fibonacci_series(0, FIBONACCI_FINITE_TERMS);
        assert!(terms.iter().all(|t| t.is_finite()));
        assert!(fibonacci_series(FIBONACCI_FINITE_TERMS, 1)[0].is_infinite());
    }

    #[test]
    fn primality_matches_trial_division() {
        let trial = |n: u64| n >= 2 && (2..n).take_while(|d| d * d <= n).all(|d| n % d != 0);
        for n in 0..2000 {
            assert_eq!(is_prime(n), trial(n), "disagree at {n}");
        }
        assert!(is_prime(1_000_000_007));
        assert!(!is_prime(3_215_031_751));
    }

    #[test]
    fn prime_segment_upward() {
        let seg = PrimeSegment::new(3, 6);
        assert_eq!(seg.primes(), &[3, 5, 7, 11, 13, 17]);
        assert_eq!(seg.render(PrimeFormat::Width), vec![2.0, 2.0, 4.0, 2.0, 4.0]);
        let unit = seg.render(PrimeFormat::Unit);
        assert_eq!(unit.first(), Some(&0.0));
        assert_eq!(unit.last(), Some(&1.0));
        assert_eq!(seg.render(PrimeFormat::Binary).len(), 15);
    }

    #[test]
    fn prime_segment_negative_start_continues_upward() {
        let seg = PrimeSegment::new(-10, 6);
        assert_eq!(seg.primes(), &[-7, -5, -3, -2, 2, 3]);
        let short = PrimeSegment::new(-20, 3);
        assert_eq!(short.primes(), &[-19, -17, -13]);
    }
}
