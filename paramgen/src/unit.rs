// Value-domain utilities: unit-interval mapping, boundary folding,
// interpolation, partitioning, and float-to-int rounding.
//
// Pure functions used by nearly every generator. Anything that maps a
// generator's internal series onto a caller range goes through
// `unit_norm_range` followed by `denorm`. None of these panic on degenerate
// input; zero spans and out-of-range unit values resolve to fixed results.

use std::fmt;

use paramgen_prng::SeededRng;

use crate::error::{PmtrError, SyntaxKind};

/// Clamp a value into the unit interval.
pub fn limit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Map a unit value onto the range spanned by `a` and `b` (in either order).
///
/// The unit value is clamped first; `a == b` returns `a`.
pub fn denorm(value: f64, a: f64, b: f64) -> f64 {
    if a == b {
        return a;
    }
    let (min, max) = if a < b { (a, b) } else { (b, a) };
    limit(value) * (max - min) + min
}

/// Position of `value` within `[min, max]` as a unit value. Zero span is 0.
pub fn unit_norm(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span == 0.0 { 0.0 } else { (value - min) / span }
}

/// Normalize a series into the unit interval.
///
/// With `fix`, the series is normalized against that range; otherwise
/// against its own minimum and maximum. A single element maps to 0.
pub fn unit_norm_range(series: &[f64], fix: Option<(f64, f64)>) -> Vec<f64> {
    if series.len() <= 1 {
        return vec![0.0; series.len()];
    }
    let (min, max) = match fix {
        Some((a, b)) => (a.min(b), a.max(b)),
        None => series_min_max(series),
    };
    series.iter().map(|&v| unit_norm(v, min, max)).collect()
}

/// Minimum and maximum of a series; `(0, 0)` when empty.
pub fn series_min_max(series: &[f64]) -> (f64, f64) {
    let mut iter = series.iter().copied();
    let Some(first) = iter.next() else {
        return (0.0, 0.0);
    };
    iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Linear interpolation from `a` (at 0) to `b` (at 1).
pub fn interpolate(value: f64, a: f64, b: f64) -> f64 {
    let value = limit(value);
    if value == 0.0 {
        a
    } else if value == 1.0 {
        b
    } else {
        a * (1.0 - value) + b * value
    }
}

/// How a value outside a boundary pair is brought back inside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryMethod {
    Limit,
    Wrap,
    Reflect,
}

impl BoundaryMethod {
    pub fn parse(text: &str) -> Result<Self, PmtrError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "l" | "limit" => Ok(BoundaryMethod::Limit),
            "w" | "wrap" => Ok(BoundaryMethod::Wrap),
            "r" | "reflect" => Ok(BoundaryMethod::Reflect),
            _ => Err(PmtrError::syntax(
                SyntaxKind::Selection,
                text,
                "boundary method must be limit, wrap, or reflect",
            )),
        }
    }
}

impl fmt::Display for BoundaryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoundaryMethod::Limit => "limit",
            BoundaryMethod::Wrap => "wrap",
            BoundaryMethod::Reflect => "reflect",
        })
    }
}

/// Fit `f` within the boundaries `a` and `b` (in either order).
pub fn boundary_fit(a: f64, b: f64, f: f64, method: BoundaryMethod) -> f64 {
    let (min, max) = if a < b { (a, b) } else { (b, a) };
    if f >= min && f <= max {
        return f;
    }
    if min == max || !f.is_finite() {
        return min;
    }
    let period = max - min;
    match method {
        BoundaryMethod::Limit => f.clamp(min, max),
        BoundaryMethod::Wrap => {
            if f > max {
                f - period * ((f - max) / period).ceil()
            } else {
                f + period * ((min - f) / period).ceil()
            }
        }
        BoundaryMethod::Reflect => {
            let m = (f - min).rem_euclid(2.0 * period);
            if m <= period {
                min + m
            } else {
                min + 2.0 * period - m
            }
        }
    }
}

/// Push `f` out of the open interval between `a` and `b`; values on or
/// outside the boundaries pass through.
///
/// Values in the upper half leave through the upper boundary and values in
/// the lower half through the lower one. Limit snaps to that boundary, wrap
/// shifts by one period, and reflect mirrors across it.
pub fn boundary_reject(a: f64, b: f64, f: f64, method: BoundaryMethod) -> f64 {
    let (min, max) = if a < b { (a, b) } else { (b, a) };
    if f <= min || f >= max {
        return f;
    }
    let period = max - min;
    let upper = f >= min + period * 0.5;
    match (method, upper) {
        (BoundaryMethod::Limit, true) => max,
        (BoundaryMethod::Limit, false) => min,
        (BoundaryMethod::Wrap, true) => f + period,
        (BoundaryMethod::Wrap, false) => f - period,
        (BoundaryMethod::Reflect, true) => 2.0 * max - f,
        (BoundaryMethod::Reflect, false) => 2.0 * min - f,
    }
}

/// One partition of the unit interval: (lower, mean, upper).
pub type UnitBound = (f64, f64, f64);

/// Split the unit interval into `parts` equal partitions.
pub fn unit_boundary_equal(parts: usize) -> Vec<UnitBound> {
    if parts == 0 {
        return Vec::new();
    }
    let step = 1.0 / parts as f64;
    let mut bounds = Vec::with_capacity(parts);
    let mut low = 0.0;
    for face in 0..parts {
        let high = if face == parts - 1 { 1.0 } else { step * (face + 1) as f64 };
        bounds.push((low, low + step * 0.5, high));
        low = high;
    }
    bounds
}

/// Index of the partition containing `value` (clamped to the unit interval).
/// 1.0 belongs to the last partition. Returns 0 for an empty partition list.
pub fn unit_boundary_position(value: f64, bounds: &[UnitBound]) -> usize {
    let value = limit(value);
    if bounds.is_empty() {
        return 0;
    }
    if value >= 1.0 {
        return bounds.len() - 1;
    }
    bounds
        .iter()
        .position(|&(low, _, high)| value >= low && value < high)
        .unwrap_or(bounds.len() - 1)
}

/// Membership of `members` over the integer range `[lo, hi]` as 1.0/0.0.
pub fn discrete_binary_pad(members: &[i64], lo: i64, hi: i64) -> Vec<f64> {
    (lo..=hi)
        .map(|z| if members.binary_search(&z).is_ok() { 1.0 } else { 0.0 })
        .collect()
}

/// Float to integer conversion strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundMode {
    Round,
    Floor,
    Ceiling,
    /// Round up with probability equal to the fractional part.
    Weight,
}

/// Convert a float to an integer. Only `RoundMode::Weight` draws from `rng`.
pub fn float_to_int(x: f64, mode: RoundMode, rng: &mut SeededRng) -> i64 {
    if !x.is_finite() {
        return 0;
    }
    match mode {
        RoundMode::Round => x.round() as i64,
        RoundMode::Floor => x.floor() as i64,
        RoundMode::Ceiling => x.ceil() as i64,
        RoundMode::Weight => {
            let floor = x.floor();
            let frac = x - floor;
            if frac == 0.0 {
                floor as i64
            } else if rng.random_bool(frac) {
                floor as i64 + 1
            } else {
                floor as i64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denorm_handles_reversed_and_equal_bounds() {
        assert_eq!(denorm(0.5, 0.0, 10.0), 5.0);
        assert_eq!(denorm(0.25, 10.0, 0.0), 2.5);
        assert_eq!(denorm(0.7, 3.0, 3.0), 3.0);
        assert_eq!(denorm(1.5, 0.0, 2.0), 2.0);
    }

    #[test]
    fn unit_norm_range_own_extremes() {
        let norm = unit_norm_range(&[2.0, 4.0, 6.0], None);
        assert_eq!(norm, vec![0.0, 0.5, 1.0]);
        assert_eq!(unit_norm_range(&[7.0], None), vec![0.0]);
        assert_eq!(unit_norm_range(&[3.0, 3.0], None), vec![0.0, 0.0]);
    }

    #[test]
    fn unit_norm_range_fixed_range() {
        let norm = unit_norm_range(&[0.0, 3.0, 6.0], Some((0.0, 12.0)));
        assert_eq!(norm, vec![0.0, 0.25, 0.5]);
    }

    #[test]
    fn boundary_fit_limit() {
        assert_eq!(boundary_fit(0.0, 1.0, 1.7, BoundaryMethod::Limit), 1.0);
        assert_eq!(boundary_fit(1.0, 0.0, -3.0, BoundaryMethod::Limit), 0.0);
        assert_eq!(boundary_fit(0.0, 1.0, 0.3, BoundaryMethod::Limit), 0.3);
    }

    #[test]
    fn boundary_fit_wrap() {
        let v = boundary_fit(0.0, 10.0, 13.0, BoundaryMethod::Wrap);
        assert!((v - 3.0).abs() < 1e-9, "wrap above: {v}");
        let v = boundary_fit(0.0, 10.0, -2.0, BoundaryMethod::Wrap);
        assert!((v - 8.0).abs() < 1e-9, "wrap below: {v}");
        let v = boundary_fit(0.0, 10.0, 35.0, BoundaryMethod::Wrap);
        assert!((v - 5.0).abs() < 1e-9, "wrap several periods: {v}");
    }

    #[test]
    fn boundary_fit_reflect() {
        let v = boundary_fit(0.0, 10.0, 13.0, BoundaryMethod::Reflect);
        assert!((v - 7.0).abs() < 1e-9, "reflect above: {v}");
        let v = boundary_fit(0.0, 10.0, -4.0, BoundaryMethod::Reflect);
        assert!((v - 4.0).abs() < 1e-9, "reflect below: {v}");
        let v = boundary_fit(0.0, 10.0, 25.0, BoundaryMethod::Reflect);
        assert!((v - 5.0).abs() < 1e-9, "reflect twice: {v}");
    }

    #[test]
    fn boundary_fit_equal_bounds_returns_boundary() {
        assert_eq!(boundary_fit(2.0, 2.0, 9.0, BoundaryMethod::Wrap), 2.0);
    }

    #[test]
    fn boundary_reject_pushes_out_of_range() {
        assert_eq!(boundary_reject(3.0, 9.0, 23.0, BoundaryMethod::Limit), 23.0);
        assert_eq!(boundary_reject(3.0, 9.0, 3.0, BoundaryMethod::Wrap), 3.0);
        assert_eq!(boundary_reject(3.0, 9.0, 7.0, BoundaryMethod::Limit), 9.0);
        assert_eq!(boundary_reject(9.0, 3.0, 5.0, BoundaryMethod::Limit), 3.0);
        assert_eq!(boundary_reject(3.0, 9.0, 5.0, BoundaryMethod::Wrap), -1.0);
        assert_eq!(boundary_reject(3.0, 9.0, 6.0, BoundaryMethod::Wrap), 12.0);
        assert_eq!(boundary_reject(3.0, 9.0, 8.0, BoundaryMethod::Reflect), 10.0);
        assert_eq!(boundary_reject(3.0, 9.0, 4.0, BoundaryMethod::Reflect), 2.0);
        assert_eq!(boundary_reject(2.0, 2.0, 2.0, BoundaryMethod::Reflect), 2.0);
    }

    #[test]
    fn boundary_method_parse() {
        assert_eq!(BoundaryMethod::parse("W").unwrap(), BoundaryMethod::Wrap);
        assert_eq!(BoundaryMethod::parse("reflect").unwrap(), BoundaryMethod::Reflect);
        assert!(BoundaryMethod::parse("bounce").is_err());
    }

    #[test]
    fn interpolate_endpoints_and_midpoint() {
        assert_eq!(interpolate(0.0, 2.0, 4.0), 2.0);
        assert_eq!(interpolate(1.0, 2.0, 4.0), 4.0);
        assert_eq!(interpolate(0.5, 2.0, 4.0), 3.0);
    }

    #[test]
    fn equal_partitions_cover_unit_interval() {
        let bounds = unit_boundary_equal(4);
        assert_eq!(bounds.len(), 4);
        assert_eq!(bounds[0].0, 0.0);
        assert_eq!(bounds[3].2, 1.0);
        assert_eq!(unit_boundary_position(0.0, &bounds), 0);
        assert_eq!(unit_boundary_position(0.3, &bounds), 1);
        assert_eq!(unit_boundary_position(0.75, &bounds), 3);
        assert_eq!(unit_boundary_position(1.0, &bounds), 3);
    }

    #[test]
    fn binary_pad_marks_members() {
        assert_eq!(
            discrete_binary_pad(&[0, 3], 0, 4),
            vec![1.0, 0.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn float_to_int_modes() {
        let mut rng = SeededRng::new(1);
        assert_eq!(float_to_int(2.5, RoundMode::Round, &mut rng), 3);
        assert_eq!(float_to_int(-2.5, RoundMode::Floor, &mut rng), -3);
        assert_eq!(float_to_int(2.1, RoundMode::Ceiling, &mut rng), 3);
        assert_eq!(float_to_int(4.0, RoundMode::Weight, &mut rng), 4);
    }

    #[test]
    fn weighted_rounding_splits_by_fraction() {
        let mut rng = SeededRng::new(99);
        let n = 10_000;
        let ups = (0..n)
            .filter(|_| float_to_int(3.25, RoundMode::Weight, &mut rng) == 4)
            .count();
        let pct = ups as f64 / n as f64;
        assert!((0.22..0.28).contains(&pct), "expected ~25% round up, got {pct}");
    }
}
