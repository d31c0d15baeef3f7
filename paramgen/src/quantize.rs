// Grid quantization with partial attraction.
//
// A grid is a list of positive step widths laid out from an anchor: upward,
// lines sit at anchor + w0, anchor + w0 + w1, ... cycling through the widths
// in order; downward, at anchor - w(n-1), anchor - w(n-1) - w(n-2), ...
// cycling in reverse. `attract` finds the pair of lines bracketing a value,
// picks the nearer one (ties go up), and moves the value toward it by `pull`.
//
// `funnel_binary` is the two-line case: a threshold sends a value to one
// boundary or the other.

use std::fmt;

use tracing::warn;

use crate::error::{PmtrError, SyntaxKind};
use crate::unit;

/// Where a value exactly on the threshold goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdMatch {
    Lower,
    Upper,
    Match,
}

impl ThresholdMatch {
    pub fn parse(text: &str) -> Result<Self, PmtrError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "l" | "lower" => Ok(ThresholdMatch::Lower),
            "u" | "upper" => Ok(ThresholdMatch::Upper),
            "m" | "match" => Ok(ThresholdMatch::Match),
            _ => Err(PmtrError::syntax(
                SyntaxKind::Selection,
                text,
                "threshold match must be lower, upper, or match",
            )),
        }
    }
}

impl fmt::Display for ThresholdMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThresholdMatch::Lower => "lower",
            ThresholdMatch::Upper => "upper",
            ThresholdMatch::Match => "match",
        })
    }
}

/// Send `value` to the larger of `a` and `b` when above `threshold` and to
/// the smaller when below.
pub fn funnel_binary(threshold: f64, a: f64, b: f64, value: f64, on_match: ThresholdMatch) -> f64 {
    let (min, max) = if a < b { (a, b) } else { (b, a) };
    if value > threshold {
        max
    } else if value < threshold {
        min
    } else {
        match on_match {
            ThresholdMatch::Lower => min,
            ThresholdMatch::Upper => max,
            ThresholdMatch::Match => threshold,
        }
    }
}

/// Attraction quantizer bounded by a search ceiling.
#[derive(Clone, Copy, Debug)]
pub struct Quantizer {
    loop_limit: usize,
}

impl Quantizer {
    pub fn new(loop_limit: usize) -> Self {
        Self { loop_limit }
    }

    /// The lines immediately at or below and above `value`, if found within
    /// the search ceiling.
    pub fn bracket(&self, value: f64, anchor: f64, grid: &[f64]) -> Option<(f64, f64)> {
        let widths: Vec<f64> = grid.iter().map(|w| w.abs()).filter(|w| *w > 0.0).collect();
        if widths.is_empty() || !value.is_finite() || !anchor.is_finite() {
            return None;
        }
        let n = widths.len();
        if value >= anchor {
            let mut lower = anchor;
            for i in 0..self.loop_limit {
                let upper = lower + widths[i % n];
                if value <= upper {
                    return Some((lower, upper));
                }
                lower = upper;
            }
        } else {
            let mut upper = anchor;
            for i in 0..self.loop_limit {
                let lower = upper - widths[n - 1 - i % n];
                if value >= lower {
                    return Some((lower, upper));
                }
                upper = lower;
            }
        }
        None
    }

    /// Move `value` toward its nearest grid line. `pull` is clamped to the
    /// unit interval: 0 leaves the value alone, 1 lands on the line.
    pub fn attract(&self, value: f64, pull: f64, anchor: f64, grid: &[f64]) -> f64 {
        let Some((lower, upper)) = self.bracket(value, anchor, grid) else {
            warn!(value, anchor, "no grid lines bracket the value; leaving it unchanged");
            return value;
        };
        let target = if value - lower < upper - value { lower } else { upper };
        unit::interpolate(pull, value, target)
    }
}
