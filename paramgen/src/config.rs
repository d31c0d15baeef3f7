// Tunable limits for generator construction and runtime.
//
// Loop ceilings and size limits that bound every algorithm's running time.
// None of these are part of the generator contract; they are knobs. Loaded
// from JSON (any missing field takes its default) or built with
// `GeneratorConfig::default()`. The factory hands a copy to each generator
// that needs one.

use serde::{Deserialize, Serialize};

/// Limits shared by the factory and the generators it builds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Consecutive degenerate control values an iteration combinator accepts
    /// before forcing one value through.
    pub fail_limit: usize,
    /// Maximum grid steps the quantizer walks looking for a bracketing pair.
    pub loop_limit: usize,
    /// Redraws a non-repeating selector attempts before accepting a repeat.
    pub non_repeat_retry_limit: usize,
    /// Symbols of history a Markov generator keeps.
    pub markov_history_limit: usize,
    /// Largest precomputed series accepted: prime and Fibonacci lengths,
    /// sieve ranges, basket counts, and iteration counts.
    pub prime_length_max: usize,
    /// Most step widths a quantizer samples per call.
    pub grid_step_max: usize,
    /// Widest range of known members compressed into a sieve.
    pub sieve_compress_span_max: usize,
    /// Largest cellular automaton row width.
    pub automaton_width_max: usize,
    /// Largest cellular automaton height, skip, and extraction width.
    pub automaton_height_max: usize,
    /// Forward Euler step for the Lorenz attractor.
    pub lorenz_step: f64,
    /// Deepest generator nesting the factory builds.
    pub max_depth: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            fail_limit: 99,
            loop_limit: 999,
            non_repeat_retry_limit: 32,
            markov_history_limit: 9,
            prime_length_max: 999_999,
            grid_step_max: 999,
            sieve_compress_span_max: 999,
            automaton_width_max: 1000,
            automaton_height_max: 10_000,
            lorenz_step: 0.01,
            max_depth: 64,
        }
    }
}

impl GeneratorConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GeneratorConfig::from_json(r#"{"fail_limit": 5}"#).unwrap();
        assert_eq!(config.fail_limit, 5);
        assert_eq!(config.loop_limit, GeneratorConfig::default().loop_limit);
        assert_eq!(config.markov_history_limit, 9);
        assert_eq!(config.grid_step_max, 999);
    }

    #[test]
    fn json_roundtrip() {
        let config = GeneratorConfig {
            lorenz_step: 0.005,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored = GeneratorConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(GeneratorConfig::from_json("{fail_limit: }").is_err());
    }
}
