// The registered generator types.
//
// Each submodule defines a family of generators together with its registry
// entries (name, acronyms, signature, constructor):
//
// - `basic`: constants, baskets, uniform randomness, accumulation, masking,
//   sample-and-hold, arithmetic operators.
// - `fill`: baskets frozen from a run of another generator.
// - `boundary`: band rejection, binary funnels, turning cycles.
// - `series`: sieve segments, prime segments, Fibonacci terms.
// - `chaotic`: logistic map, Hénon and Lorenz baskets.
// - `cellular`: cellular automaton extraction.
// - `markov_value`: Markov chains over symbol strings.
// - `quantize_value`: grid quantization of another generator.
// - `iterate`: combinators that group, hold, window, select, and cross-fade
//   other generators.
//
// Every generator keeps the canonical rendering of its arguments from `Args`
// and returns it from `describe_args`. The helpers below are shared by
// several families.

mod basic;
mod boundary;
mod cellular;
mod chaotic;
mod fill;
mod iterate;
mod markov_value;
mod quantize_value;
mod series;

use paramgen_prng::SeededRng;

use crate::error::ValidationFailure;
use crate::factory::GeneratorEntry;
use crate::generator::{Generator, Pmtr};
use crate::selector::{SelectionPolicy, Selector};
use crate::unit;
use crate::value::{Context, Value};

/// Every registered generator type, in catalogue order.
pub fn entries() -> Vec<GeneratorEntry> {
    let mut all = Vec::new();
    all.extend(basic::entries());
    all.extend(fill::entries());
    all.extend(boundary::entries());
    all.extend(series::entries());
    all.extend(chaotic::entries());
    all.extend(cellular::entries());
    all.extend(markov_value::entries());
    all.extend(quantize_value::entries());
    all.extend(iterate::entries());
    all
}

/// A selector over a precomputed series that may turn out empty.
///
/// Constructors build these from whatever the series computation produced;
/// an empty pool produces 0 and reports itself through `check_args`.
#[derive(Clone, Debug)]
pub(crate) struct Pool<T> {
    selector: Option<Selector<T>>,
}

impl<T: Clone> Pool<T> {
    pub(crate) fn new(values: Vec<T>, policy: SelectionPolicy, rng: SeededRng, retry_limit: usize) -> Self {
        // Only an empty source fails.
        Self {
            selector: Selector::new(values, policy, rng, retry_limit).ok(),
        }
    }

    pub(crate) fn next(&mut self) -> Option<T> {
        self.selector.as_mut().map(Selector::next_value)
    }

    pub(crate) fn reset(&mut self) {
        if let Some(selector) = self.selector.as_mut() {
            selector.reset();
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.selector.is_none()
    }
}

/// A precomputed series returned through a selector as is.
///
/// Backs `sieveList`, `listPrime`, and `caList`. `problem` is the validation
/// failure found while computing the series, if any.
#[derive(Debug)]
pub(crate) struct SelectedSeries {
    pub(crate) name: &'static str,
    pub(crate) pool: Pool<f64>,
    pub(crate) problem: Option<&'static str>,
    pub(crate) record: Vec<String>,
}

impl Generator for SelectedSeries {
    fn type_name(&self) -> &'static str {
        self.name
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, _step: i64, _ctx: &Context) -> Value {
        Value::Num(self.pool.next().unwrap_or(0.0))
    }

    fn reset(&mut self) {
        self.pool.reset();
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        check_series(self.name, self.problem, &self.pool)
    }
}

/// A precomputed unit-interval series returned through a selector and mapped
/// onto the range of two generators.
///
/// Backs `valueSieve`, `valuePrime`, `fibonacciSeries`, the chaotic baskets,
/// and `caValue`.
#[derive(Debug)]
pub(crate) struct UnitSeries {
    pub(crate) name: &'static str,
    pub(crate) pool: Pool<f64>,
    pub(crate) min: Pmtr,
    pub(crate) max: Pmtr,
    pub(crate) problem: Option<&'static str>,
    pub(crate) record: Vec<String>,
}

impl Generator for UnitSeries {
    fn type_name(&self) -> &'static str {
        self.name
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let u = self.pool.next().unwrap_or(0.0);
        let min = self.min.produce_num(step, ctx);
        let max = self.max.produce_num(step, ctx);
        Value::Num(unit::denorm(u, min, max))
    }

    fn reset(&mut self) {
        self.pool.reset();
        self.min.reset();
        self.max.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.min, &self.max]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        check_series(self.name, self.problem, &self.pool)
    }
}

fn check_series(name: &str, problem: Option<&str>, pool: &Pool<f64>) -> Result<(), ValidationFailure> {
    if let Some(message) = problem {
        return Err(ValidationFailure::new(name, message));
    }
    ensure(!pool.is_empty(), name, "the series is empty; choose other arguments")
}

/// Fail validation with `message` unless `ok`.
pub(crate) fn ensure(ok: bool, tag: &str, message: &str) -> Result<(), ValidationFailure> {
    if ok {
        Ok(())
    } else {
        Err(ValidationFailure::new(tag, message))
    }
}

/// A produced value read as a repeat or skip count.
pub(crate) fn count_of(value: f64, ceiling: usize) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let ceiling = ceiling.min(i64::MAX as usize) as f64;
    value.round().clamp(-ceiling, ceiling) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_produces_nothing() {
        let mut pool: Pool<f64> = Pool::new(Vec::new(), SelectionPolicy::OrderedCyclic, SeededRng::new(0), 8);
        assert!(pool.is_empty());
        assert_eq!(pool.next(), None);
    }

    #[test]
    fn pool_reset_restarts_selection() {
        let mut pool = Pool::new(vec![1.0, 2.0, 3.0], SelectionPolicy::OrderedCyclic, SeededRng::new(0), 8);
        assert_eq!(pool.next(), Some(1.0));
        assert_eq!(pool.next(), Some(2.0));
        pool.reset();
        assert_eq!(pool.next(), Some(1.0));
    }

    #[test]
    fn counts_round_and_clamp() {
        assert_eq!(count_of(2.6, 100), 3);
        assert_eq!(count_of(-1.4, 100), -1);
        assert_eq!(count_of(1e12, 100), 100);
        assert_eq!(count_of(f64::NAN, 100), 0);
    }
}
