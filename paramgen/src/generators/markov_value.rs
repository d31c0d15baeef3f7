// Markov value generators.
//
// Each call draws one unit value, resolves the (possibly fractional) order
// from the order generator, and asks the transition table for the successor
// of the recent history. The chosen symbol's value is returned as a number
// when it reads as one and as a string otherwise.
//
// `markovValue` reads its table from a transition string;
// `markovGeneratorAnalysis` builds one at construction by analyzing a run of
// another generator's output.

use std::collections::VecDeque;

use tracing::warn;

use crate::args::{ArgKind, ArgSpec, Args};
use crate::error::{PmtrError, ValidationFailure};
use crate::factory::{BuildEnv, GeneratorEntry};
use crate::generator::{Generator, Pmtr};
use crate::markov::Transition;
use crate::stream::RngStream;
use crate::value::{Context, Value};

use super::ensure;

const MARKOV_VALUE_ARGS: &[ArgSpec] = &[
    ArgSpec::new("transition", ArgKind::Str, "a{.2}b{.5}c{.8}d{0}:{a=5|b=4|c=7|d=1}"),
    ArgSpec::new("order", ArgKind::NumOrGen, "(c, 0)"),
];

const MARKOV_ANALYSIS_ARGS: &[ArgSpec] = &[
    ArgSpec::new("source", ArgKind::Gen, "(bg, oc, (3, 3, 3, 0, 9, 9, 6))"),
    ArgSpec::new("valueCount", ArgKind::Int, "30"),
    ArgSpec::new("maxAnalysisOrder", ArgKind::Int, "2"),
    ArgSpec::new("order", ArgKind::NumOrGen, "(mv, a{1}b{0}c{2}:{a=10|b=1|c=2}, (c, 0))"),
];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![
        GeneratorEntry {
            name: "markovValue",
            acronyms: &["mv"],
            signature: MARKOV_VALUE_ARGS,
            build: build_markov_value,
        },
        GeneratorEntry {
            name: "markovGeneratorAnalysis",
            acronyms: &["mga"],
            signature: MARKOV_ANALYSIS_ARGS,
            build: build_markov_analysis,
        },
    ]
}

/// A transition table walked under a generated order.
#[derive(Debug)]
struct Chain {
    transition: Transition,
    order: Pmtr,
    history: VecDeque<String>,
    history_limit: usize,
    rng: RngStream,
}

impl Chain {
    fn new(transition: Transition, order: Pmtr, env: &mut BuildEnv<'_>) -> Self {
        // History never needs to be longer than the longest rule context.
        let history_limit = env.config().markov_history_limit.max(transition.max_order());
        Self {
            transition,
            order,
            history: VecDeque::with_capacity(history_limit + 1),
            history_limit,
            rng: RngStream::new(env.fork_rng()),
        }
    }

    fn next_symbol(&mut self, step: i64, ctx: &Context) -> Option<String> {
        let unit = self.rng.unit();
        let raw_order = self.order.produce_num(step, ctx);
        let order = self.transition.resolve_order(raw_order, self.rng.rng());
        let history: Vec<String> = self.history.iter().cloned().collect();
        self.transition.next(unit, &history, order).map(str::to_string)
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let symbol = match self.next_symbol(step, ctx) {
            Some(symbol) => symbol,
            None => {
                warn!(step, "no rule with positive weight; using the first symbol");
                match self.transition.symbols().next() {
                    Some(first) => first.to_string(),
                    None => return Value::Num(0.0),
                }
            }
        };
        let value = Value::from_symbol(self.transition.value_of(&symbol).unwrap_or_default());
        self.history.push_back(symbol);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
        value
    }

    fn reset(&mut self) {
        self.history.clear();
        self.rng.reset();
        self.order.reset();
    }

    fn check(&self, tag: &str) -> Result<(), ValidationFailure> {
        self.transition
            .validate()
            .map_err(|message| ValidationFailure::new(tag, message))
    }
}

#[derive(Debug)]
pub struct MarkovValue {
    chain: Chain,
    record: Vec<String>,
}

fn build_markov_value(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let transition = Transition::parse(&args.str(0)?)?;
    args.set_rendering(0, transition.to_string());
    let order = args.generator(1)?;
    Ok(Box::new(MarkovValue {
        chain: Chain::new(transition, order, env),
        record: args.record().to_vec(),
    }))
}

impl Generator for MarkovValue {
    fn type_name(&self) -> &'static str {
        "markovValue"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        self.chain.produce(step, ctx)
    }

    fn reset(&mut self) {
        self.chain.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.chain.order]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        self.chain.check("markovValue")
    }
}

/// A Markov chain learned from another generator's output.
#[derive(Debug)]
pub struct MarkovAnalysis {
    source: Pmtr,
    count: i64,
    max_order: i64,
    chain: Chain,
    record: Vec<String>,
}

fn build_markov_analysis(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let mut source = args.generator(0)?;
    let count = args.int(1)?;
    let max_order = args.int(2)?;
    let order = args.generator(3)?;
    let config = env.config();
    if count.unsigned_abs() > config.prime_length_max as u64 {
        return Err(PmtrError::value(
            "markovGeneratorAnalysis",
            format!("value count {count} is beyond the limit of {}", config.prime_length_max),
        ));
    }
    if max_order > config.markov_history_limit as i64 {
        return Err(PmtrError::value(
            "markovGeneratorAnalysis",
            format!("analysis order cannot exceed {}", config.markov_history_limit),
        ));
    }
    let ctx = Context::new();
    let observed: Vec<String> = (0..count.max(1))
        .map(|t| source.produce(t, &ctx).to_string())
        .collect();
    source.reset();
    let transition = Transition::from_analysis(&observed, max_order.max(1) as usize)?;
    Ok(Box::new(MarkovAnalysis {
        source,
        count,
        max_order,
        chain: Chain::new(transition, order, env),
        record: args.record().to_vec(),
    }))
}

impl Generator for MarkovAnalysis {
    fn type_name(&self) -> &'static str {
        "markovGeneratorAnalysis"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        self.chain.produce(step, ctx)
    }

    fn reset(&mut self) {
        self.source.reset();
        self.chain.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source, &self.chain.order]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        ensure(self.count > 0, "markovGeneratorAnalysis", "value count must be greater than zero")?;
        ensure(
            self.max_order > 0,
            "markovGeneratorAnalysis",
            "analysis order must be greater than zero",
        )?;
        self.chain.check("markovGeneratorAnalysis")
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PmtrError;
    use crate::factory::Factory;
    use crate::value::{Context, Value};

    fn values(text: &str, n: usize) -> Vec<Value> {
        let mut factory = Factory::new(21);
        let mut pmtr = factory.build(text).unwrap();
        let ctx = Context::new();
        (0..n as i64).map(|t| pmtr.produce(t, &ctx)).collect()
    }

    #[test]
    fn single_weight_always_chosen() {
        let out = values("mv, a{7}b{8}:{a=1}", 20);
        assert!(out.iter().all(|v| *v == Value::Num(7.0)));
    }

    #[test]
    fn first_order_rules_follow_history() {
        // a -> b -> c -> a ...
        let out = values("mv, a{1}b{2}c{3}:{a=1}a:{b=1}b:{c=1}c:{a=1}, 1", 7);
        let nums: Vec<f64> = out.iter().filter_map(Value::as_f64).collect();
        assert_eq!(nums, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn zero_order_ignores_history() {
        let out = values("mv, a{1}b{2}:{a=1}a:{b=1}, 0", 10);
        assert!(out.iter().all(|v| *v == Value::Num(1.0)));
    }

    #[test]
    fn string_symbol_values_come_back_as_strings() {
        let out = values("mv, x{c4}:{x=1}", 2);
        assert_eq!(out[0], Value::Str("c4".into()));
    }

    #[test]
    fn reset_replays() {
        let mut factory = Factory::new(3);
        let mut pmtr = factory.build("mv").unwrap();
        let ctx = Context::new();
        let first: Vec<Value> = (0..30).map(|t| pmtr.produce(t, &ctx)).collect();
        pmtr.reset();
        let second: Vec<Value> = (0..30).map(|t| pmtr.produce(t, &ctx)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn non_positive_weights_fail_validation() {
        let mut factory = Factory::new(0);
        let pmtr = factory.build("mv, a{1}b{2}:{a=1|b=0}").unwrap();
        assert!(pmtr.check_args().is_err());
        assert!(factory.build("mv").unwrap().check_args().is_ok());
    }

    #[test]
    fn transition_renders_canonically() {
        let mut factory = Factory::new(0);
        let a = factory.build("mv, a{1} b{2} :{a=1|b=1}").unwrap();
        let b = factory.build(&a.describe_full()).unwrap();
        assert_eq!(a.describe_full(), b.describe_full());
    }

    #[test]
    fn analysis_reproduces_a_deterministic_cycle() {
        // 1 -> 2 -> 3 -> 1 at first order.
        let out = values("mga, (bg, oc, (1, 2, 3)), 9, 1, 1", 7);
        let nums: Vec<f64> = out.iter().filter_map(Value::as_f64).collect();
        assert_eq!(nums.len(), 7);
        for pair in nums.windows(2) {
            let expected = if pair[0] == 3.0 { 1.0 } else { pair[0] + 1.0 };
            assert_eq!(pair[1], expected, "out of sequence: {nums:?}");
        }
    }

    #[test]
    fn analysis_draws_only_observed_values() {
        let out = values("mga", 200);
        for v in out {
            assert!(matches!(v.as_f64(), Some(0.0 | 3.0 | 6.0 | 9.0)), "unobserved value: {v:?}");
        }
    }

    #[test]
    fn analysis_renders_its_arguments() {
        let mut factory = Factory::new(0);
        let pmtr = factory.build("mga, (bg, oc, (1, 2)), 4, 1, 0").unwrap();
        assert_eq!(
            pmtr.describe_full(),
            "markovGeneratorAnalysis, (basketGen, orderedCyclic, (1, 2)), 4, 1, (constant, 0)"
        );
    }

    #[test]
    fn analysis_limits() {
        let mut factory = Factory::new(0);
        assert!(factory.build("mga, (c, 1), 0, 1, 0").unwrap().check_args().is_err());
        assert!(factory.build("mga, (c, 1), 5, 0, 0").unwrap().check_args().is_err());
        assert!(factory.build("mga, (c, 1), 5, 1, 0").unwrap().check_args().is_ok());
        assert!(matches!(
            factory.build("mga, (c, 1), 5, 10, 0"),
            Err(PmtrError::Value { .. })
        ));
        assert!(matches!(
            factory.build("mga, (c, 1), 2000000, 1, 0"),
            Err(PmtrError::Value { .. })
        ));
    }

    #[test]
    fn analysis_reset_replays() {
        let mut factory = Factory::new(5);
        let mut pmtr = factory.build("mga, (ru, 0, 4), 20, 2, (bg, oc, (0, 1, 2))").unwrap();
        let ctx = Context::new();
        let first: Vec<Value> = (0..30).map(|t| pmtr.produce(t, &ctx)).collect();
        pmtr.reset();
        let second: Vec<Value> = (0..30).map(|t| pmtr.produce(t, &ctx)).collect();
        assert_eq!(first, second);
    }
}
