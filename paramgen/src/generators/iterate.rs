// Iteration combinators.
//
// These wrap other generators and change how their values are consumed:
//
// - `iterateGroup` repeats one source value, or discards source values,
//   according to a count generator.
// - `iterateWindow` picks a generator from a list and draws a run of values
//   from it.
// - `iterateHold` and `iterateSelect` fill a pool from the source, serve
//   values from it, and refill after a number of calls set by the refresh
//   generator.
// - `iterateCross` interpolates between two generators.
//
// A count that keeps coming out degenerate (zero, or only discards) would
// never produce anything; after `fail_limit` rounds one value is forced.

use std::collections::VecDeque;

use paramgen_prng::SeededRng;
use tracing::warn;

use crate::args::{ArgKind, ArgSpec, Args};
use crate::error::PmtrError;
use crate::factory::{BuildEnv, GeneratorEntry};
use crate::generator::{Generator, Pmtr};
use crate::selector::{SelectionPolicy, Selector};
use crate::stream::RngStream;
use crate::unit::{self, UnitBound};
use crate::value::{Context, Value};

use super::count_of;

const GROUP_ARGS: &[ArgSpec] = &[
    ArgSpec::new("source", ArgKind::NumOrGen, "(ru, 0, 1)"),
    ArgSpec::new("count", ArgKind::NumOrGen, "(bg, rc, (-3, 1, -1, 5))"),
];

const WINDOW_ARGS: &[ArgSpec] = &[
    ArgSpec::new("generators", ArgKind::GenList, "((ru, 0, 1), (bg, oc, (0, 0.5, 1)))"),
    ArgSpec::new("count", ArgKind::NumOrGen, "(bg, oc, (8, 4, -2))"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

const HOLD_ARGS: &[ArgSpec] = &[
    ArgSpec::new("source", ArgKind::NumOrGen, "(ru, 0, 1)"),
    ArgSpec::new("size", ArgKind::NumOrGen, "(bg, rc, (2, 3, 4))"),
    ArgSpec::new("refresh", ArgKind::NumOrGen, "(bg, oc, (12, 24))"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

const SELECT_ARGS: &[ArgSpec] = &[
    ArgSpec::new("source", ArgKind::NumOrGen, "(ru, 0, 1)"),
    ArgSpec::new("size", ArgKind::NumOrGen, "(bg, rc, (10, 11, 12))"),
    ArgSpec::new("refresh", ArgKind::NumOrGen, "(bg, oc, (12, 24))"),
    ArgSpec::new("select", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

const CROSS_ARGS: &[ArgSpec] = &[
    ArgSpec::new("a", ArgKind::NumOrGen, "(ru, 0, 1)"),
    ArgSpec::new("b", ArgKind::NumOrGen, "(bg, oc, (0, 0.5, 1))"),
    ArgSpec::new("control", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![
        GeneratorEntry {
            name: "iterateGroup",
            acronyms: &["ig"],
            signature: GROUP_ARGS,
            build: build_group,
        },
        GeneratorEntry {
            name: "iterateWindow",
            acronyms: &["iw"],
            signature: WINDOW_ARGS,
            build: build_window,
        },
        GeneratorEntry {
            name: "iterateHold",
            acronyms: &["ih"],
            signature: HOLD_ARGS,
            build: build_hold,
        },
        GeneratorEntry {
            name: "iterateSelect",
            acronyms: &["is"],
            signature: SELECT_ARGS,
            build: build_select,
        },
        GeneratorEntry {
            name: "iterateCross",
            acronyms: &["ic"],
            signature: CROSS_ARGS,
            build: build_cross,
        },
    ]
}

/// Repeats or discards source values.
///
/// A count `n > 0` draws one source value and returns it `n` times; `n < 0`
/// draws and drops `|n|` values and asks the count generator again.
#[derive(Debug)]
pub struct IterateGroup {
    source: Pmtr,
    count: Pmtr,
    buffer: VecDeque<Value>,
    fail_limit: usize,
    ceiling: usize,
    record: Vec<String>,
}

fn build_group(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    Ok(Box::new(IterateGroup {
        source: args.generator(0)?,
        count: args.generator(1)?,
        buffer: VecDeque::new(),
        fail_limit: env.config().fail_limit,
        ceiling: env.config().prime_length_max,
        record: args.record().to_vec(),
    }))
}

impl Generator for IterateGroup {
    fn type_name(&self) -> &'static str {
        "iterateGroup"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let mut fails = 0;
        while self.buffer.is_empty() {
            let n = count_of(self.count.produce_num(step, ctx), self.ceiling);
            if n < 0 {
                for _ in 0..n.unsigned_abs() {
                    self.source.produce(step, ctx);
                }
            } else if n > 0 {
                let value = self.source.produce(step, ctx);
                self.buffer.extend(std::iter::repeat_n(value, n as usize));
            }
            fails += 1;
            if fails > self.fail_limit && self.buffer.is_empty() {
                warn!(generator = "iterateGroup", "no values obtained; supplying one");
                self.buffer.push_back(self.source.produce(step, ctx));
            }
        }
        self.buffer.pop_front().unwrap_or(Value::Num(0.0))
    }

    fn reset(&mut self) {
        self.source.reset();
        self.count.reset();
        self.buffer.clear();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source, &self.count]
    }
}

/// Draws runs of values from generators picked out of a list.
///
/// Each round selects a generator and reads the count: `n > 0` draws `n`
/// values from it, `n < 0` discards `|n|` of its values.
#[derive(Debug)]
pub struct IterateWindow {
    generators: Vec<Pmtr>,
    count: Pmtr,
    picker: Selector<usize>,
    buffer: VecDeque<Value>,
    fail_limit: usize,
    ceiling: usize,
    record: Vec<String>,
}

fn build_window(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let generators = args.generators(0)?;
    let count = args.generator(1)?;
    let policy = args.selection(2)?;
    if generators.is_empty() {
        return Err(PmtrError::value("iterateWindow", "the generator list is empty"));
    }
    let picker = Selector::new(
        (0..generators.len()).collect(),
        policy,
        env.fork_rng(),
        env.config().non_repeat_retry_limit,
    )?;
    Ok(Box::new(IterateWindow {
        generators,
        count,
        picker,
        buffer: VecDeque::new(),
        fail_limit: env.config().fail_limit,
        ceiling: env.config().prime_length_max,
        record: args.record().to_vec(),
    }))
}

impl Generator for IterateWindow {
    fn type_name(&self) -> &'static str {
        "iterateWindow"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let mut fails = 0;
        while self.buffer.is_empty() {
            let pos = self.picker.next_value();
            let n = count_of(self.count.produce_num(step, ctx), self.ceiling);
            let chosen = &mut self.generators[pos];
            if n < 0 {
                for _ in 0..n.unsigned_abs() {
                    chosen.produce(step, ctx);
                }
            } else {
                for _ in 0..n {
                    self.buffer.push_back(chosen.produce(step, ctx));
                }
            }
            fails += 1;
            if fails > self.fail_limit && self.buffer.is_empty() {
                warn!(generator = "iterateWindow", "no values obtained; supplying one");
                self.buffer.push_back(chosen.produce(step, ctx));
            }
        }
        self.buffer.pop_front().unwrap_or(Value::Num(0.0))
    }

    fn reset(&mut self) {
        for g in &mut self.generators {
            g.reset();
        }
        self.count.reset();
        self.picker.reset();
        self.buffer.clear();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        let mut subs: Vec<&Pmtr> = self.generators.iter().collect();
        subs.push(&self.count);
        subs
    }
}

/// Refill schedule shared by `iterateHold` and `iterateSelect`.
///
/// The pool is refilled on the first call and then every `period` calls,
/// where `period` is read from the refresh generator after each refill. A
/// period of 0 never refills. The source is sampled at consecutive steps
/// counted across the generator's whole run.
#[derive(Debug)]
struct Refresh {
    size: Pmtr,
    refresh: Pmtr,
    pool: Vec<Value>,
    event_count: u64,
    event_total: i64,
    period: u64,
    ceiling: usize,
}

impl Refresh {
    fn new(size: Pmtr, refresh: Pmtr, ceiling: usize) -> Self {
        Self {
            size,
            refresh,
            pool: Vec::new(),
            event_count: 0,
            event_total: 0,
            period: 0,
            ceiling,
        }
    }

    /// Account for one call, refilling the pool when due. Returns whether
    /// the pool was refilled.
    fn tick(&mut self, source: &mut Pmtr, step: i64, ctx: &Context) -> bool {
        let due = self.event_total == 0 || (self.period != 0 && self.event_count >= self.period);
        let refilled = due && self.refill(source, step, ctx);
        if self.event_count == 0 || self.event_total == 0 {
            self.period = count_of(self.refresh.produce_num(step, ctx), self.ceiling).unsigned_abs();
        }
        self.event_count += 1;
        self.event_total += 1;
        refilled
    }

    fn refill(&mut self, source: &mut Pmtr, step: i64, ctx: &Context) -> bool {
        let mut size = count_of(self.size.produce_num(step, ctx), self.ceiling);
        if size <= 0 {
            // Keep serving the current pool until a usable size comes up.
            if !self.pool.is_empty() {
                return false;
            }
            warn!(size, "pool size is not positive and the pool is empty; supplying one value");
            size = 1;
        }
        self.pool.clear();
        for t in self.event_total..self.event_total + size {
            self.pool.push(source.produce(t, ctx));
        }
        self.event_count = 0;
        true
    }

    fn reset(&mut self) {
        self.size.reset();
        self.refresh.reset();
        self.pool.clear();
        self.event_count = 0;
        self.event_total = 0;
        self.period = 0;
    }
}

/// Serves values from a periodically refilled pool through a selector.
#[derive(Debug)]
pub struct IterateHold {
    source: Pmtr,
    schedule: Refresh,
    policy: SelectionPolicy,
    selector: Option<Selector<Value>>,
    rng: RngStream,
    retry_limit: usize,
    record: Vec<String>,
}

fn build_hold(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let source = args.generator(0)?;
    let size = args.generator(1)?;
    let refresh = args.generator(2)?;
    let policy = args.selection(3)?;
    Ok(Box::new(IterateHold {
        source,
        schedule: Refresh::new(size, refresh, env.config().prime_length_max),
        policy,
        selector: None,
        rng: RngStream::new(env.fork_rng()),
        retry_limit: env.config().non_repeat_retry_limit,
        record: args.record().to_vec(),
    }))
}

impl Generator for IterateHold {
    fn type_name(&self) -> &'static str {
        "iterateHold"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        if self.schedule.tick(&mut self.source, step, ctx) {
            let rng: SeededRng = self.rng.rng().fork();
            self.selector = Selector::new(self.schedule.pool.clone(), self.policy, rng, self.retry_limit).ok();
        }
        match self.selector.as_mut() {
            Some(selector) => selector.next_value(),
            None => Value::Num(0.0),
        }
    }

    fn reset(&mut self) {
        self.source.reset();
        self.schedule.reset();
        self.selector = None;
        self.rng.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source, &self.schedule.size, &self.schedule.refresh]
    }
}

/// Serves values from a periodically refilled pool, indexed by a unit
/// control split into equal partitions.
#[derive(Debug)]
pub struct IterateSelect {
    source: Pmtr,
    schedule: Refresh,
    select: Pmtr,
    bounds: Vec<UnitBound>,
    record: Vec<String>,
}

fn build_select(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let source = args.generator(0)?;
    let size = args.generator(1)?;
    let refresh = args.generator(2)?;
    Ok(Box::new(IterateSelect {
        source,
        schedule: Refresh::new(size, refresh, env.config().prime_length_max),
        select: args.generator(3)?,
        bounds: Vec::new(),
        record: args.record().to_vec(),
    }))
}

impl Generator for IterateSelect {
    fn type_name(&self) -> &'static str {
        "iterateSelect"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        if self.schedule.tick(&mut self.source, step, ctx) {
            self.bounds = unit::unit_boundary_equal(self.schedule.pool.len());
        }
        let u = unit::limit(self.select.produce_num(step, ctx));
        let pos = unit::unit_boundary_position(u, &self.bounds);
        self.schedule.pool.get(pos).cloned().unwrap_or(Value::Num(0.0))
    }

    fn reset(&mut self) {
        self.source.reset();
        self.schedule.reset();
        self.select.reset();
        self.bounds.clear();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source, &self.schedule.size, &self.schedule.refresh, &self.select]
    }
}

/// Cross-fades between two generators: control 0 gives `a`, 1 gives `b`.
#[derive(Debug)]
pub struct IterateCross {
    a: Pmtr,
    b: Pmtr,
    control: Pmtr,
    record: Vec<String>,
}

fn build_cross(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    Ok(Box::new(IterateCross {
        a: args.generator(0)?,
        b: args.generator(1)?,
        control: args.generator(2)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for IterateCross {
    fn type_name(&self) -> &'static str {
        "iterateCross"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let a = self.a.produce_num(step, ctx);
        let b = self.b.produce_num(step, ctx);
        let control = unit::limit(self.control.produce_num(step, ctx));
        Value::Num(unit::interpolate(control, a, b))
    }

    fn reset(&mut self) {
        self.a.reset();
        self.b.reset();
        self.control.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.a, &self.b, &self.control]
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GeneratorConfig;
    use crate::factory::Factory;
    use crate::value::Context;

    fn nums(text: &str, n: usize) -> Vec<f64> {
        let mut factory = Factory::new(17);
        let mut pmtr = factory.build(text).unwrap();
        let ctx = Context::new();
        (0..n as i64).map(|t| pmtr.produce_num(t, &ctx)).collect()
    }

    #[test]
    fn group_repeats_each_source_value() {
        let out = nums("ig, (bg, oc, (1, 2, 3)), 2", 6);
        assert_eq!(out, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn group_negative_counts_skip() {
        // -1 drops a value, then 1 passes the next through.
        let out = nums("ig, (bg, oc, (1, 2, 3, 4)), (bg, oc, (-1, 1))", 2);
        assert_eq!(out, vec![2.0, 4.0]);
    }

    #[test]
    fn group_forces_a_value_after_repeated_zero_counts() {
        let config = GeneratorConfig {
            fail_limit: 3,
            ..GeneratorConfig::default()
        };
        let mut factory = Factory::with_config(config, 0);
        let mut pmtr = factory.build("ig, (bg, oc, (5, 6)), 0").unwrap();
        let ctx = Context::new();
        assert_eq!(pmtr.produce_num(0, &ctx), 5.0);
        assert_eq!(pmtr.produce_num(1, &ctx), 6.0);
    }

    #[test]
    fn window_draws_runs_from_the_chosen_generator() {
        let out = nums("iw, ((c, 1), (c, 2)), 3, oc", 9);
        assert_eq!(out, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn window_negative_count_discards_from_the_chosen_generator() {
        // Round 1 picks the first list and takes 2; round 2 discards 1 from
        // the second list; round 3 picks the first list again.
        let out = nums("iw, ((bg, oc, (1, 2, 3, 4)), (bg, oc, (10, 20))), (bg, oc, (2, -1, 1)), oc", 4);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 20.0]);
    }

    #[test]
    fn hold_serves_from_a_pool_until_refresh() {
        let out = nums("ih, (bg, oc, (1, 2, 3, 4, 5, 6)), 2, 4, oc", 8);
        assert_eq!(out, vec![1.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 4.0]);
    }

    #[test]
    fn hold_with_zero_refresh_keeps_the_first_pool() {
        let out = nums("ih, (bg, oc, (1, 2, 3)), 2, 0, oc", 6);
        assert_eq!(out, vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn hold_with_empty_size_supplies_one_value() {
        let out = nums("ih, (bg, oc, (7, 8)), 0, 3, oc", 4);
        assert_eq!(out, vec![7.0, 7.0, 7.0, 7.0]);
    }

    #[test]
    fn select_indexes_the_pool_by_unit_control() {
        let out = nums("is, (bg, oc, (1, 2, 3, 4)), 4, 0, (bg, oc, (0, 0.3, 0.6, 0.99))", 4);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn cross_interpolates_between_sources() {
        let out = nums("ic, 10, 20, (bg, oc, (0, 0.25, 1, 2))", 4);
        assert_eq!(out, vec![10.0, 12.5, 20.0, 20.0]);
    }

    #[test]
    fn reset_restores_buffers() {
        let mut factory = Factory::new(9);
        let ctx = Context::new();
        for text in ["ig", "iw", "ih", "is", "ic"] {
            let mut pmtr = factory.build(text).unwrap();
            let first: Vec<f64> = (0..40).map(|t| pmtr.produce_num(t, &ctx)).collect();
            pmtr.reset();
            let second: Vec<f64> = (0..40).map(|t| pmtr.produce_num(t, &ctx)).collect();
            assert_eq!(first, second, "{text} did not replay after reset");
        }
    }
}
