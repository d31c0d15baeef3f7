// Baskets filled from another generator at construction.
//
// The source is sampled once per step 0..count with an empty context and the
// results are frozen; reset rewinds the selection, not the contents.

use crate::args::{ArgKind, ArgSpec, Args};
use crate::error::{PmtrError, ValidationFailure};
use crate::factory::{BuildEnv, GeneratorEntry};
use crate::generator::{Generator, Pmtr};
use crate::unit::{self, UnitBound};
use crate::value::{Context, Value};

use super::{Pool, UnitSeries, ensure};

const BASKET_FILL_ARGS: &[ArgSpec] = &[
    ArgSpec::new("selection", ArgKind::Str, "oc"),
    ArgSpec::new("source", ArgKind::Gen, "(ru, 0, 1)"),
    ArgSpec::new("valueCount", ArgKind::Int, "10"),
];

const BASKET_FILL_SELECT_ARGS: &[ArgSpec] = &[
    ArgSpec::new("source", ArgKind::Gen, "(ru, 0, 1)"),
    ArgSpec::new("valueCount", ArgKind::Int, "10"),
    ArgSpec::new("control", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

const MASK_SCALE_ARGS: &[ArgSpec] = &[
    ArgSpec::new("source", ArgKind::Gen, "(lp, 100, 120, wid, oc)"),
    ArgSpec::new("valueCount", ArgKind::Int, "120"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "3"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![
        GeneratorEntry {
            name: "basketFill",
            acronyms: &["bf"],
            signature: BASKET_FILL_ARGS,
            build: build_basket_fill,
        },
        GeneratorEntry {
            name: "basketFillSelect",
            acronyms: &["bfs"],
            signature: BASKET_FILL_SELECT_ARGS,
            build: build_basket_fill_select,
        },
        GeneratorEntry {
            name: "maskScale",
            acronyms: &["ms"],
            signature: MASK_SCALE_ARGS,
            build: build_mask_scale,
        },
    ]
}

/// Read a value-count slot, enforcing the configured ceiling.
fn count_arg(args: &Args, index: usize, env: &BuildEnv<'_>) -> Result<i64, PmtrError> {
    let count = args.int(index)?;
    let ceiling = env.config().prime_length_max;
    if count.unsigned_abs() > ceiling as u64 {
        return Err(PmtrError::value(
            args.tag(),
            format!("value count {count} is beyond the limit of {ceiling}"),
        ));
    }
    Ok(count)
}

fn fill(source: &mut Pmtr, count: usize) -> Vec<Value> {
    let ctx = Context::new();
    (0..count as i64).map(|t| source.produce(t, &ctx)).collect()
}

/// A frozen run of a source generator, returned through a selector.
#[derive(Debug)]
pub struct BasketFill {
    source: Pmtr,
    pool: Pool<Value>,
    record: Vec<String>,
}

fn build_basket_fill(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let policy = args.selection(0)?;
    let mut source = args.generator(1)?;
    // A zero count still takes one value.
    let count = count_arg(args, 2, env)?.unsigned_abs().max(1) as usize;
    let basket = fill(&mut source, count);
    Ok(Box::new(BasketFill {
        source,
        pool: Pool::new(basket, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
        record: args.record().to_vec(),
    }))
}

impl Generator for BasketFill {
    fn type_name(&self) -> &'static str {
        "basketFill"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, _step: i64, _ctx: &Context) -> Value {
        self.pool.next().unwrap_or(Value::Num(0.0))
    }

    fn reset(&mut self) {
        self.pool.reset();
        self.source.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        ensure(!self.pool.is_empty(), "basketFill", "the basket is empty")
    }
}

/// A frozen run of a source generator, indexed by a unit control value.
#[derive(Debug)]
pub struct BasketFillSelect {
    source: Pmtr,
    basket: Vec<Value>,
    bounds: Vec<UnitBound>,
    control: Pmtr,
    record: Vec<String>,
}

fn build_basket_fill_select(
    args: &mut Args,
    env: &mut BuildEnv<'_>,
) -> Result<Box<dyn Generator>, PmtrError> {
    let mut source = args.generator(0)?;
    let count = count_arg(args, 1, env)?.unsigned_abs().max(1) as usize;
    let basket = fill(&mut source, count);
    Ok(Box::new(BasketFillSelect {
        source,
        bounds: unit::unit_boundary_equal(basket.len()),
        basket,
        control: args.generator(2)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for BasketFillSelect {
    fn type_name(&self) -> &'static str {
        "basketFillSelect"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let u = unit::limit(self.control.produce_num(step, ctx));
        let pos = unit::unit_boundary_position(u, &self.bounds);
        self.basket.get(pos).cloned().unwrap_or(Value::Num(0.0))
    }

    fn reset(&mut self) {
        self.source.reset();
        self.control.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source, &self.control]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        ensure(!self.basket.is_empty(), "basketFillSelect", "the basket is empty")
    }
}

/// A frozen run of a source generator, normalized to the unit interval and
/// rescaled into a moving range.
#[derive(Debug)]
pub struct MaskScale {
    source: Pmtr,
    series: UnitSeries,
}

fn build_mask_scale(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let mut source = args.generator(0)?;
    let count = count_arg(args, 1, env)?;
    let ctx = Context::new();
    let raw: Vec<f64> = (0..count.max(0)).map(|t| source.produce_num(t, &ctx)).collect();
    let min = args.generator(2)?;
    let max = args.generator(3)?;
    let policy = args.selection(4)?;
    Ok(Box::new(MaskScale {
        source,
        series: UnitSeries {
            name: "maskScale",
            pool: Pool::new(
                unit::unit_norm_range(&raw, None),
                policy,
                env.fork_rng(),
                env.config().non_repeat_retry_limit,
            ),
            min,
            max,
            problem: (count < 1).then_some("value count must be 1 or greater"),
            record: args.record().to_vec(),
        },
    }))
}

impl Generator for MaskScale {
    fn type_name(&self) -> &'static str {
        "maskScale"
    }

    fn describe_args(&self) -> Vec<String> {
        self.series.describe_args()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        self.series.produce(step, ctx)
    }

    fn reset(&mut self) {
        self.source.reset();
        self.series.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source, &self.series.min, &self.series.max]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        self.series.check_args()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PmtrError;
    use crate::factory::Factory;
    use crate::value::{Context, Value};

    fn values(text: &str, n: usize) -> Vec<Value> {
        let mut factory = Factory::new(13);
        let mut pmtr = factory.build(text).unwrap();
        let ctx = Context::new();
        (0..n as i64).map(|t| pmtr.produce(t, &ctx)).collect()
    }

    fn nums(text: &str, n: usize) -> Vec<f64> {
        values(text, n).iter().filter_map(Value::as_f64).collect()
    }

    #[test]
    fn basket_fill_freezes_a_run_of_the_source() {
        assert_eq!(nums("bf, oc, (bg, oc, (3, 100)), 3", 5), vec![3.0, 100.0, 3.0, 3.0, 100.0]);
    }

    #[test]
    fn basket_fill_repeats_random_draws() {
        let out = nums("bf, oc, (ru, 0, 1), 4", 12);
        assert_eq!(out[..4], out[4..8]);
        assert_eq!(out[..4], out[8..]);
    }

    #[test]
    fn basket_fill_counts() {
        // Zero becomes one; negatives count by magnitude.
        assert_eq!(nums("bf, oc, (a, 0, (c, 1)), 0", 3), vec![0.0, 0.0, 0.0]);
        assert_eq!(nums("bf, oc, (a, 0, (c, 1)), -2", 3), vec![0.0, 1.0, 0.0]);
        let mut factory = Factory::new(0);
        assert!(matches!(factory.build("bf, oc, (c, 1), 5000000"), Err(PmtrError::Value { .. })));
    }

    #[test]
    fn basket_fill_keeps_strings() {
        let out = values("bf, oc, (bg, oc, (c4, d4)), 2", 3);
        assert_eq!(out, vec![Value::Str("c4".into()), Value::Str("d4".into()), Value::Str("c4".into())]);
    }

    #[test]
    fn basket_fill_select_indexes_by_unit() {
        assert_eq!(nums("bfs, (bg, oc, (20, 30)), 2, (bg, oc, (0.2, 0.8))", 3), vec![20.0, 30.0, 20.0]);
        assert_eq!(nums("bfs, (bg, oc, (20, 30)), 2, 7", 1), vec![30.0]);
    }

    #[test]
    fn mask_scale_rescales_the_frozen_series() {
        let out = nums("ms, (bg, oc, (0, 5, 10)), 3, 100, 200, oc", 4);
        assert_eq!(out, vec![100.0, 150.0, 200.0, 100.0]);
    }

    #[test]
    fn mask_scale_default_stays_in_range() {
        for v in nums("ms", 240) {
            assert!((0.0..=3.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn mask_scale_needs_a_positive_count() {
        let mut factory = Factory::new(0);
        assert!(factory.build("ms, (ru, 0, 1), 0").unwrap().check_args().is_err());
        assert!(factory.build("ms").unwrap().check_args().is_ok());
    }
}
