// Logistic map and chaotic baskets.
//
// `logisticMap` iterates live, one step per call. The Hénon and Lorenz
// baskets run their map at construction time, collect the chosen
// coordinates, normalize the collection, and then select from it like any
// other unit series. Coefficient generators are sampled at simulated steps
// 0, 1, 2, ... while the basket fills.

use crate::args::{ArgKind, ArgSpec, Args};
use crate::chaos::{self, HenonMap, LorenzMap};
use crate::error::{PmtrError, ValidationFailure};
use crate::factory::{BuildEnv, GeneratorEntry};
use crate::generator::{Generator, Pmtr};
use crate::unit;
use crate::value::{Context, Value};

use super::{Pool, UnitSeries, ensure};

const LOGISTIC_ARGS: &[ArgSpec] = &[
    ArgSpec::new("init", ArgKind::Num, "0.5"),
    ArgSpec::new("p", ArgKind::NumOrGen, "(bg, rc, (3, 3.2, 3.57))"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
];

const HENON_ARGS: &[ArgSpec] = &[
    ArgSpec::new("x", ArgKind::Num, "0.5"),
    ArgSpec::new("y", ArgKind::Num, "0.5"),
    ArgSpec::new("a", ArgKind::NumOrGen, "1.4"),
    ArgSpec::new("b", ArgKind::NumOrGen, "0.3"),
    ArgSpec::new("count", ArgKind::Int, "1000"),
    ArgSpec::new("select", ArgKind::Str, "x"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

const LORENZ_ARGS: &[ArgSpec] = &[
    ArgSpec::new("x", ArgKind::Num, "1"),
    ArgSpec::new("y", ArgKind::Num, "1"),
    ArgSpec::new("z", ArgKind::Num, "1"),
    ArgSpec::new("r", ArgKind::NumOrGen, "28"),
    ArgSpec::new("s", ArgKind::NumOrGen, "10"),
    ArgSpec::new("b", ArgKind::NumOrGen, "2.66666"),
    ArgSpec::new("count", ArgKind::Int, "1000"),
    ArgSpec::new("select", ArgKind::Str, "xyz"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![
        GeneratorEntry {
            name: "logisticMap",
            acronyms: &["lm"],
            signature: LOGISTIC_ARGS,
            build: build_logistic,
        },
        GeneratorEntry {
            name: "henonBasket",
            acronyms: &["hb"],
            signature: HENON_ARGS,
            build: build_henon,
        },
        GeneratorEntry {
            name: "lorenzBasket",
            acronyms: &["lb"],
            signature: LORENZ_ARGS,
            build: build_lorenz,
        },
    ]
}

/// The logistic map `x <- p x (1 - x)`, de-normalized onto a moving range.
///
/// `p` is a generator, or a preset name (`bi`, `quad`, `chaos`,
/// `periodic01`) that fixes it.
#[derive(Debug)]
pub struct LogisticMap {
    init: f64,
    x: f64,
    p: Pmtr,
    preset: Option<f64>,
    min: Pmtr,
    max: Pmtr,
    record: Vec<String>,
}

fn build_logistic(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let init = args.num(0)?;
    let p = args.generator(1)?;
    let preset = match p.constant_value() {
        Some(Value::Str(name)) => Some(chaos::logistic_preset(&name).ok_or_else(|| {
            PmtrError::value("logisticMap", format!("'{name}' is not a logistic preset"))
        })?),
        _ => None,
    };
    Ok(Box::new(LogisticMap {
        init,
        x: init,
        p,
        preset,
        min: args.generator(2)?,
        max: args.generator(3)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for LogisticMap {
    fn type_name(&self) -> &'static str {
        "logisticMap"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let p = match self.preset {
            Some(p) => p,
            None => self.p.produce_num(step, ctx),
        };
        self.x = unit::limit(chaos::logistic(p, self.x));
        let min = self.min.produce_num(step, ctx);
        let max = self.max.produce_num(step, ctx);
        Value::Num(unit::denorm(self.x, min, max))
    }

    fn reset(&mut self) {
        self.x = self.init;
        self.p.reset();
        self.min.reset();
        self.max.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.p, &self.min, &self.max]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        ensure(
            self.init > 0.0 && self.init <= 1.0,
            "logisticMap",
            "initial value must be greater than 0 and at most 1",
        )
    }
}

/// Parse a coordinate selection such as `xy` against the allowed axes.
fn coordinate_select(tag: &str, text: &str, axes: &str) -> Result<Vec<usize>, PmtrError> {
    let text = text.trim().to_ascii_lowercase();
    let mut picks = Vec::new();
    for ch in text.chars() {
        match axes.find(ch) {
            Some(i) if !picks.contains(&i) => picks.push(i),
            _ => {
                return Err(PmtrError::value(
                    tag,
                    format!("'{text}' must combine the axes {axes} without repeats"),
                ));
            }
        }
    }
    if picks.is_empty() {
        return Err(PmtrError::value(tag, format!("choose at least one of the axes {axes}")));
    }
    Ok(picks)
}

fn basket_count(args: &Args, index: usize, env: &BuildEnv<'_>) -> Result<usize, PmtrError> {
    let count = args.int(index)?.unsigned_abs();
    let ceiling = env.config().prime_length_max;
    if count > ceiling as u64 {
        return Err(PmtrError::value(
            args.tag(),
            format!("count {count} is beyond the limit of {ceiling}"),
        ));
    }
    Ok(count as usize)
}

/// Fill a basket of `count` values by stepping a map; `step` returns the
/// coordinates at simulated step `t`.
fn fill_basket(count: usize, picks: &[usize], mut step: impl FnMut(i64) -> Vec<f64>) -> Vec<f64> {
    let mut basket = Vec::with_capacity(count);
    let mut t = 0;
    while basket.len() < count {
        let point = step(t);
        basket.extend(picks.iter().map(|&i| point[i]).take(count - basket.len()));
        t += 1;
    }
    unit::unit_norm_range(&basket, None)
}

fn build_henon(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let (x, y) = (args.num(0)?, args.num(1)?);
    let mut a = args.generator(2)?;
    let mut b = args.generator(3)?;
    let count = basket_count(args, 4, env)?;
    let text = args.str(5)?;
    let picks = coordinate_select("henonBasket", &text, "xy")?;
    args.set_rendering(5, text.trim().to_ascii_lowercase());
    let min = args.generator(6)?;
    let max = args.generator(7)?;
    let policy = args.selection(8)?;

    let ctx = Context::new();
    let mut map = HenonMap::new(1.4, 0.3, x, y);
    let series = fill_basket(count, &picks, |t| {
        let (ca, cb) = (a.produce_num(t, &ctx), b.produce_num(t, &ctx));
        let (x, y) = map.step(ca, cb);
        vec![x, y]
    });
    a.reset();
    b.reset();
    Ok(Box::new(ChaoticBasket {
        series: UnitSeries {
            name: "henonBasket",
            pool: Pool::new(series, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
            min,
            max,
            problem: (count == 0).then_some("count must be greater than zero"),
            record: args.record().to_vec(),
        },
        coefficients: vec![a, b],
    }))
}

fn build_lorenz(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let (x, y, z) = (args.num(0)?, args.num(1)?, args.num(2)?);
    let mut r = args.generator(3)?;
    let mut s = args.generator(4)?;
    let mut b = args.generator(5)?;
    let count = basket_count(args, 6, env)?;
    let text = args.str(7)?;
    let picks = coordinate_select("lorenzBasket", &text, "xyz")?;
    args.set_rendering(7, text.trim().to_ascii_lowercase());
    let min = args.generator(8)?;
    let max = args.generator(9)?;
    let policy = args.selection(10)?;

    let ctx = Context::new();
    let mut map = LorenzMap::new(x, y, z, env.config().lorenz_step);
    let series = fill_basket(count, &picks, |t| {
        let (cr, cs, cb) = (r.produce_num(t, &ctx), s.produce_num(t, &ctx), b.produce_num(t, &ctx));
        let (x, y, z) = map.step(cr, cs, cb);
        vec![x, y, z]
    });
    r.reset();
    s.reset();
    b.reset();
    Ok(Box::new(ChaoticBasket {
        series: UnitSeries {
            name: "lorenzBasket",
            pool: Pool::new(series, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
            min,
            max,
            problem: (count == 0).then_some("count must be greater than zero"),
            record: args.record().to_vec(),
        },
        coefficients: vec![r, s, b],
    }))
}

/// A unit series filled from a chaotic map, plus the coefficient generators
/// that shaped it.
#[derive(Debug)]
pub struct ChaoticBasket {
    series: UnitSeries,
    coefficients: Vec<Pmtr>,
}

impl Generator for ChaoticBasket {
    fn type_name(&self) -> &'static str {
        self.series.type_name()
    }

    fn describe_args(&self) -> Vec<String> {
        self.series.describe_args()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        self.series.produce(step, ctx)
    }

    fn reset(&mut self) {
        self.series.reset();
        for c in &mut self.coefficients {
            c.reset();
        }
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        let mut subs = self.series.sub_generators();
        subs.extend(self.coefficients.iter());
        subs
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        self.series.check_args()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::PmtrError;
    use crate::factory::Factory;
    use crate::value::Context;

    fn nums(text: &str, n: usize) -> Vec<f64> {
        let mut factory = Factory::new(11);
        let mut pmtr = factory.build(text).unwrap();
        let ctx = Context::new();
        (0..n as i64).map(|t| pmtr.produce_num(t, &ctx)).collect()
    }

    #[test]
    fn logistic_map_iterates_and_scales() {
        let out = nums("lm, 0.5, 2, 0, 10", 3);
        // x stays at 0.5 for p = 2.
        assert_eq!(out, vec![5.0, 5.0, 5.0]);
        let out = nums("lm, 0.1, 4, 0, 1", 2);
        assert!((out[0] - 0.36).abs() < 1e-12, "out of range: {}", out[0]);
        assert!((out[1] - 0.9216).abs() < 1e-12, "out of range: {}", out[1]);
    }

    #[test]
    fn logistic_presets_by_name() {
        let out = nums("lm, 0.5, bi, 0, 1", 1);
        assert!((out[0] - 0.8).abs() < 1e-12, "out of range: {}", out[0]);
        let mut factory = Factory::new(0);
        assert!(matches!(factory.build("lm, 0.5, wobbly"), Err(PmtrError::Value { .. })));
    }

    #[test]
    fn logistic_init_must_be_in_unit_interval() {
        let mut factory = Factory::new(0);
        assert!(factory.build("lm, 0, 3").unwrap().check_args().is_err());
        assert!(factory.build("lm, 1, 3").unwrap().check_args().is_ok());
    }

    #[test]
    fn henon_basket_values_fill_the_range() {
        let out = nums("hb, 0.5, 0.5, 1.4, 0.3, 200, xy, 10, 20, oc", 200);
        let lo = out.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(lo, 10.0);
        assert_eq!(hi, 20.0);
    }

    #[test]
    fn basket_select_strings_are_checked() {
        let mut factory = Factory::new(0);
        assert!(factory.build("hb, 0.5, 0.5, 1.4, 0.3, 10, xz").is_err());
        assert!(factory.build("lb, 1, 1, 1, 28, 10, 2.66, 10, zyx").is_ok());
        assert!(factory.build("lb, 1, 1, 1, 28, 10, 2.66, 10, xx").is_err());
    }

    #[test]
    fn lorenz_basket_is_deterministic() {
        let a = nums("lb, 1, 1, 1, 28, 10, 2.66666, 100, x, 0, 1, oc", 50);
        let b = nums("lb, 1, 1, 1, 28, 10, 2.66666, 100, x, 0, 1, oc", 50);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
