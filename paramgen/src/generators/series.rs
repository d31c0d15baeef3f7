// Sieve, prime, and Fibonacci series generators.
//
// All of these compute their series once at construction. Lengths and sieve
// ranges are bounded by `GeneratorConfig::prime_length_max`; a negative
// length walks the same series in reverse.
//
// The sieveList logic slot takes three forms: a plain logic string, a logic
// string with a `lo, hi` suffix that overrides zMin and zMax, or a list of
// known members that is compressed into a sieve.

use crate::args::{ArgKind, ArgSpec, Args};
use crate::chaos::{self, PrimeFormat, PrimeSegment};
use crate::error::{PmtrError, SyntaxKind};
use crate::factory::{BuildEnv, GeneratorEntry};
use crate::generator::{Generator, Pmtr};
use crate::sieve::{Sieve, SieveBounds, SieveFormat};
use crate::unit;
use crate::value::{Context, Value};

use super::{Pool, SelectedSeries, UnitSeries};

const SIEVE_LIST_ARGS: &[ArgSpec] = &[
    ArgSpec::new("logic", ArgKind::StrOrList, "3|4"),
    ArgSpec::new("zMin", ArgKind::Int, "-12"),
    ArgSpec::new("zMax", ArgKind::Int, "12"),
    ArgSpec::new("format", ArgKind::Str, "int"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

const VALUE_SIEVE_ARGS: &[ArgSpec] = &[
    ArgSpec::new("logic", ArgKind::Str, "3&19|4&13@11"),
    ArgSpec::new("length", ArgKind::Int, "360"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
    ArgSpec::new("selection", ArgKind::Str, "oo"),
];

const SIEVE_FUNNEL_ARGS: &[ArgSpec] = &[
    ArgSpec::new("logic", ArgKind::Str, "3|4"),
    ArgSpec::new("length", ArgKind::Int, "24"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
    ArgSpec::new("fill", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

const LIST_PRIME_ARGS: &[ArgSpec] = &[
    ArgSpec::new("start", ArgKind::Int, "2"),
    ArgSpec::new("length", ArgKind::Int, "50"),
    ArgSpec::new("format", ArgKind::Str, "int"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

const VALUE_PRIME_ARGS: &[ArgSpec] = &[
    ArgSpec::new("start", ArgKind::Int, "2"),
    ArgSpec::new("length", ArgKind::Int, "50"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
    ArgSpec::new("selection", ArgKind::Str, "oo"),
];

const FIBONACCI_ARGS: &[ArgSpec] = &[
    ArgSpec::new("start", ArgKind::Int, "200"),
    ArgSpec::new("length", ArgKind::Int, "20"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![
        GeneratorEntry {
            name: "sieveList",
            acronyms: &["sl"],
            signature: SIEVE_LIST_ARGS,
            build: build_sieve_list,
        },
        GeneratorEntry {
            name: "valueSieve",
            acronyms: &["vs"],
            signature: VALUE_SIEVE_ARGS,
            build: build_value_sieve,
        },
        GeneratorEntry {
            name: "sieveFunnel",
            acronyms: &["sf"],
            signature: SIEVE_FUNNEL_ARGS,
            build: build_sieve_funnel,
        },
        GeneratorEntry {
            name: "listPrime",
            acronyms: &["lp"],
            signature: LIST_PRIME_ARGS,
            build: build_list_prime,
        },
        GeneratorEntry {
            name: "valuePrime",
            acronyms: &["vp"],
            signature: VALUE_PRIME_ARGS,
            build: build_value_prime,
        },
        GeneratorEntry {
            name: "fibonacciSeries",
            acronyms: &["fs"],
            signature: FIBONACCI_ARGS,
            build: build_fibonacci,
        },
    ]
}

/// Parse a sieve slot and canonicalize its rendering.
fn sieve_arg(args: &mut Args, index: usize) -> Result<Sieve, PmtrError> {
    let sieve = Sieve::parse(&args.str(index)?)?;
    args.set_rendering(index, sieve.to_string());
    Ok(sieve)
}

/// Read a signed length slot, enforcing the configured ceiling.
fn length_arg(args: &Args, index: usize, env: &BuildEnv<'_>) -> Result<i64, PmtrError> {
    let length = args.int(index)?;
    let ceiling = env.config().prime_length_max;
    if length.unsigned_abs() > ceiling as u64 {
        return Err(PmtrError::value(
            args.tag(),
            format!("length {length} is beyond the limit of {ceiling}"),
        ));
    }
    Ok(length)
}

/// Read the sieveList logic slot and canonicalize its rendering.
fn sieve_list_logic(args: &mut Args, env: &BuildEnv<'_>) -> Result<(Sieve, Option<SieveBounds>), PmtrError> {
    let Ok(values) = args.list(0) else {
        let (sieve, bounds) = Sieve::parse_bounded(&args.str(0)?)?;
        let rendering = match bounds {
            Some(bounds) => format!("{sieve}, {bounds}"),
            None => sieve.to_string(),
        };
        args.set_rendering(0, rendering);
        return Ok((sieve, bounds));
    };
    let mut members = Vec::with_capacity(values.len());
    for value in &values {
        match value.as_f64() {
            Some(n) if n.fract() == 0.0 => members.push(n as i64),
            _ => {
                return Err(PmtrError::value(
                    "sieveList",
                    format!("known member {value} is not an integer"),
                ));
            }
        }
    }
    let (Some(&lo), Some(&hi)) = (members.iter().min(), members.iter().max()) else {
        return Err(PmtrError::syntax(SyntaxKind::Sieve, "()", "no residual classes defined"));
    };
    let ceiling = env.config().sieve_compress_span_max;
    if hi.abs_diff(lo) > ceiling as u64 {
        return Err(PmtrError::value(
            "sieveList",
            format!("known members span {lo}..{hi}, wider than {ceiling}"),
        ));
    }
    let sieve = Sieve::compress(&members, lo, hi)?;
    args.set_rendering(0, sieve.to_string());
    Ok((sieve, None))
}

fn build_sieve_list(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let (sieve, bounds) = sieve_list_logic(args, env)?;
    let (a, b) = match bounds {
        Some(bounds) => (bounds.lo, bounds.hi),
        None => (args.int(1)?, args.int(2)?),
    };
    if a == b {
        return Err(PmtrError::value("sieveList", "zMin must not be equal to zMax"));
    }
    let (lo, hi) = (a.min(b), a.max(b));
    let ceiling = env.config().prime_length_max;
    if hi.abs_diff(lo) > ceiling as u64 {
        return Err(PmtrError::value(
            "sieveList",
            format!("z range {lo}..{hi} is wider than {ceiling}"),
        ));
    }
    let format = SieveFormat::parse(&args.str(3)?)?;
    args.set_rendering(3, format.to_string());
    let policy = args.selection(4)?;
    let segment = sieve.segment(lo, hi, format);
    Ok(Box::new(SelectedSeries {
        name: "sieveList",
        pool: Pool::new(segment, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
        problem: None,
        record: args.record().to_vec(),
    }))
}

fn build_value_sieve(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let sieve = sieve_arg(args, 0)?;
    let length = length_arg(args, 1, env)?;
    let mut series = if length == 0 {
        Vec::new()
    } else {
        sieve.segment(0, length.abs() - 1, SieveFormat::Unit)
    };
    if length < 0 {
        series.reverse();
    }
    let min = args.generator(2)?;
    let max = args.generator(3)?;
    let policy = args.selection(4)?;
    Ok(Box::new(UnitSeries {
        name: "valueSieve",
        pool: Pool::new(series, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
        min,
        max,
        problem: (length == 0).then_some("length must not be zero"),
        record: args.record().to_vec(),
    }))
}

/// Maps a unit control onto the nearest normalized sieve member.
#[derive(Debug)]
pub struct SieveFunnel {
    positions: Vec<f64>,
    min: Pmtr,
    max: Pmtr,
    fill: Pmtr,
    record: Vec<String>,
}

fn build_sieve_funnel(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let sieve = sieve_arg(args, 0)?;
    let length = length_arg(args, 1, env)?;
    let members: Vec<f64> = if length == 0 {
        Vec::new()
    } else {
        sieve.members(0, length.abs() - 1).into_iter().map(|z| z as f64).collect()
    };
    Ok(Box::new(SieveFunnel {
        positions: unit::unit_norm_range(&members, None),
        min: args.generator(2)?,
        max: args.generator(3)?,
        fill: args.generator(4)?,
        record: args.record().to_vec(),
    }))
}

impl SieveFunnel {
    /// The position nearest `u`; ties go to the higher position.
    fn nearest(&self, u: f64) -> f64 {
        self.positions
            .iter()
            .copied()
            .fold(None, |best: Option<f64>, p| match best {
                Some(b) if (u - b).abs() < (u - p).abs() => Some(b),
                Some(b) if (u - b).abs() == (u - p).abs() => Some(b.max(p)),
                _ => Some(p),
            })
            .unwrap_or(0.0)
    }
}

impl Generator for SieveFunnel {
    fn type_name(&self) -> &'static str {
        "sieveFunnel"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let u = unit::limit(self.fill.produce_num(step, ctx));
        let position = self.nearest(u);
        let min = self.min.produce_num(step, ctx);
        let max = self.max.produce_num(step, ctx);
        Value::Num(unit::denorm(position, min, max))
    }

    fn reset(&mut self) {
        self.min.reset();
        self.max.reset();
        self.fill.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.min, &self.max, &self.fill]
    }

    fn check_args(&self) -> Result<(), crate::error::ValidationFailure> {
        super::ensure(
            !self.positions.is_empty(),
            "sieveFunnel",
            "sieve segment is empty; choose a longer length",
        )
    }
}

/// The prime segment for `start` and a signed `length`.
fn primes(start: i64, length: i64, format: PrimeFormat) -> Vec<f64> {
    let mut series = PrimeSegment::new(start, length.unsigned_abs() as usize).render(format);
    if length < 0 {
        series.reverse();
    }
    series
}

fn build_list_prime(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let start = args.int(0)?;
    let length = length_arg(args, 1, env)?;
    let text = args.str(2)?;
    let format = PrimeFormat::parse(&text)
        .ok_or_else(|| PmtrError::syntax(SyntaxKind::Format, text, "prime format must be int, wid, unit, or bin"))?;
    args.set_rendering(2, format.name());
    let policy = args.selection(3)?;
    let series = primes(start, length, format);
    Ok(Box::new(SelectedSeries {
        name: "listPrime",
        pool: Pool::new(series, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
        problem: (length == 0).then_some("length must not be zero"),
        record: args.record().to_vec(),
    }))
}

fn build_value_prime(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let start = args.int(0)?;
    let length = length_arg(args, 1, env)?;
    let series = primes(start, length, PrimeFormat::Unit);
    let min = args.generator(2)?;
    let max = args.generator(3)?;
    let policy = args.selection(4)?;
    Ok(Box::new(UnitSeries {
        name: "valuePrime",
        pool: Pool::new(series, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
        min,
        max,
        problem: (length == 0).then_some("length must not be zero"),
        record: args.record().to_vec(),
    }))
}

fn build_fibonacci(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let start = args.int(0)?;
    let length = length_arg(args, 1, env)?;
    let last = start.max(0).unsigned_abs() + length.unsigned_abs();
    if last > chaos::FIBONACCI_FINITE_TERMS as u64 {
        return Err(PmtrError::value(
            "fibonacciSeries",
            format!(
                "start {start} and length {length} reach past the last finite term ({})",
                chaos::FIBONACCI_FINITE_TERMS
            ),
        ));
    }
    let terms = chaos::fibonacci_series(start.max(0) as usize, length.unsigned_abs() as usize);
    let mut series = unit::unit_norm_range(&terms, None);
    if length < 0 {
        series.reverse();
    }
    let min = args.generator(2)?;
    let max = args.generator(3)?;
    let policy = args.selection(4)?;
    let problem = if start < 1 {
        Some("start must be 1 or greater")
    } else if length == 0 {
        Some("length must not be zero")
    } else {
        None
    };
    Ok(Box::new(UnitSeries {
        name: "fibonacciSeries",
        pool: Pool::new(series, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
        min,
        max,
        problem,
        record: args.record().to_vec(),
    }))
}
