// Generators shaped by boundaries: rejection from a band, a binary threshold
// funnel, and a linear cycle that turns at its limits.

use crate::args::{ArgKind, ArgSpec, Args};
use crate::error::{PmtrError, ValidationFailure};
use crate::factory::{BuildEnv, GeneratorEntry, string_choice};
use crate::generator::{Generator, Pmtr};
use crate::quantize::{self, ThresholdMatch};
use crate::unit::{self, BoundaryMethod};
use crate::value::{Context, Value};

use super::ensure;

const MASK_REJECT_ARGS: &[ArgSpec] = &[
    ArgSpec::new("boundary", ArgKind::Str, "l"),
    ArgSpec::new("lower", ArgKind::NumOrGen, "(c, 0.25)"),
    ArgSpec::new("upper", ArgKind::NumOrGen, "(c, 0.75)"),
    ArgSpec::new("source", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

const FUNNEL_BINARY_ARGS: &[ArgSpec] = &[
    ArgSpec::new("thresholdMatch", ArgKind::Str, "u"),
    ArgSpec::new("threshold", ArgKind::NumOrGen, "(c, 0.5)"),
    ArgSpec::new("a", ArgKind::NumOrGen, "(c, 0)"),
    ArgSpec::new("b", ArgKind::NumOrGen, "(c, 1)"),
    ArgSpec::new("source", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

const CYCLIC_GEN_ARGS: &[ArgSpec] = &[
    ArgSpec::new("direction", ArgKind::Str, "ud"),
    ArgSpec::new("min", ArgKind::Num, "0"),
    ArgSpec::new("max", ArgKind::Num, "1"),
    ArgSpec::new("increment", ArgKind::Num, "0.125"),
];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![
        GeneratorEntry {
            name: "maskReject",
            acronyms: &["mr"],
            signature: MASK_REJECT_ARGS,
            build: build_mask_reject,
        },
        GeneratorEntry {
            name: "funnelBinary",
            acronyms: &["fb"],
            signature: FUNNEL_BINARY_ARGS,
            build: build_funnel_binary,
        },
        GeneratorEntry {
            name: "cyclicGen",
            acronyms: &["cg"],
            signature: CYCLIC_GEN_ARGS,
            build: build_cyclic_gen,
        },
    ]
}

/// Keeps a source out of the band between two generators.
#[derive(Debug)]
pub struct MaskReject {
    method: BoundaryMethod,
    lower: Pmtr,
    upper: Pmtr,
    source: Pmtr,
    record: Vec<String>,
}

fn build_mask_reject(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let method = BoundaryMethod::parse(&args.str(0)?)?;
    args.set_rendering(0, method.to_string());
    Ok(Box::new(MaskReject {
        method,
        lower: args.generator(1)?,
        upper: args.generator(2)?,
        source: args.generator(3)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for MaskReject {
    fn type_name(&self) -> &'static str {
        "maskReject"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let a = self.lower.produce_num(step, ctx);
        let b = self.upper.produce_num(step, ctx);
        let f = self.source.produce_num(step, ctx);
        Value::Num(unit::boundary_reject(a, b, f, self.method))
    }

    fn reset(&mut self) {
        self.lower.reset();
        self.upper.reset();
        self.source.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.lower, &self.upper, &self.source]
    }
}

/// Sends a source to one of two boundaries depending on a threshold.
#[derive(Debug)]
pub struct FunnelBinary {
    on_match: ThresholdMatch,
    threshold: Pmtr,
    a: Pmtr,
    b: Pmtr,
    source: Pmtr,
    record: Vec<String>,
}

fn build_funnel_binary(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let on_match = ThresholdMatch::parse(&args.str(0)?)?;
    args.set_rendering(0, on_match.to_string());
    Ok(Box::new(FunnelBinary {
        on_match,
        threshold: args.generator(1)?,
        a: args.generator(2)?,
        b: args.generator(3)?,
        source: args.generator(4)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for FunnelBinary {
    fn type_name(&self) -> &'static str {
        "funnelBinary"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let h = self.threshold.produce_num(step, ctx);
        let a = self.a.produce_num(step, ctx);
        let b = self.b.produce_num(step, ctx);
        let f = self.source.produce_num(step, ctx);
        Value::Num(quantize::funnel_binary(h, a, b, f, self.on_match))
    }

    fn reset(&mut self) {
        self.threshold.reset();
        self.a.reset();
        self.b.reset();
        self.source.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.threshold, &self.a, &self.b, &self.source]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    UpDown,
    DownUp,
    Up,
    Down,
}

const DIRECTIONS: &[(&str, &[&str])] = &[
    ("upDown", &["ud", "lud", "0"]),
    ("downUp", &["du", "ldu", "1"]),
    ("up", &["u", "lu", "2"]),
    ("down", &["d", "ld", "3"]),
];

/// Steps between two limits, turning or jumping back at the ends.
#[derive(Debug)]
pub struct CyclicGen {
    start: Direction,
    direction: Direction,
    min: f64,
    max: f64,
    increment: f64,
    cycle: f64,
    record: Vec<String>,
}

fn build_cyclic_gen(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let name = string_choice("cyclicGen", &args.str(0)?, DIRECTIONS)?;
    args.set_rendering(0, name);
    let start = match name {
        "upDown" => Direction::UpDown,
        "downUp" => Direction::DownUp,
        "up" => Direction::Up,
        _ => Direction::Down,
    };
    let min = args.num(1)?;
    Ok(Box::new(CyclicGen {
        start,
        direction: start,
        min,
        max: args.num(2)?,
        increment: args.num(3)?,
        cycle: min,
        record: args.record().to_vec(),
    }))
}

impl Generator for CyclicGen {
    fn type_name(&self) -> &'static str {
        "cyclicGen"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, _step: i64, _ctx: &Context) -> Value {
        match self.direction {
            Direction::UpDown => {
                self.cycle += self.increment;
                if self.cycle > self.max {
                    self.direction = Direction::DownUp;
                    self.cycle = self.max;
                }
            }
            Direction::DownUp => {
                self.cycle -= self.increment;
                if self.cycle < self.min {
                    self.direction = Direction::UpDown;
                    self.cycle = self.min;
                }
            }
            Direction::Up => {
                self.cycle = if self.cycle + self.increment > self.max {
                    self.min
                } else {
                    self.cycle + self.increment
                };
            }
            Direction::Down => {
                self.cycle = if self.cycle - self.increment < self.min {
                    self.max
                } else {
                    self.cycle - self.increment
                };
            }
        }
        Value::Num(self.cycle)
    }

    fn reset(&mut self) {
        self.direction = self.start;
        self.cycle = self.min;
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        ensure(self.min <= self.max, "cyclicGen", "minimum is larger than maximum")?;
        ensure(
            self.increment >= 0.0 && self.increment <= (self.max - self.min).abs(),
            "cyclicGen",
            "increment must fit within the range",
        )
    }
}
