// Grid quantization of another generator.
//
// Every call rebuilds the grid by sampling the step generator `count` times,
// then pulls the source value toward its nearest line.

use tracing::warn;

use crate::args::{ArgKind, ArgSpec, Args};
use crate::error::{PmtrError, ValidationFailure};
use crate::factory::{BuildEnv, GeneratorEntry, constant_num};
use crate::generator::{Generator, Pmtr};
use crate::quantize::Quantizer;
use crate::value::{Context, Value};

use super::ensure;

const QUANTIZE_ARGS: &[ArgSpec] = &[
    ArgSpec::new("anchor", ArgKind::NumOrGen, "(c, 0)"),
    ArgSpec::new("step", ArgKind::NumOrGen, "(c, 0.25)"),
    ArgSpec::new("count", ArgKind::Int, "1"),
    ArgSpec::new("pull", ArgKind::NumOrGen, "(c, 1)"),
    ArgSpec::new("source", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![GeneratorEntry {
        name: "quantize",
        acronyms: &["q"],
        signature: QUANTIZE_ARGS,
        build: build_quantize,
    }]
}

#[derive(Debug)]
pub struct Quantize {
    anchor: Pmtr,
    step: Pmtr,
    count: i64,
    pull: Pmtr,
    source: Pmtr,
    quantizer: Quantizer,
    record: Vec<String>,
}

fn build_quantize(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let count = args.int(2)?;
    let ceiling = env.config().grid_step_max;
    if count.unsigned_abs() > ceiling as u64 {
        return Err(PmtrError::value(
            "quantize",
            format!("step count {count} exceeds the limit of {ceiling}"),
        ));
    }
    Ok(Box::new(Quantize {
        anchor: args.generator(0)?,
        step: args.generator(1)?,
        count,
        pull: args.generator(3)?,
        source: args.generator(4)?,
        quantizer: Quantizer::new(env.config().loop_limit),
        record: args.record().to_vec(),
    }))
}

impl Generator for Quantize {
    fn type_name(&self) -> &'static str {
        "quantize"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let mut grid = Vec::with_capacity(self.count.max(0) as usize);
        for _ in 0..self.count.max(0) {
            let width = self.step.produce_num(step, ctx).abs();
            if width > 0.0 && width.is_finite() {
                grid.push(width);
            }
        }
        if grid.is_empty() {
            warn!(step, "quantize grid has no usable widths; using 1");
            grid.push(1.0);
        }
        let anchor = self.anchor.produce_num(step, ctx);
        let fill = self.source.produce_num(step, ctx);
        let pull = self.pull.produce_num(step, ctx);
        Value::Num(self.quantizer.attract(fill, pull, anchor, &grid))
    }

    fn reset(&mut self) {
        self.anchor.reset();
        self.step.reset();
        self.pull.reset();
        self.source.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.anchor, &self.step, &self.pull, &self.source]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        ensure(self.count > 0, "quantize", "step count must be greater than zero")?;
        ensure(
            constant_num(&self.step) != Some(0.0),
            "quantize",
            "a constant step width of zero makes no grid",
        )
    }
}
