// Cellular automaton generators.
//
// Both generators run the whole automaton at construction time. The rule and
// mutation generators are sampled once per generation (generation 0 is the
// seed row and still consumes one sample of each), then the table is read
// through an extraction format. `caList` returns the raw cell values or
// indices; `caValue` normalizes them and maps them onto a moving range.

use crate::args::{ArgKind, ArgSpec, Args};
use crate::automata::{Automaton, AutomatonSpec, TableFormat};
use crate::error::{PmtrError, ValidationFailure};
use crate::factory::{BuildEnv, GeneratorEntry};
use crate::generator::{Generator, Pmtr};
use crate::value::{Context, Value};

use super::{Pool, SelectedSeries, UnitSeries};

const CA_LIST_ARGS: &[ArgSpec] = &[
    ArgSpec::new("spec", ArgKind::Str, "f{f}i{c}x{81}y{120}"),
    ArgSpec::new("rule", ArgKind::NumOrGen, "0.25"),
    ArgSpec::new("mutation", ArgKind::NumOrGen, "0.0005"),
    ArgSpec::new("format", ArgKind::Str, "sc"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

const CA_VALUE_ARGS: &[ArgSpec] = &[
    ArgSpec::new("spec", ArgKind::Str, "f{s}"),
    ArgSpec::new("rule", ArgKind::NumOrGen, "(c, 110)"),
    ArgSpec::new("mutation", ArgKind::NumOrGen, "(c, 0)"),
    ArgSpec::new("format", ArgKind::Str, "sr"),
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
    ArgSpec::new("selection", ArgKind::Str, "oc"),
];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![
        GeneratorEntry {
            name: "caList",
            acronyms: &["cl"],
            signature: CA_LIST_ARGS,
            build: build_ca_list,
        },
        GeneratorEntry {
            name: "caValue",
            acronyms: &["cv"],
            signature: CA_VALUE_ARGS,
            build: build_ca_value,
        },
    ]
}

/// Parse the spec and format slots, run the automaton, and extract.
///
/// Returns the extracted series with the rule and mutation generators, reset
/// after the run.
fn run_automaton(
    args: &mut Args,
    env: &mut BuildEnv<'_>,
    normalize: bool,
) -> Result<(Vec<f64>, Pmtr, Pmtr), PmtrError> {
    let spec = AutomatonSpec::parse(&args.str(0)?, env.config())?;
    args.set_rendering(0, spec.to_string());
    let mut rule = args.generator(1)?;
    let mut mutation = args.generator(2)?;
    let format = TableFormat::parse(&args.str(3)?)?;
    args.set_rendering(3, format.name());

    let ctx = Context::new();
    let mut rng = env.fork_rng();
    let generations = spec.total_generations();
    tracing::debug!(%spec, generations, "running automaton");
    let mut automaton = Automaton::new(spec, &mut rng);
    rule.produce_num(0, &ctx);
    mutation.produce_num(0, &ctx);
    for t in 1..generations as i64 {
        let r = rule.produce_num(t, &ctx);
        let m = mutation.produce_num(t, &ctx);
        automaton.step(r, m, &mut rng);
    }
    rule.reset();
    mutation.reset();

    let series = automaton.extract(format, normalize);
    if series.is_empty() {
        return Err(PmtrError::value(
            args.tag(),
            format!("format {format} extracts nothing from this automaton"),
        ));
    }
    Ok((series, rule, mutation))
}

fn build_ca_list(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let (series, rule, mutation) = run_automaton(args, env, false)?;
    let policy = args.selection(4)?;
    Ok(Box::new(CellularSeries {
        series: Box::new(SelectedSeries {
            name: "caList",
            pool: Pool::new(series, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
            problem: None,
            record: args.record().to_vec(),
        }),
        rule,
        mutation,
    }))
}

fn build_ca_value(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let (series, rule, mutation) = run_automaton(args, env, true)?;
    let min = args.generator(4)?;
    let max = args.generator(5)?;
    let policy = args.selection(6)?;
    Ok(Box::new(CellularSeries {
        series: Box::new(UnitSeries {
            name: "caValue",
            pool: Pool::new(series, policy, env.fork_rng(), env.config().non_repeat_retry_limit),
            min,
            max,
            problem: None,
            record: args.record().to_vec(),
        }),
        rule,
        mutation,
    }))
}

/// An extracted automaton table, plus the rule and mutation generators that
/// drove the run.
#[derive(Debug)]
pub struct CellularSeries {
    series: Box<dyn Generator>,
    rule: Pmtr,
    mutation: Pmtr,
}

impl Generator for CellularSeries {
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
        self.rule.reset();
        self.mutation.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        let mut subs = self.series.sub_generators();
        subs.push(&self.rule);
        subs.push(&self.mutation);
        subs
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        self.series.check_args()
    }
}
