// Constants, baskets, uniform randomness, and simple transforms of other
// generators.

use crate::args::{ArgKind, ArgSpec, Args};
use crate::error::{PmtrError, ValidationFailure};
use crate::factory::{BuildEnv, GeneratorEntry, string_choice};
use crate::generator::{Generator, Pmtr};
use crate::stream::RngStream;
use crate::unit::{self, BoundaryMethod, UnitBound};
use crate::value::{Context, Value};

use super::{Pool, ensure};

const CONSTANT_ARGS: &[ArgSpec] = &[ArgSpec::new("value", ArgKind::StrOrNum, "0")];

const BASKET_GEN_ARGS: &[ArgSpec] = &[
    ArgSpec::new("selection", ArgKind::Str, "rc"),
    ArgSpec::new("values", ArgKind::NumList, "(0, 0.25, 0.25, 1)"),
];

const BASKET_SELECT_ARGS: &[ArgSpec] = &[
    ArgSpec::new("values", ArgKind::NumList, "(0, 0.25, 0.25, 1)"),
    ArgSpec::new("control", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

const RANDOM_UNIFORM_ARGS: &[ArgSpec] = &[
    ArgSpec::new("min", ArgKind::NumOrGen, "0"),
    ArgSpec::new("max", ArgKind::NumOrGen, "1"),
];

const ACCUMULATOR_ARGS: &[ArgSpec] = &[
    ArgSpec::new("init", ArgKind::Num, "0"),
    ArgSpec::new("source", ArgKind::NumOrGen, "(bg, rc, (1, 3, 4, 7, -11))"),
];

const MASK_ARGS: &[ArgSpec] = &[
    ArgSpec::new("boundary", ArgKind::Str, "l"),
    ArgSpec::new("lower", ArgKind::NumOrGen, "(c, 0)"),
    ArgSpec::new("upper", ArgKind::NumOrGen, "(c, 1)"),
    ArgSpec::new("source", ArgKind::NumOrGen, "(ru, 0, 1)"),
];

const SAMPLE_AND_HOLD_ARGS: &[ArgSpec] = &[
    ArgSpec::new("comparison", ArgKind::Str, "gt"),
    ArgSpec::new("source", ArgKind::NumOrGen, "(ru, 0, 1)"),
    ArgSpec::new("trigger", ArgKind::NumOrGen, "(ru, 0, 1)"),
    ArgSpec::new("threshold", ArgKind::NumOrGen, "(c, 0.5)"),
];

const OPERATOR_ARGS: &[ArgSpec] = &[
    ArgSpec::new("a", ArgKind::NumOrGen, "(ru, 0, 1)"),
    ArgSpec::new("b", ArgKind::NumOrGen, "(a, 0.5, (c, 0.025))"),
];

const ONE_OVER_ARGS: &[ArgSpec] = &[ArgSpec::new("value", ArgKind::NumOrGen, "(ru, 0.5, 2)")];

pub(super) fn entries() -> Vec<GeneratorEntry> {
    vec![
        GeneratorEntry {
            name: "constant",
            acronyms: &["c"],
            signature: CONSTANT_ARGS,
            build: build_constant,
        },
        GeneratorEntry {
            name: "basketGen",
            acronyms: &["bg"],
            signature: BASKET_GEN_ARGS,
            build: build_basket_gen,
        },
        GeneratorEntry {
            name: "basketSelect",
            acronyms: &["bs"],
            signature: BASKET_SELECT_ARGS,
            build: build_basket_select,
        },
        GeneratorEntry {
            name: "randomUniform",
            acronyms: &["ru"],
            signature: RANDOM_UNIFORM_ARGS,
            build: build_random_uniform,
        },
        GeneratorEntry {
            name: "accumulator",
            acronyms: &["a"],
            signature: ACCUMULATOR_ARGS,
            build: build_accumulator,
        },
        GeneratorEntry {
            name: "mask",
            acronyms: &["m"],
            signature: MASK_ARGS,
            build: build_mask,
        },
        GeneratorEntry {
            name: "sampleAndHold",
            acronyms: &["sah"],
            signature: SAMPLE_AND_HOLD_ARGS,
            build: build_sample_and_hold,
        },
        GeneratorEntry {
            name: "operatorAdd",
            acronyms: &["oa"],
            signature: OPERATOR_ARGS,
            build: build_add,
        },
        GeneratorEntry {
            name: "operatorSubtract",
            acronyms: &["os"],
            signature: OPERATOR_ARGS,
            build: build_subtract,
        },
        GeneratorEntry {
            name: "operatorMultiply",
            acronyms: &["om"],
            signature: OPERATOR_ARGS,
            build: build_multiply,
        },
        GeneratorEntry {
            name: "operatorDivide",
            acronyms: &["od"],
            signature: OPERATOR_ARGS,
            build: build_divide,
        },
        GeneratorEntry {
            name: "operatorPower",
            acronyms: &["op"],
            signature: OPERATOR_ARGS,
            build: build_power,
        },
        GeneratorEntry {
            name: "operatorCongruence",
            acronyms: &["oc"],
            signature: OPERATOR_ARGS,
            build: build_congruence,
        },
        GeneratorEntry {
            name: "oneOver",
            acronyms: &["oo"],
            signature: ONE_OVER_ARGS,
            build: build_one_over,
        },
    ]
}

/// Returns its argument forever.
#[derive(Debug)]
pub struct Constant {
    value: Value,
    record: Vec<String>,
}

fn build_constant(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    Ok(Box::new(Constant {
        value: args.value(0)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for Constant {
    fn type_name(&self) -> &'static str {
        "constant"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, _step: i64, _ctx: &Context) -> Value {
        self.value.clone()
    }

    fn reset(&mut self) {}

    fn constant_value(&self) -> Option<Value> {
        Some(self.value.clone())
    }
}

/// Selects from a literal list of values.
#[derive(Debug)]
pub struct BasketGen {
    pool: Pool<Value>,
    record: Vec<String>,
}

fn build_basket_gen(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let policy = args.selection(0)?;
    let values = args.list(1)?;
    let pool = Pool::new(values, policy, env.fork_rng(), env.config().non_repeat_retry_limit);
    Ok(Box::new(BasketGen {
        pool,
        record: args.record().to_vec(),
    }))
}

impl Generator for BasketGen {
    fn type_name(&self) -> &'static str {
        "basketGen"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, _step: i64, _ctx: &Context) -> Value {
        self.pool.next().unwrap_or(Value::Num(0.0))
    }

    fn reset(&mut self) {
        self.pool.reset();
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        ensure(!self.pool.is_empty(), "basketGen", "value list must have at least one item")
    }
}

/// Picks a list element by the unit-interval partition a control value
/// falls in.
#[derive(Debug)]
pub struct BasketSelect {
    values: Vec<Value>,
    bounds: Vec<UnitBound>,
    control: Pmtr,
    record: Vec<String>,
}

fn build_basket_select(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let values = args.list(0)?;
    let control = args.generator(1)?;
    Ok(Box::new(BasketSelect {
        bounds: unit::unit_boundary_equal(values.len()),
        values,
        control,
        record: args.record().to_vec(),
    }))
}

impl Generator for BasketSelect {
    fn type_name(&self) -> &'static str {
        "basketSelect"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let u = unit::limit(self.control.produce_num(step, ctx));
        let pos = unit::unit_boundary_position(u, &self.bounds);
        self.values.get(pos).cloned().unwrap_or(Value::Num(0.0))
    }

    fn reset(&mut self) {
        self.control.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.control]
    }

    fn check_args(&self) -> Result<(), ValidationFailure> {
        ensure(!self.values.is_empty(), "basketSelect", "value list must have at least one item")
    }
}

/// Uniform random values between two (possibly moving) bounds.
#[derive(Debug)]
pub struct RandomUniform {
    min: Pmtr,
    max: Pmtr,
    rng: RngStream,
    record: Vec<String>,
}

fn build_random_uniform(args: &mut Args, env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    Ok(Box::new(RandomUniform {
        min: args.generator(0)?,
        max: args.generator(1)?,
        rng: RngStream::new(env.fork_rng()),
        record: args.record().to_vec(),
    }))
}

impl Generator for RandomUniform {
    fn type_name(&self) -> &'static str {
        "randomUniform"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let u = self.rng.unit();
        let min = self.min.produce_num(step, ctx);
        let max = self.max.produce_num(step, ctx);
        Value::Num(unit::denorm(u, min, max))
    }

    fn reset(&mut self) {
        self.min.reset();
        self.max.reset();
        self.rng.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.min, &self.max]
    }
}

/// Running sum of another generator, starting from a fixed value.
#[derive(Debug)]
pub struct Accumulator {
    init: f64,
    total: f64,
    started: bool,
    source: Pmtr,
    record: Vec<String>,
}

fn build_accumulator(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let init = args.num(0)?;
    Ok(Box::new(Accumulator {
        init,
        total: init,
        started: false,
        source: args.generator(1)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for Accumulator {
    fn type_name(&self) -> &'static str {
        "accumulator"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        // The first call returns the initial value untouched.
        if self.started {
            self.total += self.source.produce_num(step, ctx);
        } else {
            self.started = true;
        }
        Value::Num(self.total)
    }

    fn reset(&mut self) {
        self.source.reset();
        self.total = self.init;
        self.started = false;
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source]
    }
}

/// Folds a source into a pair of moving boundaries.
#[derive(Debug)]
pub struct Mask {
    method: BoundaryMethod,
    lower: Pmtr,
    upper: Pmtr,
    source: Pmtr,
    record: Vec<String>,
}

fn build_mask(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let method = BoundaryMethod::parse(&args.str(0)?)?;
    args.set_rendering(0, method.to_string());
    Ok(Box::new(Mask {
        method,
        lower: args.generator(1)?,
        upper: args.generator(2)?,
        source: args.generator(3)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for Mask {
    fn type_name(&self) -> &'static str {
        "mask"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let a = self.lower.produce_num(step, ctx);
        let b = self.upper.produce_num(step, ctx);
        let f = self.source.produce_num(step, ctx);
        Value::Num(unit::boundary_fit(a, b, f, self.method))
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

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comparison {
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

const COMPARISONS: &[(&str, &[&str])] = &[
    ("equal", &["e", "eq"]),
    ("greaterThan", &["gt"]),
    ("greaterThanOrEqual", &["gte"]),
    ("lessThan", &["lt"]),
    ("lessThanOrEqual", &["lte"]),
];

/// Which side of the threshold the trigger was last seen on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gate {
    Above,
    Below,
}

/// Samples a source whenever a trigger crosses a threshold, and holds the
/// sample in between.
///
/// Crossing comparisons (`gt`, `gte`, `lt`, `lte`) fire once per crossing:
/// after firing, the trigger has to return to the other side first.
#[derive(Debug)]
pub struct SampleAndHold {
    comparison: Comparison,
    source: Pmtr,
    trigger: Pmtr,
    threshold: Pmtr,
    held: Option<Value>,
    gate: Option<Gate>,
    record: Vec<String>,
}

fn build_sample_and_hold(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    let name = string_choice("sampleAndHold", &args.str(0)?, COMPARISONS)?;
    let comparison = match name {
        "equal" => Comparison::Equal,
        "greaterThan" => Comparison::GreaterThan,
        "greaterThanOrEqual" => Comparison::GreaterThanOrEqual,
        "lessThan" => Comparison::LessThan,
        _ => Comparison::LessThanOrEqual,
    };
    args.set_rendering(0, name);
    Ok(Box::new(SampleAndHold {
        comparison,
        source: args.generator(1)?,
        trigger: args.generator(2)?,
        threshold: args.generator(3)?,
        held: None,
        gate: None,
        record: args.record().to_vec(),
    }))
}

/// Round to ten decimal places so float noise does not decide a crossing.
fn round10(x: f64) -> f64 {
    (x * 1e10).round() / 1e10
}

impl Generator for SampleAndHold {
    fn type_name(&self) -> &'static str {
        "sampleAndHold"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let trigger = round10(self.trigger.produce_num(step, ctx));
        let threshold = round10(self.threshold.produce_num(step, ctx));
        let armed_up = self.gate != Some(Gate::Above);
        let armed_down = self.gate != Some(Gate::Below);
        let fire = self.held.is_none()
            || match self.comparison {
                Comparison::Equal => trigger == threshold,
                Comparison::GreaterThan => trigger > threshold && armed_up,
                Comparison::GreaterThanOrEqual => trigger >= threshold && armed_up,
                Comparison::LessThan => trigger < threshold && armed_down,
                Comparison::LessThanOrEqual => trigger <= threshold && armed_down,
            };
        if trigger > threshold {
            self.gate = Some(Gate::Above);
        } else if trigger < threshold {
            self.gate = Some(Gate::Below);
        }
        if fire {
            self.held = Some(self.source.produce(step, ctx));
        }
        self.held.clone().unwrap_or(Value::Num(0.0))
    }

    fn reset(&mut self) {
        self.held = None;
        self.gate = None;
        self.source.reset();
        self.trigger.reset();
        self.threshold.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source, &self.trigger, &self.threshold]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Congruence,
}

impl BinaryOp {
    fn type_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "operatorAdd",
            BinaryOp::Subtract => "operatorSubtract",
            BinaryOp::Multiply => "operatorMultiply",
            BinaryOp::Divide => "operatorDivide",
            BinaryOp::Power => "operatorPower",
            BinaryOp::Congruence => "operatorCongruence",
        }
    }

    /// Division and congruence by zero, and powers with no real result,
    /// return `a`.
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide if b == 0.0 => a,
            BinaryOp::Divide => a / b,
            BinaryOp::Power => {
                let p = a.powf(b);
                if p.is_finite() { p } else { a }
            }
            BinaryOp::Congruence if b == 0.0 => a,
            BinaryOp::Congruence => {
                // The result takes the sign of the divisor.
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
            }
        }
    }
}

/// Arithmetic on two generators.
#[derive(Debug)]
pub struct Operator {
    op: BinaryOp,
    a: Pmtr,
    b: Pmtr,
    record: Vec<String>,
}

fn build_operator(args: &mut Args, op: BinaryOp) -> Result<Box<dyn Generator>, PmtrError> {
    Ok(Box::new(Operator {
        op,
        a: args.generator(0)?,
        b: args.generator(1)?,
        record: args.record().to_vec(),
    }))
}

fn build_add(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    build_operator(args, BinaryOp::Add)
}

fn build_subtract(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    build_operator(args, BinaryOp::Subtract)
}

fn build_multiply(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    build_operator(args, BinaryOp::Multiply)
}

fn build_divide(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    build_operator(args, BinaryOp::Divide)
}

fn build_power(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    build_operator(args, BinaryOp::Power)
}

fn build_congruence(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    build_operator(args, BinaryOp::Congruence)
}

impl Generator for Operator {
    fn type_name(&self) -> &'static str {
        self.op.type_name()
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let a = self.a.produce_num(step, ctx);
        let b = self.b.produce_num(step, ctx);
        Value::Num(self.op.apply(a, b))
    }

    fn reset(&mut self) {
        self.a.reset();
        self.b.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.a, &self.b]
    }
}

/// Reciprocal of another generator; 0 maps to 1.
#[derive(Debug)]
pub struct OneOver {
    source: Pmtr,
    record: Vec<String>,
}

fn build_one_over(args: &mut Args, _env: &mut BuildEnv<'_>) -> Result<Box<dyn Generator>, PmtrError> {
    Ok(Box::new(OneOver {
        source: args.generator(0)?,
        record: args.record().to_vec(),
    }))
}

impl Generator for OneOver {
    fn type_name(&self) -> &'static str {
        "oneOver"
    }

    fn describe_args(&self) -> Vec<String> {
        self.record.clone()
    }

    fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let x = self.source.produce_num(step, ctx);
        Value::Num(if x == 0.0 { 1.0 } else { 1.0 / x })
    }

    fn reset(&mut self) {
        self.source.reset();
    }

    fn sub_generators(&self) -> Vec<&Pmtr> {
        vec![&self.source]
    }
}

#[cfg(test)]
mod tests {
    use crate::factory::Factory;
    use crate::generator::DescribeMode;
    use crate::value::{Context, Value};

    fn run(text: &str, n: usize) -> Vec<Value> {
        let mut factory = Factory::new(7);
        let mut pmtr = factory.build(text).unwrap();
        let ctx = Context::new();
        (0..n as i64).map(|t| pmtr.produce(t, &ctx)).collect()
    }

    fn nums(text: &str, n: usize) -> Vec<f64> {
        run(text, n).iter().map(|v| v.as_f64().unwrap()).collect()
    }

    #[test]
    fn constant_keeps_strings_and_numbers() {
        assert_eq!(run("c, 4", 2), vec![Value::Num(4.0), Value::Num(4.0)]);
        assert_eq!(run("c, hello", 1), vec![Value::Str("hello".into())]);
    }

    #[test]
    fn basket_gen_ordered_cycle() {
        assert_eq!(nums("bg, oc, (1, 2, 3)", 5), vec![1.0, 2.0, 3.0, 1.0, 2.0]);
        assert_eq!(run("bg, oc, (a, b)", 3)[1], Value::Str("b".into()));
    }

    #[test]
    fn basket_gen_empty_list_fails_validation() {
        let mut factory = Factory::new(0);
        let pmtr = factory.build("bg, oc, ()").unwrap();
        assert!(pmtr.check_args().is_err());
    }

    #[test]
    fn basket_select_uses_unit_partitions() {
        assert_eq!(nums("bs, (10, 20, 30, 40), (c, 0.3)", 1), vec![20.0]);
        assert_eq!(nums("bs, (10, 20, 30, 40), (c, 1)", 1), vec![40.0]);
        assert_eq!(nums("bs, (10, 20, 30, 40), (c, -5)", 1), vec![10.0]);
    }

    #[test]
    fn random_uniform_stays_in_bounds() {
        for v in nums("ru, 3, (c, -2)", 500) {
            assert!((-2.0..=3.0).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn accumulator_starts_at_init() {
        assert_eq!(nums("a, 10, (c, 2)", 4), vec![10.0, 12.0, 14.0, 16.0]);
    }

    #[test]
    fn mask_wraps_and_canonicalizes_method() {
        assert_eq!(nums("m, w, 0, 1, (c, 1.25)", 1), vec![0.25]);
        let mut factory = Factory::new(0);
        let pmtr = factory.build("m, r, 0, 1, 0.5").unwrap();
        assert!(pmtr.describe(DescribeMode::Full).starts_with("mask, reflect, "));
    }

    #[test]
    fn sample_and_hold_fires_once_per_crossing() {
        // Trigger goes 0, 1, 1, 0, 1: upward crossings at steps 1 and 4.
        let out = nums("sah, gt, (bg, oc, (1, 2, 3, 4, 5, 6)), (bg, oc, (0, 1, 1, 0, 1)), 0.5", 5);
        assert_eq!(out, vec![1.0, 2.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn operators_and_zero_divisors() {
        assert_eq!(nums("oa, 2, 3", 1), vec![5.0]);
        assert_eq!(nums("os, 2, 3", 1), vec![-1.0]);
        assert_eq!(nums("om, 2, 3", 1), vec![6.0]);
        assert_eq!(nums("od, 3, 0", 1), vec![3.0]);
        assert_eq!(nums("op, 2, 3", 1), vec![8.0]);
        assert_eq!(nums("oc, 7, 0", 1), vec![7.0]);
        assert_eq!(nums("oc, -1, 3", 1), vec![2.0]);
        assert_eq!(nums("oo, 0", 1), vec![1.0]);
        assert_eq!(nums("oo, 4", 1), vec![0.25]);
    }

    #[test]
    fn unknown_comparison_is_rejected() {
        let mut factory = Factory::new(0);
        assert!(factory.build("sah, sideways").is_err());
    }
}
