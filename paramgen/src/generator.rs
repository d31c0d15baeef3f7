// The generator calling contract.
//
// Every registered type implements `Generator`. Callers never hold a
// `Box<dyn Generator>` directly; they hold a `Pmtr`, which adds the cached
// last-produced value and the two description modes. A `Pmtr` exclusively owns
// its sub-generators, so a built graph is a tree and `reset()` and
// `check_args()` recurse through it.
//
// `describe(Full)` prints `typeName, arg, (sub), ...` with every argument in
// canonical form and every nested generator in parentheses; `ArgsOnly`
// prints just the argument list. Both re-parse through the factory to a
// generator with the same description.

use std::fmt;

use tracing::warn;

use crate::error::ValidationFailure;
use crate::value::{Context, Value};

/// The behaviour shared by every generator type.
pub trait Generator: fmt::Debug {
    /// Canonical (full) registered name.
    fn type_name(&self) -> &'static str;

    /// Canonical rendering of each constructor argument.
    fn describe_args(&self) -> Vec<String>;

    /// Produce the value for `step`. Never fails.
    fn produce(&mut self, step: i64, ctx: &Context) -> Value;

    /// Return to the post-construction state, recursing into sub-generators.
    fn reset(&mut self);

    /// Owned sub-generators, for recursive validation.
    fn sub_generators(&self) -> Vec<&Pmtr> {
        Vec::new()
    }

    /// Semantic validation of this generator's own arguments.
    fn check_args(&self) -> Result<(), ValidationFailure> {
        Ok(())
    }

    /// The fixed output of a generator that never varies, if any.
    fn constant_value(&self) -> Option<Value> {
        None
    }
}

/// Which part of a generator `describe()` prints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescribeMode {
    /// Type name followed by the arguments.
    Full,
    /// The arguments alone.
    ArgsOnly,
}

/// A constructed generator.
#[derive(Debug)]
pub struct Pmtr {
    inner: Box<dyn Generator>,
    last: Option<Value>,
}

impl Pmtr {
    pub fn new(inner: Box<dyn Generator>) -> Self {
        Self { inner, last: None }
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    /// Produce the value for `step` and cache it.
    pub fn produce(&mut self, step: i64, ctx: &Context) -> Value {
        let value = self.inner.produce(step, ctx);
        self.last = Some(value.clone());
        value
    }

    /// Produce a value and read it as a number. A non-numeric string counts
    /// as 0.
    pub fn produce_num(&mut self, step: i64, ctx: &Context) -> f64 {
        let value = self.produce(step, ctx);
        match value.as_f64() {
            Some(n) => n,
            None => {
                warn!(generator = self.type_name(), value = %value, "string value in a numeric slot; using 0");
                0.0
            }
        }
    }

    /// The most recently produced value.
    pub fn last(&self) -> Option<&Value> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.inner.reset();
    }

    /// Validate this generator and every sub-generator, innermost first.
    pub fn check_args(&self) -> Result<(), ValidationFailure> {
        for sub in self.inner.sub_generators() {
            sub.check_args()?;
        }
        self.inner.check_args()
    }

    pub fn constant_value(&self) -> Option<Value> {
        self.inner.constant_value()
    }

    pub fn describe(&self, mode: DescribeMode) -> String {
        let args = self.inner.describe_args();
        match mode {
            DescribeMode::ArgsOnly => args.join(", "),
            DescribeMode::Full if args.is_empty() => self.type_name().to_string(),
            DescribeMode::Full => format!("{}, {}", self.type_name(), args.join(", ")),
        }
    }

    pub fn describe_full(&self) -> String {
        self.describe(DescribeMode::Full)
    }
}

impl fmt::Display for Pmtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe_full())
    }
}
