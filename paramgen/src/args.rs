// Typed constructor arguments.
//
// Every registered generator declares a signature: an ordered list of slots,
// each with a name, an `ArgKind`, and a default literal. The factory checks a
// literal argument list against the signature in two passes:
//
// 1. Shape: count and kind of every supplied literal, defaults appended for
//    missing trailing slots. Nothing is built yet, so a mistyped argument
//    fails before any sub-generator consumes randomness.
// 2. Build: nested generator literals become `Pmtr`s; numbers in `NumOrGen`
//    slots are promoted to `constant` generators.
//
// The result is an `Args` value the generator's constructor reads slot by
// slot. `Args` also keeps a canonical rendering of every slot; constructors
// that canonicalize a string (selection names, sieve logic, transition
// strings) overwrite their slot's rendering, and the finished record is what
// `describe()` prints.

use crate::error::PmtrError;
use crate::generator::Pmtr;
use crate::literal::Literal;
use crate::selector::SelectionPolicy;
use crate::value::{Value, format_num};

/// What a signature slot accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// A string; numbers are accepted and rendered as text.
    Str,
    Num,
    /// A number with no fractional part.
    Int,
    StrOrNum,
    /// A flat list of numbers and strings.
    NumList,
    /// A string, or a flat list of numbers.
    StrOrList,
    /// A nested generator literal.
    Gen,
    /// A number (promoted to `constant`) or a generator literal.
    NumOrGen,
    /// A list of generator literals.
    GenList,
}

impl ArgKind {
    pub fn name(self) -> &'static str {
        match self {
            ArgKind::Str => "string",
            ArgKind::Num => "number",
            ArgKind::Int => "integer",
            ArgKind::StrOrNum => "string or number",
            ArgKind::NumList => "list",
            ArgKind::StrOrList => "string or list",
            ArgKind::Gen => "generator",
            ArgKind::NumOrGen => "number or generator",
            ArgKind::GenList => "generator list",
        }
    }
}

/// One signature slot.
#[derive(Clone, Copy, Debug)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    /// Default literal text, used when the slot is omitted.
    pub default: &'static str,
}

impl ArgSpec {
    pub const fn new(name: &'static str, kind: ArgKind, default: &'static str) -> Self {
        Self { name, kind, default }
    }
}

/// True when a literal is shaped like a generator: `(tag, ...)` or a bare tag.
pub fn is_generator_literal(lit: &Literal) -> bool {
    match lit {
        Literal::List(items) => matches!(items.first(), Some(Literal::Str(_))),
        Literal::Str(_) => true,
        Literal::Num(_) => false,
    }
}

/// Shape check of one literal against a slot kind.
pub fn kind_accepts(kind: ArgKind, lit: &Literal) -> bool {
    match (kind, lit) {
        (ArgKind::Str, Literal::Str(_) | Literal::Num(_)) => true,
        (ArgKind::Num, Literal::Num(_)) => true,
        (ArgKind::Int, Literal::Num(n)) => n.fract() == 0.0,
        (ArgKind::StrOrNum, Literal::Str(_) | Literal::Num(_)) => true,
        (ArgKind::NumList, Literal::List(items)) => {
            items.iter().all(|i| !matches!(i, Literal::List(_)))
        }
        (ArgKind::StrOrList, Literal::Str(_) | Literal::Num(_)) => true,
        (ArgKind::StrOrList, Literal::List(items)) => items.iter().all(|i| matches!(i, Literal::Num(_))),
        (ArgKind::Gen, lit) => is_generator_literal(lit),
        (ArgKind::NumOrGen, Literal::Num(_)) => true,
        (ArgKind::NumOrGen, lit) => is_generator_literal(lit),
        (ArgKind::GenList, Literal::List(items)) => {
            !items.is_empty() && items.iter().all(|i| matches!(i, Literal::List(_)) && is_generator_literal(i))
        }
        _ => false,
    }
}

/// A resolved slot.
#[derive(Debug)]
pub enum Arg {
    Str(String),
    Num(f64),
    List(Vec<Value>),
    Gen(Option<Pmtr>),
    Gens(Option<Vec<Pmtr>>),
}

/// Resolved arguments handed to a generator constructor.
#[derive(Debug)]
pub struct Args {
    tag: &'static str,
    slots: Vec<Arg>,
    record: Vec<String>,
}

impl Args {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            slots: Vec::new(),
            record: Vec::new(),
        }
    }

    /// Append a resolved slot with its canonical rendering.
    pub fn push(&mut self, arg: Arg) {
        let rendered = render_arg(&arg);
        self.slots.push(arg);
        self.record.push(rendered);
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn mismatch(&self, index: usize, expected: ArgKind) -> PmtrError {
        let found = match self.slots.get(index) {
            Some(Arg::Str(_)) => "string",
            Some(Arg::Num(_)) => "number",
            Some(Arg::List(_)) => "list",
            Some(Arg::Gen(_)) | Some(Arg::Gens(_)) => "generator",
            None => "nothing",
        };
        PmtrError::ArgType {
            tag: self.tag.to_string(),
            position: index + 1,
            found: found.to_string(),
            expected: expected.name().to_string(),
        }
    }

    pub fn str(&self, index: usize) -> Result<String, PmtrError> {
        match self.slots.get(index) {
            Some(Arg::Str(s)) => Ok(s.clone()),
            Some(Arg::Num(n)) => Ok(format_num(*n)),
            _ => Err(self.mismatch(index, ArgKind::Str)),
        }
    }

    pub fn num(&self, index: usize) -> Result<f64, PmtrError> {
        match self.slots.get(index) {
            Some(Arg::Num(n)) => Ok(*n),
            _ => Err(self.mismatch(index, ArgKind::Num)),
        }
    }

    pub fn int(&self, index: usize) -> Result<i64, PmtrError> {
        match self.slots.get(index) {
            Some(Arg::Num(n)) if n.fract() == 0.0 => Ok(*n as i64),
            _ => Err(self.mismatch(index, ArgKind::Int)),
        }
    }

    pub fn value(&self, index: usize) -> Result<Value, PmtrError> {
        match self.slots.get(index) {
            Some(Arg::Num(n)) => Ok(Value::Num(*n)),
            Some(Arg::Str(s)) => Ok(Value::Str(s.clone())),
            _ => Err(self.mismatch(index, ArgKind::StrOrNum)),
        }
    }

    pub fn list(&self, index: usize) -> Result<Vec<Value>, PmtrError> {
        match self.slots.get(index) {
            Some(Arg::List(values)) => Ok(values.clone()),
            _ => Err(self.mismatch(index, ArgKind::NumList)),
        }
    }

    /// Take a sub-generator out of its slot.
    pub fn generator(&mut self, index: usize) -> Result<Pmtr, PmtrError> {
        match self.slots.get_mut(index) {
            Some(Arg::Gen(slot)) => match slot.take() {
                Some(pmtr) => Ok(pmtr),
                None => Err(PmtrError::value(self.tag, format!("argument {} already taken", index + 1))),
            },
            _ => Err(self.mismatch(index, ArgKind::Gen)),
        }
    }

    pub fn generators(&mut self, index: usize) -> Result<Vec<Pmtr>, PmtrError> {
        match self.slots.get_mut(index) {
            Some(Arg::Gens(slot)) => match slot.take() {
                Some(list) => Ok(list),
                None => Err(PmtrError::value(self.tag, format!("argument {} already taken", index + 1))),
            },
            _ => Err(self.mismatch(index, ArgKind::GenList)),
        }
    }

    /// Parse a selection-policy slot and canonicalize its rendering.
    pub fn selection(&mut self, index: usize) -> Result<SelectionPolicy, PmtrError> {
        let policy = SelectionPolicy::parse(&self.str(index)?)?;
        self.set_rendering(index, policy.name());
        Ok(policy)
    }

    /// Replace the canonical rendering of a string slot.
    pub fn set_rendering(&mut self, index: usize, text: impl AsRef<str>) {
        if let Some(slot) = self.record.get_mut(index) {
            *slot = Literal::Str(text.as_ref().to_string()).to_string();
        }
    }

    pub fn record(&self) -> &[String] {
        &self.record
    }
}

fn render_arg(arg: &Arg) -> String {
    match arg {
        Arg::Str(s) => Literal::Str(s.clone()).to_string(),
        Arg::Num(n) => format_num(*n),
        Arg::List(values) => Literal::List(values.iter().map(Literal::from).collect()).to_string(),
        Arg::Gen(Some(pmtr)) => format!("({})", pmtr.describe_full()),
        Arg::Gens(Some(list)) => {
            let inner: Vec<String> = list.iter().map(|p| format!("({})", p.describe_full())).collect();
            format!("({})", inner.join(", "))
        }
        Arg::Gen(None) | Arg::Gens(None) => String::new(),
    }
}
