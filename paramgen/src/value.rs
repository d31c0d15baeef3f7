// Produced values and the per-call context.
//
// Generators mostly produce numbers; a few (constant, basketGen, markovValue)
// can produce strings. `Value` carries either. `format_num` is the single
// place numbers are rendered, shared by `Display` and by `describe()` so that
// described literals re-parse to the same numbers.

use std::collections::BTreeMap;
use std::fmt;

/// A value produced by a generator.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
}

impl Value {
    /// Numeric view of the value. Strings that parse as numbers convert;
    /// anything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Str(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Wrap a symbol value: numeric text becomes `Num`, the rest stays `Str`.
    pub fn from_symbol(text: &str) -> Value {
        match text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Num(n),
            _ => Value::Str(text.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => f.write_str(&format_num(*n)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

/// Scheduler-supplied data passed through every `produce()` call.
///
/// The library reads nothing from it itself; it is forwarded untouched to
/// every sub-generator.
pub type Context = BTreeMap<String, Value>;

/// Render a number the way literals write it: integral values without a
/// fractional part, everything else in shortest round-trip form.
pub fn format_num(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_render_without_fraction() {
        assert_eq!(format_num(3.0), "3");
        assert_eq!(format_num(-12.0), "-12");
        assert_eq!(format_num(0.25), "0.25");
    }

    #[test]
    fn rendered_numbers_reparse_exactly() {
        for n in [0.1, 1.0 / 3.0, 2.66666, 1e-7, 123456.789] {
            let back: f64 = format_num(n).parse().unwrap();
            assert_eq!(back, n, "round trip failed for {n}");
        }
    }

    #[test]
    fn symbol_values_become_numbers_when_numeric() {
        assert_eq!(Value::from_symbol(".2"), Value::Num(0.2));
        assert_eq!(Value::from_symbol("c4"), Value::Str("c4".into()));
    }

    #[test]
    fn string_numeric_view() {
        assert_eq!(Value::Str(" 4.5 ".into()).as_f64(), Some(4.5));
        assert_eq!(Value::Str("abc".into()).as_f64(), None);
    }
}
