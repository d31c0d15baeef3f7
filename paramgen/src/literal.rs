// Literal expression grammar.
//
// Generators are written as nested comma-separated lists:
//
//     ru, 0, (bg, oc, (1, 2, 3))
//
// An item is one of:
// - a parenthesized or bracketed list of items;
// - a quoted string (`"..."` or `'...'`, backslash escapes the next char);
// - a number;
// - a bare word: everything up to the next top-level comma or bracket,
//   trimmed. Bare words may contain spaces and any other punctuation, which
//   is how sieve, Markov, and automaton strings are written unquoted.
//
// `Display` renders the canonical form: lists in parentheses with ", "
// separators, numbers through `format_num`, strings quoted only when a bare
// word would not read back as the same string.

use std::fmt;

use crate::error::{PmtrError, SyntaxKind};
use crate::value::{Value, format_num};

/// A parsed literal item.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Num(f64),
    Str(String),
    List(Vec<Literal>),
}

impl Literal {
    /// Parse comma-separated top-level items.
    pub fn parse_items(text: &str) -> Result<Vec<Literal>, PmtrError> {
        let mut reader = Reader {
            chars: text.chars().collect(),
            pos: 0,
            source: text,
        };
        reader.skip_ws();
        if reader.at_end() {
            return Ok(Vec::new());
        }
        reader.items(None)
    }

    /// Parse a whole expression. A lone item is returned as is; several
    /// top-level items form a list.
    pub fn parse(text: &str) -> Result<Literal, PmtrError> {
        let mut items = Self::parse_items(text)?;
        match items.len() {
            0 => Err(PmtrError::syntax(SyntaxKind::Literal, text, "empty expression")),
            1 => Ok(items.remove(0)),
            _ => Ok(Literal::List(items)),
        }
    }

    /// Short type word used in argument error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Num(_) => "number",
            Literal::Str(_) => "string",
            Literal::List(_) => "list",
        }
    }

    /// Convert a scalar literal to a `Value`. Lists have no value.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Literal::Num(n) => Some(Value::Num(*n)),
            Literal::Str(s) => Some(Value::Str(s.clone())),
            Literal::List(_) => None,
        }
    }
}

impl From<&Value> for Literal {
    fn from(value: &Value) -> Self {
        match value {
            Value::Num(n) => Literal::Num(*n),
            Value::Str(s) => Literal::Str(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Num(n) => f.write_str(&format_num(*n)),
            Literal::Str(s) => f.write_str(&render_str(s)),
            Literal::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Render a string so that it parses back to itself.
pub fn render_str(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s.trim() != s
        || parse_number(s).is_some()
        || s.contains([',', '(', ')', '[', ']', '"', '\'', '\\']);
    if !needs_quotes {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Numbers are finite decimal floats; `inf`/`nan` stay words.
fn parse_number(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '-' | '+' | '.')) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

struct Reader<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Reader<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> PmtrError {
        PmtrError::syntax(SyntaxKind::Literal, self.source, message)
    }

    /// Items up to `close` (consumed) or end of input when `close` is None.
    fn items(&mut self, close: Option<char>) -> Result<Vec<Literal>, PmtrError> {
        let mut items = Vec::new();
        self.skip_ws();
        if close.is_some() && self.peek() == close {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.item()?);
            self.skip_ws();
            match self.peek() {
                None if close.is_none() => return Ok(items),
                None => return Err(self.error("unbalanced brackets")),
                Some(',') => self.pos += 1,
                Some(c) if Some(c) == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(c) => {
                    return Err(self.error(format!("unexpected '{c}' at position {}", self.pos)));
                }
            }
        }
    }

    fn item(&mut self) -> Result<Literal, PmtrError> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                Ok(Literal::List(self.items(Some(')'))?))
            }
            Some('[') => {
                self.pos += 1;
                Ok(Literal::List(self.items(Some(']'))?))
            }
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                self.quoted(q)
            }
            None | Some(',' | ')' | ']') => Err(self.error("empty item")),
            Some(_) => self.bare(),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<Literal, PmtrError> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated string"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Literal::Str(out));
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn bare(&mut self) -> Result<Literal, PmtrError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '(' | ')' | '[' | ']') {
                break;
            }
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let word = word.trim();
        if word.is_empty() {
            return Err(self.error("empty item"));
        }
        Ok(match parse_number(word) {
            Some(n) => Literal::Num(n),
            None => Literal::Str(word.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Literal {
        Literal::Str(text.into())
    }

    #[test]
    fn nested_generator_literal() {
        let lit = Literal::parse("ru, 0, (bg, oc, (1, 2.5, -3))").unwrap();
        assert_eq!(
            lit,
            Literal::List(vec![
                s("ru"),
                Literal::Num(0.0),
                Literal::List(vec![
                    s("bg"),
                    s("oc"),
                    Literal::List(vec![Literal::Num(1.0), Literal::Num(2.5), Literal::Num(-3.0)]),
                ]),
            ])
        );
    }

    #[test]
    fn bare_words_keep_inner_punctuation() {
        let items = Literal::parse_items("sl, 3@0|4@1&-5, a{.2}b{.5}:{a=1|b=3}").unwrap();
        assert_eq!(items[1], s("3@0|4@1&-5"));
        assert_eq!(items[2], s("a{.2}b{.5}:{a=1|b=3}"));
    }

    #[test]
    fn brackets_are_lists_too() {
        assert_eq!(
            Literal::parse("[1, 2]").unwrap(),
            Literal::List(vec![Literal::Num(1.0), Literal::Num(2.0)])
        );
        assert_eq!(Literal::parse("()").unwrap(), Literal::List(vec![]));
    }

    #[test]
    fn quoted_strings_and_escapes() {
        assert_eq!(Literal::parse(r#""a, b""#).unwrap(), s("a, b"));
        assert_eq!(Literal::parse(r"'it\'s'").unwrap(), s("it's"));
        assert_eq!(Literal::parse("\"3\"").unwrap(), s("3"));
    }

    #[test]
    fn malformed_input_fails() {
        for bad in ["(1, 2", "1, 2)", "(1, 2]", "1,,2", "1,", "\"open", "abc(1)"] {
            assert!(
                matches!(Literal::parse(bad), Err(PmtrError::Syntax { kind: SyntaxKind::Literal, .. })),
                "expected literal syntax error for {bad:?}"
            );
        }
    }

    #[test]
    fn rendering_reparses_to_same_literal() {
        let lit = Literal::List(vec![
            s("basketGen"),
            s("randomChoice"),
            Literal::List(vec![Literal::Num(0.25), s("c4"), s("a, b"), s("7"), s(" pad")]),
            s(""),
        ]);
        let text = lit.to_string();
        assert_eq!(Literal::parse(&text).unwrap(), lit, "rendered as {text}");
    }

    #[test]
    fn strings_quoted_only_when_needed() {
        assert_eq!(render_str("oc"), "oc");
        assert_eq!(render_str("3@0|4@0"), "3@0|4@0");
        assert_eq!(render_str("1.5"), "\"1.5\"");
        assert_eq!(render_str("x(y)"), "\"x(y)\"");
    }

    #[test]
    fn special_float_words_stay_strings() {
        assert_eq!(Literal::parse("inf").unwrap(), s("inf"));
        assert_eq!(Literal::parse("nan").unwrap(), s("nan"));
        assert_eq!(Literal::parse("-.5").unwrap(), Literal::Num(-0.5));
    }
}
