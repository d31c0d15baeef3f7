// Residue-class sieves (Xenakis).
//
// A sieve is a boolean expression over residue classes. A leaf `m@s` is true
// at integer z iff (z - s) mod m == 0; leaves combine with `&` (and), `|`
// (or), `^` (xor), unary `-` (complement), and `{}` grouping. The expression is
// range-independent; evaluating it over a caller range [lo, hi] yields the
// members, which `segment()` renders in one of four formats (integers, a 0/1
// membership row, unit-normalized positions, or widths between members).
//
// Parsing is recursive descent over a normalized token stream. Synonyms are
// accepted on input (`and`/`*`, `or`/`+`, `xor`, `not`, round and square
// brackets) but `Display` always renders the canonical form, which re-parses
// to the same tree.
//
// Precedence, tightest first: `-`, `&`, `^`, `|`.
//
// Also here:
// - `Sieve::compress` derives a union-of-residues sieve from a list of known
//   members.
// - `Sieve::parse_bounded` reads a logic string with an optional range
//   suffix; bounds may be integers or pitch names (c4 = 0), and pitch-named
//   bounds render back as names.
//
// See also: `generators/series.rs` for the sieveList / valueSieve /
// sieveFunnel generators built on this module.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{PmtrError, SyntaxKind};
use crate::unit;

/// A parsed sieve expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SieveExpr {
    Residual { modulus: u64, shift: u64 },
    Not(Box<SieveExpr>),
    And(Box<SieveExpr>, Box<SieveExpr>),
    Xor(Box<SieveExpr>, Box<SieveExpr>),
    Or(Box<SieveExpr>, Box<SieveExpr>),
}

impl SieveExpr {
    pub fn residual(modulus: u64, shift: u64) -> Self {
        let shift = if modulus == 0 { shift } else { shift % modulus };
        SieveExpr::Residual { modulus, shift }
    }

    /// Membership of `z`.
    pub fn contains(&self, z: i64) -> bool {
        match self {
            SieveExpr::Residual { modulus, shift } => {
                if *modulus == 0 {
                    return false;
                }
                let m = *modulus as i128;
                (z as i128 - *shift as i128).rem_euclid(m) == 0
            }
            SieveExpr::Not(a) => !a.contains(z),
            SieveExpr::And(a, b) => a.contains(z) && b.contains(z),
            SieveExpr::Xor(a, b) => a.contains(z) != b.contains(z),
            SieveExpr::Or(a, b) => a.contains(z) || b.contains(z),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            SieveExpr::Or(..) => 1,
            SieveExpr::Xor(..) => 2,
            SieveExpr::And(..) => 3,
            SieveExpr::Not(_) => 4,
            SieveExpr::Residual { .. } => 5,
        }
    }

    fn write_child(&self, f: &mut fmt::Formatter<'_>, child: &SieveExpr, group: bool) -> fmt::Result {
        if group {
            write!(f, "{{{child}}}")
        } else {
            write!(f, "{child}")
        }
    }
}

impl fmt::Display for SieveExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.precedence();
        match self {
            SieveExpr::Residual { modulus, shift } => write!(f, "{modulus}@{shift}"),
            SieveExpr::Not(a) => {
                f.write_str("-")?;
                self.write_child(f, a, a.precedence() < p)
            }
            SieveExpr::And(a, b) | SieveExpr::Xor(a, b) | SieveExpr::Or(a, b) => {
                let op = match self {
                    SieveExpr::And(..) => "&",
                    SieveExpr::Xor(..) => "^",
                    _ => "|",
                };
                // Left-associative: the right operand needs braces at equal
                // precedence to keep the same tree.
                self.write_child(f, a, a.precedence() < p)?;
                f.write_str(op)?;
                self.write_child(f, b, b.precedence() <= p)
            }
        }
    }
}

/// Output format of a sieve segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SieveFormat {
    /// The member integers.
    Int,
    /// 1.0/0.0 membership over every integer of the range.
    Binary,
    /// Members normalized against the range bounds.
    Unit,
    /// Distances between consecutive members.
    Width,
}

impl SieveFormat {
    pub fn parse(text: &str) -> Result<Self, PmtrError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(SieveFormat::Int),
            "bin" | "binary" => Ok(SieveFormat::Binary),
            "unit" => Ok(SieveFormat::Unit),
            "wid" | "width" => Ok(SieveFormat::Width),
            _ => Err(PmtrError::syntax(
                SyntaxKind::Format,
                text,
                "not a valid sieve format string",
            )),
        }
    }
}

impl fmt::Display for SieveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SieveFormat::Int => "int",
            SieveFormat::Binary => "bin",
            SieveFormat::Unit => "unit",
            SieveFormat::Width => "wid",
        })
    }
}

/// A parsed residue-class sieve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sieve {
    expr: SieveExpr,
}

impl Sieve {
    /// Parse a logical sieve string such as `3@0|4@0` or `-{5|2}&4@1`.
    pub fn parse(text: &str) -> Result<Self, PmtrError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
            source: text,
        };
        let expr = parser.parse_or()?;
        if parser.pos != tokens.len() {
            let message = match tokens[parser.pos] {
                Token::Neg => "negation cannot be used as a binary operator",
                Token::RGroup => "unbalanced closing brace",
                _ => "unexpected trailing input",
            };
            return Err(PmtrError::syntax(SyntaxKind::Sieve, text, message));
        }
        Ok(Self { expr })
    }

    /// Parse `logic, lo, hi`; the bounds are optional and may be pitch names.
    pub fn parse_bounded(text: &str) -> Result<(Self, Option<SieveBounds>), PmtrError> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        let sieve = Self::parse(parts[0])?;
        match parts[1..] {
            [] => Ok((sieve, None)),
            [a, b] => {
                let named = [a, b].iter().any(|p| p.parse::<i64>().is_err());
                let (a, b) = (parse_pitch(a)?, parse_pitch(b)?);
                Ok((
                    sieve,
                    Some(SieveBounds {
                        lo: a.min(b),
                        hi: a.max(b),
                        named,
                    }),
                ))
            }
            _ => Err(PmtrError::syntax(
                SyntaxKind::Sieve,
                text,
                "expected a logical string optionally followed by two bounds",
            )),
        }
    }

    /// Build a sieve that reproduces a set of known members over `[lo, hi]`.
    ///
    /// Greedy residue-class compression: each uncovered member takes the
    /// smallest modulus whose whole class within the range lies in the set.
    pub fn compress(values: &[i64], lo: i64, hi: i64) -> Result<Self, PmtrError> {
        let set: BTreeSet<i64> = values.iter().copied().filter(|v| (lo..=hi).contains(v)).collect();
        if set.is_empty() {
            return Err(PmtrError::syntax(
                SyntaxKind::Sieve,
                format!("{values:?}"),
                "no residual classes defined",
            ));
        }
        let span = hi - lo + 1;
        let mut covered = BTreeSet::new();
        let mut leaves = Vec::new();
        for &v in &set {
            if covered.contains(&v) {
                continue;
            }
            for m in 1..=span {
                let shift = v.rem_euclid(m);
                let first = lo + (shift - lo).rem_euclid(m);
                let class = (first..=hi).step_by(m as usize);
                if class.clone().all(|z| set.contains(&z)) {
                    covered.extend(class);
                    leaves.push(SieveExpr::residual(m as u64, shift as u64));
                    break;
                }
            }
        }
        let mut iter = leaves.into_iter();
        let mut expr = iter.next().ok_or_else(|| {
            PmtrError::syntax(SyntaxKind::Sieve, format!("{values:?}"), "no residual classes defined")
        })?;
        for leaf in iter {
            expr = SieveExpr::Or(Box::new(expr), Box::new(leaf));
        }
        Ok(Self { expr })
    }

    pub fn expr(&self) -> &SieveExpr {
        &self.expr
    }

    pub fn contains(&self, z: i64) -> bool {
        self.expr.contains(z)
    }

    /// Members within `[lo, hi]` (inclusive), ascending.
    pub fn members(&self, lo: i64, hi: i64) -> Vec<i64> {
        (lo..=hi).filter(|&z| self.contains(z)).collect()
    }

    /// Members within `[lo, hi]` rendered in `format`.
    pub fn segment(&self, lo: i64, hi: i64, format: SieveFormat) -> Vec<f64> {
        let members = self.members(lo, hi);
        match format {
            SieveFormat::Int => members.iter().map(|&z| z as f64).collect(),
            SieveFormat::Binary => unit::discrete_binary_pad(&members, lo, hi),
            SieveFormat::Unit => {
                let ints: Vec<f64> = members.iter().map(|&z| z as f64).collect();
                unit::unit_norm_range(&ints, Some((lo as f64, hi as f64)))
            }
            SieveFormat::Width => members.windows(2).map(|w| (w[1] - w[0]) as f64).collect(),
        }
    }

}

impl fmt::Display for Sieve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Num(u64),
    At,
    And,
    Or,
    Xor,
    Neg,
    LGroup,
    RGroup,
}

fn tokenize(text: &str) -> Result<Vec<Token>, PmtrError> {
    let normalized = text
        .to_ascii_lowercase()
        .replace("xor", "^")
        .replace("and", "&")
        .replace("or", "|")
        .replace("not", "-");
    let mut tokens = Vec::new();
    let mut chars = normalized.chars().peekable();
    while let Some(c) = chars.next() {
        let token = match c {
            ' ' | '\t' | '\n' => continue,
            '@' => Token::At,
            '&' | '*' => Token::And,
            '|' | '+' => Token::Or,
            '^' => Token::Xor,
            '-' => Token::Neg,
            '{' | '(' | '[' => Token::LGroup,
            '}' | ')' | ']' => Token::RGroup,
            '0'..='9' => {
                let mut digits = String::from(c);
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = digits.parse::<u64>().map_err(|_| {
                    PmtrError::syntax(SyntaxKind::Sieve, text, format!("number out of range: {digits}"))
                })?;
                Token::Num(n)
            }
            other => {
                return Err(PmtrError::syntax(
                    SyntaxKind::Sieve,
                    text,
                    format!("unexpected character '{other}'"),
                ));
            }
        };
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Err(PmtrError::syntax(SyntaxKind::Sieve, text, "no residual classes defined"));
    }
    Ok(tokens)
}

/// Deepest combined nesting of groups and negations accepted.
const MAX_NESTING: usize = 64;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn error(&self, message: &str) -> PmtrError {
        PmtrError::syntax(SyntaxKind::Sieve, self.source, message)
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, PmtrError>,
    ) -> Result<T, PmtrError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("groups and negations are nested too deeply"));
        }
        self.depth += 1;
        let out = parse(self);
        self.depth -= 1;
        out
    }

    fn parse_or(&mut self) -> Result<SieveExpr, PmtrError> {
        let mut left = self.parse_xor()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_xor()?;
            left = SieveExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<SieveExpr, PmtrError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Xor) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = SieveExpr::Xor(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<SieveExpr, PmtrError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = SieveExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<SieveExpr, PmtrError> {
        if self.peek() == Some(&Token::Neg) {
            self.pos += 1;
            if self.peek().is_none() {
                return Err(self.error("negation cannot be used without operands"));
            }
            let inner = self.nested(Self::parse_unary)?;
            return Ok(SieveExpr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<SieveExpr, PmtrError> {
        match self.peek().cloned() {
            Some(Token::LGroup) => {
                self.pos += 1;
                let inner = self.nested(Self::parse_or)?;
                if self.peek() != Some(&Token::RGroup) {
                    return Err(self.error("unbalanced group braces"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Num(modulus)) => {
                self.pos += 1;
                let mut shift = 0;
                if self.peek() == Some(&Token::At) {
                    self.pos += 1;
                    match self.peek().cloned() {
                        Some(Token::Num(s)) => {
                            self.pos += 1;
                            shift = s;
                        }
                        _ => return Err(self.error("residual shift must follow '@'")),
                    }
                }
                Ok(SieveExpr::residual(modulus, shift))
            }
            Some(_) => Err(self.error("expected a residual class or a group")),
            None => Err(self.error("expression ends where an operand is expected")),
        }
    }
}

const PITCH_NAMES: [&str; 12] = [
    "c", "c#", "d", "d#", "e", "f", "f#", "g", "g#", "a", "a#", "b",
];

/// Parse a pitch name (`c4`, `f#3`, `bb2`) or a pitch-space integer (c4 = 0).
pub fn parse_pitch(text: &str) -> Result<i64, PmtrError> {
    let text = text.trim().to_ascii_lowercase();
    if let Ok(n) = text.parse::<i64>() {
        return Ok(n);
    }
    let bad = || PmtrError::syntax(SyntaxKind::Sieve, text.clone(), "not a pitch name");
    let mut chars = text.chars();
    let letter = chars.next().ok_or_else(bad)?;
    let mut pc: i64 = match letter {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return Err(bad()),
    };
    let rest: String = chars.collect();
    let octave_start = rest
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .ok_or_else(bad)?;
    let (accidentals, octave) = rest.split_at(octave_start);
    for acc in accidentals.chars() {
        match acc {
            '#' => pc += 1,
            'b' => pc -= 1,
            _ => return Err(bad()),
        }
    }
    let octave: i64 = octave.parse().map_err(|_| bad())?;
    Ok((octave - 4) * 12 + pc)
}

/// Sharp-spelled pitch name of a pitch-space integer.
pub fn pitch_name(ps: i64) -> String {
    let pc = ps.rem_euclid(12) as usize;
    let octave = 4 + ps.div_euclid(12);
    format!("{}{}", PITCH_NAMES[pc], octave)
}

/// Range bounds read from a bounded logic string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SieveBounds {
    pub lo: i64,
    pub hi: i64,
    /// Written as pitch names rather than integers.
    pub named: bool,
}

impl fmt::Display for SieveBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.named {
            write!(f, "{}, {}", pitch_name(self.lo), pitch_name(self.hi))
        } else {
            write!(f, "{}, {}", self.lo, self.hi)
        }
    }
}
