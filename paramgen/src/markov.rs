// Markov transition tables with n-order backoff.
//
// A transition string declares symbols and weighted rules:
//
//     a{.2} b{.5} c{.8}   :{a=5|b=4|c=7}   a:{c=1}   b:c:{a=3|b=1}
//
// - Symbol definitions are `name{value}`; names are lowercase letters and
//   digits, values any text without braces.
// - Rules are `context{sym=weight|...}`. A context is `:`-separated segments
//   (a trailing `:` is optional, a bare `:` is the zero-order rule). A group
//   is a rule when its label contains `:` or its body contains `=`.
// - A context segment is a symbol, `*` (any symbol), `-x` (any symbol but x),
//   or `x|y|z` (any of them). One operator kind per segment.
//
// Lookup takes the last `order` symbols of history as the context and tries a
// direct key match, then an expression match of the same length. When nothing
// matches, or the match has no positive weight, the context is shortened by
// dropping its oldest symbol, ending at the zero-order rule, which every table
// must define. Sampling walks the cumulative weight table like the backoff
// models in the music generator.
//
// Non-positive weights parse (so a table can be inspected) but are reported
// by `validate()` and never sampled.
//
// `Transition::from_analysis` goes the other way: it counts the transitions
// of an observed sequence and emits a table in the same grammar.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use paramgen_prng::SeededRng;
use tracing::debug;

use crate::error::{PmtrError, SyntaxKind};
use crate::unit::{RoundMode, float_to_int};
use crate::value::format_num;

/// One position of a rule context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Symbol(String),
    Any,
    Not(String),
    OneOf(Vec<String>),
}

impl Segment {
    fn matches(&self, symbol: &str) -> bool {
        match self {
            Segment::Symbol(s) => s == symbol,
            Segment::Any => true,
            Segment::Not(s) => s != symbol,
            Segment::OneOf(options) => options.iter().any(|s| s == symbol),
        }
    }

    fn symbols(&self) -> Vec<&str> {
        match self {
            Segment::Symbol(s) | Segment::Not(s) => vec![s.as_str()],
            Segment::Any => Vec::new(),
            Segment::OneOf(options) => options.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Symbol(s) => f.write_str(s),
            Segment::Any => f.write_str("*"),
            Segment::Not(s) => write!(f, "-{s}"),
            Segment::OneOf(options) => f.write_str(&options.join("|")),
        }
    }
}

/// A context and its weighted successors.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub context: Vec<Segment>,
    pub weights: Vec<(String, f64)>,
}

impl Rule {
    fn is_direct(&self) -> bool {
        self.context.iter().all(|s| matches!(s, Segment::Symbol(_)))
    }

    fn matches(&self, history: &[String]) -> bool {
        self.context.len() == history.len()
            && self.context.iter().zip(history).all(|(seg, sym)| seg.matches(sym))
    }

    fn positive_total(&self) -> f64 {
        self.weights.iter().map(|(_, w)| *w).filter(|w| *w > 0.0).sum()
    }

    fn key_string(&self) -> String {
        let segments: Vec<String> = self.context.iter().map(Segment::to_string).collect();
        format!("{}:", segments.join(":"))
    }
}

/// A parsed transition table.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    symbols: BTreeMap<String, String>,
    rules: Vec<Rule>,
    max_order: usize,
}

fn by_length_then_name(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

impl Transition {
    pub fn parse(text: &str) -> Result<Self, PmtrError> {
        let err = |message: String| PmtrError::syntax(SyntaxKind::Transition, text, message);
        if text.matches('{').count() != text.matches('}').count() {
            return Err(err("all braces not paired".into()));
        }
        let cleaned: String = text.chars().filter(|c| !matches!(c, '"' | '\'')).collect();

        let mut symbols = BTreeMap::new();
        let mut raw_rules: Vec<(String, String)> = Vec::new();
        for group in cleaned.split('}') {
            if !group.contains('{') {
                if group.trim().is_empty() {
                    continue;
                }
                return Err(err(format!("badly placed delimiters near '{}'", group.trim())));
            }
            let mut parts = group.split('{');
            let (Some(label), Some(body), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(err("badly placed delimiters".into()));
            };
            let label: String = label
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            if label.contains(':') || body.contains('=') {
                let valid = |c: char| is_symbol_char(c) || matches!(c, ':' | '*' | '-' | '|');
                if let Some(bad) = label.chars().find(|&c| !valid(c)) {
                    return Err(err(format!("rule key uses illegal character '{bad}'")));
                }
                let body: String = body
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase();
                raw_rules.push((label, body));
            } else {
                if label.is_empty() {
                    return Err(err("symbol definition without a name".into()));
                }
                if let Some(bad) = label.chars().find(|&c| !is_symbol_char(c)) {
                    return Err(err(format!("symbol definition uses illegal character '{bad}'")));
                }
                let value: String = body.chars().filter(|c| !c.is_whitespace()).collect();
                symbols.insert(label, value);
            }
        }
        if symbols.is_empty() {
            return Err(err("no symbols defined".into()));
        }
        if raw_rules.is_empty() {
            return Err(err("no weights defined".into()));
        }

        let mut rules: Vec<Rule> = Vec::new();
        for (label, body) in raw_rules {
            let context = parse_context(&label).map_err(&err)?;
            for seg in &context {
                for sym in seg.symbols() {
                    if !symbols.contains_key(sym) {
                        return Err(err(format!("context refers to undefined symbol '{sym}'")));
                    }
                }
            }
            let mut weights = Vec::new();
            for assign in body.split('|') {
                if !assign.contains('=') {
                    continue;
                }
                let mut halves = assign.split('=');
                let (Some(sym), Some(weight), None) = (halves.next(), halves.next(), halves.next()) else {
                    return Err(err(format!("incorrect weight specification: {assign}")));
                };
                let weight: f64 = weight
                    .parse()
                    .ok()
                    .filter(|w: &f64| w.is_finite())
                    .ok_or_else(|| err(format!("bad weight value given: {assign}")))?;
                if !symbols.contains_key(sym) {
                    return Err(err(format!("weight specified for undefined symbol: {sym}")));
                }
                weights.push((sym.to_string(), weight));
            }
            weights.sort_by(|a, b| by_length_then_name(&a.0, &b.0));
            let rule = Rule { context, weights };
            rules.retain(|r| r.context != rule.context);
            rules.push(rule);
        }
        rules.sort_by(|a, b| {
            a.context
                .len()
                .cmp(&b.context.len())
                .then_with(|| a.key_string().cmp(&b.key_string()))
        });
        if !rules.iter().any(|r| r.context.is_empty()) {
            return Err(err("no zero-order rule defined".into()));
        }
        let max_order = rules.iter().map(|r| r.context.len()).max().unwrap_or(0);
        Ok(Self {
            symbols,
            rules,
            max_order,
        })
    }

    /// Build a table from an observed sequence, with rules up to `order`.
    ///
    /// Distinct values become symbols `a`..`z`, `aa`, `ab`, ... in order of
    /// first appearance, and every weight is an occurrence count. Contexts
    /// above order zero read the sequence cyclically. The order is clamped
    /// to one less than the sequence length.
    pub fn from_analysis(values: &[String], order: usize) -> Result<Self, PmtrError> {
        let values: Vec<String> = values
            .iter()
            .map(|v| v.chars().filter(|c| !c.is_whitespace() && !matches!(c, '"' | '\'')).collect())
            .collect();
        let source = values.join(" ");
        let err = |message: String| PmtrError::syntax(SyntaxKind::Transition, source.clone(), message);
        if values.is_empty() {
            return Err(err("no values to analyze".into()));
        }
        if let Some(bad) = values.iter().find(|v| v.is_empty() || v.contains(['{', '}', '='])) {
            return Err(err(format!("'{bad}' cannot be used as a symbol value")));
        }

        let mut labels: BTreeMap<&str, String> = BTreeMap::new();
        let mut text = String::new();
        let mut sequence = Vec::with_capacity(values.len());
        for value in &values {
            let next = labels.len();
            let label = labels.entry(value.as_str()).or_insert_with(|| {
                let label = alpha_label(next);
                text.push_str(&format!("{label}{{{value}}}"));
                label
            });
            sequence.push(label.clone());
        }

        let order = order.min(sequence.len() - 1);
        let mut counts: BTreeMap<Vec<&str>, BTreeMap<&str, usize>> = BTreeMap::new();
        for symbol in &sequence {
            *counts.entry(Vec::new()).or_default().entry(symbol.as_str()).or_default() += 1;
        }
        for n in 1..=order {
            let wrapped: Vec<&str> = sequence
                .iter()
                .chain(&sequence[..n])
                .map(String::as_str)
                .collect();
            for window in wrapped.windows(n + 1) {
                let (context, successor) = window.split_at(n);
                *counts
                    .entry(context.to_vec())
                    .or_default()
                    .entry(successor[0])
                    .or_default() += 1;
            }
        }
        for (context, successors) in &counts {
            let weights: Vec<String> = successors.iter().map(|(s, c)| format!("{s}={c}")).collect();
            text.push_str(&format!("{}:{{{}}}", context.join(":"), weights.join("|")));
        }
        debug!(symbols = labels.len(), order, "analyzed sequence");
        Self::parse(&text)
    }

    pub fn max_order(&self) -> usize {
        self.max_order
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The value bound to a symbol name.
    pub fn value_of(&self, symbol: &str) -> Option<&str> {
        self.symbols.get(symbol).map(String::as_str)
    }

    /// Symbol names, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    /// Report rules carrying weights that can never be sampled.
    pub fn validate(&self) -> Result<(), String> {
        for rule in &self.rules {
            if let Some((sym, w)) = rule.weights.iter().find(|(_, w)| *w <= 0.0) {
                return Err(format!(
                    "rule {} gives non-positive weight {} to '{sym}'",
                    rule.key_string(),
                    format_num(*w)
                ));
            }
            if rule.positive_total() <= 0.0 {
                return Err(format!("rule {} has no positive weights", rule.key_string()));
            }
        }
        Ok(())
    }

    /// Turn a possibly fractional order into an integer order in
    /// `[0, max_order]` with weighted rounding.
    pub fn resolve_order(&self, order: f64, rng: &mut SeededRng) -> usize {
        let rounded = float_to_int(order, RoundMode::Weight, rng);
        rounded.clamp(0, self.max_order as i64) as usize
    }

    /// The rule used for `history` at `order`, after backoff.
    pub fn find_rule(&self, history: &[String], order: usize) -> Option<&Rule> {
        let take = order.min(history.len()).min(self.max_order);
        for len in (0..=take).rev() {
            let context = &history[history.len() - len..];
            let candidate = self
                .rules
                .iter()
                .filter(|r| r.is_direct())
                .find(|r| r.matches(context))
                .or_else(|| self.rules.iter().find(|r| !r.is_direct() && r.matches(context)));
            match candidate {
                Some(rule) if rule.positive_total() > 0.0 => return Some(rule),
                _ => {
                    if len > 0 {
                        debug!(order = len, "no usable rule; backing off");
                    }
                }
            }
        }
        None
    }

    /// Choose the successor symbol for `history` using a unit value.
    pub fn next(&self, unit: f64, history: &[String], order: usize) -> Option<&str> {
        let rule = self.find_rule(history, order)?;
        sample_weights(&rule.weights, unit)
    }
}

/// Bijective base-26 label: 0 is `a`, 25 is `z`, 26 is `aa`.
fn alpha_label(mut n: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(char::from(b'a' + (n % 26) as u8));
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    out.iter().rev().collect()
}

fn parse_context(label: &str) -> Result<Vec<Segment>, String> {
    let mut context = Vec::new();
    for segment in label.split(':').filter(|s| !s.is_empty()) {
        let ops = ['*', '-', '|']
            .iter()
            .filter(|op| segment.contains(**op))
            .count();
        let parsed = match ops {
            0 => Segment::Symbol(segment.to_string()),
            1 if segment == "*" => Segment::Any,
            1 if segment.starts_with('-') && segment.len() > 1 && !segment[1..].contains('-') => {
                Segment::Not(segment[1..].to_string())
            }
            1 if segment.contains('|') => {
                let options: Vec<String> = segment.split('|').map(str::to_string).collect();
                if options.iter().any(String::is_empty) {
                    return Err(format!("empty alternative in '{segment}'"));
                }
                Segment::OneOf(options)
            }
            1 => return Err(format!("badly placed operator in '{segment}'")),
            _ => {
                return Err(format!(
                    "only one operator may be used per rule key segment: '{segment}'"
                ));
            }
        };
        context.push(parsed);
    }
    Ok(context)
}

/// Sample from a weight table with a unit value; non-positive weights are
/// skipped.
fn sample_weights(weights: &[(String, f64)], unit: f64) -> Option<&str> {
    let total: f64 = weights.iter().map(|(_, w)| *w).filter(|w| *w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }
    let target = unit.clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    let mut last = None;
    for (sym, w) in weights.iter().filter(|(_, w)| *w > 0.0) {
        cumulative += w;
        last = Some(sym.as_str());
        if cumulative > target {
            return last;
        }
    }
    last
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.symbols.keys().collect();
        names.sort_by(|a, b| by_length_then_name(a, b));
        for name in names {
            write!(f, "{name}{{{}}}", self.symbols[name])?;
        }
        for rule in &self.rules {
            let weights: Vec<String> = rule
                .weights
                .iter()
                .map(|(s, w)| format!("{s}={}", format_num(*w)))
                .collect();
            write!(f, "{}{{{}}}", rule.key_string(), weights.join("|"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn zero_order_distribution() {
        let t = Transition::parse("a{1}b{2}:{a=1|b=3}").unwrap();
        let mut rng = SeededRng::new(11);
        let n = 10_000;
        let a_count = (0..n)
            .filter(|_| t.next(rng.next_f64(), &[], 0) == Some("a"))
            .count();
        let p = a_count as f64 / n as f64;
        assert!((p - 0.25).abs() < 0.02, "P(a) out of range: {p}");
    }

    #[test]
    fn first_order_rule_is_used_when_history_allows() {
        let t = Transition::parse("a{x} b{y} :{a=1|b=1} a:{b=1} b:{a=1}").unwrap();
        assert_eq!(t.max_order(), 1);
        for u in [0.0, 0.3, 0.99] {
            assert_eq!(t.next(u, &hist(&["a"]), 1), Some("b"));
            assert_eq!(t.next(u, &hist(&["a", "b"]), 1), Some("a"));
        }
    }

    #[test]
    fn backoff_shortens_context() {
        let t = Transition::parse("a{x}b{y}c{z}:{c=1}a:b:{a=1}").unwrap();
        // no second-order rule for b:b, no first-order rules at all
        assert_eq!(t.next(0.5, &hist(&["b", "b"]), 2), Some("c"));
        assert_eq!(t.next(0.5, &hist(&["a", "b"]), 2), Some("a"));
        // order 1 never sees the a:b context
        assert_eq!(t.next(0.5, &hist(&["a", "b"]), 1), Some("c"));
    }

    #[test]
    fn expression_segments_match() {
        let t = Transition::parse("a{a}b{b}c{c}:{a=1}*:-c:{c=1}a|b:c:{b=1}").unwrap();
        assert_eq!(t.next(0.5, &hist(&["c", "a"]), 2), Some("c"));
        assert_eq!(t.next(0.5, &hist(&["b", "c"]), 2), Some("b"));
        assert_eq!(t.next(0.5, &hist(&["c", "c"]), 2), Some("a"));
    }

    #[test]
    fn direct_match_beats_expression() {
        let t = Transition::parse("a{a}b{b}:{a=1}*:{a=1}b:{b=1}").unwrap();
        assert_eq!(t.next(0.5, &hist(&["b"]), 1), Some("b"));
        assert_eq!(t.next(0.5, &hist(&["a"]), 1), Some("a"));
    }

    #[test]
    fn canonical_display_reparses() {
        let t = Transition::parse("b{2} a{1} cc{3} b:a{a=2|b=1} :{cc=1|a=3} a:{b=1}").unwrap();
        let text = t.to_string();
        assert_eq!(text, "a{1}b{2}cc{3}:{a=3|cc=1}a:{b=1}b:a:{a=2|b=1}");
        assert_eq!(Transition::parse(&text).unwrap(), t);
    }

    #[test]
    fn syntax_errors() {
        let bad = [
            "a{1}:{a=1",
            "a{1}b{2}",
            ":{a=1}",
            "a{1}:{b=1}",
            "a{1}:{a=x}",
            "a{1}:{a=1=2}",
            "a{1}a:{a=1}",
            "a{1}b:{a=1}:{a=1}",
            "A#{1}:{a=1}",
            "a{1}:{a=1}*-a:{a=1}",
        ];
        for text in bad {
            assert!(
                matches!(
                    Transition::parse(text),
                    Err(PmtrError::Syntax { kind: SyntaxKind::Transition, .. })
                ),
                "expected transition error for {text}"
            );
        }
    }

    #[test]
    fn non_positive_weights_parse_but_fail_validation() {
        let t = Transition::parse("a{1}b{2}:{a=0|b=2}").unwrap();
        assert!(t.validate().is_err());
        for u in [0.0, 0.5, 0.999] {
            assert_eq!(t.next(u, &[], 0), Some("b"));
        }
        let ok = Transition::parse("a{1}b{2}:{a=1|b=2}").unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn analysis_counts_cyclic_transitions() {
        let seq = hist(&["1", "2", "1", "3"]);
        let t = Transition::from_analysis(&seq, 1).unwrap();
        assert_eq!(t.to_string(), "a{1}b{2}c{3}:{a=2|b=1|c=1}a:{b=1|c=1}b:{a=1}c:{a=1}");
        assert_eq!(Transition::parse(&t.to_string()).unwrap(), t);
        assert_eq!(t.next(0.5, &hist(&["b"]), 1), Some("a"));
    }

    #[test]
    fn analysis_clamps_order_and_rejects_bad_values() {
        let t = Transition::from_analysis(&hist(&["x", "y"]), 5).unwrap();
        assert_eq!(t.max_order(), 1);
        let t = Transition::from_analysis(&hist(&["4"]), 3).unwrap();
        assert_eq!(t.to_string(), "a{4}:{a=1}");
        for bad in [hist(&[]), hist(&["a{b"]), hist(&["k=1"])] {
            assert!(matches!(
                Transition::from_analysis(&bad, 1),
                Err(PmtrError::Syntax { kind: SyntaxKind::Transition, .. })
            ));
        }
    }

    #[test]
    fn analysis_labels_run_past_z() {
        assert_eq!(alpha_label(0), "a");
        assert_eq!(alpha_label(25), "z");
        assert_eq!(alpha_label(26), "aa");
        assert_eq!(alpha_label(701), "zz");
        assert_eq!(alpha_label(702), "aaa");
        let seq: Vec<String> = (0..30).map(|i| i.to_string()).collect();
        let t = Transition::from_analysis(&seq, 0).unwrap();
        assert_eq!(t.value_of("ad"), Some("29"));
    }

    #[test]
    fn fractional_order_rounds_by_weight() {
        let t = Transition::parse("a{1}:{a=1}a:{a=1}a:a:{a=1}").unwrap();
        let mut rng = SeededRng::new(4);
        assert_eq!(t.resolve_order(7.0, &mut rng), 2);
        assert_eq!(t.resolve_order(-3.0, &mut rng), 0);
        let ones = (0..1000).filter(|_| t.resolve_order(0.5, &mut rng) == 1).count();
        assert!((400..600).contains(&ones), "weighted rounding skewed: {ones}");
    }
}
