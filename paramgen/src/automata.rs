// One-dimensional cellular automata.
//
// An automaton is described by a spec string of `key{value}` pairs:
//
//     f{s}k{2}r{1}i{center}x{91}y{135}w{0}c{0}s{0}b{wrap}
//
// | key | aliases           | meaning                                       |
// |-----|-------------------|-----------------------------------------------|
// | f   | format form type  | s standard, t totalistic, c continuous, f float |
// | k   | colors            | states per cell (2..36; continuous ignores it) |
// | r   | radius            | neighbourhood radius, 0.5..10 in halves        |
// | i   | init initial      | center, random, a digit pattern, or a number   |
// | x   | size              | row width                                      |
// | y   | steps gen         | generations kept after skipping                |
// | w   | width             | extraction width, 0 means x                    |
// | c   | center            | extraction center offset                       |
// | s   | skip              | generations discarded before extraction        |
// | b   | boundary          | wrap, or fixed (outside cells read as 0)       |
//
// Rule families:
// - standard: the neighbourhood read as a base-k number n (leftmost cell most
//   significant) selects digit n of the rule written in base k.
// - totalistic: the neighbourhood sum s selects digit s of the rule.
// - continuous / float: the next cell is (neighbourhood mean + rule) mod 1.
//
// Each step takes its own rule and mutation value, so rules can change over
// time. Mutation is the probability that a cell takes a different state
// (continuous: a fresh random value).
//
// `extract()` reads rows `s..` through a `TableFormat`: a reduction (flat,
// sum, average, product) along rows or columns, optionally reflected, with a
// cell filter (values, indices, active or passive cells). Products multiply
// the non-zero cells only, so an all-zero row reduces to 1.

use std::fmt;

use paramgen_prng::SeededRng;

use crate::config::GeneratorConfig;
use crate::error::{PmtrError, SyntaxKind};
use crate::unit;
use crate::value::format_num;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleFamily {
    Standard,
    Totalistic,
    Continuous,
    Float,
}

impl RuleFamily {
    fn code(self) -> &'static str {
        match self {
            RuleFamily::Standard => "s",
            RuleFamily::Totalistic => "t",
            RuleFamily::Continuous => "c",
            RuleFamily::Float => "f",
        }
    }

    pub fn is_continuous(self) -> bool {
        matches!(self, RuleFamily::Continuous | RuleFamily::Float)
    }
}

/// Generation 0.
#[derive(Clone, Debug, PartialEq)]
pub enum CaInit {
    Center,
    Random,
    /// Cell values cycled across the row.
    Pattern(Vec<u8>),
    Fill(f64),
}

impl fmt::Display for CaInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaInit::Center => f.write_str("center"),
            CaInit::Random => f.write_str("random"),
            CaInit::Pattern(digits) => {
                for d in digits {
                    write!(f, "{d}")?;
                }
                Ok(())
            }
            CaInit::Fill(v) => f.write_str(&format_num(*v)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaBoundary {
    Wrap,
    Fixed,
}

/// A parsed automaton spec string.
#[derive(Clone, Debug, PartialEq)]
pub struct AutomatonSpec {
    pub family: RuleFamily,
    pub k: u32,
    pub r: f64,
    pub init: CaInit,
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub c: i64,
    pub s: usize,
    pub boundary: CaBoundary,
}

const KEY_ALIASES: &[(&str, &[&str])] = &[
    ("f", &["format", "form", "type"]),
    ("k", &["colors"]),
    ("r", &["radius"]),
    ("i", &["init", "initial"]),
    ("x", &["size"]),
    ("y", &["steps", "gen"]),
    ("w", &["width"]),
    ("c", &["center"]),
    ("s", &["skip"]),
    ("b", &["boundary"]),
];

impl AutomatonSpec {
    pub fn parse(text: &str, config: &GeneratorConfig) -> Result<Self, PmtrError> {
        let err = |message: String| PmtrError::syntax(SyntaxKind::Automaton, text, message);
        if text.matches('{').count() != text.matches('}').count() {
            return Err(err("all braces not paired".into()));
        }

        let mut spec = Self {
            family: RuleFamily::Standard,
            k: 2,
            r: 1.0,
            init: CaInit::Center,
            x: 91,
            y: 135,
            w: 0,
            c: 0,
            s: 0,
            boundary: CaBoundary::Wrap,
        };
        let mut k_given = None;

        for group in text.split('}') {
            if group.trim().is_empty() {
                continue;
            }
            let mut parts = group.split('{');
            let (Some(label), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(err(format!("badly placed delimiters near '{}'", group.trim())));
            };
            let label = label.trim().to_ascii_lowercase();
            let value = value.trim().to_ascii_lowercase();
            let key = KEY_ALIASES
                .iter()
                .find(|(key, aliases)| *key == label || aliases.contains(&label.as_str()))
                .map(|(key, _)| *key)
                .ok_or_else(|| err(format!("unknown key '{label}'")))?;
            let int = |min: i64, max: i64| -> Result<i64, PmtrError> {
                value
                    .parse::<i64>()
                    .ok()
                    .filter(|v| (min..=max).contains(v))
                    .ok_or_else(|| err(format!("{key}{{{value}}} must be an integer in {min}..={max}")))
            };
            let x_max = config.automaton_width_max as i64;
            let y_max = config.automaton_height_max as i64;
            match key {
                "f" => {
                    spec.family = match value.as_str() {
                        "s" | "standard" => RuleFamily::Standard,
                        "t" | "tot" | "totalistic" => RuleFamily::Totalistic,
                        "c" | "continuous" => RuleFamily::Continuous,
                        "f" | "float" => RuleFamily::Float,
                        _ => return Err(err(format!("unknown format '{value}'"))),
                    }
                }
                "k" => k_given = Some(int(0, 36)? as u32),
                "r" => {
                    let r: f64 = value
                        .parse()
                        .ok()
                        .filter(|r: &f64| (0.5..=10.0).contains(r))
                        .ok_or_else(|| err(format!("r{{{value}}} must be in 0.5..=10")))?;
                    spec.r = (r * 2.0).round() / 2.0;
                }
                "i" => spec.init = parse_init(&value).ok_or_else(|| err(format!("bad init '{value}'")))?,
                "x" => spec.x = int(1, x_max)? as usize,
                "y" => spec.y = int(1, y_max)? as usize,
                "w" => spec.w = int(0, y_max)? as usize,
                "c" => spec.c = int(-x_max, x_max)?,
                "s" => spec.s = int(0, y_max)? as usize,
                "b" => {
                    spec.boundary = match value.as_str() {
                        "wrap" | "w" => CaBoundary::Wrap,
                        "fixed" | "f" => CaBoundary::Fixed,
                        _ => return Err(err(format!("unknown boundary '{value}'"))),
                    }
                }
                _ => {}
            }
        }

        if let Some(k) = k_given {
            if k == 0 && !spec.family.is_continuous() {
                spec.family = RuleFamily::Float;
            }
            spec.k = k;
        }
        if spec.family.is_continuous() {
            spec.k = 0;
        } else if spec.k < 2 {
            return Err(err(format!("k{{{}}} needs at least 2 states", spec.k)));
        }
        if spec.family == RuleFamily::Totalistic && spec.r < 1.0 {
            return Err(err("totalistic automata need r of at least 1".into()));
        }
        if spec.w == 0 {
            spec.w = spec.x;
        }
        Ok(spec)
    }

    /// Cells read per neighbourhood.
    pub fn span(&self) -> usize {
        (self.r * 2.0) as usize + 1
    }

    /// Generations computed: kept plus skipped.
    pub fn total_generations(&self) -> usize {
        self.y + self.s
    }
}

fn parse_init(value: &str) -> Option<CaInit> {
    match value {
        "c" | "center" => Some(CaInit::Center),
        "r" | "random" => Some(CaInit::Random),
        _ if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) => Some(CaInit::Pattern(
            value.bytes().map(|b| b - b'0').collect(),
        )),
        _ => value.parse::<f64>().ok().filter(|v| v.is_finite()).map(CaInit::Fill),
    }
}

impl fmt::Display for AutomatonSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "f{{{}}}k{{{}}}r{{{}}}i{{{}}}x{{{}}}y{{{}}}w{{{}}}c{{{}}}s{{{}}}b{{{}}}",
            self.family.code(),
            self.k,
            format_num(self.r),
            self.init,
            self.x,
            self.y,
            self.w,
            self.c,
            self.s,
            match self.boundary {
                CaBoundary::Wrap => "wrap",
                CaBoundary::Fixed => "fixed",
            }
        )
    }
}

/// How rows are reduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Flat,
    Sum,
    Average,
    Product,
}

/// Which cells of a row an extraction keeps, and whether it keeps their
/// values or their column indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellFilter {
    Value,
    ValueActive,
    ValuePassive,
    Index,
    IndexActive,
    IndexPassive,
}

/// An extraction format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableFormat {
    pub reduction: Reduction,
    pub column: bool,
    pub reflect: bool,
    pub filter: CellFilter,
}

const REDUCTIONS: &[(Reduction, &str, &str)] = &[
    (Reduction::Flat, "flat", "f"),
    (Reduction::Sum, "sum", "s"),
    (Reduction::Average, "average", "a"),
    (Reduction::Product, "product", "p"),
];

const FILTERS: &[(CellFilter, &str, &str)] = &[
    (CellFilter::Value, "", ""),
    (CellFilter::ValueActive, "Active", "a"),
    (CellFilter::ValuePassive, "Passive", "p"),
    (CellFilter::Index, "Index", "i"),
    (CellFilter::IndexActive, "IndexActive", "ia"),
    (CellFilter::IndexPassive, "IndexPassive", "ip"),
];

impl TableFormat {
    /// Every valid format with its camelCase name and acronym.
    fn all() -> Vec<(TableFormat, String, String)> {
        let mut out = Vec::new();
        for &(reduction, name, short) in REDUCTIONS {
            for column in [false, true] {
                let reflects: &[bool] = if reduction == Reduction::Flat { &[false, true] } else { &[false] };
                for &reflect in reflects {
                    for &(filter, fname, fshort) in FILTERS {
                        let full = format!(
                            "{name}{}{}{fname}",
                            if column { "Column" } else { "Row" },
                            if reflect { "Reflect" } else { "" }
                        );
                        let acronym = format!(
                            "{short}{}{}{fshort}",
                            if column { "c" } else { "r" },
                            if reflect { "r" } else { "" }
                        );
                        let format = TableFormat {
                            reduction,
                            column,
                            reflect,
                            filter,
                        };
                        out.push((format, full, acronym));
                    }
                }
            }
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self, PmtrError> {
        let key = text.trim().to_ascii_lowercase();
        let row = |reduction| TableFormat {
            reduction,
            column: false,
            reflect: false,
            filter: CellFilter::Value,
        };
        match key.as_str() {
            "f" | "flat" => return Ok(row(Reduction::Flat)),
            "s" | "sum" => return Ok(row(Reduction::Sum)),
            "a" | "average" => return Ok(row(Reduction::Average)),
            "p" | "product" => return Ok(row(Reduction::Product)),
            _ => {}
        }
        Self::all()
            .into_iter()
            .find(|(_, full, acronym)| full.to_ascii_lowercase() == key || *acronym == key)
            .map(|(format, _, _)| format)
            .ok_or_else(|| PmtrError::syntax(SyntaxKind::Format, text, "not a valid table format"))
    }

    /// Canonical camelCase name.
    pub fn name(&self) -> String {
        Self::all()
            .into_iter()
            .find(|(format, _, _)| format == self)
            .map(|(_, full, _)| full)
            .unwrap_or_else(|| "flatRow".to_string())
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// An automaton and its generation history.
#[derive(Clone, Debug)]
pub struct Automaton {
    spec: AutomatonSpec,
    rows: Vec<Vec<f64>>,
}

impl Automaton {
    /// Create the automaton with generation 0 in place.
    pub fn new(spec: AutomatonSpec, rng: &mut SeededRng) -> Self {
        let first = initial_row(&spec, rng);
        Self {
            spec,
            rows: vec![first],
        }
    }

    pub fn spec(&self) -> &AutomatonSpec {
        &self.spec
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Compute the next generation from the last.
    pub fn step(&mut self, rule: f64, mutation: f64, rng: &mut SeededRng) {
        let Some(last) = self.rows.last() else {
            return;
        };
        let spec = &self.spec;
        let span = spec.span();
        let shift = (span / 2) as i64;
        let width = spec.x as i64;
        let k = spec.k as u128;
        let neighbourhood = |pos: usize| -> Vec<f64> {
            (0..span as i64)
                .map(|q| {
                    let i = pos as i64 - shift + q;
                    match spec.boundary {
                        CaBoundary::Wrap => last[i.rem_euclid(width) as usize],
                        CaBoundary::Fixed if (0..width).contains(&i) => last[i as usize],
                        CaBoundary::Fixed => 0.0,
                    }
                })
                .collect()
        };

        let mut next = Vec::with_capacity(spec.x);
        match spec.family {
            RuleFamily::Continuous | RuleFamily::Float => {
                let rule = if rule.is_finite() { rule.rem_euclid(1.0) } else { 0.0 };
                for pos in 0..spec.x {
                    let cells = neighbourhood(pos);
                    let mean = cells.iter().sum::<f64>() / cells.len() as f64;
                    let mutate = rng.next_f64() < mutation;
                    next.push(if mutate { rng.next_f64() } else { (mean + rule).rem_euclid(1.0) });
                }
            }
            RuleFamily::Standard | RuleFamily::Totalistic => {
                let sums = (k as usize - 1) * span + 1;
                let space = match spec.family {
                    RuleFamily::Standard => k.checked_pow(span as u32).and_then(|n| pow_u128(k, n)),
                    _ => pow_u128(k, sums as u128),
                };
                let rule = rule_number(rule, space, rng);
                for pos in 0..spec.x {
                    let cells = neighbourhood(pos);
                    let selector = match spec.family {
                        RuleFamily::Standard => cells.iter().fold(Some(0u128), |acc, &c| {
                            acc.and_then(|a| a.checked_mul(k)).and_then(|a| a.checked_add(c as u128))
                        }),
                        _ => Some(cells.iter().map(|&c| c as u128).sum()),
                    };
                    let state = selector.map_or(0, |n| rule_digit(rule, k, n));
                    let state = if rng.next_f64() < mutation {
                        let others = spec.k as usize - 1;
                        let pick = rng.range_usize(0, others) as u128;
                        if pick >= state { pick + 1 } else { pick }
                    } else {
                        state
                    };
                    next.push(state as f64);
                }
            }
        }
        self.rows.push(next);
    }

    /// Read rows `s..` through `format`. With `normalize`, the series is
    /// mapped onto the unit interval against (0, series maximum).
    pub fn extract(&self, format: TableFormat, normalize: bool) -> Vec<f64> {
        let spec = &self.spec;
        let start = spec.s.min(self.rows.len());
        let center = (spec.x / 2) as i64 + spec.c;
        let (left, right) = (spec.w / 2, spec.w - spec.w / 2);
        let (lo, hi) = (center - left as i64, center + right as i64);
        let width = spec.x as i64;

        let mut table: Vec<Vec<f64>> = self.rows[start..]
            .iter()
            .map(|row| {
                (lo..hi)
                    .filter_map(|i| {
                        let q = i.rem_euclid(width) as usize;
                        let v = row[q];
                        match format.filter {
                            CellFilter::Value => Some(v),
                            CellFilter::ValueActive => (v > 0.0).then_some(v),
                            CellFilter::ValuePassive => (v == 0.0).then_some(v),
                            CellFilter::Index => Some(q as f64),
                            CellFilter::IndexActive => (v > 0.0).then_some(q as f64),
                            CellFilter::IndexPassive => (v == 0.0).then_some(q as f64),
                        }
                    })
                    .collect()
            })
            .collect();
        if format.column {
            table = rotate(&table);
        }

        let series: Vec<f64> = match format.reduction {
            Reduction::Flat => table
                .into_iter()
                .flat_map(|mut row| {
                    if format.reflect {
                        row.reverse();
                    }
                    row
                })
                .collect(),
            Reduction::Sum => table.iter().map(|row| row.iter().sum()).collect(),
            Reduction::Average => table
                .iter()
                .map(|row| {
                    if row.is_empty() {
                        0.0
                    } else {
                        row.iter().sum::<f64>() / row.len() as f64
                    }
                })
                .collect(),
            Reduction::Product => table
                .iter()
                .map(|row| row.iter().filter(|v| **v != 0.0).product())
                .collect(),
        };
        if normalize {
            let max = series.iter().copied().fold(0.0_f64, f64::max);
            unit::unit_norm_range(&series, Some((0.0, max)))
        } else {
            series
        }
    }
}

fn initial_row(spec: &AutomatonSpec, rng: &mut SeededRng) -> Vec<f64> {
    let continuous = spec.family.is_continuous();
    let top = if continuous { 1.0 } else { (spec.k - 1) as f64 };
    let mut row = vec![0.0; spec.x];
    match &spec.init {
        CaInit::Center => {
            row[spec.x / 2] = match spec.family {
                RuleFamily::Standard => top,
                _ => 1.0,
            };
        }
        CaInit::Random => {
            for cell in row.iter_mut() {
                *cell = if continuous {
                    rng.next_f64()
                } else {
                    rng.range_usize(0, spec.k as usize) as f64
                };
            }
        }
        CaInit::Pattern(digits) => {
            for (i, cell) in row.iter_mut().enumerate() {
                *cell = (digits[i % digits.len()] as f64).min(top);
            }
        }
        CaInit::Fill(v) => {
            let v = if continuous { v.clamp(0.0, 1.0) } else { v.round().clamp(0.0, top) };
            row.fill(v);
        }
    }
    row
}

fn pow_u128(base: u128, exp: u128) -> Option<u128> {
    u32::try_from(exp).ok().and_then(|e| base.checked_pow(e))
}

/// Weighted-round a rule value and reduce it into the rule space.
fn rule_number(rule: f64, space: Option<u128>, rng: &mut SeededRng) -> u128 {
    if !rule.is_finite() {
        return 0;
    }
    let floor = rule.floor();
    let frac = rule - floor;
    let mut n = floor as i128;
    if frac > 0.0 && rng.random_bool(frac) {
        n = n.saturating_add(1);
    }
    match space.and_then(|s| i128::try_from(s).ok()) {
        Some(s) if s > 0 => n.rem_euclid(s) as u128,
        _ => n.unsigned_abs(),
    }
}

/// Digit `n` of `rule` in base `k`.
fn rule_digit(rule: u128, k: u128, n: u128) -> u128 {
    match pow_u128(k, n) {
        Some(place) => (rule / place) % k,
        None => 0,
    }
}

/// Columns of a table whose rows may differ in length.
fn rotate(table: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let spread = table.iter().map(Vec::len).max().unwrap_or(0);
    (0..spread)
        .map(|i| table.iter().filter_map(|row| row.get(i).copied()).collect())
        .collect()
}
