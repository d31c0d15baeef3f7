// Policy-driven selection over a fixed, precomputed sequence.
//
// Many generators precompute a series (basket values, sieve segments, prime
// lists, chaotic baskets, automaton extractions) and then hand it to a
// `Selector`, which returns one element per call according to a
// `SelectionPolicy`. The source never changes after construction; only the
// cursor, the permutation scratch pool, and the last drawn index move.
// `reset()` restores all of it, including the random stream.
//
// Policies and their literal names are listed on `SelectionPolicy`. A
// single-element source always returns that element regardless of policy.

use std::fmt;

use paramgen_prng::SeededRng;
use tracing::warn;

use crate::error::{PmtrError, SyntaxKind};
use crate::stream::RngStream;

/// How a `Selector` walks its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// `oc`, `orderedCyclic`, `1`: in order, wrapping to the start.
    OrderedCyclic,
    /// `ocr`, `orderedCyclicRetrograde`: in reverse order, wrapping to the end.
    OrderedCyclicRetrograde,
    /// `oo`, `orderedOscillate`: forward to the end, then back, without
    /// repeating the turning points.
    OrderedOscillate,
    /// `os`, `orderedOnce`: in order once, then repeat the final element.
    OrderedOnce,
    /// `rc`, `randomChoice`, `0`: uniform with replacement.
    RandomChoice,
    /// `rw`, `randomWalk`: a ±1 step from the current position, wrapping.
    RandomWalk,
    /// `rp`, `randomPermutate`: a full random permutation before any repeat.
    RandomPermutate,
    /// `rnr`, `randomNonRepeat`: uniform, but never the same index twice in a
    /// row unless the retry ceiling is exhausted.
    RandomNonRepeat,
}

const POLICY_NAMES: &[(SelectionPolicy, &str, &[&str])] = &[
    (SelectionPolicy::RandomChoice, "randomChoice", &["rc", "0"]),
    (SelectionPolicy::RandomWalk, "randomWalk", &["rw"]),
    (SelectionPolicy::RandomPermutate, "randomPermutate", &["rp"]),
    (SelectionPolicy::RandomNonRepeat, "randomNonRepeat", &["rnr"]),
    (SelectionPolicy::OrderedCyclic, "orderedCyclic", &["oc", "1"]),
    (
        SelectionPolicy::OrderedCyclicRetrograde,
        "orderedCyclicRetrograde",
        &["ocr"],
    ),
    (SelectionPolicy::OrderedOscillate, "orderedOscillate", &["oo"]),
    (SelectionPolicy::OrderedOnce, "orderedOnce", &["os"]),
];

impl SelectionPolicy {
    /// Parse a selection string (full name or acronym, any case).
    pub fn parse(text: &str) -> Result<Self, PmtrError> {
        let key = text.trim().to_ascii_lowercase();
        POLICY_NAMES
            .iter()
            .find(|(_, name, acronyms)| {
                name.to_ascii_lowercase() == key || acronyms.contains(&key.as_str())
            })
            .map(|(policy, _, _)| *policy)
            .ok_or_else(|| {
                PmtrError::syntax(SyntaxKind::Selection, text, "unknown selection method")
            })
    }

    /// Canonical (full) name.
    pub fn name(self) -> &'static str {
        POLICY_NAMES
            .iter()
            .find(|(policy, _, _)| *policy == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("orderedCyclic")
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns one element of a fixed source per call.
#[derive(Clone, Debug)]
pub struct Selector<T> {
    source: Vec<T>,
    policy: SelectionPolicy,
    cursor: isize,
    /// Index sequence for `OrderedOscillate`.
    direction: Vec<usize>,
    /// Remaining indices of the current permutation.
    scratch: Vec<usize>,
    last: Option<usize>,
    rng: RngStream,
    retry_limit: usize,
}

impl<T: Clone> Selector<T> {
    /// Build a selector. Fails on an empty source.
    pub fn new(
        source: Vec<T>,
        policy: SelectionPolicy,
        rng: SeededRng,
        retry_limit: usize,
    ) -> Result<Self, PmtrError> {
        if source.is_empty() {
            return Err(PmtrError::value(
                "selector",
                "cannot select from an empty sequence",
            ));
        }
        let direction = oscillate_indices(source.len());
        let mut selector = Self {
            source,
            policy,
            cursor: 0,
            direction,
            scratch: Vec::new(),
            last: None,
            rng: RngStream::new(rng),
            retry_limit,
        };
        selector.cursor = selector.start_cursor();
        Ok(selector)
    }

    fn start_cursor(&self) -> isize {
        match self.policy {
            SelectionPolicy::OrderedCyclicRetrograde => self.source.len() as isize - 1,
            _ => 0,
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn values(&self) -> &[T] {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Restore the post-construction state.
    pub fn reset(&mut self) {
        self.cursor = self.start_cursor();
        self.scratch.clear();
        self.last = None;
        self.rng.reset();
    }

    /// Return the next element.
    pub fn next_value(&mut self) -> T {
        let index = self.next_index();
        self.source[index].clone()
    }

    /// Advance per the policy and return the selected index.
    pub fn next_index(&mut self) -> usize {
        let len = self.source.len();
        if len == 1 {
            return 0;
        }
        let index = match self.policy {
            SelectionPolicy::OrderedCyclic => {
                if self.cursor >= len as isize {
                    self.cursor = 0;
                }
                let i = self.cursor as usize;
                self.cursor += 1;
                i
            }
            SelectionPolicy::OrderedCyclicRetrograde => {
                if self.cursor < 0 {
                    self.cursor = len as isize - 1;
                }
                let i = self.cursor as usize;
                self.cursor -= 1;
                i
            }
            SelectionPolicy::OrderedOscillate => {
                if self.cursor >= self.direction.len() as isize {
                    self.cursor = 0;
                }
                let i = self.direction[self.cursor as usize];
                self.cursor += 1;
                i
            }
            SelectionPolicy::OrderedOnce => {
                let i = (self.cursor as usize).min(len - 1);
                if (self.cursor as usize) < len {
                    self.cursor += 1;
                }
                i
            }
            SelectionPolicy::RandomChoice => self.rng.rng().range_usize(0, len),
            SelectionPolicy::RandomWalk => {
                if self.rng.rng().random_bool(0.5) {
                    self.cursor += 1;
                } else {
                    self.cursor -= 1;
                }
                self.cursor.rem_euclid(len as isize) as usize
            }
            SelectionPolicy::RandomPermutate => {
                if self.scratch.is_empty() {
                    self.scratch = (0..len).collect();
                }
                let pick = self.rng.rng().range_usize(0, self.scratch.len());
                self.scratch.remove(pick)
            }
            SelectionPolicy::RandomNonRepeat => {
                let mut i = self.rng.rng().range_usize(0, len);
                let mut attempts = 0;
                while Some(i) == self.last && attempts < self.retry_limit {
                    i = self.rng.rng().range_usize(0, len);
                    attempts += 1;
                }
                if Some(i) == self.last {
                    warn!(index = i, "retry ceiling reached; repeating the previous element");
                }
                i
            }
        };
        self.last = Some(index);
        index
    }
}

/// 0, 1, .., n-1, n-2, .., 1
fn oscillate_indices(len: usize) -> Vec<usize> {
    if len <= 2 {
        return (0..len).collect();
    }
    (0..len).chain((1..len - 1).rev()).collect()
}
