//! Pattern Frequency Database
//!
//! Maps trailing symbol runs of every length in `[min_len, max_len]` to the
//! counts of the symbol that followed them. A secondary n-gram table
//! (lengths 2..=`max_ngram`) backs the lookup when no long pattern matches.
//!
//! Keys pack the run into a `u64` (A = 1, B = 0) alongside its length, so
//! "AB" and "AAB" never collide even though their bit values may.

use core::fmt;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::PredictorConfig;
use crate::strategy::Vote;
use crate::symbol::Symbol;

/// Longest run that fits in a [`PatternKey`].
pub const MAX_PATTERN_LEN: usize = 63;

/// Shortest n-gram tracked by the secondary table.
const MIN_NGRAM_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternKey {
    bits: u64,
    len: u8,
}

impl PatternKey {
    pub fn from_symbols(symbols: &[Symbol]) -> Self {
        debug_assert!(symbols.len() <= MAX_PATTERN_LEN);
        let bits = symbols
            .iter()
            .fold(0u64, |acc, s| (acc << 1) | s.bit() as u64);
        Self {
            bits,
            len: symbols.len() as u8,
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn to_symbols(&self) -> Vec<Symbol> {
        (0..self.len)
            .rev()
            .map(|shift| {
                if (self.bits >> shift) & 1 == 1 {
                    Symbol::A
                } else {
                    Symbol::B
                }
            })
            .collect()
    }
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in self.to_symbols() {
            write!(f, "{}", s)?;
        }
        Ok(())
    }
}

/// Exact tallies of the symbol that followed a context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub a: u64,
    pub b: u64,
}

impl OutcomeCounts {
    pub fn record(&mut self, next: Symbol) {
        match next {
            Symbol::A => self.a += 1,
            Symbol::B => self.b += 1,
        }
    }

    pub fn get(&self, symbol: Symbol) -> u64 {
        match symbol {
            Symbol::A => self.a,
            Symbol::B => self.b,
        }
    }

    pub fn total(&self) -> u64 {
        self.a + self.b
    }

    /// P(A), or `None` when nothing has been counted.
    pub fn probability_a(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.a as f64 / total as f64),
        }
    }

    /// Majority vote, falling back to the uniform prior on empty counts.
    pub fn vote(&self) -> Vote {
        self.probability_a()
            .map(Vote::from_probability_a)
            .unwrap_or_else(Vote::prior)
    }
}

/// Which table answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Pattern(usize),
    NGram(usize),
    Prior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    pub counts: OutcomeCounts,
    pub source: LookupSource,
}

impl PatternMatch {
    fn prior() -> Self {
        Self {
            counts: OutcomeCounts::default(),
            source: LookupSource::Prior,
        }
    }

    pub fn vote(&self) -> Vote {
        self.counts.vote()
    }
}

#[derive(Debug, Clone)]
pub struct PatternDatabase {
    min_len: usize,
    max_len: usize,
    max_ngram: usize,
    patterns: HashMap<PatternKey, OutcomeCounts>,
    ngrams: HashMap<PatternKey, OutcomeCounts>,
}

impl PatternDatabase {
    pub fn new(min_len: usize, max_len: usize, max_ngram: usize) -> Self {
        Self {
            min_len,
            max_len: max_len.min(MAX_PATTERN_LEN),
            max_ngram: max_ngram.min(MAX_PATTERN_LEN),
            patterns: HashMap::new(),
            ngrams: HashMap::new(),
        }
    }

    pub fn from_config(config: &PredictorConfig) -> Self {
        Self::new(
            config.min_pattern_len,
            config.max_pattern_len,
            config.max_ngram_len,
        )
    }

    /// Bulk-count every (pattern, next) pair in `sequence`.
    ///
    /// Equivalent to calling [`update`](Self::update) once per position, so a
    /// database built in bulk matches one grown incrementally.
    pub fn observe(&mut self, sequence: &[Symbol]) {
        for end in 1..sequence.len() {
            self.update(&sequence[..end], sequence[end]);
        }
    }

    /// Count `next` against every tracked suffix of `window`.
    pub fn update(&mut self, window: &[Symbol], next: Symbol) {
        let longest = self.max_len.min(window.len());
        for len in self.min_len..=longest {
            let key = PatternKey::from_symbols(&window[window.len() - len..]);
            self.patterns.entry(key).or_default().record(next);
        }

        let longest_ngram = self.max_ngram.min(window.len());
        for len in MIN_NGRAM_LEN..=longest_ngram {
            let key = PatternKey::from_symbols(&window[window.len() - len..]);
            self.ngrams.entry(key).or_default().record(next);
        }
    }

    /// Counts for the longest suffix of `window` with observations.
    pub fn lookup(&self, window: &[Symbol]) -> PatternMatch {
        if window.len() < self.min_len {
            return PatternMatch::prior();
        }

        let longest = self.max_len.min(window.len());
        for len in (self.min_len..=longest).rev() {
            let key = PatternKey::from_symbols(&window[window.len() - len..]);
            if let Some(counts) = self.patterns.get(&key).filter(|c| c.total() > 0) {
                return PatternMatch {
                    counts: *counts,
                    source: LookupSource::Pattern(len),
                };
            }
        }

        let longest_ngram = self.max_ngram.min(window.len());
        for len in (MIN_NGRAM_LEN..=longest_ngram).rev() {
            let key = PatternKey::from_symbols(&window[window.len() - len..]);
            if let Some(counts) = self.ngrams.get(&key).filter(|c| c.total() > 0) {
                return PatternMatch {
                    counts: *counts,
                    source: LookupSource::NGram(len),
                };
            }
        }

        PatternMatch::prior()
    }

    pub fn predict(&self, window: &[Symbol]) -> Vote {
        self.lookup(window).vote()
    }

    /// Register every substring of `recent` that the database has never seen,
    /// with zero counts. Returns how many keys were added.
    pub fn extend_with(&mut self, recent: &[Symbol]) -> usize {
        let mut added = 0;
        for len in self.min_len..=self.max_len.min(recent.len()) {
            for start in 0..=recent.len() - len {
                let key = PatternKey::from_symbols(&recent[start..start + len]);
                if let Entry::Vacant(slot) = self.patterns.entry(key) {
                    slot.insert(OutcomeCounts::default());
                    added += 1;
                }
            }
        }
        added
    }

    pub fn counts(&self, pattern: &[Symbol]) -> Option<OutcomeCounts> {
        if pattern.len() > MAX_PATTERN_LEN {
            return None;
        }
        self.patterns
            .get(&PatternKey::from_symbols(pattern))
            .copied()
    }

    /// Number of distinct pattern keys (n-grams excluded).
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}
