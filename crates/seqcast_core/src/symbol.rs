use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};

/// One observed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    A,
    B,
}

impl Symbol {
    pub const ALL: [Symbol; 2] = [Symbol::A, Symbol::B];

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Symbol::A),
            'B' => Some(Symbol::B),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Symbol::A => 'A',
            Symbol::B => 'B',
        }
    }

    /// Numeric encoding used by the spectral and feature code: A = 1, B = 0.
    pub fn bit(self) -> u8 {
        match self {
            Symbol::A => 1,
            Symbol::B => 0,
        }
    }

    /// Row index into two-element tables.
    pub fn index(self) -> usize {
        match self {
            Symbol::A => 0,
            Symbol::B => 1,
        }
    }

    pub fn inverted(self) -> Self {
        match self {
            Symbol::A => Symbol::B,
            Symbol::B => Symbol::A,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<char> for Symbol {
    type Error = PredictorError;

    fn try_from(c: char) -> Result<Self> {
        Symbol::from_char(c).ok_or(PredictorError::InvalidSymbol {
            found: c,
            position: 0,
        })
    }
}

/// Parse a training sequence. Every character must be 'A' or 'B'.
pub fn parse_sequence(input: &str) -> Result<Vec<Symbol>> {
    if input.is_empty() {
        return Err(PredictorError::EmptySequence);
    }
    input
        .chars()
        .enumerate()
        .map(|(position, found)| {
            Symbol::from_char(found).ok_or(PredictorError::InvalidSymbol { found, position })
        })
        .collect()
}

/// Parse exactly one observed symbol, e.g. the `last_char` of a predict request.
pub fn parse_single(input: &str) -> Result<Symbol> {
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Symbol::try_from(c),
        (None, _) => Err(PredictorError::EmptySequence),
        _ => Err(PredictorError::NotSingleSymbol(input.chars().count())),
    }
}

pub fn to_string(symbols: &[Symbol]) -> String {
    symbols.iter().map(|s| s.as_char()).collect()
}

/// Append-only record of every observed symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceLog {
    symbols: Vec<Symbol>,
}

impl SequenceLog {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    pub fn append(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn as_slice(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn last(&self) -> Option<Symbol> {
        self.symbols.last().copied()
    }

    /// Trailing view of at most `len` symbols.
    pub fn window(&self, len: usize) -> &[Symbol] {
        let start = self.symbols.len().saturating_sub(len);
        &self.symbols[start..]
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.symbols.iter().filter(|&&s| s == symbol).count()
    }
}
