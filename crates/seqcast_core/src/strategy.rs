use core::fmt;

use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// The closed set of prediction strategies, in the order they are queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Pattern,
    Markov,
    Bayesian,
    Cycle,
    Classifier,
}

impl Strategy {
    pub const COUNT: usize = 5;
    pub const ALL: [Strategy; Strategy::COUNT] = [
        Strategy::Pattern,
        Strategy::Markov,
        Strategy::Bayesian,
        Strategy::Cycle,
        Strategy::Classifier,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Pattern => "pattern",
            Strategy::Markov => "markov",
            Strategy::Bayesian => "bayesian",
            Strategy::Cycle => "cycle",
            Strategy::Classifier => "classifier",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single strategy's opinion about the next symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub symbol: Symbol,
    pub confidence: f64,
}

impl Vote {
    pub fn new(symbol: Symbol, confidence: f64) -> Self {
        Self { symbol, confidence }
    }

    /// Uniform prior. Ties and empty data always resolve to A.
    pub fn prior() -> Self {
        Self::new(Symbol::A, 0.5)
    }

    /// Majority class of a two-class distribution given P(A); P(A) = 0.5 picks A.
    pub fn from_probability_a(p_a: f64) -> Self {
        if p_a >= 0.5 {
            Self::new(Symbol::A, p_a)
        } else {
            Self::new(Symbol::B, 1.0 - p_a)
        }
    }
}

/// Per-strategy votes for one prediction round. `None` means the strategy abstained.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrategyVotes([Option<Vote>; Strategy::COUNT]);

impl StrategyVotes {
    pub fn set(&mut self, strategy: Strategy, vote: Option<Vote>) {
        self.0[strategy.index()] = vote;
    }

    pub fn get(&self, strategy: Strategy) -> Option<Vote> {
        self.0[strategy.index()]
    }

    /// Non-abstaining votes in fixed strategy order.
    pub fn iter(&self) -> impl Iterator<Item = (Strategy, Vote)> + '_ {
        Strategy::ALL
            .iter()
            .filter_map(|&s| self.get(s).map(|vote| (s, vote)))
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|v| v.is_some()).count()
    }
}
