// Weighted ensemble over strategy votes, plus the accuracy-driven weight
// calibration that feeds it.

use serde::{Deserialize, Serialize};

use crate::config::PredictorConfig;
use crate::ledger::PerformanceLedger;
use crate::strategy::{Strategy, StrategyVotes};
use crate::symbol::Symbol;

/// Per-strategy weight, indexed by [`Strategy::index`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights([f64; Strategy::COUNT]);

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self([1.0 / Strategy::COUNT as f64; Strategy::COUNT])
    }
}

impl EnsembleWeights {
    pub fn new(weights: [f64; Strategy::COUNT]) -> Self {
        Self(weights)
    }

    pub fn get(&self, strategy: Strategy) -> f64 {
        self.0[strategy.index()]
    }

    pub fn set(&mut self, strategy: Strategy, weight: f64) {
        self.0[strategy.index()] = weight;
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Strategy, f64)> + '_ {
        Strategy::ALL.iter().map(|&s| (s, self.get(s)))
    }
}

/// Outcome of one ensemble round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combined {
    pub symbol: Symbol,
    pub confidence: f64,
    /// Most confident individual strategy, not necessarily the heaviest.
    pub winner: Strategy,
}

/// Weighted vote. `None` only when every strategy abstained.
pub fn combine(votes: &StrategyVotes, weights: &EnsembleWeights) -> Option<Combined> {
    let mut buckets = [0.0f64; 2];
    let mut winner: Option<(Strategy, f64)> = None;

    for (strategy, vote) in votes.iter() {
        buckets[vote.symbol.index()] += vote.confidence * weights.get(strategy);
        // Strict comparison keeps the earliest strategy on ties
        if winner.map_or(true, |(_, best)| vote.confidence > best) {
            winner = Some((strategy, vote.confidence));
        }
    }

    let (winner, _) = winner?;
    let symbol = if buckets[Symbol::A.index()] >= buckets[Symbol::B.index()] {
        Symbol::A
    } else {
        Symbol::B
    };
    Some(Combined {
        symbol,
        confidence: buckets[symbol.index()].clamp(0.0, 1.0),
        winner,
    })
}

/// Blends overall and recent accuracy into normalized weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightCalibrator {
    overall_weight: f64,
    recent_window: usize,
}

impl WeightCalibrator {
    pub fn new(overall_weight: f64, recent_window: usize) -> Self {
        Self {
            overall_weight,
            recent_window,
        }
    }

    pub fn from_config(config: &PredictorConfig) -> Self {
        Self::new(config.overall_weight, config.recent_window)
    }

    /// Fresh weights summing to 1, or `None` when every strategy scores 0.
    pub fn calibrate(&self, ledger: &PerformanceLedger) -> Option<EnsembleWeights> {
        let mut raw = [0.0; Strategy::COUNT];
        for strategy in Strategy::ALL {
            let overall = ledger.stats(strategy).accuracy();
            let recent = ledger.recent_accuracy(strategy, self.recent_window);
            raw[strategy.index()] =
                self.overall_weight * overall + (1.0 - self.overall_weight) * recent;
        }

        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return None;
        }
        raw.iter_mut().for_each(|w| *w /= total);
        Some(EnsembleWeights(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PredictionRecord;
    use crate::strategy::Vote;

    #[test]
    fn test_default_weights_are_uniform() {
        let weights = EnsembleWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-12);
        assert_eq!(weights.get(Strategy::Cycle), 0.2);
    }

    #[test]
    fn test_all_abstain_yields_none() {
        assert_eq!(combine(&StrategyVotes::default(), &EnsembleWeights::default()), None);
    }

    #[test]
    fn test_weighted_majority_and_winner() {
        let mut votes = StrategyVotes::default();
        votes.set(Strategy::Pattern, Some(Vote::new(Symbol::B, 0.6)));
        votes.set(Strategy::Markov, Some(Vote::new(Symbol::A, 0.9)));
        votes.set(Strategy::Bayesian, Some(Vote::new(Symbol::B, 0.7)));

        let result = combine(&votes, &EnsembleWeights::default()).unwrap();
        // B: (0.6 + 0.7) * 0.2 = 0.26 beats A: 0.9 * 0.2 = 0.18
        assert_eq!(result.symbol, Symbol::B);
        assert!((result.confidence - 0.26).abs() < 1e-12);
        assert_eq!(result.winner, Strategy::Markov);
    }

    #[test]
    fn test_bucket_tie_resolves_to_a_and_winner_to_earliest() {
        let mut votes = StrategyVotes::default();
        votes.set(Strategy::Markov, Some(Vote::new(Symbol::B, 0.8)));
        votes.set(Strategy::Cycle, Some(Vote::new(Symbol::A, 0.8)));

        let result = combine(&votes, &EnsembleWeights::default()).unwrap();
        assert_eq!(result.symbol, Symbol::A);
        assert_eq!(result.winner, Strategy::Markov);
    }

    #[test]
    fn test_calibration_with_no_history_keeps_prior() {
        let calibrator = WeightCalibrator::new(0.4, 50);
        assert_eq!(calibrator.calibrate(&PerformanceLedger::new()), None);
    }

    #[test]
    fn test_calibration_normalizes() {
        let mut ledger = PerformanceLedger::new();
        for (strategy, actual) in [
            (Strategy::Pattern, Symbol::A),
            (Strategy::Markov, Symbol::A),
            (Strategy::Markov, Symbol::B),
        ] {
            ledger.push(PredictionRecord::new(Symbol::A, 0.7, strategy));
            ledger.resolve_last(actual);
        }

        let weights = WeightCalibrator::new(0.4, 50).calibrate(&ledger).unwrap();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        // Pattern raw 1.0, Markov raw 0.5
        assert!((weights.get(Strategy::Pattern) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(weights.get(Strategy::Classifier), 0.0);
    }
}
