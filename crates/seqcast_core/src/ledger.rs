use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patterns::PatternKey;
use crate::strategy::Strategy;
use crate::symbol::Symbol;

/// Monotone correct/total tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub correct: u64,
    pub total: u64,
}

impl StrategyStats {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    /// correct / total, 0 when nothing has been verified.
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub symbol: Symbol,
    pub confidence: f64,
    pub strategy: Strategy,
    pub timestamp: DateTime<Utc>,
    /// Filled in once the next true symbol arrives.
    pub correct: Option<bool>,
}

impl PredictionRecord {
    pub fn new(symbol: Symbol, confidence: f64, strategy: Strategy) -> Self {
        Self {
            symbol,
            confidence,
            strategy,
            timestamp: Utc::now(),
            correct: None,
        }
    }
}

/// Error rate observed after a pattern, as reported by reanalysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternErrorRate {
    pub pattern: String,
    pub error_rate: f64,
}

/// Prediction history and accuracy bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct PerformanceLedger {
    stats: [StrategyStats; Strategy::COUNT],
    records: Vec<PredictionRecord>,
    pattern_outcomes: HashMap<PatternKey, StrategyStats>,
}

impl PerformanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: PredictionRecord) {
        self.records.push(record);
    }

    /// Score the most recent unresolved prediction against `actual`.
    /// Returns `None` when there is nothing to verify.
    pub fn resolve_last(&mut self, actual: Symbol) -> Option<bool> {
        let record = self.records.last_mut().filter(|r| r.correct.is_none())?;
        let correct = record.symbol == actual;
        record.correct = Some(correct);
        self.stats[record.strategy.index()].record(correct);
        Some(correct)
    }

    pub fn record_pattern(&mut self, pattern: &[Symbol], correct: bool) {
        self.pattern_outcomes
            .entry(PatternKey::from_symbols(pattern))
            .or_default()
            .record(correct);
    }

    pub fn stats(&self, strategy: Strategy) -> StrategyStats {
        self.stats[strategy.index()]
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fraction correct among the last `window` verified records; 0.5 with none.
    pub fn recent_confidence(&self, window: usize) -> f64 {
        let (correct, total) = self
            .records
            .iter()
            .rev()
            .filter_map(|r| r.correct)
            .take(window)
            .fold((0usize, 0usize), |(c, t), ok| (c + usize::from(ok), t + 1));
        if total == 0 {
            0.5
        } else {
            correct as f64 / total as f64
        }
    }

    /// Accuracy of `strategy` over verified records among the last `window`
    /// predictions it won. 0 when it won none of them.
    pub fn recent_accuracy(&self, strategy: Strategy, window: usize) -> f64 {
        let start = self.records.len().saturating_sub(window);
        let (correct, total) = self.records[start..]
            .iter()
            .filter(|r| r.strategy == strategy)
            .filter_map(|r| r.correct)
            .fold((0usize, 0usize), |(c, t), ok| (c + usize::from(ok), t + 1));
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Error rates of every `pattern_len` run in `recent` with verified
    /// outcomes, highest first.
    pub fn pattern_error_rates(&self, recent: &[Symbol], pattern_len: usize) -> Vec<PatternErrorRate> {
        if pattern_len == 0 || recent.len() < pattern_len {
            return Vec::new();
        }
        let mut rates: Vec<PatternErrorRate> = recent
            .windows(pattern_len)
            .filter_map(|run| {
                let key = PatternKey::from_symbols(run);
                let stats = self.pattern_outcomes.get(&key)?;
                (stats.total > 0).then(|| PatternErrorRate {
                    pattern: key.to_string(),
                    error_rate: 1.0 - stats.accuracy(),
                })
            })
            .collect();
        rates.sort_by(|a, b| b.error_rate.total_cmp(&a.error_rate));
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::parse_sequence;

    fn verified(ledger: &mut PerformanceLedger, strategy: Strategy, correct: bool) {
        ledger.push(PredictionRecord::new(Symbol::A, 0.9, strategy));
        let actual = if correct { Symbol::A } else { Symbol::B };
        assert_eq!(ledger.resolve_last(actual), Some(correct));
    }

    #[test]
    fn test_resolve_updates_winning_strategy_only() {
        let mut ledger = PerformanceLedger::new();
        verified(&mut ledger, Strategy::Markov, true);
        verified(&mut ledger, Strategy::Markov, false);
        assert_eq!(ledger.stats(Strategy::Markov), StrategyStats { correct: 1, total: 2 });
        assert_eq!(ledger.stats(Strategy::Cycle).accuracy(), 0.0);
        // Already resolved
        assert_eq!(ledger.resolve_last(Symbol::A), None);
    }

    #[test]
    fn test_recent_confidence_defaults_to_half() {
        let mut ledger = PerformanceLedger::new();
        assert_eq!(ledger.recent_confidence(20), 0.5);
        ledger.push(PredictionRecord::new(Symbol::A, 0.5, Strategy::Pattern));
        assert_eq!(ledger.recent_confidence(20), 0.5);
    }

    #[test]
    fn test_recent_confidence_uses_trailing_window() {
        let mut ledger = PerformanceLedger::new();
        for _ in 0..10 {
            verified(&mut ledger, Strategy::Pattern, false);
        }
        for i in 0..20 {
            verified(&mut ledger, Strategy::Pattern, i < 16);
        }
        assert!((ledger.recent_confidence(20) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_recent_accuracy_filters_by_strategy() {
        let mut ledger = PerformanceLedger::new();
        verified(&mut ledger, Strategy::Bayesian, true);
        verified(&mut ledger, Strategy::Cycle, false);
        verified(&mut ledger, Strategy::Bayesian, false);
        assert_eq!(ledger.recent_accuracy(Strategy::Bayesian, 50), 0.5);
        assert_eq!(ledger.recent_accuracy(Strategy::Cycle, 50), 0.0);
        assert_eq!(ledger.recent_accuracy(Strategy::Bayesian, 1), 0.0);
        assert_eq!(ledger.recent_accuracy(Strategy::Pattern, 50), 0.0);
    }

    #[test]
    fn test_pattern_error_rates_sorted_descending() {
        let mut ledger = PerformanceLedger::new();
        let ab = parse_sequence("AB").unwrap();
        let ba = parse_sequence("BA").unwrap();
        ledger.record_pattern(&ab, true);
        ledger.record_pattern(&ba, false);
        ledger.record_pattern(&ba, true);

        let rates = ledger.pattern_error_rates(&parse_sequence("ABA").unwrap(), 2);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].pattern, "BA");
        assert_eq!(rates[0].error_rate, 0.5);
        assert_eq!(rates[1].error_rate, 0.0);
    }
}
