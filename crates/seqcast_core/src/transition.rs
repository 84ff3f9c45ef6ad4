use crate::patterns::OutcomeCounts;
use crate::strategy::Vote;
use crate::symbol::Symbol;

/// First-order transition counts plus marginal symbol counts.
///
/// Updated on every observation; `transitions[s]` counts what followed `s`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionModel {
    transitions: [OutcomeCounts; 2],
    marginals: OutcomeCounts,
    last: Option<Symbol>,
}

impl TransitionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sequence(sequence: &[Symbol]) -> Self {
        let mut model = Self::new();
        for &symbol in sequence {
            model.observe(symbol);
        }
        model
    }

    pub fn observe(&mut self, symbol: Symbol) {
        if let Some(prev) = self.last {
            self.transitions[prev.index()].record(symbol);
        }
        self.marginals.record(symbol);
        self.last = Some(symbol);
    }

    pub fn row(&self, from: Symbol) -> OutcomeCounts {
        self.transitions[from.index()]
    }

    /// Total recorded transitions; never exceeds observations - 1.
    pub fn transition_count(&self) -> u64 {
        self.transitions.iter().map(OutcomeCounts::total).sum()
    }

    /// Marginal frequency of each symbol, uniform before any observation.
    pub fn priors(&self) -> (f64, f64) {
        match self.marginals.total() {
            0 => (0.5, 0.5),
            total => (
                self.marginals.a as f64 / total as f64,
                self.marginals.b as f64 / total as f64,
            ),
        }
    }

    /// Majority successor of `last`; (A, 0.5) with no data.
    pub fn markov_prediction(&self, last: Symbol) -> Vote {
        self.row(last).vote()
    }

    /// Transition likelihood weighted by the marginal prior, renormalized.
    pub fn bayesian_prediction(&self, last: Symbol) -> Vote {
        let row = self.row(last);
        let total = row.total();
        if total == 0 {
            return Vote::prior();
        }

        let (prior_a, prior_b) = self.priors();
        let p_a = (row.a as f64 / total as f64) * prior_a;
        let p_b = (row.b as f64 / total as f64) * prior_b;
        let norm = p_a + p_b;
        if norm <= 0.0 {
            return Vote::prior();
        }
        Vote::from_probability_a(p_a / norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::parse_sequence;

    #[test]
    fn test_empty_model_defaults_to_a() {
        let model = TransitionModel::new();
        assert_eq!(model.markov_prediction(Symbol::B), Vote::prior());
        assert_eq!(model.bayesian_prediction(Symbol::A), Vote::prior());
    }

    #[test]
    fn test_markov_majority() {
        // After A: B, B, A, B
        let model = TransitionModel::from_sequence(&parse_sequence("ABABAAB").unwrap());
        assert_eq!(model.row(Symbol::A), OutcomeCounts { a: 1, b: 3 });
        let vote = model.markov_prediction(Symbol::A);
        assert_eq!(vote.symbol, Symbol::B);
        assert!((vote.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_transition_count_bounded_by_length() {
        let symbols = parse_sequence("AABBBABAAB").unwrap();
        let model = TransitionModel::from_sequence(&symbols);
        assert_eq!(model.transition_count(), symbols.len() as u64 - 1);
    }

    #[test]
    fn test_bayesian_reweights_by_prior() {
        // After B: A once, B once -> likelihood tie; A dominates the marginals.
        let model = TransitionModel::from_sequence(&parse_sequence("AAAAAABBA").unwrap());
        assert_eq!(model.row(Symbol::B), OutcomeCounts { a: 1, b: 1 });
        let vote = model.bayesian_prediction(Symbol::B);
        assert_eq!(vote.symbol, Symbol::A);
        // prior_a = 7/9, prior_b = 2/9 -> 0.5*7/9 / (0.5*7/9 + 0.5*2/9) = 7/9
        assert!((vote.confidence - 7.0 / 9.0).abs() < 1e-12);
    }
}
