use std::sync::Mutex;

use chrono::Timelike;
use tracing::debug;

use super::features::{extract, training_set, StandardScaler};
use super::Classifier;
use crate::error::ClassifierError;
use crate::strategy::Vote;
use crate::symbol::Symbol;

struct FittedModel {
    classifier: Box<dyn Classifier>,
    scaler: Option<StandardScaler>,
}

/// Turns symbol windows into scaled feature vectors for a [`Classifier`].
///
/// Scaler and classifier share one lock so a fit never interleaves with a
/// query.
pub struct ClassifierAdapter {
    window_len: usize,
    model: Mutex<FittedModel>,
}

impl ClassifierAdapter {
    pub fn new(classifier: Box<dyn Classifier>, window_len: usize) -> Self {
        Self {
            window_len,
            model: Mutex::new(FittedModel {
                classifier,
                scaler: None,
            }),
        }
    }

    /// Fit scaler and classifier on the augmented corpus built from
    /// `sequence`. Returns the number of training samples.
    pub fn fit(&self, sequence: &[Symbol], hour: u32) -> Result<usize, ClassifierError> {
        let (features, labels) = training_set(sequence, self.window_len, hour);
        let scaler = StandardScaler::fit(&features)?;
        let scaled = features
            .iter()
            .map(|row| scaler.transform(row))
            .collect::<Result<Vec<_>, _>>()?;

        let mut model = self.model.lock().unwrap_or_else(|p| p.into_inner());
        model.classifier.fit(&scaled, &labels)?;
        model.scaler = Some(scaler);
        Ok(labels.len())
    }

    pub fn is_fitted(&self) -> bool {
        let model = self.model.lock().unwrap_or_else(|p| p.into_inner());
        model.scaler.is_some() && model.classifier.is_fitted()
    }

    /// Vote for the symbol after the trailing `window_len` symbols of `history`.
    /// Abstains on short history, an unfitted model, or a classifier error.
    pub fn predict_at(&self, history: &[Symbol], hour: u32) -> Option<Vote> {
        if history.len() < self.window_len {
            return None;
        }
        let window = &history[history.len() - self.window_len..];

        let model = self.model.lock().unwrap_or_else(|p| p.into_inner());
        let scaler = model.scaler.as_ref()?;
        let result = scaler
            .transform(&extract(window, hour))
            .and_then(|scaled| model.classifier.predict_proba(&scaled));

        match result {
            Ok([p_a, p_b]) => Some(if p_a >= 0.5 {
                Vote::new(Symbol::A, p_a)
            } else {
                Vote::new(Symbol::B, p_b)
            }),
            Err(e) => {
                debug!(error = %e, "classifier abstained");
                None
            }
        }
    }
}

/// Local wall-clock hour, 0..24.
pub fn current_hour() -> u32 {
    chrono::Local::now().hour()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::LogisticClassifier;
    use crate::symbol::parse_sequence;

    fn adapter(window_len: usize) -> ClassifierAdapter {
        ClassifierAdapter::new(Box::new(LogisticClassifier::default()), window_len)
    }

    #[test]
    fn test_unfitted_adapter_abstains() {
        let adapter = adapter(4);
        let history = parse_sequence("ABABAB").unwrap();
        assert!(!adapter.is_fitted());
        assert_eq!(adapter.predict_at(&history, 12), None);
    }

    #[test]
    fn test_short_history_abstains() {
        let adapter = adapter(13);
        adapter
            .fit(&parse_sequence("AABAB").unwrap(), 0)
            .unwrap();
        assert!(adapter.is_fitted());
        assert_eq!(adapter.predict_at(&parse_sequence("AABA").unwrap(), 0), None);
    }

    #[test]
    fn test_fitted_adapter_votes_with_probability() {
        let adapter = adapter(4);
        let seq = parse_sequence(&"AAB".repeat(12)).unwrap();
        let samples = adapter.fit(&seq, 9).unwrap();
        assert_eq!(samples, seq.len() * 4 - 4);

        let vote = adapter.predict_at(&seq, 9).unwrap();
        assert!((0.5..=1.0).contains(&vote.confidence));
    }

    #[test]
    fn test_empty_corpus_leaves_adapter_unfitted() {
        let adapter = adapter(13);
        let err = adapter.fit(&parse_sequence("AB").unwrap(), 0).unwrap_err();
        assert_eq!(err, ClassifierError::EmptyTrainingSet);
        assert!(!adapter.is_fitted());
    }
}
