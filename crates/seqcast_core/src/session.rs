//! Session facade used by the daemon and console front ends.
//!
//! Holds at most one predictor; training replaces it. Input strings are
//! validated here so no predictor state is touched by a bad request.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adaptive::{ControllerState, Spawner};
use crate::config::PredictorConfig;
use crate::error::{PredictorError, Result};
use crate::predictor::{Prediction, Predictor, PredictorBuilder, PredictorSnapshot};
use crate::strategy::Strategy;
use crate::symbol::{parse_sequence, parse_single, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayHint {
    Announce,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayColor {
    Green,
    Blue,
    Red,
}

/// Announce only when confident enough and the predicted symbol repeats the
/// one just submitted.
///
/// The second condition checks the prediction for the *next* round against
/// the symbol the caller already submitted for *this* round. That is most
/// likely an inverted or misplaced check in the client this mirrors; it is
/// kept unchanged so hints match existing consumers.
pub fn display_hint(prediction: &Prediction, submitted: Symbol, threshold: f64) -> DisplayHint {
    if prediction.confidence >= threshold && prediction.symbol == submitted {
        DisplayHint::Announce
    } else {
        DisplayHint::Wait
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub symbol: Symbol,
    pub confidence: f64,
    pub strategy: Strategy,
    pub state: ControllerState,
    pub hint: DisplayHint,
    pub message: String,
    pub color: DisplayColor,
}

impl PredictResponse {
    fn new(prediction: Prediction, hint: DisplayHint) -> Self {
        let (message, color) = match (hint, prediction.symbol) {
            (DisplayHint::Announce, Symbol::A) => ("Next Character = 'A'", DisplayColor::Green),
            (DisplayHint::Announce, Symbol::B) => ("Next Character = 'B'", DisplayColor::Blue),
            (DisplayHint::Wait, _) => ("Wait for next character.", DisplayColor::Red),
        };
        Self {
            symbol: prediction.symbol,
            confidence: prediction.confidence,
            strategy: prediction.strategy,
            state: prediction.state,
            hint,
            message: message.to_string(),
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainSummary {
    pub length: usize,
    pub patterns: usize,
    pub classifier_fitted: bool,
}

#[derive(Default)]
pub struct Session {
    config: PredictorConfig,
    spawner: Option<Arc<dyn Spawner>>,
    fixed_hour: Option<u32>,
    predictor: Option<Predictor>,
}

impl Session {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn with_fixed_hour(mut self, hour: u32) -> Self {
        self.fixed_hour = Some(hour);
        self
    }

    /// Builder carrying this session's config, spawner and pinned hour.
    /// Lets callers fit a predictor away from the session and
    /// [`install`](Self::install) it afterwards.
    pub fn predictor_builder(&self) -> PredictorBuilder {
        let mut builder = PredictorBuilder::new().config(self.config.clone());
        if let Some(spawner) = &self.spawner {
            builder = builder.spawner(Arc::clone(spawner));
        }
        if let Some(hour) = self.fixed_hour {
            builder = builder.fixed_hour(hour);
        }
        builder
    }

    /// Replace the current predictor with `predictor`.
    pub fn install(&mut self, predictor: Predictor) -> TrainSummary {
        let snapshot = predictor.snapshot();
        let summary = TrainSummary {
            length: snapshot.sequence_len,
            patterns: snapshot.pattern_count,
            classifier_fitted: snapshot.classifier_fitted,
        };
        info!(
            length = summary.length,
            replaced = self.predictor.is_some(),
            "session trained"
        );
        self.predictor = Some(predictor);
        summary
    }

    /// Build a fresh predictor from `sequence`, replacing any existing one.
    /// On error the previous predictor is kept.
    pub fn train(&mut self, sequence: &str) -> Result<TrainSummary> {
        let symbols = parse_sequence(sequence)?;
        let predictor = self.predictor_builder().build(&symbols)?;
        Ok(self.install(predictor))
    }

    /// Feed one observed symbol, given as a one-character string.
    pub fn predict(&mut self, last_char: &str) -> Result<PredictResponse> {
        let predictor = self.predictor.as_mut().ok_or(PredictorError::NotTrained)?;
        let submitted = parse_single(last_char)?;
        let prediction = predictor.predict_next(submitted);
        let hint = display_hint(&prediction, submitted, self.config.announce_threshold);
        Ok(PredictResponse::new(prediction, hint))
    }

    pub fn is_trained(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn predictor(&self) -> Option<&Predictor> {
        self.predictor.as_ref()
    }

    pub fn snapshot(&self) -> Option<PredictorSnapshot> {
        self.predictor.as_ref().map(Predictor::snapshot)
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }
}

/// Keep only 'A' and 'B' characters, most recent first.
pub fn extract_symbols(text: &str) -> String {
    text.chars()
        .filter(|c| Symbol::from_char(*c).is_some())
        .rev()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::DeferredSpawner;

    fn session() -> Session {
        Session::default()
            .with_spawner(Arc::new(DeferredSpawner::new()))
            .with_fixed_hour(8)
    }

    #[test]
    fn test_predict_before_train() {
        let mut session = session();
        assert_eq!(session.predict("A"), Err(PredictorError::NotTrained));
    }

    #[test]
    fn test_invalid_symbol_leaves_state_untouched() {
        let mut session = session();
        session.train("ABABAB").unwrap();
        assert!(matches!(
            session.predict("C"),
            Err(PredictorError::InvalidSymbol { found: 'C', .. })
        ));
        assert_eq!(session.snapshot().unwrap().sequence_len, 6);
    }

    #[test]
    fn test_failed_train_keeps_previous_predictor() {
        let mut session = session();
        session.train("AABB").unwrap();
        assert!(session.train("AAXB").is_err());
        assert_eq!(session.snapshot().unwrap().sequence_len, 4);
    }

    #[test]
    fn test_install_replaces_predictor_built_elsewhere() {
        let mut session = session();
        session.train("AABB").unwrap();

        let builder = session.predictor_builder();
        let symbols = parse_sequence("ABABABAB").unwrap();
        let predictor = std::thread::spawn(move || builder.build(&symbols))
            .join()
            .unwrap()
            .unwrap();
        let summary = session.install(predictor);

        assert_eq!(summary.length, 8);
        assert_eq!(session.snapshot().unwrap().sequence_len, 8);
        assert_eq!(session.predictor().unwrap().sequence().len(), 8);
    }

    #[test]
    fn test_train_then_predict() {
        let mut session = session();
        let summary = session.train("AABAB").unwrap();
        assert_eq!(summary.length, 5);

        let response = session.predict("A").unwrap();
        assert!((0.0..=1.0).contains(&response.confidence));
        match response.hint {
            DisplayHint::Announce => assert_ne!(response.color, DisplayColor::Red),
            DisplayHint::Wait => {
                assert_eq!(response.message, "Wait for next character.");
                assert_eq!(response.color, DisplayColor::Red);
            }
        }
    }

    #[test]
    fn test_hint_requires_confidence_and_matching_symbol() {
        let prediction = Prediction {
            symbol: Symbol::B,
            confidence: 0.9,
            strategy: Strategy::Markov,
            state: ControllerState::Predicting,
        };
        assert_eq!(display_hint(&prediction, Symbol::B, 0.8), DisplayHint::Announce);
        assert_eq!(display_hint(&prediction, Symbol::A, 0.8), DisplayHint::Wait);
        assert_eq!(display_hint(&prediction, Symbol::B, 0.95), DisplayHint::Wait);

        let response = PredictResponse::new(prediction, DisplayHint::Announce);
        assert_eq!(response.message, "Next Character = 'B'");
        assert_eq!(response.color, DisplayColor::Blue);
    }

    #[test]
    fn test_extract_symbols_filters_and_reverses() {
        assert_eq!(extract_symbols("xA-b B\nAA c"), "AABA");
        assert_eq!(extract_symbols("no symbols here"), "");
    }
}
