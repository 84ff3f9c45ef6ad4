//! Online Ensemble Predictor
//!
//! Owns the observed sequence and every strategy model. Each call to
//! [`Predictor::predict_next`] feeds one true symbol through the pipeline:
//!
//! 1. the pattern database and transition counts learn the new symbol
//! 2. the previous prediction is verified and the controller updated
//! 3. a reanalysis pass is scheduled while the controller is `Waiting`
//! 4. the five strategies vote in fixed order
//! 5. weights are recalibrated and the votes combined
//!
//! Reanalysis runs on a [`Spawner`] and never blocks the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adaptive::{
    ControllerState, ReanalysisReport, ReanalysisWorker, SharedModel, Spawner, ThreadSpawner,
    Transition, VerificationController,
};
use crate::config::PredictorConfig;
use crate::error::{PredictorError, Result};
use crate::inference::{current_hour, Classifier, ClassifierAdapter, LogisticClassifier};
use crate::ledger::{PerformanceLedger, PredictionRecord, StrategyStats};
use crate::mixer::{combine, Combined, EnsembleWeights, WeightCalibrator};
use crate::patterns::{OutcomeCounts, PatternDatabase};
use crate::spectral::CycleDetector;
use crate::strategy::{Strategy, StrategyVotes, Vote};
use crate::symbol::{parse_sequence, SequenceLog, Symbol};
use crate::sync::{lock, read, write};
use crate::transition::TransitionModel;

/// Ensemble output for the symbol after the one just observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub symbol: Symbol,
    pub confidence: f64,
    /// Most confident individual strategy this round
    pub strategy: Strategy,
    pub state: ControllerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyReport {
    pub correct: u64,
    pub total: u64,
    pub accuracy: f64,
    pub weight: f64,
}

/// Point-in-time view for the stats endpoint and console summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictorSnapshot {
    pub sequence_len: usize,
    pub predictions: usize,
    pub state: ControllerState,
    pub consecutive_errors: u32,
    pub strategies: BTreeMap<Strategy, StrategyReport>,
    pub pattern_count: usize,
    pub classifier_fitted: bool,
    pub reanalysis_scheduled: u64,
    pub reanalysis_completed: u64,
    pub reanalysis_in_flight: bool,
    pub last_reanalysis: Option<ReanalysisReport>,
    /// Training-time symbol counts keyed by local hour
    pub time_patterns: BTreeMap<u32, OutcomeCounts>,
}

pub struct PredictorBuilder {
    config: PredictorConfig,
    classifier: Option<Box<dyn Classifier>>,
    spawner: Option<Arc<dyn Spawner>>,
    fixed_hour: Option<u32>,
}

impl Default for PredictorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorBuilder {
    pub fn new() -> Self {
        Self {
            config: PredictorConfig::default(),
            classifier: None,
            spawner: None,
            fixed_hour: None,
        }
    }

    pub fn config(mut self, config: PredictorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default logistic classifier.
    pub fn classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Where reanalysis passes run; a named thread per pass by default.
    pub fn spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Pin the hour-of-day feature instead of reading the local clock.
    pub fn fixed_hour(mut self, hour: u32) -> Self {
        self.fixed_hour = Some(hour % 24);
        self
    }

    pub fn build(self, training: &[Symbol]) -> Result<Predictor> {
        self.config.validate()?;
        if training.is_empty() {
            return Err(PredictorError::EmptySequence);
        }
        let config = self.config;

        let mut patterns = PatternDatabase::from_config(&config);
        patterns.observe(training);
        let transitions = TransitionModel::from_sequence(training);

        let hour = self.fixed_hour.unwrap_or_else(current_hour);
        let classifier = ClassifierAdapter::new(
            self.classifier
                .unwrap_or_else(|| Box::new(LogisticClassifier::new(config.classifier.clone()))),
            config.max_pattern_len,
        );
        match classifier.fit(training, hour) {
            Ok(samples) => debug!(samples, "classifier fitted"),
            Err(e) => warn!(error = %e, "classifier not fitted; strategy will abstain"),
        }

        let mut time_patterns = BTreeMap::new();
        let mut counts = OutcomeCounts::default();
        training.iter().for_each(|&s| counts.record(s));
        time_patterns.insert(hour, counts);

        info!(
            length = training.len(),
            patterns = patterns.len(),
            classifier_fitted = classifier.is_fitted(),
            "predictor trained"
        );

        let calibrator = WeightCalibrator::from_config(&config);
        let shared = Arc::new(SharedModel::new(
            VerificationController::from_config(&config),
            EnsembleWeights::default(),
            patterns,
            PerformanceLedger::new(),
        ));
        let spawner = self.spawner.unwrap_or_else(|| Arc::new(ThreadSpawner));
        let worker = ReanalysisWorker::new(
            Arc::clone(&shared),
            spawner,
            calibrator,
            config.min_pattern_len,
        );

        Ok(Predictor {
            sequence: SequenceLog::new(training.to_vec()),
            transitions,
            cycles: CycleDetector::from_config(&config),
            classifier,
            calibrator,
            shared,
            worker,
            fixed_hour: self.fixed_hour,
            time_patterns,
            last_prediction: None,
            config,
        })
    }
}

pub struct Predictor {
    config: PredictorConfig,
    sequence: SequenceLog,
    transitions: TransitionModel,
    cycles: CycleDetector,
    classifier: ClassifierAdapter,
    calibrator: WeightCalibrator,
    shared: Arc<SharedModel>,
    worker: ReanalysisWorker,
    fixed_hour: Option<u32>,
    time_patterns: BTreeMap<u32, OutcomeCounts>,
    last_prediction: Option<Prediction>,
}

impl Predictor {
    pub fn builder() -> PredictorBuilder {
        PredictorBuilder::new()
    }

    /// Train with default configuration on an 'A'/'B' string.
    pub fn train(sequence: &str) -> Result<Self> {
        let symbols = parse_sequence(sequence)?;
        PredictorBuilder::new().build(&symbols)
    }

    /// Observe the true `symbol` and predict the one after it.
    pub fn predict_next(&mut self, symbol: Symbol) -> Prediction {
        write(&self.shared.patterns).update(self.sequence.as_slice(), symbol);
        self.sequence.append(symbol);
        self.transitions.observe(symbol);

        self.verify(symbol);
        self.schedule_reanalysis();

        let votes = self.collect_votes();
        if let Some(weights) = self.calibrator.calibrate(&read(&self.shared.ledger)) {
            *write(&self.shared.weights) = weights;
        }
        let weights = *read(&self.shared.weights);

        let combined = combine(&votes, &weights).unwrap_or(Combined {
            symbol: Symbol::A,
            confidence: 0.5,
            winner: Strategy::Pattern,
        });
        write(&self.shared.ledger).push(PredictionRecord::new(
            combined.symbol,
            combined.confidence,
            combined.winner,
        ));

        let prediction = Prediction {
            symbol: combined.symbol,
            confidence: combined.confidence,
            strategy: combined.winner,
            state: self.state(),
        };
        self.last_prediction = Some(prediction);
        prediction
    }

    fn verify(&self, actual: Symbol) {
        let (correct, recent_confidence) = {
            let mut ledger = write(&self.shared.ledger);
            let Some(correct) = ledger.resolve_last(actual) else {
                return;
            };
            if self.sequence.len() >= self.config.min_pattern_len {
                ledger.record_pattern(self.sequence.window(self.config.min_pattern_len), correct);
            }
            (correct, ledger.recent_confidence(self.config.resume_window))
        };

        let mut controller = lock(&self.shared.controller);
        let transition = if correct {
            controller.record_hit(recent_confidence)
        } else {
            controller.record_miss()
        };
        match transition {
            Transition::EnteredWaiting => warn!(
                consecutive_errors = controller.consecutive_errors(),
                "entering WAITING"
            ),
            Transition::Resumed => info!(recent_confidence, "resumed PREDICTING"),
            Transition::None => {}
        }
    }

    fn schedule_reanalysis(&self) {
        // Controller lock must be released before trigger
        let needed = lock(&self.shared.controller).needs_reanalysis();
        if needed {
            let recent = self.sequence.window(self.config.reanalysis_window).to_vec();
            self.worker.trigger(recent);
        }
    }

    fn collect_votes(&self) -> StrategyVotes {
        let history = self.sequence.as_slice();
        let last = self.sequence.last();
        let mut votes = StrategyVotes::default();

        let window = self.sequence.window(self.config.max_pattern_len);
        votes.set(Strategy::Pattern, Some(read(&self.shared.patterns).predict(window)));

        let markov = last.map_or_else(Vote::prior, |s| self.transitions.markov_prediction(s));
        votes.set(Strategy::Markov, Some(markov));
        let bayesian = last.map_or_else(Vote::prior, |s| self.transitions.bayesian_prediction(s));
        votes.set(Strategy::Bayesian, Some(bayesian));

        votes.set(Strategy::Cycle, self.cycles.predict(history));
        votes.set(Strategy::Classifier, self.classifier.predict_at(history, self.hour()));
        votes
    }

    fn hour(&self) -> u32 {
        self.fixed_hour.unwrap_or_else(current_hour)
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn sequence(&self) -> &[Symbol] {
        self.sequence.as_slice()
    }

    pub fn state(&self) -> ControllerState {
        lock(&self.shared.controller).state()
    }

    pub fn consecutive_errors(&self) -> u32 {
        lock(&self.shared.controller).consecutive_errors()
    }

    pub fn weights(&self) -> EnsembleWeights {
        *read(&self.shared.weights)
    }

    pub fn stats(&self, strategy: Strategy) -> StrategyStats {
        read(&self.shared.ledger).stats(strategy)
    }

    pub fn last_prediction(&self) -> Option<Prediction> {
        self.last_prediction
    }

    pub fn prediction_count(&self) -> usize {
        read(&self.shared.ledger).len()
    }

    pub fn pattern_counts(&self, pattern: &[Symbol]) -> Option<OutcomeCounts> {
        read(&self.shared.patterns).counts(pattern)
    }

    pub fn transitions(&self) -> &TransitionModel {
        &self.transitions
    }

    pub fn reanalysis_scheduled(&self) -> u64 {
        self.worker.scheduled()
    }

    pub fn reanalysis_in_flight(&self) -> bool {
        self.worker.is_busy()
    }

    pub fn snapshot(&self) -> PredictorSnapshot {
        let weights = self.weights();
        let strategies = {
            let ledger = read(&self.shared.ledger);
            Strategy::ALL
                .iter()
                .map(|&s| {
                    let stats = ledger.stats(s);
                    let report = StrategyReport {
                        correct: stats.correct,
                        total: stats.total,
                        accuracy: stats.accuracy(),
                        weight: weights.get(s),
                    };
                    (s, report)
                })
                .collect()
        };
        let (state, consecutive_errors) = {
            let controller = lock(&self.shared.controller);
            (controller.state(), controller.consecutive_errors())
        };

        PredictorSnapshot {
            sequence_len: self.sequence.len(),
            predictions: self.prediction_count(),
            state,
            consecutive_errors,
            strategies,
            pattern_count: read(&self.shared.patterns).len(),
            classifier_fitted: self.classifier.is_fitted(),
            reanalysis_scheduled: self.worker.scheduled(),
            reanalysis_completed: self.worker.completed(),
            reanalysis_in_flight: self.worker.is_busy(),
            last_reanalysis: self.worker.last_report(),
            time_patterns: self.time_patterns.clone(),
        }
    }
}
