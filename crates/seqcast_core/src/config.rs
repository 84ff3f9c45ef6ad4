use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::patterns::MAX_PATTERN_LEN;

/// Period detection method used by the cycle strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleMethod {
    /// Dominant nonzero DFT bin, `period = N / bin`.
    #[default]
    Spectral,
    /// Strongest local maximum of the autocorrelation.
    Autocorrelation,
}

/// Hyperparameters for the built-in logistic classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// L2 penalty applied to the weights (not the bias).
    pub l2: f64,
    /// Seed for the epoch shuffle, keeps training reproducible.
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 200,
            batch_size: 32,
            l2: 1e-3,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Shortest pattern length tracked by the pattern database
    pub min_pattern_len: usize,
    /// Longest pattern length; also the classifier feature window
    pub max_pattern_len: usize,
    /// Longest secondary n-gram (n-grams start at 2)
    pub max_ngram_len: usize,
    /// Consecutive misses that move the controller to WAITING
    pub error_threshold: u32,
    /// Recent accuracy that must be exceeded to resume from WAITING
    pub confidence_threshold: f64,
    /// Verified predictions considered when computing resume confidence
    pub resume_window: usize,
    /// Predictions considered for recency accuracy during weight calibration
    pub recent_window: usize,
    /// Observations handed to a reanalysis pass
    pub reanalysis_window: usize,
    /// Minimum sequence length before the cycle strategy votes
    pub cycle_min_len: usize,
    pub cycle_method: CycleMethod,
    /// Share of overall accuracy in a strategy weight; recency gets the rest
    pub overall_weight: f64,
    /// Confidence at which the display hint announces a prediction
    pub announce_threshold: f64,
    pub classifier: ClassifierConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            min_pattern_len: 5,
            max_pattern_len: 13,
            max_ngram_len: 4,
            error_threshold: 3,
            confidence_threshold: 0.75,
            resume_window: 20,
            recent_window: 50,
            reanalysis_window: 20,
            cycle_min_len: 10,
            cycle_method: CycleMethod::Spectral,
            overall_weight: 0.4,
            announce_threshold: 0.8,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl PredictorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_pattern_len == 0 {
            return Err(ConfigError::ZeroPatternLength);
        }
        if self.min_pattern_len > self.max_pattern_len {
            return Err(ConfigError::PatternBounds {
                min: self.min_pattern_len,
                max: self.max_pattern_len,
            });
        }
        if self.max_pattern_len > MAX_PATTERN_LEN {
            return Err(ConfigError::PatternTooLong {
                len: self.max_pattern_len,
                limit: MAX_PATTERN_LEN,
            });
        }
        if self.error_threshold == 0 {
            return Err(ConfigError::Zero("error_threshold"));
        }
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("overall_weight", self.overall_weight),
            ("announce_threshold", self.announce_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        for (name, value) in [
            ("resume_window", self.resume_window),
            ("recent_window", self.recent_window),
            ("reanalysis_window", self.reanalysis_window),
            ("classifier.epochs", self.classifier.epochs),
            ("classifier.batch_size", self.classifier.batch_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }
}
