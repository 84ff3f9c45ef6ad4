//! Verification State Machine
//!
//! Tracks whether the ensemble's output is currently trusted. Repeated misses
//! move the controller from `Predicting` to `Waiting`; it comes back either
//! when recent accuracy recovers or when a reanalysis pass releases it.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PredictorConfig;

/// Trust state reported alongside every prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerState {
    /// Predictions are trusted
    #[default]
    Predicting,
    /// Too many consecutive misses; predictions continue but are suspect
    Waiting,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerState::Predicting => f.write_str("PREDICTING"),
            ControllerState::Waiting => f.write_str("WAITING"),
        }
    }
}

/// State change caused by a single verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    EnteredWaiting,
    Resumed,
}

#[derive(Debug, Clone)]
pub struct VerificationController {
    state: ControllerState,
    /// Misses since the last hit or release
    consecutive_errors: u32,
    error_threshold: u32,
    /// Recent accuracy must strictly exceed this to resume from `Waiting`
    confidence_threshold: f64,
    /// Number of `Predicting -> Waiting` transitions so far
    waiting_entries: u64,
}

impl Default for VerificationController {
    fn default() -> Self {
        Self::from_config(&PredictorConfig::default())
    }
}

impl VerificationController {
    pub fn new(error_threshold: u32, confidence_threshold: f64) -> Self {
        Self {
            state: ControllerState::Predicting,
            consecutive_errors: 0,
            error_threshold,
            confidence_threshold,
            waiting_entries: 0,
        }
    }

    pub fn from_config(config: &PredictorConfig) -> Self {
        Self::new(config.error_threshold, config.confidence_threshold)
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn waiting_entries(&self) -> u64 {
        self.waiting_entries
    }

    /// The previous prediction matched.
    ///
    /// # Arguments
    /// * `recent_confidence` - fraction correct over the resume window
    pub fn record_hit(&mut self, recent_confidence: f64) -> Transition {
        self.consecutive_errors = 0;
        if self.state == ControllerState::Waiting && recent_confidence > self.confidence_threshold
        {
            self.state = ControllerState::Predicting;
            return Transition::Resumed;
        }
        Transition::None
    }

    /// The previous prediction missed. Enters `Waiting` once per episode.
    pub fn record_miss(&mut self) -> Transition {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        if self.state == ControllerState::Predicting
            && self.consecutive_errors >= self.error_threshold
        {
            self.state = ControllerState::Waiting;
            self.waiting_entries += 1;
            return Transition::EnteredWaiting;
        }
        Transition::None
    }

    /// A reanalysis pass should be in flight.
    pub fn needs_reanalysis(&self) -> bool {
        self.state == ControllerState::Waiting
    }

    /// Unconditional return to `Predicting` with a clean error streak.
    pub fn release(&mut self) {
        self.state = ControllerState::Predicting;
        self.consecutive_errors = 0;
    }
}
