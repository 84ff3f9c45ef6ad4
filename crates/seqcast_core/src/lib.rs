//! Online ensemble prediction over binary A/B symbol streams.
//!
//! Five strategies (pattern frequency, first-order Markov, Bayesian,
//! periodicity and a supervised classifier) vote on the next symbol. Their
//! weights follow each strategy's measured accuracy, and a verification
//! controller suspends trust after repeated misses until a background
//! reanalysis pass or recovered accuracy restores it.

pub mod adaptive;
pub mod config;
pub mod error;
pub mod inference;
pub mod ledger;
pub mod mixer;
pub mod patterns;
pub mod predictor;
pub mod session;
pub mod spectral;
pub mod strategy;
pub mod symbol;
pub mod transition;

mod sync;

pub use adaptive::{
    ControllerState, DeferredSpawner, InlineSpawner, ReanalysisReport, Spawner, ThreadSpawner,
};
pub use config::{ClassifierConfig, CycleMethod, PredictorConfig};
pub use error::{ClassifierError, ConfigError, PredictorError, Result};
pub use inference::{Classifier, LogisticClassifier};
pub use mixer::EnsembleWeights;
pub use predictor::{Prediction, Predictor, PredictorBuilder, PredictorSnapshot, StrategyReport};
pub use session::{extract_symbols, DisplayColor, DisplayHint, PredictResponse, Session, TrainSummary};
pub use strategy::{Strategy, Vote};
pub use symbol::{parse_sequence, Symbol};
