use thiserror::Error;

/// Errors surfaced to callers of the predictor and session APIs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    #[error("sequence is empty")]
    EmptySequence,

    #[error("invalid symbol {found:?} at position {position}; expected 'A' or 'B'")]
    InvalidSymbol { found: char, position: usize },

    #[error("expected exactly one symbol, got {0} characters")]
    NotSingleSymbol(usize),

    #[error("model has not been trained; call train first")]
    NotTrained,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Rejected predictor configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("min_pattern_len must be at least 1")]
    ZeroPatternLength,

    #[error("min_pattern_len ({min}) exceeds max_pattern_len ({max})")]
    PatternBounds { min: usize, max: usize },

    #[error("max_pattern_len ({len}) exceeds the supported maximum of {limit}")]
    PatternTooLong { len: usize, limit: usize },

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("{0} must be nonzero")]
    Zero(&'static str),
}

/// Failures reported by a [`crate::inference::Classifier`] implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("classifier has not been fitted")]
    NotFitted,

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("{features} feature rows but {labels} labels")]
    LabelMismatch { features: usize, labels: usize },

    #[error("expected {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Reasons a reanalysis pass gave up. Never surfaced to callers; logged and swallowed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReanalysisError {
    #[error("no observations available for reanalysis")]
    NoObservations,
}

pub type Result<T> = std::result::Result<T, PredictorError>;
