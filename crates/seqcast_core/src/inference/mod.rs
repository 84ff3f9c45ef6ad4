//! Supervised classifier strategy.
//!
//! The ensemble only depends on the [`Classifier`] capability; the bundled
//! [`LogisticClassifier`] is the default implementation.

pub mod adapter;
pub mod features;
pub mod logistic;

pub use adapter::{current_hour, ClassifierAdapter};
pub use features::StandardScaler;
pub use logistic::LogisticClassifier;

use crate::error::ClassifierError;

/// Binary probabilistic classifier. Label 1 (and index 0 of the returned
/// distribution) is the symbol A.
pub trait Classifier: Send {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), ClassifierError>;

    /// `[P(A), P(B)]` for one feature row.
    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], ClassifierError>;

    fn is_fitted(&self) -> bool;
}
