use core::f64::consts::PI;

use crate::error::ClassifierError;
use crate::symbol::Symbol;

/// Number of features appended after the one-hot window.
pub const SUMMARY_FEATURES: usize = 5;

pub fn feature_len(window_len: usize) -> usize {
    window_len + SUMMARY_FEATURES
}

/// Shannon entropy of the A/B mix in bits (0 for a pure window).
pub fn shannon_entropy(window: &[Symbol]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let p_a = a_ratio(window);
    let p_b = 1.0 - p_a;
    if p_a == 0.0 || p_b == 0.0 {
        return 0.0;
    }
    -(p_a * p_a.log2() + p_b * p_b.log2())
}

/// Mean of entropy, distinct-symbol ratio and adjacent-transition ratio.
pub fn complexity(window: &[Symbol]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let distinct = Symbol::ALL
        .iter()
        .filter(|s| window.contains(s))
        .count();
    let distinct_ratio = distinct as f64 / window.len() as f64;

    let transition_ratio = if window.len() > 1 {
        let changes = window.windows(2).filter(|w| w[0] != w[1]).count();
        changes as f64 / (window.len() - 1) as f64
    } else {
        0.0
    };

    (shannon_entropy(window) + distinct_ratio + transition_ratio) / 3.0
}

fn a_ratio(window: &[Symbol]) -> f64 {
    let count = window.iter().filter(|&&s| s == Symbol::A).count();
    count as f64 / window.len() as f64
}

/// Feature vector: one-hot window (A = 1), A ratio, entropy, hour-of-day
/// phase as sin/cos, complexity.
pub fn extract(window: &[Symbol], hour: u32) -> Vec<f64> {
    let mut features = Vec::with_capacity(feature_len(window.len()));
    features.extend(window.iter().map(|s| s.bit() as f64));

    let ratio = if window.is_empty() { 0.0 } else { a_ratio(window) };
    features.push(ratio);
    features.push(shannon_entropy(window));

    let phase = 2.0 * PI * (hour % 24) as f64 / 24.0;
    features.push(phase.sin());
    features.push(phase.cos());

    features.push(complexity(window));
    features
}

/// Training corpus: the sequence, its reversal, its symbol inversion and a
/// half-length rotation, concatenated.
pub fn augment(sequence: &[Symbol]) -> Vec<Symbol> {
    let mut out = Vec::with_capacity(sequence.len() * 4);
    out.extend_from_slice(sequence);
    out.extend(sequence.iter().rev());
    out.extend(sequence.iter().map(|s| s.inverted()));

    let shift = (sequence.len() / 2).max(1).min(sequence.len());
    out.extend_from_slice(&sequence[shift..]);
    out.extend_from_slice(&sequence[..shift]);
    out
}

/// Sliding-window samples over the augmented corpus. Label 1 means the
/// symbol after the window is A.
pub fn training_set(sequence: &[Symbol], window_len: usize, hour: u32) -> (Vec<Vec<f64>>, Vec<u8>) {
    let corpus = augment(sequence);
    if corpus.len() <= window_len {
        return (Vec::new(), Vec::new());
    }
    corpus
        .windows(window_len + 1)
        .map(|w| (extract(&w[..window_len], hour), w[window_len].bit()))
        .unzip()
}

/// Per-feature standardization. Constant features keep unit scale.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(samples: &[Vec<f64>]) -> Result<Self, ClassifierError> {
        let first = samples.first().ok_or(ClassifierError::EmptyTrainingSet)?;
        let dims = first.len();
        let n = samples.len() as f64;

        let mut mean = vec![0.0; dims];
        for row in samples {
            check_dims(dims, row)?;
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x / n;
            }
        }

        let mut var = vec![0.0; dims];
        for row in samples {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                *v += (x - m) * (x - m) / n;
            }
        }
        let scale = var
            .into_iter()
            .map(|v| if v > 0.0 { v.sqrt() } else { 1.0 })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        check_dims(self.mean.len(), features)?;
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }
}

fn check_dims(expected: usize, row: &[f64]) -> Result<(), ClassifierError> {
    if row.len() != expected {
        return Err(ClassifierError::DimensionMismatch {
            expected,
            found: row.len(),
        });
    }
    Ok(())
}
