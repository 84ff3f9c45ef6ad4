use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::Classifier;
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;

/// L2-regularized logistic regression, trained with seeded mini-batch
/// gradient descent. The same data and seed always yield the same model.
#[derive(Debug, Clone)]
pub struct LogisticClassifier {
    config: ClassifierConfig,
    weights: Vec<f64>,
    bias: f64,
    fitted: bool,
}

impl LogisticClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            bias: 0.0,
            fitted: false,
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    fn logit(&self, features: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }
}

impl Default for LogisticClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Classifier for LogisticClassifier {
    fn fit(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), ClassifierError> {
        if features.len() != labels.len() {
            return Err(ClassifierError::LabelMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }
        let dims = features
            .first()
            .map(Vec::len)
            .ok_or(ClassifierError::EmptyTrainingSet)?;
        if let Some(row) = features.iter().find(|row| row.len() != dims) {
            return Err(ClassifierError::DimensionMismatch {
                expected: dims,
                found: row.len(),
            });
        }

        self.weights = vec![0.0; dims];
        self.bias = 0.0;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..features.len()).collect();
        let batch_size = self.config.batch_size.max(1);
        let lr = self.config.learning_rate;
        let mut grad = vec![0.0; dims];

        for _ in 0..self.config.epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(batch_size) {
                grad.iter_mut().for_each(|g| *g = 0.0);
                let mut grad_bias = 0.0;

                for &i in batch {
                    let err = sigmoid(self.logit(&features[i])) - labels[i] as f64;
                    for (g, x) in grad.iter_mut().zip(&features[i]) {
                        *g += err * x;
                    }
                    grad_bias += err;
                }

                let n = batch.len() as f64;
                for (w, g) in self.weights.iter_mut().zip(&grad) {
                    *w -= lr * (g / n + self.config.l2 * *w);
                }
                self.bias -= lr * grad_bias / n;
            }
        }

        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], ClassifierError> {
        if !self.fitted {
            return Err(ClassifierError::NotFitted);
        }
        if features.len() != self.weights.len() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.weights.len(),
                found: features.len(),
            });
        }
        let p_a = sigmoid(self.logit(features));
        Ok([p_a, 1.0 - p_a])
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }
}
