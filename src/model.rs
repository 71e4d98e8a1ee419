//! Binary logistic classifier fitted with linfa-logistic

use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChurnError;

/// Label emitted for a churning customer.
pub const POSITIVE_LABEL: &str = "Yes";
/// Label emitted for a retained customer.
pub const NEGATIVE_LABEL: &str = "No";

/// Solver settings for the logistic fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// L2 penalty strength.
    pub alpha: f64,
    /// Maximum L-BFGS iterations.
    pub max_iterations: u64,
    /// Probability at or above which the positive label is emitted.
    pub threshold: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iterations: 100,
            threshold: 0.5,
        }
    }
}

/// Fitted logistic model reduced to its coefficients.
///
/// Scoring needs no solver state, so the artifact stays readable without the
/// fitting library's own serialization format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub threshold: f64,
    pub positive_label: String,
    pub negative_label: String,
}

impl LogisticModel {
    /// Number of input features the model was fitted on.
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Positive-class probability for one transformed row.
    pub fn probability(&self, row: ArrayView1<f64>) -> f64 {
        let logit = self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        sigmoid(logit)
    }

    /// Raw class label for a probability.
    pub fn label_for(&self, probability: f64) -> &str {
        if probability >= self.threshold {
            &self.positive_label
        } else {
            &self.negative_label
        }
    }

    /// Score every row: raw label and positive-class probability.
    pub fn predict(&self, x: &Array2<f64>) -> crate::Result<Vec<(String, f64)>> {
        if x.ncols() != self.n_features() {
            return Err(ChurnError::FeatureMismatch(format!(
                "classifier expects {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok(x.outer_iter()
            .map(|row| {
                let p = self.probability(row);
                (self.label_for(p).to_string(), p)
            })
            .collect())
    }
}

/// Fit the classifier on transformed features and 0/1 targets.
///
/// Targets are mapped to `"Yes"`/`"No"` before fitting so the classifier's
/// own labels are the strings the predictor compares against.
pub fn fit_logistic(
    x: &Array2<f64>,
    y: &[f64],
    config: &LogisticConfig,
) -> crate::Result<LogisticModel> {
    if x.nrows() != y.len() {
        return Err(ChurnError::Training(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(ChurnError::Training("no rows to fit".to_string()));
    }

    let targets: Array1<&'static str> = y
        .iter()
        .map(|&v| if v > 0.5 { POSITIVE_LABEL } else { NEGATIVE_LABEL })
        .collect();
    let positives = targets.iter().filter(|&&t| t == POSITIVE_LABEL).count();
    if positives == 0 || positives == targets.len() {
        return Err(ChurnError::Training(
            "target has a single class; both churned and retained customers are required"
                .to_string(),
        ));
    }

    let dataset = Dataset::new(x.clone(), targets);
    // linfa-logistic treats the larger label ("Yes" > "No") as the positive class.
    let fitted = LogisticRegression::default()
        .alpha(config.alpha)
        .max_iterations(config.max_iterations)
        .fit(&dataset)
        .map_err(|e| ChurnError::Training(e.to_string()))?;

    debug!(
        intercept = fitted.intercept(),
        n_features = fitted.params().len(),
        "logistic regression fitted"
    );

    Ok(LogisticModel {
        intercept: fitted.intercept(),
        coefficients: fitted.params().to_vec(),
        threshold: config.threshold,
        positive_label: POSITIVE_LABEL.to_string(),
        negative_label: NEGATIVE_LABEL.to_string(),
    })
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<f64>) {
        let x = array![
            [-2.0, 0.1],
            [-1.5, -0.3],
            [-1.0, 0.2],
            [-0.5, 0.0],
            [0.5, 0.1],
            [1.0, -0.2],
            [1.5, 0.3],
            [2.0, 0.0],
        ];
        let y = vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_fit_logistic_direction() {
        let (x, y) = separable();
        let model = fit_logistic(&x, &y, &LogisticConfig::default()).unwrap();

        assert_eq!(model.n_features(), 2);
        assert!(model.coefficients[0] > 0.0);
        let high = model.probability(array![2.5, 0.0].view());
        let low = model.probability(array![-2.5, 0.0].view());
        assert!(high > 0.5 && low < 0.5);
    }

    #[test]
    fn test_labels_follow_threshold() {
        let (x, y) = separable();
        let model = fit_logistic(&x, &y, &LogisticConfig::default()).unwrap();
        for (label, p) in model.predict(&x).unwrap() {
            assert!((0.0..=1.0).contains(&p));
            assert_eq!(label == POSITIVE_LABEL, p >= 0.5);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = separable();
        let first = fit_logistic(&x, &y, &LogisticConfig::default()).unwrap();
        let second = fit_logistic(&x, &y, &LogisticConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_class_target_is_rejected() {
        let (x, _) = separable();
        let y = vec![0.0; 8];
        assert!(matches!(
            fit_logistic(&x, &y, &LogisticConfig::default()),
            Err(ChurnError::Training(_))
        ));
    }

    #[test]
    fn test_predict_checks_width() {
        let model = LogisticModel {
            intercept: 0.0,
            coefficients: vec![1.0, 1.0],
            threshold: 0.5,
            positive_label: POSITIVE_LABEL.to_string(),
            negative_label: NEGATIVE_LABEL.to_string(),
        };
        assert!(model.predict(&Array2::zeros((1, 3))).is_err());
        let scored = model.predict(&Array2::zeros((1, 2))).unwrap();
        assert_eq!(scored[0].0, POSITIVE_LABEL);
        assert_abs_diff_eq!(scored[0].1, 0.5);
    }
}
