//! Scoring service owning a loaded churn pipeline

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{error, warn};

use crate::features::{CustomerRecord, FeatureMap};
use crate::model::POSITIVE_LABEL;
use crate::pipeline::{reindex, ChurnScorer, FittedPipeline};

/// Label text returned when no model is available.
pub const MODEL_NOT_LOADED: &str = "Model not loaded";

/// Verdict for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PredictionLabel {
    #[serde(rename = "Yes")]
    Yes,
    #[serde(rename = "No")]
    No,
    #[serde(rename = "Model not loaded")]
    ModelNotLoaded,
}

impl PredictionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionLabel::Yes => "Yes",
            PredictionLabel::No => "No",
            PredictionLabel::ModelNotLoaded => MODEL_NOT_LOADED,
        }
    }

    /// `Yes` exactly when the classifier's raw label is the string "Yes".
    fn from_raw(raw: &str) -> Self {
        if raw == POSITIVE_LABEL {
            PredictionLabel::Yes
        } else {
            PredictionLabel::No
        }
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label plus positive-class (churn) probability, unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: PredictionLabel,
    pub probability: f64,
}

impl Prediction {
    /// The result every call returns when no model is loaded.
    pub const fn model_not_loaded() -> Self {
        Prediction {
            label: PredictionLabel::ModelNotLoaded,
            probability: 0.0,
        }
    }

    pub fn is_model_not_loaded(&self) -> bool {
        self.label == PredictionLabel::ModelNotLoaded
    }
}

/// Explicitly constructed predictor. Build it once and share it by
/// reference; scoring never mutates the loaded pipeline.
pub struct ChurnPredictor {
    scorer: Option<Box<dyn ChurnScorer>>,
}

impl ChurnPredictor {
    /// Strict load: artifact errors are returned to the caller.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let pipeline = FittedPipeline::load(path)?;
        Ok(Self::from_pipeline(pipeline))
    }

    /// Lenient load: a missing or unreadable artifact is logged and leaves
    /// the predictor without a model, so every call returns the sentinel.
    pub fn open(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(predictor) => predictor,
            Err(e) => {
                error!(error = %e, "churn model unavailable");
                Self::without_model()
            }
        }
    }

    pub fn from_pipeline(pipeline: FittedPipeline) -> Self {
        Self::with_scorer(Box::new(pipeline))
    }

    /// Wrap any scorer, e.g. a stub in tests.
    pub fn with_scorer(scorer: Box<dyn ChurnScorer>) -> Self {
        Self {
            scorer: Some(scorer),
        }
    }

    pub fn without_model() -> Self {
        Self { scorer: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.scorer.is_some()
    }

    /// Score one typed record.
    pub fn predict(&self, record: &CustomerRecord) -> Prediction {
        self.predict_features(&record.to_feature_map())
    }

    /// Score one loosely typed record; absent features are imputed.
    pub fn predict_features(&self, features: &FeatureMap) -> Prediction {
        self.predict_feature_batch(std::slice::from_ref(features))
            .pop()
            .unwrap_or_else(Prediction::model_not_loaded)
    }

    /// Score typed records in one pass.
    pub fn predict_batch(&self, records: &[CustomerRecord]) -> Vec<Prediction> {
        let rows: Vec<FeatureMap> = records.iter().map(CustomerRecord::to_feature_map).collect();
        self.predict_feature_batch(&rows)
    }

    /// Score loosely typed records in one pass. Always returns one
    /// prediction per input row.
    pub fn predict_feature_batch(&self, rows: &[FeatureMap]) -> Vec<Prediction> {
        let Some(scorer) = self.scorer.as_deref() else {
            return vec![Prediction::model_not_loaded(); rows.len()];
        };
        if rows.is_empty() {
            return Vec::new();
        }

        let frame = reindex(&scorer.input_columns(), rows);
        match scorer.score(&frame) {
            Ok(scored) if scored.len() == rows.len() => scored
                .into_iter()
                .map(|(raw, probability)| Prediction {
                    label: PredictionLabel::from_raw(&raw),
                    probability,
                })
                .collect(),
            Ok(scored) => {
                warn!(expected = rows.len(), got = scored.len(), "scorer returned wrong row count");
                vec![Prediction::model_not_loaded(); rows.len()]
            }
            Err(e) => {
                error!(error = %e, "scoring failed");
                vec![Prediction::model_not_loaded(); rows.len()]
            }
        }
    }
}

impl fmt::Debug for ChurnPredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChurnPredictor")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
