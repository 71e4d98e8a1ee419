//! Error taxonomy shared by the loader, trainer and predictor

use std::path::PathBuf;

use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

/// Failures surfaced by churnforge operations.
///
/// Data-quality problems inside a dataset (unparseable charges, blank
/// categories) and unseen categories at scoring time are absorbed by
/// imputation and never show up here.
#[derive(Debug, Error)]
pub enum ChurnError {
    #[error("failed to load dataset {path:?}: {reason}")]
    DataLoad { path: PathBuf, reason: String },

    #[error("training failed: {0}")]
    Training(String),

    #[error("model artifact not found at {path:?}")]
    ModelArtifactMissing { path: PathBuf },

    #[error("model artifact at {path:?} could not be read: {reason}")]
    ModelArtifactCorrupt { path: PathBuf, reason: String },

    #[error("feature mismatch: {0}")]
    FeatureMismatch(String),

    #[error("terminal input failed: {0}")]
    Input(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl<E> From<DrawingAreaErrorKind<E>> for ChurnError
where
    E: std::error::Error + Send + Sync,
{
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        ChurnError::Chart(e.to_string())
    }
}

impl ChurnError {
    /// True for the two artifact failures that leave a predictor without a model.
    pub fn is_artifact_error(&self) -> bool {
        matches!(
            self,
            ChurnError::ModelArtifactMissing { .. } | ChurnError::ModelArtifactCorrupt { .. }
        )
    }
}
