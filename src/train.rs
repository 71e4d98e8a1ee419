//! Training: load, clean, fit preprocessing + logistic regression, persist

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::data::{feature_frame, load_feature_table, split_features_target, target_values};
use crate::error::ChurnError;
use crate::features::{feature_columns, TARGET_COLUMN};
use crate::model::{fit_logistic, LogisticConfig};
use crate::pipeline::{
    ArtifactMetadata, FittedPipeline, ARTIFACT_FORMAT_VERSION, DEFAULT_MODEL_PATH,
};
use crate::preprocessing::ColumnTransformer;

/// Inputs and tunables for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    pub target_column: String,
    pub logistic: LogisticConfig,
}

impl TrainConfig {
    pub fn new(data_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            model_path: model_path.into(),
            target_column: TARGET_COLUMN.to_string(),
            logistic: LogisticConfig::default(),
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.logistic.alpha = alpha;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.logistic.max_iterations = max_iterations;
        self
    }

    pub fn with_target_column(mut self, target_column: impl Into<String>) -> Self {
        self.target_column = target_column.into();
        self
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self::new("Telco_customer_churn.csv", DEFAULT_MODEL_PATH)
    }
}

/// Train on `dataset_path` with default settings and save to `model_output_path`.
pub fn train(
    dataset_path: impl AsRef<Path>,
    model_output_path: impl AsRef<Path>,
) -> crate::Result<FittedPipeline> {
    train_with_config(&TrainConfig::new(
        dataset_path.as_ref(),
        model_output_path.as_ref(),
    ))
}

/// Train according to `config` and save the artifact.
pub fn train_with_config(config: &TrainConfig) -> crate::Result<FittedPipeline> {
    let start_time = Instant::now();

    let df = load_feature_table(&config.data_path)
        .map_err(|e| ChurnError::Training(format!("no training data: {e}")))?;

    let pipeline = fit_pipeline(&df, &config.target_column, &config.logistic)?;
    pipeline.save(&config.model_path)?;

    info!(
        samples = pipeline.metadata.n_samples,
        features = pipeline.classifier.n_features(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "training complete"
    );
    Ok(pipeline)
}

/// Fit preprocessing and classifier on a cleaned table, using every column
/// except the target as a feature.
pub fn fit_pipeline(
    df: &DataFrame,
    target_column: &str,
    logistic: &LogisticConfig,
) -> crate::Result<FittedPipeline> {
    if df.height() == 0 {
        return Err(ChurnError::Training("dataset has no rows".to_string()));
    }

    let (x_df, y_series) = split_features_target(df, target_column)?;
    let frame = feature_frame(&x_df)?;
    let y = target_values(&y_series)?;

    let contract = feature_columns();
    let missing: Vec<&String> = contract
        .iter()
        .filter(|name| frame.column(name).is_none())
        .collect();
    if !missing.is_empty() {
        warn!(?missing, "training table lacks contract features");
    }

    let builder = ColumnTransformer::for_frame(&frame);
    info!(
        numeric = builder.numeric_columns().len(),
        categorical = builder.categorical_columns().len(),
        rows = frame.n_rows(),
        "fitting preprocessing"
    );
    let preprocessor = builder.fit(&frame)?;
    let x = preprocessor.transform(&frame)?;

    info!(features = x.ncols(), "fitting logistic regression");
    let classifier = fit_logistic(&x, &y, logistic)?;

    Ok(FittedPipeline {
        metadata: ArtifactMetadata {
            format_version: ARTIFACT_FORMAT_VERSION,
            trained_at: Utc::now(),
            n_samples: frame.n_rows(),
            target_column: target_column.to_string(),
            input_columns: frame.names().map(str::to_string).collect(),
            output_features: preprocessor.output_feature_names(),
        },
        preprocessor,
        classifier,
    })
}
