//! Fitted preprocessing + classifier composition and its on-disk artifact
//!
//! The artifact is a single JSON document. It records the ordered input
//! columns, the fitted feature groups and the classifier coefficients, so a
//! reader needs nothing besides the file to score records.

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ChurnError;
use crate::features::{FeatureKind, FeatureMap};
use crate::model::LogisticModel;
use crate::preprocessing::{ColumnFrame, ColumnValues, FittedColumnTransformer};

/// Bumped whenever the artifact layout changes incompatibly.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Default artifact location.
pub const DEFAULT_MODEL_PATH: &str = "models/churn_model.json";

/// Descriptive fields stored next to the fitted parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    pub target_column: String,
    /// Input columns in the order the raw table presented them.
    pub input_columns: Vec<String>,
    /// Transformed feature names in classifier order.
    pub output_features: Vec<String>,
}

/// Anything that turns a column frame into raw labels and positive-class
/// probabilities. `FittedPipeline` is the production implementation.
pub trait ChurnScorer: Send + Sync {
    /// Input columns and their kinds, used to reindex incoming records.
    fn input_columns(&self) -> Vec<(String, FeatureKind)>;

    /// Raw classifier label and positive-class probability per row.
    fn score(&self, frame: &ColumnFrame) -> crate::Result<Vec<(String, f64)>>;
}

/// The trained artifact. Never mutated after the trainer builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub metadata: ArtifactMetadata,
    pub preprocessor: FittedColumnTransformer,
    pub classifier: LogisticModel,
}

impl FittedPipeline {
    /// Write the artifact, creating parent directories. The bytes go to a
    /// temporary sibling first and are renamed into place, so readers never
    /// observe a partial file.
    pub fn save(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        info!(path = %path.display(), bytes = json.len(), "model artifact saved");
        Ok(())
    }

    /// Read an artifact. A missing file is `ModelArtifactMissing`; anything
    /// unreadable or of another format version is `ModelArtifactCorrupt`.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChurnError::ModelArtifactMissing {
                path: path.to_path_buf(),
            });
        }

        let corrupt = |reason: String| ChurnError::ModelArtifactCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = fs::read(path).map_err(|e| corrupt(e.to_string()))?;
        let pipeline: FittedPipeline =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;

        if pipeline.metadata.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {} (expected {})",
                pipeline.metadata.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if pipeline.preprocessor.n_features_out() != pipeline.classifier.n_features() {
            return Err(corrupt(format!(
                "preprocessor emits {} features but classifier expects {}",
                pipeline.preprocessor.n_features_out(),
                pipeline.classifier.n_features()
            )));
        }

        info!(
            path = %path.display(),
            trained_at = %pipeline.metadata.trained_at,
            "model artifact loaded"
        );
        Ok(pipeline)
    }

    /// Transform and classify in one pass.
    pub fn predict_frame(&self, frame: &ColumnFrame) -> crate::Result<Vec<(String, f64)>> {
        let x = self.preprocessor.transform(frame)?;
        self.classifier.predict(&x)
    }
}

impl ChurnScorer for FittedPipeline {
    fn input_columns(&self) -> Vec<(String, FeatureKind)> {
        let kinds = self.preprocessor.input_columns();
        // Report in the recorded raw-table order.
        self.metadata
            .input_columns
            .iter()
            .filter_map(|name| {
                kinds
                    .iter()
                    .find(|(column, _)| column == name)
                    .map(|(column, kind)| (column.clone(), *kind))
            })
            .collect()
    }

    fn score(&self, frame: &ColumnFrame) -> crate::Result<Vec<(String, f64)>> {
        self.predict_frame(frame)
    }
}

/// Project feature maps onto the scorer's columns. Absent keys become
/// missing values, extra keys are ignored, and each value is read according
/// to the column's kind.
pub fn reindex(columns: &[(String, FeatureKind)], rows: &[FeatureMap]) -> ColumnFrame {
    let mut frame = ColumnFrame::new();
    for (name, kind) in columns {
        let cells = rows.iter().map(|row| row.get(name).and_then(Option::as_ref));
        let values = match kind {
            FeatureKind::Numeric => {
                ColumnValues::Numeric(cells.map(|v| v.and_then(|v| v.as_number())).collect())
            }
            FeatureKind::Categorical => {
                ColumnValues::Categorical(cells.map(|v| v.map(|v| v.as_text())).collect())
            }
        };
        frame.push(name.clone(), values);
    }
    frame
}
