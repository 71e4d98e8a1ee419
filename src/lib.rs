//! churnforge: Telco customer churn prediction
//!
//! Loads and cleans the customer table, fits a preprocessing column
//! transformer plus logistic regression, persists the fitted pipeline, and
//! scores customers from code, JSON or an interactive terminal form.

pub mod cli;
pub mod data;
pub mod error;
pub mod features;
pub mod form;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod preprocessing;
pub mod train;
pub mod viz;

// Re-export public items for easier access
pub use cli::{Args, Command};
pub use data::load_feature_table;
pub use error::ChurnError;
pub use features::{CustomerRecord, FeatureKind, FeatureMap, FeatureValue, FEATURE_CONTRACT};
pub use model::{LogisticConfig, LogisticModel};
pub use pipeline::{ChurnScorer, FittedPipeline, DEFAULT_MODEL_PATH};
pub use predict::{ChurnPredictor, Prediction, PredictionLabel};
pub use preprocessing::{ColumnTransformer, FittedColumnTransformer};
pub use train::{train, train_with_config, TrainConfig};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, ChurnError>;
