//! Command-line interface definitions and argument parsing

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::error::ChurnError;
use crate::features::FeatureMap;
use crate::pipeline::DEFAULT_MODEL_PATH;

/// Telco customer churn prediction with logistic regression
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train the churn model and save the artifact
    Train {
        /// Path to the customer CSV file
        #[arg(short, long, default_value = "Telco_customer_churn.csv")]
        data: PathBuf,

        /// Output path for the model artifact
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// L2 regularization strength
        #[arg(long, default_value = "1.0")]
        alpha: f64,

        /// Maximum solver iterations
        #[arg(long, default_value = "100")]
        max_iterations: u64,
    },

    /// Score customers with a saved model
    Predict {
        /// Path to the model artifact
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// JSON file holding one record or an array of records
        #[arg(short, long, conflicts_with = "record")]
        input: Option<PathBuf>,

        /// Inline JSON record, e.g. '{"Contract": "Two year"}'
        #[arg(short, long)]
        record: Option<String>,
    },

    /// Interactive prediction form
    Form {
        /// Path to the model artifact
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
    },

    /// Exploratory charts and summary of the dataset
    Eda {
        /// Path to the customer CSV file
        #[arg(short, long, default_value = "Telco_customer_churn.csv")]
        data: PathBuf,

        /// Directory receiving the PNG charts
        #[arg(short, long, default_value = "eda_plots")]
        output_dir: PathBuf,
    },
}

impl Command {
    /// Records passed to `predict`, `None` when neither `--input` nor
    /// `--record` was given.
    pub fn prediction_records(&self) -> crate::Result<Option<Vec<FeatureMap>>> {
        match self {
            Command::Predict {
                input: Some(path), ..
            } => {
                let text = fs::read_to_string(path)?;
                parse_records(&text).map(Some)
            }
            Command::Predict {
                record: Some(json), ..
            } => parse_records(json).map(Some),
            _ => Ok(None),
        }
    }
}

/// Parse a JSON object or an array of objects into feature maps.
pub fn parse_records(json: &str) -> crate::Result<Vec<FeatureMap>> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        _ => Err(ChurnError::Input(
            "expected a JSON object or an array of objects".to_string(),
        )),
    }
}
