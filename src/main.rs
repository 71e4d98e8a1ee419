//! churnforge: Telco customer churn prediction CLI
//!
//! Dispatches the train, predict, form and eda subcommands.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use churnforge::logging::init_logging;
use churnforge::data::load_raw_table;
use churnforge::{
    form, train_with_config, viz, Args, ChurnPredictor, Command, CustomerRecord, TrainConfig,
};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.verbose {
        println!("churnforge - Telco customer churn prediction");
        println!("============================================\n");
    }

    match &args.command {
        Command::Train {
            data,
            model,
            alpha,
            max_iterations,
        } => {
            let config = TrainConfig::new(data, model)
                .with_alpha(*alpha)
                .with_max_iterations(*max_iterations);
            run_training(&config, args.verbose)
        }
        Command::Predict { model, .. } => run_prediction(&args.command, model, args.verbose),
        Command::Form { model } => run_form(model),
        Command::Eda { data, output_dir } => run_eda(data, output_dir, args.verbose),
    }
}

/// Fit and persist the model
fn run_training(config: &TrainConfig, verbose: bool) -> Result<()> {
    println!("=== Training ===\n");
    if verbose {
        println!("  Data file: {}", config.data_path.display());
        println!("  Regularization (alpha): {}", config.logistic.alpha);
        println!("  Max iterations: {}", config.logistic.max_iterations);
    }

    let start_time = Instant::now();
    let pipeline = train_with_config(config)?;

    println!("✓ Model trained on {} customers", pipeline.metadata.n_samples);
    if verbose {
        println!("  Input columns: {}", pipeline.metadata.input_columns.len());
        println!("  Encoded features: {}", pipeline.metadata.output_features.len());
    }
    println!("✓ Model saved to: {}", config.model_path.display());
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Score the given records, or the sample customer when none are given
fn run_prediction(command: &Command, model: &Path, verbose: bool) -> Result<()> {
    let predictor = ChurnPredictor::open(model);

    let records = match command.prediction_records()? {
        Some(records) => records,
        None => {
            if verbose {
                println!("No input given, scoring the sample customer\n");
            }
            vec![CustomerRecord::example().to_feature_map()]
        }
    };

    let predictions = predictor.predict_feature_batch(&records);
    for (i, prediction) in predictions.iter().enumerate() {
        if predictions.len() > 1 {
            println!("Customer {}:", i + 1);
        }
        if prediction.is_model_not_loaded() {
            println!("Prediction: {}", prediction.label);
        } else {
            let verdict = if prediction.label == churnforge::PredictionLabel::Yes {
                "Churn"
            } else {
                "Not Churn"
            };
            println!("Prediction: {verdict}");
        }
        println!("Churn Probability: {:.2}", prediction.probability);
    }
    Ok(())
}

/// Interactive form; refuses to start without a usable model
fn run_form(model: &Path) -> Result<()> {
    let predictor = ChurnPredictor::load(model).with_context(|| {
        format!(
            "cannot start the form without a trained model at {}; run `churnforge train` first",
            model.display()
        )
    })?;
    form::run_form(&predictor)?;
    Ok(())
}

/// Summary statistics and charts
fn run_eda(data: &Path, output_dir: &Path, verbose: bool) -> Result<()> {
    println!("=== Exploratory Data Analysis ===");
    let start_time = Instant::now();

    let raw = load_raw_table(data)?;
    let written = viz::generate_eda_report(&raw, output_dir)?;

    println!("\n✓ {} charts written to {}", written.len(), output_dir.display());
    if verbose {
        println!("  Processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    }
    Ok(())
}
