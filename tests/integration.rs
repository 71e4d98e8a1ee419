//! Integration tests for churnforge

use std::io::Write;
use std::path::Path;

use approx::assert_abs_diff_eq;
use churnforge::cli::parse_records;
use churnforge::data::load_raw_table;
use churnforge::features::feature_columns;
use churnforge::{
    load_feature_table, train, ChurnError, ChurnPredictor, CustomerRecord, FeatureMap,
    FeatureValue, FittedPipeline, PredictionLabel,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::{tempdir, NamedTempFile};

const HEADER: &str = "CustomerID,Count,Country,State,City,Zip Code,Lat Long,Latitude,Longitude,\
Gender,Senior Citizen,Partner,Dependents,Tenure Months,Phone Service,Multiple Lines,\
Internet Service,Online Security,Online Backup,Device Protection,Tech Support,Streaming TV,\
Streaming Movies,Contract,Paperless Billing,Payment Method,Monthly Charges,Total Charges,\
Churn Label,Churn Value,Churn Score,CLTV,Churn Reason";

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

/// Create a synthetic export shaped like the Telco churn table. Churn is
/// driven by month-to-month contracts, fiber service and short tenure.
fn create_telco_csv(rows: usize, seed: u64) -> NamedTempFile {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();

    for i in 0..rows {
        let contract = pick(&mut rng, &["Month-to-month", "One year", "Two year"]);
        let internet = pick(&mut rng, &["DSL", "Fiber optic", "No"]);
        let phone = pick(&mut rng, &["Yes", "No"]);
        let tenure: u32 = match contract {
            "Month-to-month" => rng.gen_range(0..24),
            "One year" => rng.gen_range(12..48),
            _ => rng.gen_range(24..72),
        };

        let add_on = |rng: &mut StdRng| {
            if internet == "No" {
                "No internet service"
            } else {
                pick(rng, &["Yes", "No"])
            }
        };
        let online_security = add_on(&mut rng);
        let online_backup = add_on(&mut rng);
        let device_protection = add_on(&mut rng);
        let tech_support = add_on(&mut rng);
        let streaming_tv = add_on(&mut rng);
        let streaming_movies = add_on(&mut rng);
        let multiple_lines = if phone == "No" {
            "No phone service"
        } else {
            pick(&mut rng, &["Yes", "No"])
        };

        let monthly: f64 = match internet {
            "Fiber optic" => rng.gen_range(70.0..110.0),
            "DSL" => rng.gen_range(40.0..70.0),
            _ => rng.gen_range(18.0..26.0),
        };
        let total = if tenure == 0 {
            " ".to_string()
        } else {
            format!("{:.2}", monthly * f64::from(tenure))
        };

        let risk = match (contract, internet) {
            ("Month-to-month", "Fiber optic") => 0.9,
            ("Month-to-month", _) => 0.45,
            (_, "Fiber optic") => 0.15,
            _ => 0.03,
        };
        let churned = rng.gen_bool(risk);

        writeln!(
            file,
            "{id},1,United States,California,Los Angeles,90003,\"33.96, -118.27\",33.96,-118.27,\
{gender},{senior},{partner},{dependents},{tenure},{phone},{multiple_lines},{internet},\
{online_security},{online_backup},{device_protection},{tech_support},{streaming_tv},\
{streaming_movies},{contract},{paperless},{payment},{monthly:.2},{total},{label},{value},\
{score},{cltv},{reason}",
            id = format!("{:04}-TEST", i),
            gender = pick(&mut rng, &["Male", "Female"]),
            senior = pick(&mut rng, &["Yes", "No", "No", "No"]),
            partner = pick(&mut rng, &["Yes", "No"]),
            dependents = pick(&mut rng, &["Yes", "No"]),
            paperless = pick(&mut rng, &["Yes", "No"]),
            payment = pick(
                &mut rng,
                &[
                    "Electronic check",
                    "Mailed check",
                    "Bank transfer (automatic)",
                    "Credit card (automatic)",
                ],
            ),
            label = if churned { "Yes" } else { "No" },
            value = u8::from(churned),
            score = if churned { 85 } else { 30 },
            cltv = 4000 + i,
            reason = if churned { "Competitor offered more data" } else { "" },
        )
        .unwrap();
    }

    file
}

fn train_on(csv: &NamedTempFile, model_path: &Path) -> FittedPipeline {
    train(csv.path(), model_path).unwrap()
}

fn high_risk_record() -> CustomerRecord {
    CustomerRecord {
        tenure_months: 2,
        monthly_charges: 95.0,
        total_charges: Some(190.0),
        ..CustomerRecord::example()
    }
}

fn low_risk_record() -> FeatureMap {
    let mut map = CustomerRecord::example().to_feature_map();
    map.insert("Contract".into(), Some(FeatureValue::from("Two year")));
    map.insert("Internet Service".into(), Some(FeatureValue::from("DSL")));
    map.insert("Tenure Months".into(), Some(FeatureValue::Number(60.0)));
    map.insert("Monthly Charges".into(), Some(FeatureValue::Number(55.0)));
    map.insert("Total Charges".into(), Some(FeatureValue::Number(3300.0)));
    map
}

#[test]
fn test_end_to_end_pipeline() {
    let csv = create_telco_csv(400, 7);
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("models").join("churn_model.json");

    let pipeline = train_on(&csv, &model_path);
    assert!(model_path.exists());
    assert_eq!(pipeline.metadata.n_samples, 400);
    assert_eq!(pipeline.metadata.input_columns, feature_columns());
    assert_eq!(pipeline.metadata.target_column, "Churn Value");

    let predictor = ChurnPredictor::load(&model_path).unwrap();
    let prediction = predictor.predict(&CustomerRecord::example());
    assert!(matches!(prediction.label, PredictionLabel::Yes | PredictionLabel::No));
    assert!((0.0..=1.0).contains(&prediction.probability));
}

#[test]
fn test_cleaned_table_has_contract_columns_and_no_nulls() {
    let csv = create_telco_csv(120, 11);
    let df = load_feature_table(csv.path()).unwrap();

    let mut expected = feature_columns();
    expected.push("Churn Value".to_string());
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    assert_eq!(names, expected);
    assert!(df.get_columns().iter().all(|column| column.null_count() == 0));
}

#[test]
fn test_training_is_deterministic() {
    let csv = create_telco_csv(300, 3);
    let dir = tempdir().unwrap();

    let first = train_on(&csv, &dir.path().join("a.json"));
    let second = train_on(&csv, &dir.path().join("b.json"));

    assert_eq!(first.preprocessor, second.preprocessor);
    assert_eq!(first.classifier, second.classifier);
}

#[test]
fn test_labels_follow_probability() {
    let csv = create_telco_csv(400, 21);
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    train_on(&csv, &model_path);
    let predictor = ChurnPredictor::load(&model_path).unwrap();

    let high = predictor.predict(&high_risk_record());
    let low = predictor.predict_features(&low_risk_record());
    assert_eq!(high.label, PredictionLabel::Yes, "p = {}", high.probability);
    assert_eq!(low.label, PredictionLabel::No, "p = {}", low.probability);
    assert!(high.probability > low.probability);

    let mut rows = vec![low_risk_record(), high_risk_record().to_feature_map()];
    rows.push(CustomerRecord::example().to_feature_map());
    for prediction in predictor.predict_feature_batch(&rows) {
        assert_eq!(
            prediction.label == PredictionLabel::Yes,
            prediction.probability >= 0.5
        );
    }
}

#[test]
fn test_key_order_does_not_matter() {
    let csv = create_telco_csv(200, 5);
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    train_on(&csv, &model_path);
    let predictor = ChurnPredictor::load(&model_path).unwrap();

    let forward = serde_json::to_string(&CustomerRecord::example()).unwrap();
    let mut fields: Vec<(String, serde_json::Value)> =
        serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&forward)
            .unwrap()
            .into_iter()
            .collect();
    fields.reverse();
    let reversed = format!(
        "{{{}}}",
        fields
            .iter()
            .map(|(key, value)| format!("{}:{}", serde_json::to_string(key).unwrap(), value))
            .collect::<Vec<_>>()
            .join(",")
    );

    let a = predictor.predict_features(&parse_records(&forward).unwrap()[0]);
    let b = predictor.predict_features(&parse_records(&reversed).unwrap()[0]);
    assert_eq!(a, b);
    assert_eq!(a, predictor.predict(&CustomerRecord::example()));
}

#[test]
fn test_unseen_category_and_missing_features_still_score() {
    let csv = create_telco_csv(200, 9);
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    train_on(&csv, &model_path);
    let predictor = ChurnPredictor::load(&model_path).unwrap();

    let mut unseen = CustomerRecord::example().to_feature_map();
    unseen.insert("Contract".into(), Some(FeatureValue::from("Three year")));
    let prediction = predictor.predict_features(&unseen);
    assert!(!prediction.is_model_not_loaded());
    assert!((0.0..=1.0).contains(&prediction.probability));

    let mut sparse = FeatureMap::new();
    sparse.insert("Contract".into(), Some(FeatureValue::from("Two year")));
    sparse.insert("Unrelated".into(), Some(FeatureValue::from("ignored")));
    let prediction = predictor.predict_features(&sparse);
    assert!(!prediction.is_model_not_loaded());
    assert!((0.0..=1.0).contains(&prediction.probability));

    let mut no_total = CustomerRecord::example();
    no_total.total_charges = None;
    assert!(!predictor.predict(&no_total).is_model_not_loaded());
}

#[test]
fn test_reloaded_artifact_scores_identically() {
    let csv = create_telco_csv(250, 13);
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    let trained = train_on(&csv, &model_path);
    let reloaded = FittedPipeline::load(&model_path).unwrap();

    assert_eq!(reloaded.metadata, trained.metadata);

    let in_memory = ChurnPredictor::from_pipeline(trained);
    let from_disk = ChurnPredictor::from_pipeline(reloaded);
    let rows = vec![
        CustomerRecord::example().to_feature_map(),
        low_risk_record(),
        high_risk_record().to_feature_map(),
    ];
    for (a, b) in in_memory
        .predict_feature_batch(&rows)
        .iter()
        .zip(from_disk.predict_feature_batch(&rows))
    {
        assert_eq!(a.label, b.label);
        assert_abs_diff_eq!(a.probability, b.probability, epsilon = 1e-9);
    }
}

#[test]
fn test_batch_matches_single_predictions() {
    let csv = create_telco_csv(200, 17);
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    train_on(&csv, &model_path);
    let predictor = ChurnPredictor::load(&model_path).unwrap();

    let records = vec![CustomerRecord::example(), high_risk_record()];
    let batch = predictor.predict_batch(&records);
    assert_eq!(batch.len(), 2);
    for (record, prediction) in records.iter().zip(&batch) {
        let single = predictor.predict(record);
        assert_eq!(single.label, prediction.label);
        assert_abs_diff_eq!(single.probability, prediction.probability, epsilon = 1e-12);
    }
}

#[test]
fn test_missing_model_returns_sentinel() {
    let dir = tempdir().unwrap();
    let predictor = ChurnPredictor::open(dir.path().join("missing.json"));

    let prediction = predictor.predict(&CustomerRecord::example());
    assert_eq!(prediction.label.to_string(), "Model not loaded");
    assert_eq!(prediction.probability, 0.0);
}

#[test]
fn test_corrupt_model_returns_sentinel() {
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    std::fs::write(&model_path, b"{\"metadata\": 42").unwrap();

    assert!(matches!(
        ChurnPredictor::load(&model_path),
        Err(ChurnError::ModelArtifactCorrupt { .. })
    ));
    assert!(ChurnPredictor::open(&model_path)
        .predict(&CustomerRecord::example())
        .is_model_not_loaded());
}

#[test]
fn test_training_without_dataset_fails() {
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    let result = train(dir.path().join("absent.csv"), &model_path);

    assert!(matches!(result, Err(ChurnError::Training(_))));
    assert!(!model_path.exists());
}

#[test]
fn test_eda_counts_cover_every_row() {
    let csv = create_telco_csv(150, 23);
    let df = load_feature_table(csv.path()).unwrap();

    let (stayed, churned) = churnforge::viz::churn_counts(&df).unwrap();
    assert_eq!(stayed + churned, 150);
    assert!(churned > 0 && stayed > 0);

    let by_service = churnforge::viz::churn_by_category(&df, "Internet Service").unwrap();
    let categories: Vec<&str> = by_service.iter().map(|row| row.category.as_str()).collect();
    assert_eq!(categories, vec!["DSL", "Fiber optic", "No"]);
    assert_eq!(
        by_service.iter().map(|row| row.stayed + row.churned).sum::<usize>(),
        150
    );
}

#[test]
fn test_infinite_charges_keep_probability_in_bounds() {
    let csv = create_telco_csv(200, 29);
    let dir = tempdir().unwrap();
    let model_path = dir.path().join("model.json");
    train_on(&csv, &model_path);
    let predictor = ChurnPredictor::load(&model_path).unwrap();

    let records = parse_records(
        r#"{"Monthly Charges": "inf", "Total Charges": "-infinity", "Contract": "One year"}"#,
    )
    .unwrap();
    let prediction = predictor.predict_features(&records[0]);
    assert!(!prediction.is_model_not_loaded());
    assert!((0.0..=1.0).contains(&prediction.probability));
    assert_eq!(
        prediction.label == PredictionLabel::Yes,
        prediction.probability >= 0.5
    );
}

#[test]
fn test_eda_summary_counts_missing_before_imputation() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "CustomerID,Gender,Tenure Months,Total Charges,Churn Value").unwrap();
    writeln!(file, "A,Male,1,29.85,1").unwrap();
    writeln!(file, "B,,34,1889.5,0").unwrap();
    writeln!(file, "C,Female,0, ,0").unwrap();
    writeln!(file, "D,Female,2,108.15,1").unwrap();

    let raw = load_raw_table(file.path()).unwrap();
    let summary = churnforge::viz::summarize(&raw).unwrap();

    let missing: Vec<usize> = summary.missing.iter().map(|(_, n)| *n).collect();
    assert_eq!(missing, vec![1, 0, 1, 0]);
    assert_eq!(summary.duplicate_rows, 0);
    assert_eq!(summary.churn, Some((2, 2)));
    let total = summary
        .numeric
        .iter()
        .find(|stats| stats.column == "Total Charges")
        .unwrap();
    assert_eq!(total.count, 3);
}
