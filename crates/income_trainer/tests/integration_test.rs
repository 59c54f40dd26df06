//! Integration tests for the salary prediction pipeline
//!
//! Trains on a synthetic census-like CSV and checks determinism, persistence
//! and the inference fallbacks end to end.

use anyhow::Result;
use income_core::encoding::CodeLookup;
use income_core::schema::{IncomeBracket, IncomeRecord, CATEGORICAL_COLUMNS};
use income_trainer::{
    Dataset, ForestConfig, LcgRng, PipelineConfig, PredictionPipeline, TrainOutcome,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

const HEADER: &str = "age,workclass,education,marital-status,occupation,relationship,race,gender,hours-per-week,native-country,income";

const WORKCLASSES: [&str; 4] = ["Private", "Self-emp-not-inc", "Local-gov", "State-gov"];
const EDUCATIONS: [&str; 5] = ["HS-grad", "Some-college", "Bachelors", "Masters", "Doctorate"];
const MARITAL: [&str; 3] = ["Never-married", "Married-civ-spouse", "Divorced"];
const OCCUPATIONS: [&str; 4] = ["Adm-clerical", "Sales", "Exec-managerial", "Prof-specialty"];
const RACES: [&str; 3] = ["White", "Black", "Asian-Pac-Islander"];
const COUNTRIES: [&str; 3] = ["United-States", "Mexico", "India"];

fn pick<'a>(rng: &mut LcgRng, items: &[&'a str]) -> &'a str {
    items[rng.next_range(items.len())]
}

/// One synthetic CSV row; higher education, age, hours and marriage raise income
fn synthetic_row(rng: &mut LcgRng) -> String {
    let age = 18 + rng.next_range(50) as i64;
    let education_idx = rng.next_range(EDUCATIONS.len());
    let marital = pick(rng, &MARITAL);
    let hours = 20 + rng.next_range(41) as i64;
    let gender = if rng.next_range(2) == 0 { "Male" } else { "Female" };
    let relationship = match (marital, gender) {
        ("Married-civ-spouse", "Male") => "Husband",
        ("Married-civ-spouse", _) => "Wife",
        _ => "Not-in-family",
    };

    let mut score = education_idx as i64 * 2 + (age - 18) / 8 + (hours - 20) / 10;
    if marital == "Married-civ-spouse" {
        score += 3;
    }
    score += rng.next_range(3) as i64;
    let income = if score >= 12 { ">50K" } else { "<=50K" };

    format!(
        "{age},{},{},{marital},{},{relationship},{},{gender},{hours},{},{income}",
        pick(rng, &WORKCLASSES),
        EDUCATIONS[education_idx],
        pick(rng, &OCCUPATIONS),
        pick(rng, &RACES),
        pick(rng, &COUNTRIES),
    )
}

/// Synthetic dataset file; every `missing_every`-th row gets a `?` cell
fn create_synthetic_dataset(rows: usize, missing_every: Option<usize>) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    let mut rng = LcgRng::new(2024);

    writeln!(file, "{HEADER}")?;
    for i in 0..rows {
        let mut row = synthetic_row(&mut rng);
        if missing_every.is_some_and(|every| i % every == every - 1) {
            // Blank out the workclass with a padded sentinel
            let mut cells: Vec<&str> = row.split(',').collect();
            cells[1] = " ?";
            row = cells.join(",");
        }
        writeln!(file, "{row}")?;
    }

    file.flush()?;
    Ok(file)
}

fn small_config(model_dir: &Path, dataset: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::with_model_dir(model_dir);
    config.dataset_path = dataset.to_path_buf();
    config.forest = ForestConfig {
        n_estimators: 20,
        max_depth: 8,
        ..ForestConfig::default()
    };
    config
}

fn example_record() -> IncomeRecord {
    IncomeRecord {
        age: 39,
        workclass: "Private".to_string(),
        education: "Bachelors".to_string(),
        marital_status: "Never-married".to_string(),
        occupation: "Prof-specialty".to_string(),
        relationship: "Not-in-family".to_string(),
        race: "White".to_string(),
        gender: "Male".to_string(),
        hours_per_week: 40,
        native_country: "United-States".to_string(),
    }
}

fn trained(outcome: TrainOutcome) -> income_trainer::TrainingReport {
    match outcome {
        TrainOutcome::Trained(report) => report,
        TrainOutcome::AlreadyTrained => panic!("expected a training run"),
    }
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let data = create_synthetic_dataset(400, None)?;
    let dir1 = TempDir::new()?;
    let dir2 = TempDir::new()?;

    let mut first = PredictionPipeline::new(small_config(dir1.path(), data.path()));
    let mut second = PredictionPipeline::new(small_config(dir2.path(), data.path()));
    let report1 = trained(first.train()?);
    let report2 = trained(second.train()?);

    assert_eq!(report1.model_hash, report2.model_hash, "Model hash should be identical");
    assert_eq!(report1.accuracy, report2.accuracy, "Accuracy should be identical");
    assert_eq!(report1.report, report2.report);
    assert_eq!(report1.feature_importances, report2.feature_importances);

    let dataset = Dataset::from_csv(data.path())?;
    for row in dataset.records.iter().take(100) {
        assert_eq!(first.predict(&row.record)?, second.predict(&row.record)?);
    }

    assert_eq!(
        fs::read(first.store().encoders_path())?,
        fs::read(second.store().encoders_path())?
    );

    Ok(())
}

#[test]
fn test_model_learns_the_signal() -> Result<()> {
    let data = create_synthetic_dataset(400, None)?;
    let dir = TempDir::new()?;

    let mut pipeline = PredictionPipeline::new(small_config(dir.path(), data.path()));
    let report = trained(pipeline.train()?);

    assert_eq!(report.train_samples + report.test_samples, 400);
    assert!(report.accuracy > 0.7, "accuracy {}", report.accuracy);
    assert_eq!(report.report.classes.len(), 2);

    let (top_feature, _) = &report.feature_importances[0];
    assert!(
        ["education", "age", "marital-status", "hours-per-week", "relationship"]
            .contains(&top_feature.as_str()),
        "unexpected top feature {top_feature}"
    );

    Ok(())
}

#[test]
fn test_save_load_round_trip() -> Result<()> {
    let data = create_synthetic_dataset(300, None)?;
    let dir = TempDir::new()?;
    let config = small_config(dir.path(), data.path());

    let mut original = PredictionPipeline::new(config.clone());
    original.train()?;

    let restored = PredictionPipeline::open(config)?;
    assert!(restored.is_ready());
    assert_eq!(restored.model_hash(), original.model_hash());

    let dataset = Dataset::from_csv(data.path())?;
    for row in &dataset.records {
        assert_eq!(original.predict(&row.record)?, restored.predict(&row.record)?);
    }

    // Explicit save rewrites the same pair
    let saved = restored.save()?;
    assert_eq!(Some(saved.model_hash.as_str()), original.model_hash());

    Ok(())
}

#[test]
fn test_second_train_is_a_no_op() -> Result<()> {
    let data = create_synthetic_dataset(300, None)?;
    let dir = TempDir::new()?;
    let config = small_config(dir.path(), data.path());

    let mut pipeline = PredictionPipeline::new(config.clone());
    assert!(matches!(pipeline.train()?, TrainOutcome::Trained(_)));

    let model_bytes = fs::read(pipeline.store().model_path())?;
    let encoder_bytes = fs::read(pipeline.store().encoders_path())?;

    assert!(matches!(pipeline.train()?, TrainOutcome::AlreadyTrained));

    // A fresh handle adopts the existing pair instead of training
    let mut fresh = PredictionPipeline::new(config);
    assert!(!fresh.is_ready());
    assert!(matches!(fresh.train()?, TrainOutcome::AlreadyTrained));
    assert!(fresh.is_ready());

    assert_eq!(fs::read(pipeline.store().model_path())?, model_bytes);
    assert_eq!(fs::read(pipeline.store().encoders_path())?, encoder_bytes);

    Ok(())
}

#[test]
fn test_retrain_replaces_the_pair() -> Result<()> {
    let data = create_synthetic_dataset(300, None)?;
    let dir = TempDir::new()?;
    let mut config = small_config(dir.path(), data.path());

    let mut pipeline = PredictionPipeline::new(config.clone());
    pipeline.train()?;
    let before = pipeline.model_hash().map(str::to_string);

    config.forest.seed = 7;
    let mut reseeded = PredictionPipeline::open(config)?;
    let dataset = reseeded.load_dataset()?;
    let report = reseeded.retrain_on(&dataset)?;

    assert_ne!(Some(report.model_hash.clone()), before);
    let reopened = PredictionPipeline::open(small_config(dir.path(), data.path()))?;
    assert_eq!(reopened.model_hash(), Some(report.model_hash.as_str()));

    Ok(())
}

#[test]
fn test_model_without_encoders_is_retrained() -> Result<()> {
    let data = create_synthetic_dataset(200, None)?;
    let dir = TempDir::new()?;
    let config = small_config(dir.path(), data.path());

    let mut pipeline = PredictionPipeline::new(config.clone());
    pipeline.train()?;
    fs::remove_file(pipeline.store().encoders_path())?;

    let mut fresh = PredictionPipeline::open(config)?;
    assert!(!fresh.is_ready());
    assert!(matches!(fresh.train()?, TrainOutcome::Trained(_)));
    assert!(fresh.store().is_complete());

    Ok(())
}

#[test]
fn test_unseen_category_fallback() -> Result<()> {
    let data = create_synthetic_dataset(300, None)?;
    let dir = TempDir::new()?;

    let mut pipeline = PredictionPipeline::new(small_config(dir.path(), data.path()));
    pipeline.train()?;

    let encoders = pipeline.bundle().expect("trained").encoders();
    let known = encoders.get("native-country").expect("fitted").len() as i64;
    assert_eq!(
        encoders.encode_value("native-country", Some("Atlantis")),
        CodeLookup::Unseen(known)
    );
    assert_eq!(encoders.encode_value("no-such-column", Some("x")).code(), 0);

    let mut record = example_record();
    record.native_country = "Atlantis".to_string();
    record.occupation = "Astronaut".to_string();

    let first = pipeline.predict(&record)?;
    let second = pipeline.predict(&record)?;
    assert_eq!(first, second);
    assert!((0.0..=1.0).contains(&first.confidence));
    assert_eq!(pipeline.unseen_category_count(), 4);

    pipeline.predict(&example_record())?;
    assert_eq!(pipeline.unseen_category_count(), 4);

    Ok(())
}

#[test]
fn test_missing_rows_are_dropped() -> Result<()> {
    let data = create_synthetic_dataset(200, Some(10))?;
    let dataset = Dataset::from_csv(data.path())?;

    assert_eq!(dataset.rows_read, 200);
    assert_eq!(dataset.rows_dropped, 20);
    assert_eq!(dataset.len(), 180);

    for row in &dataset.records {
        for column in CATEGORICAL_COLUMNS {
            let value = row.record.category(column).expect("no missing values remain");
            assert_ne!(value, "?");
            assert_eq!(value, value.trim());
        }
    }

    Ok(())
}

#[test]
fn test_example_scenario_is_stable() -> Result<()> {
    let data = create_synthetic_dataset(400, None)?;
    let dir = TempDir::new()?;
    let config = small_config(dir.path(), data.path());

    let mut pipeline = PredictionPipeline::new(config.clone());
    pipeline.train()?;

    let record = example_record();
    let prediction = pipeline.predict(&record)?;
    assert!(IncomeBracket::ALL.contains(&prediction.label));
    assert!((0.0..=1.0).contains(&prediction.confidence));

    let again = pipeline.predict(&record)?;
    assert_eq!(prediction.label, again.label);
    assert_eq!(prediction.confidence.to_bits(), again.confidence.to_bits());

    let reloaded = PredictionPipeline::open(config)?;
    let after_reload = reloaded.predict(&record)?;
    assert_eq!(prediction.confidence.to_bits(), after_reload.confidence.to_bits());

    Ok(())
}

#[test]
fn test_unreadable_dataset_leaves_pipeline_untrained() {
    let dir = TempDir::new().unwrap();
    let config = small_config(dir.path(), Path::new("/nonexistent/employee_data.csv"));

    let mut pipeline = PredictionPipeline::new(config);
    assert!(pipeline.train().is_err());
    assert!(!pipeline.is_ready());
    assert!(!pipeline.store().model_exists());
}
