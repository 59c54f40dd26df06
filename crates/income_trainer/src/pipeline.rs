//! Prediction pipeline
//!
//! [`PredictionPipeline`] is the handle callers keep for the lifetime of the
//! process. It starts untrained, becomes ready once a model pair is trained
//! or loaded, and from then on serves predictions without any I/O.

use income_core::artifacts::{ArtifactStore, ModelBundle, SavedArtifacts};
use income_core::encoding::EncoderSet;
use income_core::forest::SCALE;
use income_core::prediction::{Prediction, PredictionRecord};
use income_core::schema::{IncomeBracket, IncomeRecord, CATEGORICAL_COLUMNS, FEATURE_COLUMNS};
use income_core::encoding::UNSEEN_CATEGORY_METRIC;
use income_core::CoreError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::errors::{DatasetError, PredictionError, TrainingError};
use crate::evaluation::ClassificationReport;
use crate::forest::ForestTrainer;
use crate::split::stratified_split;

/// Counter of predictions served, labelled by predicted bracket
pub const PREDICTIONS_METRIC: &str = "income_predictions_total";

/// Features listed in the training log
const TOP_FEATURES: usize = 5;

/// Register descriptions for the pipeline's counters with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(PREDICTIONS_METRIC, "Predictions served, by predicted bracket");
    metrics::describe_counter!(
        UNSEEN_CATEGORY_METRIC,
        "Categorical values not seen during training, by column"
    );
}

/// Whether a model pair is resident
#[derive(Debug, Clone)]
pub enum PipelineState {
    Untrained,
    Ready {
        bundle: ModelBundle,
        model_hash: String,
    },
}

/// Result of a training request
#[derive(Debug, Clone)]
pub enum TrainOutcome {
    /// A persisted model already existed; no training was done
    AlreadyTrained,
    Trained(TrainingReport),
}

/// Summary of a completed training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Label distribution of the cleaned dataset
    pub class_counts: Vec<(IncomeBracket, usize)>,
    /// Held-out accuracy
    pub accuracy: f64,
    pub report: ClassificationReport,
    /// Feature importances, highest first
    pub feature_importances: Vec<(String, f64)>,
    pub model_hash: String,
}

/// Explicit pipeline handle with untrained and ready states
#[derive(Debug)]
pub struct PredictionPipeline {
    config: PipelineConfig,
    store: ArtifactStore,
    state: PipelineState,
    unseen: AtomicU64,
}

impl PredictionPipeline {
    /// Create an untrained pipeline; touches no files
    pub fn new(config: PipelineConfig) -> Self {
        let store = config.artifact_store();
        Self {
            config,
            store,
            state: PipelineState::Untrained,
            unseen: AtomicU64::new(0),
        }
    }

    /// Create a pipeline and load any persisted model pair
    pub fn open(config: PipelineConfig) -> Result<Self, CoreError> {
        let mut pipeline = Self::new(config);
        pipeline.load()?;
        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PipelineState::Ready { .. })
    }

    /// Resident model pair, if any
    pub fn bundle(&self) -> Option<&ModelBundle> {
        match &self.state {
            PipelineState::Ready { bundle, .. } => Some(bundle),
            PipelineState::Untrained => None,
        }
    }

    /// Structure hash of the resident classifier
    pub fn model_hash(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Ready { model_hash, .. } => Some(model_hash),
            PipelineState::Untrained => None,
        }
    }

    /// Categorical values that hit the overflow bucket since this handle was created
    pub fn unseen_category_count(&self) -> u64 {
        self.unseen.load(Ordering::Relaxed)
    }

    /// Load the persisted pair into memory
    ///
    /// Returns whether the pipeline is ready afterwards. When either file is
    /// missing the current state is kept.
    pub fn load(&mut self) -> Result<bool, CoreError> {
        if let Some(bundle) = self.store.load()? {
            self.set_ready(bundle)?;
        }
        Ok(self.is_ready())
    }

    /// Persist the resident pair
    pub fn save(&self) -> Result<SavedArtifacts, TrainingError> {
        let bundle = self.bundle().ok_or(TrainingError::NotTrained)?;
        Ok(self.store.save(bundle)?)
    }

    /// Read and clean the configured dataset
    pub fn load_dataset(&self) -> Result<Dataset, DatasetError> {
        Dataset::from_csv(&self.config.dataset_path)
    }

    /// Train from the configured dataset unless a model already exists
    pub fn train(&mut self) -> Result<TrainOutcome, TrainingError> {
        if self.adopt_existing()? {
            return Ok(TrainOutcome::AlreadyTrained);
        }
        let dataset = self.load_dataset()?;
        self.fit_and_replace(&dataset).map(TrainOutcome::Trained)
    }

    /// Train on `dataset` unless a model already exists
    pub fn train_on(&mut self, dataset: &Dataset) -> Result<TrainOutcome, TrainingError> {
        if self.adopt_existing()? {
            return Ok(TrainOutcome::AlreadyTrained);
        }
        self.fit_and_replace(dataset).map(TrainOutcome::Trained)
    }

    /// Train on `dataset` and replace any existing pair
    ///
    /// On failure the previous artifacts and in-memory state are kept.
    pub fn retrain_on(&mut self, dataset: &Dataset) -> Result<TrainingReport, TrainingError> {
        self.fit_and_replace(dataset)
    }

    /// Label and confidence for one raw record
    pub fn predict(&self, record: &IncomeRecord) -> Result<Prediction, PredictionError> {
        let bundle = self.bundle().ok_or(PredictionError::NotReady)?;
        let forest = bundle.forest();

        let encoded = bundle.encoders().encode_record(record);
        if !encoded.fallbacks.is_empty() {
            self.unseen
                .fetch_add(encoded.fallbacks.len() as u64, Ordering::Relaxed);
        }
        if encoded.features.len() != forest.n_features() {
            return Err(PredictionError::FeatureMismatch {
                expected: forest.n_features(),
                actual: encoded.features.len(),
            });
        }

        let score = forest.predict(&encoded.features);
        let label = forest
            .classes
            .get(score.class_index)
            .and_then(|name| name.parse::<IncomeBracket>().ok())
            .ok_or(PredictionError::UnknownClass(score.class_index))?;
        let confidence = score.confidence();

        metrics::counter!(PREDICTIONS_METRIC, "label" => label.as_str()).increment(1);
        info!(%label, confidence, "Prediction made");

        Ok(Prediction { label, confidence })
    }

    /// Predict and wrap the result for a caller that stores predictions
    pub fn predict_record(&self, record: IncomeRecord) -> Result<PredictionRecord, PredictionError> {
        let prediction = self.predict(&record)?;
        let model_hash = self.model_hash().unwrap_or_default().to_string();
        Ok(PredictionRecord::new(record, prediction, model_hash))
    }

    /// Load an existing pair if there is one; true means training is skipped
    fn adopt_existing(&mut self) -> Result<bool, TrainingError> {
        if !self.store.model_exists() {
            return Ok(false);
        }
        if self.is_ready() {
            info!(model = %self.store.model_path().display(), "Model already trained");
            return Ok(true);
        }
        if self.load()? {
            info!(model = %self.store.model_path().display(), "Model already trained");
            return Ok(true);
        }
        warn!(
            model = %self.store.model_path().display(),
            encoders = %self.store.encoders_path().display(),
            "Model file present without its encoders, retraining"
        );
        Ok(false)
    }

    fn fit_and_replace(&mut self, dataset: &Dataset) -> Result<TrainingReport, TrainingError> {
        let (bundle, report) = self.fit_bundle(dataset)?;
        self.store.save(&bundle)?;
        self.set_ready(bundle)?;
        Ok(report)
    }

    fn set_ready(&mut self, bundle: ModelBundle) -> Result<(), CoreError> {
        let model_hash = bundle.model_hash()?;
        self.state = PipelineState::Ready { bundle, model_hash };
        Ok(())
    }

    /// Encode, split, fit and evaluate; writes nothing
    fn fit_bundle(&self, dataset: &Dataset) -> Result<(ModelBundle, TrainingReport), TrainingError> {
        self.config.validate().map_err(TrainingError::Config)?;
        if dataset.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }

        let class_counts = dataset.class_counts();
        let present: Vec<_> = class_counts.iter().filter(|(_, count)| *count > 0).collect();
        if present.len() < 2 {
            let only = present
                .first()
                .map(|(label, _)| label.to_string())
                .unwrap_or_default();
            return Err(TrainingError::SingleClass(only));
        }

        info!(
            rows = dataset.len(),
            columns = FEATURE_COLUMNS.len() + 1,
            dropped = dataset.rows_dropped,
            "Training data shape"
        );
        for (label, count) in &class_counts {
            info!(%label, count, "Target distribution");
        }

        let encoders = EncoderSet::fit(&CATEGORICAL_COLUMNS, |column| dataset.column_values(column));
        let features: Vec<Vec<i64>> = dataset
            .records
            .iter()
            .map(|row| encoders.encode_record(&row.record).features)
            .collect();
        let labels: Vec<usize> = dataset.records.iter().map(|row| row.label.class_index()).collect();

        let split = stratified_split(
            &labels,
            IncomeBracket::ALL.len(),
            self.config.split.test_fraction,
            self.config.split.seed,
        )
        .map_err(TrainingError::Split)?;
        info!(
            train = split.train.len(),
            test = split.test.len(),
            "Stratified split"
        );

        let take = |rows: &[usize]| -> (Vec<Vec<i64>>, Vec<usize>) {
            rows.iter()
                .map(|&row| (features[row].clone(), labels[row]))
                .unzip()
        };
        let (train_x, train_y) = take(&split.train);
        let (test_x, test_y) = take(&split.test);

        let feature_names = FEATURE_COLUMNS.iter().map(|column| column.to_string()).collect();
        let mut forest = ForestTrainer::new(self.config.forest.clone()).fit(
            &train_x,
            &train_y,
            IncomeBracket::class_names(),
            feature_names,
        )?;

        let predicted: Vec<usize> = test_x.iter().map(|row| forest.predict(row).class_index).collect();
        let report = ClassificationReport::new(&test_y, &predicted, &forest.classes);
        info!(accuracy = report.accuracy, "Model accuracy");
        info!("Classification report:\n{report}");

        let feature_importances: Vec<(String, f64)> = forest
            .ranked_importances()
            .into_iter()
            .map(|(name, importance)| (name.to_string(), importance))
            .collect();
        for (name, importance) in feature_importances.iter().take(TOP_FEATURES) {
            info!(feature = %name, importance, "Top feature");
        }

        forest.metadata.trained_at = chrono::Utc::now().timestamp();
        forest.metadata.train_samples = split.train.len();
        forest.metadata.test_samples = split.test.len();
        forest.metadata.accuracy = (report.accuracy * SCALE as f64).round() as i64;

        let bundle = ModelBundle::new(forest, encoders)?;
        let model_hash = bundle.model_hash()?;

        let training_report = TrainingReport {
            rows_read: dataset.rows_read,
            rows_dropped: dataset.rows_dropped,
            train_samples: split.train.len(),
            test_samples: split.test.len(),
            class_counts,
            accuracy: report.accuracy,
            report,
            feature_importances,
            model_hash,
        };

        Ok((bundle, training_report))
    }
}
