//! Pipeline configuration
//!
//! Defaults are the production setup: 200 trees of depth at most 15,
//! split/leaf minimums of 10/4, balanced class weights, an 80/20 stratified
//! split and seed 42. A TOML file may override any subset of fields, and a
//! few environment variables override the file.

use income_core::artifacts::{ArtifactStore, ENCODERS_FILE, MODEL_FILE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::ConfigError;

/// Config file read when no explicit path is given
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

/// Environment variable overriding [`PipelineConfig::dataset_path`]
pub const ENV_DATASET_PATH: &str = "SALARY_DATASET_PATH";
/// Environment variable overriding [`PipelineConfig::model_dir`]
pub const ENV_MODEL_DIR: &str = "SALARY_MODEL_DIR";
/// Environment variable overriding both forest and split seeds
pub const ENV_SEED: &str = "SALARY_SEED";

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample weighs 1
    Uniform,
    /// `n_samples / (n_classes * class_count)`
    Balanced,
}

/// Number of features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Count(count) => count,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Random forest hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub class_weight: ClassWeight,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: i64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 15,
            min_samples_split: 10,
            min_samples_leaf: 4,
            class_weight: ClassWeight::Balanced,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.n_estimators == 0 {
            return Err("n_estimators must be at least 1".to_string());
        }
        if self.min_samples_split < 2 {
            return Err(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be at least 1".to_string());
        }
        if let MaxFeatures::Count(0) = self.max_features {
            return Err("max_features must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Held-out split settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of each class reserved for evaluation
    pub test_fraction: f64,
    pub seed: i64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            ));
        }
        Ok(())
    }
}

/// Everything the prediction pipeline needs to train, save and load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw CSV dataset
    pub dataset_path: PathBuf,
    /// Directory holding the model and encoder files
    pub model_dir: PathBuf,
    pub model_file: String,
    pub encoders_file: String,
    pub forest: ForestConfig,
    pub split: SplitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/employee_data.csv"),
            model_dir: PathBuf::from("models"),
            model_file: MODEL_FILE.to_string(),
            encoders_file: ENCODERS_FILE.to_string(),
            forest: ForestConfig::default(),
            split: SplitConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Default configuration rooted at `model_dir`
    pub fn with_model_dir(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Resolve the effective configuration
    ///
    /// Uses `path` if given, else [`DEFAULT_CONFIG_PATH`] if it exists, else
    /// the defaults; environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        info!(
            dataset = %config.dataset_path.display(),
            model_dir = %config.model_dir.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATASET_PATH) {
            self.dataset_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_MODEL_DIR) {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_SEED) {
            let seed = raw.trim().parse::<i64>().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_SEED.to_string(),
                value: raw.clone(),
            })?;
            self.forest.seed = seed;
            self.split.seed = seed;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        self.forest.validate()?;
        self.split.validate()
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::with_file_names(&self.model_dir, &self.model_file, &self.encoders_file)
    }
}
