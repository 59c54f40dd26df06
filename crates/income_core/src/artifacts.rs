//! Durable storage for the classifier and encoder set
//!
//! The pair is written as two canonical JSON files in one directory. Both
//! are fully serialized and staged as temp files before either is renamed
//! into place; the encoder file is renamed first and the model file last, so
//! the model file doubles as the "already trained" marker. The model records
//! the hash of its encoder set and [`ArtifactStore::load`] refuses a pair
//! whose hashes disagree.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::encoding::EncoderSet;
use crate::errors::{CoreError, Result};
use crate::forest::Forest;
use crate::serde_canon::to_canonical_json;

/// Default classifier file name
pub const MODEL_FILE: &str = "salary_model.json";

/// Default encoder set file name
pub const ENCODERS_FILE: &str = "label_encoders.json";

/// Classifier and encoder set, always created, stored and loaded together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBundle {
    forest: Forest,
    encoders: EncoderSet,
}

impl ModelBundle {
    /// Pair a forest with the encoders it was trained with
    pub fn new(mut forest: Forest, encoders: EncoderSet) -> Result<Self> {
        forest.encoder_hash = encoders.hash_hex()?;
        let bundle = Self { forest, encoders };
        bundle.verify()?;
        Ok(bundle)
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    /// Structure hash of the classifier
    pub fn model_hash(&self) -> Result<String> {
        Ok(self.forest.structure_hash_hex()?)
    }

    fn verify(&self) -> Result<()> {
        self.forest.validate().map_err(CoreError::ValidationFailed)?;
        self.encoders.validate().map_err(CoreError::ValidationFailed)?;

        let actual = self.encoders.hash_hex()?;
        if actual != self.forest.encoder_hash {
            return Err(CoreError::IncompatibleArtifacts(format!(
                "model expects encoder set {}, found {}",
                self.forest.encoder_hash, actual
            )));
        }

        Ok(())
    }
}

/// What a successful save wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifacts {
    pub model_path: PathBuf,
    pub encoders_path: PathBuf,
    pub model_hash: String,
    pub encoder_hash: String,
}

/// File locations of the persisted model pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    model_path: PathBuf,
    encoders_path: PathBuf,
}

impl ArtifactStore {
    /// Store using the default file names inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_file_names(dir, MODEL_FILE, ENCODERS_FILE)
    }

    pub fn with_file_names(dir: impl AsRef<Path>, model_file: &str, encoders_file: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            model_path: dir.join(model_file),
            encoders_path: dir.join(encoders_file),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn encoders_path(&self) -> &Path {
        &self.encoders_path
    }

    /// A persisted classifier exists
    pub fn model_exists(&self) -> bool {
        self.model_path.exists()
    }

    /// Both halves of the pair exist
    pub fn is_complete(&self) -> bool {
        self.model_path.exists() && self.encoders_path.exists()
    }

    /// Persist the pair, replacing any previous one
    pub fn save(&self, bundle: &ModelBundle) -> Result<SavedArtifacts> {
        let model_json = to_canonical_json(&bundle.forest)?;
        let encoders_json = to_canonical_json(&bundle.encoders)?;

        let encoders_tmp = stage(&self.encoders_path, encoders_json.as_bytes())?;
        let model_tmp = stage(&self.model_path, model_json.as_bytes())?;

        persist(encoders_tmp, &self.encoders_path)?;
        persist(model_tmp, &self.model_path)?;

        let saved = SavedArtifacts {
            model_path: self.model_path.clone(),
            encoders_path: self.encoders_path.clone(),
            model_hash: bundle.model_hash()?,
            encoder_hash: bundle.forest.encoder_hash.clone(),
        };

        info!(
            model = %saved.model_path.display(),
            encoders = %saved.encoders_path.display(),
            model_hash = %saved.model_hash,
            "Model and encoders saved"
        );

        Ok(saved)
    }

    /// Restore the pair, or `None` if either file is absent
    pub fn load(&self) -> Result<Option<ModelBundle>> {
        if !self.is_complete() {
            debug!(
                model = %self.model_path.display(),
                encoders = %self.encoders_path.display(),
                "Model files not found"
            );
            return Ok(None);
        }

        let forest: Forest = serde_json::from_str(&fs::read_to_string(&self.model_path)?)?;
        let encoders: EncoderSet = serde_json::from_str(&fs::read_to_string(&self.encoders_path)?)?;

        let bundle = ModelBundle { forest, encoders };
        bundle.verify()?;

        info!(
            model = %self.model_path.display(),
            trees = bundle.forest.num_trees(),
            "Model and encoders loaded"
        );

        Ok(Some(bundle))
    }
}

/// Write `contents` to a synced temp file next to `target`
fn stage(target: &Path, contents: &[u8]) -> Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn persist(tmp: NamedTempFile, target: &Path) -> Result<()> {
    tmp.persist(target).map_err(|err| CoreError::Persist {
        path: target.display().to_string(),
        source: err.error,
    })?;
    Ok(())
}
