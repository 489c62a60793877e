use std::fs;
use std::path::Path;

use gbdt::config::Config;
use gbdt::decision_tree::Data;
use gbdt::decision_tree::DataVec;
use gbdt::gradient_boost::GBDT;
use log::debug;
use serde::Deserialize;
use serde::Serialize;

use crate::dataset::FEATURE_COUNT;
use crate::dataset::WineRecord;
use crate::error::PipelineError;

/// A fitted regressor mapping feature vectors to predicted quality scores.
///
/// Implementations are immutable once trained; evaluation and prediction
/// only read from them. The trait keeps the pipeline wiring independent of
/// the concrete learning library.
pub trait QualityModel {
    /// Predict one quality score per record, in input order.
    fn predict(&self, records: &[WineRecord]) -> Vec<f32>;
}

/// Trainer hyperparameters. All fields are optional so file values,
/// environment values, and CLI flags can be merged before resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    pub iterations: Option<usize>,
    pub max_depth: Option<u32>,
    pub shrinkage: Option<f32>,
    pub data_sample_ratio: Option<f64>,
    pub feature_sample_ratio: Option<f64>,
}

const DEFAULT_ITERATIONS: usize = 100;
const DEFAULT_MAX_DEPTH: u32 = 6;
const DEFAULT_SHRINKAGE: f32 = 0.1;
const DEFAULT_DATA_SAMPLE_RATIO: f64 = 1.0;
const DEFAULT_FEATURE_SAMPLE_RATIO: f64 = 1.0;

/// Fully-determined hyperparameters handed to the trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrainerSettings {
    pub iterations: usize,
    pub max_depth: u32,
    pub shrinkage: f32,
    pub data_sample_ratio: f64,
    pub feature_sample_ratio: f64,
}

impl TrainerSettings {
    pub fn resolve(&self) -> ResolvedTrainerSettings {
        ResolvedTrainerSettings {
            iterations: self.iterations.unwrap_or(DEFAULT_ITERATIONS),
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            shrinkage: self.shrinkage.unwrap_or(DEFAULT_SHRINKAGE),
            data_sample_ratio: self.data_sample_ratio.unwrap_or(DEFAULT_DATA_SAMPLE_RATIO),
            feature_sample_ratio: self
                .feature_sample_ratio
                .unwrap_or(DEFAULT_FEATURE_SAMPLE_RATIO),
        }
    }
}

pub fn merge_trainer_settings(
    base: &TrainerSettings,
    overrides: Option<&TrainerSettings>,
) -> TrainerSettings {
    let mut merged = base.clone();

    if let Some(override_settings) = overrides {
        if override_settings.iterations.is_some() {
            merged.iterations = override_settings.iterations;
        }
        if override_settings.max_depth.is_some() {
            merged.max_depth = override_settings.max_depth;
        }
        if override_settings.shrinkage.is_some() {
            merged.shrinkage = override_settings.shrinkage;
        }
        if override_settings.data_sample_ratio.is_some() {
            merged.data_sample_ratio = override_settings.data_sample_ratio;
        }
        if override_settings.feature_sample_ratio.is_some() {
            merged.feature_sample_ratio = override_settings.feature_sample_ratio;
        }
    }

    merged
}

/// Gradient boosted decision tree regressor backed by the `gbdt` crate,
/// trained with squared-error loss.
pub struct GbdtRegressor {
    model: GBDT,
}

impl std::fmt::Debug for GbdtRegressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GbdtRegressor").finish_non_exhaustive()
    }
}

impl GbdtRegressor {
    /// Fit a regressor predicting the quality label from the feature vector.
    pub fn fit(
        records: &[WineRecord],
        settings: &ResolvedTrainerSettings,
    ) -> Result<Self, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::InsufficientData);
        }

        let mut config = Config::new();
        config.set_feature_size(FEATURE_COUNT);
        config.set_max_depth(settings.max_depth);
        config.set_iterations(settings.iterations);
        config.set_shrinkage(settings.shrinkage);
        config.set_data_sample_ratio(settings.data_sample_ratio);
        config.set_feature_sample_ratio(settings.feature_sample_ratio);
        config.set_loss("SquaredError");
        config.set_training_optimization_level(2);

        let mut training: DataVec = records
            .iter()
            .map(|record| Data::new_training_data(record.features().to_vec(), 1.0, record.quality, None))
            .collect();

        let mut model = GBDT::new(&config);
        model.fit(&mut training);
        debug!(
            "fitted gbdt model on {} records ({} iterations, depth {})",
            records.len(),
            settings.iterations,
            settings.max_depth
        );

        Ok(Self { model })
    }

    /// Write the fitted model to disk as JSON.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let payload = StoredModelRef {
            feature_count: FEATURE_COUNT,
            trained_at: chrono::Local::now().to_rfc3339(),
            model: &self.model,
        };
        let serialized =
            serde_json::to_string(&payload).map_err(|source| PipelineError::ModelFormat {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, serialized).map_err(|source| PipelineError::SaveModel {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a model previously written by [`GbdtRegressor::save`].
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|source| PipelineError::LoadModel {
            path: path.to_path_buf(),
            source,
        })?;
        let stored: StoredModel =
            serde_json::from_str(&raw).map_err(|source| PipelineError::ModelFormat {
                path: path.to_path_buf(),
                source,
            })?;

        if stored.feature_count != FEATURE_COUNT {
            return Err(PipelineError::FeatureWidth {
                expected: stored.feature_count,
                found: FEATURE_COUNT,
            });
        }

        debug!("loaded model trained at {}", stored.trained_at);
        Ok(Self {
            model: stored.model,
        })
    }
}

impl QualityModel for GbdtRegressor {
    fn predict(&self, records: &[WineRecord]) -> Vec<f32> {
        if records.is_empty() {
            return Vec::new();
        }

        let batch: DataVec = records
            .iter()
            .map(|record| Data::new_test_data(record.features().to_vec(), None))
            .collect();
        self.model.predict(&batch)
    }
}

#[derive(Serialize)]
struct StoredModelRef<'a> {
    feature_count: usize,
    trained_at: String,
    model: &'a GBDT,
}

#[derive(Deserialize)]
struct StoredModel {
    feature_count: usize,
    trained_at: String,
    model: GBDT,
}
