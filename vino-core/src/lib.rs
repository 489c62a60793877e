//! Core library for the vino wine quality regression pipeline.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod predict;

pub use config::AppConfig;
pub use config::AppPaths;
pub use config::ConfigBundle;
pub use config::ResolvedDataConfig;
pub use config::load_or_initialize_config;
pub use dataset::FEATURE_COUNT;
pub use dataset::FIELD_COUNT;
pub use dataset::LoadOptions;
pub use dataset::WineRecord;
pub use dataset::load_records;
pub use engine::QualityEngine;
pub use engine::RunOutcome;
pub use engine::TrainedModel;
pub use error::PipelineError;
pub use evaluation::RegressionReport;
pub use evaluation::evaluate;
pub use model::GbdtRegressor;
pub use model::QualityModel;
pub use model::TrainerSettings;
pub use predict::Prediction;
pub use predict::predict_records;
