use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use log::info;

use crate::config::AppConfig;
use crate::config::AppPaths;
use crate::config::ConfigBundle;
use crate::config::ResolvedDataConfig;
use crate::config::load_or_initialize_config;
use crate::dataset::load_records;
use crate::evaluation::RegressionReport;
use crate::evaluation::evaluate;
use crate::model::GbdtRegressor;
use crate::model::ResolvedTrainerSettings;
use crate::model::TrainerSettings;
use crate::model::merge_trainer_settings;
use crate::predict::Prediction;
use crate::predict::predict_records;

/// High-level orchestrator for the train / evaluate / predict pipeline.
#[derive(Debug)]
pub struct QualityEngine {
    bundle: ConfigBundle,
}

/// A fitted model together with what produced it.
pub struct TrainedModel {
    pub model: GbdtRegressor,
    pub records: usize,
    pub settings: ResolvedTrainerSettings,
}

/// Everything a full pipeline run produces.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RegressionReport,
    pub predictions: Vec<Prediction>,
    pub trained_records: usize,
    pub run_dir: Option<PathBuf>,
}

impl QualityEngine {
    /// Load configuration from disk (creating defaults if needed) and
    /// produce a ready-to-use engine instance.
    pub fn load(app_name: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            bundle: load_or_initialize_config(app_name)?,
        })
    }

    /// Construct an engine from an existing [`ConfigBundle`]. Useful for tests.
    pub fn from_bundle(bundle: ConfigBundle) -> Self {
        Self { bundle }
    }

    pub fn config(&self) -> &AppConfig {
        &self.bundle.config
    }

    pub fn paths(&self) -> &AppPaths {
        &self.bundle.paths
    }

    pub fn resolve_data(&self) -> Result<ResolvedDataConfig> {
        self.bundle.config.resolve_data(&self.bundle.paths)
    }

    /// Fit a model on the training file. `data_path` overrides the
    /// configured location; `overrides` layer on top of configured
    /// hyperparameters.
    pub fn train(
        &self,
        data_path: Option<&Path>,
        overrides: Option<&TrainerSettings>,
    ) -> Result<TrainedModel> {
        let data = self.resolve_data()?;
        let train_path = data_path.unwrap_or(&data.train_path);

        let records = load_records(train_path, data.options)
            .with_context(|| format!("failed to load training data from {}", train_path.display()))?;

        let settings = merge_trainer_settings(&self.bundle.config.trainer, overrides).resolve();
        let model = GbdtRegressor::fit(&records, &settings)
            .with_context(|| format!("failed to train on {}", train_path.display()))?;

        info!(
            "trained on {} records from {}",
            records.len(),
            train_path.display()
        );

        Ok(TrainedModel {
            model,
            records: records.len(),
            settings,
        })
    }

    /// Score a trained model against the held-out file.
    pub fn evaluate_model(
        &self,
        model: &GbdtRegressor,
        data_path: Option<&Path>,
    ) -> Result<RegressionReport> {
        let data = self.resolve_data()?;
        let test_path = data_path.unwrap_or(&data.test_path);

        let records = load_records(test_path, data.options)
            .with_context(|| format!("failed to load held-out data from {}", test_path.display()))?;

        let report = evaluate(model, &records)
            .with_context(|| format!("failed to evaluate against {}", test_path.display()))?;
        Ok(report)
    }

    /// Predict a quality score for every record in the test file.
    pub fn predict_with_model(
        &self,
        model: &GbdtRegressor,
        data_path: Option<&Path>,
    ) -> Result<Vec<Prediction>> {
        let data = self.resolve_data()?;
        let test_path = data_path.unwrap_or(&data.test_path);

        let records = load_records(test_path, data.options)
            .with_context(|| format!("failed to load test data from {}", test_path.display()))?;

        let predictions = predict_records(model, &records)
            .with_context(|| format!("failed to predict against {}", test_path.display()))?;
        Ok(predictions)
    }

    /// The original program's behavior in one pass: train, evaluate, predict,
    /// strictly in that order, then record the run.
    pub fn run(
        &self,
        train_path: Option<&Path>,
        test_path: Option<&Path>,
        overrides: Option<&TrainerSettings>,
    ) -> Result<RunOutcome> {
        let trained = self.train(train_path, overrides)?;
        let report = self.evaluate_model(&trained.model, test_path)?;
        let predictions = self.predict_with_model(&trained.model, test_path)?;

        let run_dir = if self.bundle.config.output.save_runs {
            Some(self.record_run(&trained, &report, &predictions)?)
        } else {
            None
        };

        Ok(RunOutcome {
            report,
            predictions,
            trained_records: trained.records,
            run_dir,
        })
    }

    /// Persist a run's metrics and final prediction as `metrics.json` under
    /// `state_dir/runs/<date>/run_<time>/`.
    fn record_run(
        &self,
        trained: &TrainedModel,
        report: &RegressionReport,
        predictions: &[Prediction],
    ) -> Result<PathBuf> {
        let now = chrono::Local::now();
        let run_dir = self
            .bundle
            .paths
            .state_dir
            .join("runs")
            .join(now.format("%Y-%m-%d").to_string())
            .join(now.format("run_%H%M%S").to_string());
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;

        let last = predictions.last();
        let metadata = serde_json::json!({
            "timestamp": now.to_rfc3339(),
            "trained_records": trained.records,
            "scored_records": report.records,
            "iterations": trained.settings.iterations,
            "max_depth": trained.settings.max_depth,
            "shrinkage": trained.settings.shrinkage,
            "rmse": report.rmse,
            "loss": report.loss,
            "r_squared": report.r_squared,
            "last_prediction": last.map(|p| serde_json::json!({
                "id": p.id,
                "quality": p.quality,
                "predicted": p.predicted,
            })),
        });

        let metrics_file = run_dir.join("metrics.json");
        fs::write(&metrics_file, serde_json::to_string_pretty(&metadata)?)
            .with_context(|| format!("failed to write {}", metrics_file.display()))?;

        Ok(run_dir)
    }
}
