use std::fs;
use std::path::Path;
use std::time::Duration;
use std::time::SystemTime;

use anyhow::Context;
use anyhow::Result;
use vino_core::GbdtRegressor;
use vino_core::Prediction;
use vino_core::QualityEngine;
use vino_core::RegressionReport;
use vino_core::TrainerSettings;

pub fn handle_run(
    engine: &QualityEngine,
    train: Option<&Path>,
    test: Option<&Path>,
    overrides: Option<&TrainerSettings>,
) -> Result<()> {
    let outcome = engine.run(train, test, overrides)?;

    println!("Trained on {} records", outcome.trained_records);
    println!();
    print_report(&outcome.report);
    println!();
    print_predictions(&outcome.predictions, engine.config().output.report_all);

    if let Some(run_dir) = &outcome.run_dir {
        println!();
        println!("Run recorded at {}", run_dir.display());
    }

    Ok(())
}

pub fn handle_train(
    engine: &QualityEngine,
    data: Option<&Path>,
    output: &Path,
    overrides: Option<&TrainerSettings>,
) -> Result<()> {
    let trained = engine.train(data, overrides)?;
    trained
        .model
        .save(output)
        .with_context(|| format!("failed to save model to {}", output.display()))?;

    println!(
        "✓ Trained on {} records ({} iterations, depth {})",
        trained.records, trained.settings.iterations, trained.settings.max_depth
    );
    println!("  Model written to {}", output.display());

    Ok(())
}

pub fn handle_evaluate(engine: &QualityEngine, model: &Path, data: Option<&Path>) -> Result<()> {
    let model = GbdtRegressor::load(model)?;
    let report = engine.evaluate_model(&model, data)?;
    print_report(&report);
    Ok(())
}

pub fn handle_predict(
    engine: &QualityEngine,
    model: &Path,
    data: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let model = GbdtRegressor::load(model)?;
    let predictions = engine.predict_with_model(&model, data)?;

    match output {
        Some(path) => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            for prediction in &predictions {
                writer.serialize(prediction)?;
            }
            writer.flush()?;
            println!("Wrote {} predictions to {}", predictions.len(), path.display());
        }
        None => {
            print_predictions(&predictions, engine.config().output.report_all);
        }
    }

    Ok(())
}

pub fn handle_info(engine: &QualityEngine) -> Result<()> {
    println!(
        "Loaded configuration from {}",
        engine.paths().config_file.display()
    );

    let data = engine.resolve_data()?;
    println!("Training data: {}", data.train_path.display());
    println!("Held-out data: {}", data.test_path.display());
    println!(
        "Reader: delimiter '{}', header row {}",
        data.options.delimiter as char,
        if data.options.has_headers {
            "expected"
        } else {
            "absent"
        }
    );

    let trainer = engine.config().trainer.resolve();
    println!(
        "Trainer: {} iterations, depth {}, shrinkage {}",
        trainer.iterations, trainer.max_depth, trainer.shrinkage
    );
    println!("Run history: {}", engine.paths().state_dir.join("runs").display());

    Ok(())
}

pub fn handle_history(engine: &QualityEngine, detailed: bool) -> Result<()> {
    let runs_dir = engine.paths().state_dir.join("runs");

    if !runs_dir.exists() {
        println!("No recorded runs found.");
        return Ok(());
    }

    let mut runs = Vec::new();

    for date_entry in fs::read_dir(&runs_dir)? {
        let date_entry = date_entry?;
        let date_path = date_entry.path();
        if !date_path.is_dir() {
            continue;
        }

        for run_entry in fs::read_dir(&date_path)? {
            let run_entry = run_entry?;
            let run_path = run_entry.path();
            if !run_path.is_dir() {
                continue;
            }

            let metrics_file = run_path.join("metrics.json");
            if !metrics_file.exists() {
                continue;
            }

            let metrics: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(&metrics_file)?)?;

            let relative_path = format!(
                "{}/{}",
                date_path.file_name().unwrap().to_string_lossy(),
                run_path.file_name().unwrap().to_string_lossy()
            );

            runs.push((relative_path, metrics));
        }
    }

    if runs.is_empty() {
        println!("No recorded runs found.");
        return Ok(());
    }

    // Newest first; dated directory names sort lexicographically.
    runs.sort_by(|a, b| b.0.cmp(&a.0));

    println!("\n{}", "=".repeat(80));
    println!("Run History");
    println!("{}", "=".repeat(80));

    for (run, metrics) in &runs {
        let get_metric =
            |key: &str| -> f64 { metrics.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0) };

        println!("\n{}", run);
        println!("  RMSE:      {:.4}", get_metric("rmse"));
        println!("  Loss:      {:.4}", get_metric("loss"));
        println!("  R squared: {:.4}", get_metric("r_squared"));

        if detailed {
            if let Some(trained) = metrics.get("trained_records") {
                println!("  Trained records: {}", trained);
            }
            if let Some(scored) = metrics.get("scored_records") {
                println!("  Scored records:  {}", scored);
            }
            if let Some(iterations) = metrics.get("iterations") {
                println!("  Iterations: {}", iterations);
            }
            if let Some(timestamp) = metrics.get("timestamp").and_then(|t| t.as_str()) {
                println!("  Timestamp: {}", timestamp);
            }
            if let Some(last) = metrics.get("last_prediction") {
                if !last.is_null() {
                    println!("  Last prediction: {}", last);
                }
            }
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("Total runs: {}", runs.len());

    Ok(())
}

pub fn handle_clean(engine: &QualityEngine, older_than_days: u32, dry_run: bool) -> Result<()> {
    let runs_dir = engine.paths().state_dir.join("runs");

    if !runs_dir.exists() {
        println!("No run directory found.");
        return Ok(());
    }

    let cutoff_time =
        SystemTime::now() - Duration::from_secs(older_than_days as u64 * 24 * 60 * 60);

    let mut to_delete = Vec::new();
    let mut total_size = 0u64;

    for date_entry in fs::read_dir(&runs_dir)? {
        let date_entry = date_entry?;
        let date_path = date_entry.path();
        if !date_path.is_dir() {
            continue;
        }

        for run_entry in fs::read_dir(&date_path)? {
            let run_entry = run_entry?;
            let run_path = run_entry.path();
            if !run_path.is_dir() {
                continue;
            }

            let metadata = fs::metadata(&run_path)?;
            if let Ok(modified) = metadata.modified() {
                if modified < cutoff_time {
                    let size = calculate_dir_size(&run_path)?;
                    total_size += size;
                    to_delete.push((run_path, size));
                }
            }
        }
    }

    if to_delete.is_empty() {
        println!("No runs older than {} days found.", older_than_days);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    if dry_run {
        println!("DRY RUN - Would delete the following:");
    } else {
        println!("Deleting runs older than {} days:", older_than_days);
    }
    println!("{}", "=".repeat(80));

    for (path, size) in &to_delete {
        println!(
            "  {} ({:.2} MB)",
            path.display(),
            *size as f64 / 1_000_000.0
        );
    }

    println!(
        "\nTotal: {} runs, {:.2} MB",
        to_delete.len(),
        total_size as f64 / 1_000_000.0
    );

    if !dry_run {
        for (path, _) in to_delete {
            fs::remove_dir_all(&path)?;
        }
        println!("\n✓ Cleanup complete");
    } else {
        println!("\nRun without --dry-run to actually delete these runs.");
    }

    Ok(())
}

fn print_report(report: &RegressionReport) {
    println!("Evaluated {} records", report.records);
    println!("  RMSE:      {:.4}", report.rmse);
    println!("  Loss:      {:.4}", report.loss);
    println!("  R squared: {:.4}", report.r_squared);
}

fn print_predictions(predictions: &[Prediction], report_all: bool) {
    if report_all {
        for prediction in predictions {
            println!(
                "Wine {:.0}: quality {:.0} | predicted {:.3}",
                prediction.id, prediction.quality, prediction.predicted
            );
        }
        println!();
    }

    if let Some(last) = predictions.last() {
        println!(
            "Last record - wine {:.0}: quality {:.0} | predicted {:.3}",
            last.id, last.quality, last.predicted
        );
    }
}

fn calculate_dir_size(path: &Path) -> Result<u64> {
    let mut size = 0;
    if path.is_dir() {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                size += calculate_dir_size(&path)?;
            } else {
                size += fs::metadata(&path)?.len();
            }
        }
    }
    Ok(size)
}
