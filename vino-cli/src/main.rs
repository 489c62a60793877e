use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;
use vino_core::QualityEngine;
use vino_core::TrainerSettings;

mod commands;

#[derive(Parser)]
#[command(name = "vino")]
#[command(about = "Wine quality regression pipeline", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[arg(long, short, global = true, help = "Show verbose debug output")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show configuration and resolved data paths")]
    Info,

    #[command(about = "Train, evaluate and report predictions in one pass")]
    Run {
        #[arg(long, help = "Training data file (overrides configuration)")]
        train: Option<PathBuf>,

        #[arg(long, help = "Held-out data file (overrides configuration)")]
        test: Option<PathBuf>,

        #[arg(long, help = "Number of boosting iterations (default: 100)")]
        iterations: Option<usize>,

        #[arg(long, help = "Maximum tree depth (default: 6)")]
        max_depth: Option<u32>,

        #[arg(long, help = "Learning rate applied to each tree (default: 0.1)")]
        shrinkage: Option<f32>,
    },

    #[command(about = "Train a model and save it to disk")]
    Train {
        #[arg(long, help = "Training data file (overrides configuration)")]
        data: Option<PathBuf>,

        #[arg(long, short, help = "Where to write the fitted model")]
        output: PathBuf,

        #[arg(long, help = "Number of boosting iterations (default: 100)")]
        iterations: Option<usize>,

        #[arg(long, help = "Maximum tree depth (default: 6)")]
        max_depth: Option<u32>,

        #[arg(long, help = "Learning rate applied to each tree (default: 0.1)")]
        shrinkage: Option<f32>,
    },

    #[command(about = "Score a saved model against a held-out data file")]
    Evaluate {
        #[arg(help = "Path to a model produced by 'train'")]
        model: PathBuf,

        #[arg(long, help = "Held-out data file (overrides configuration)")]
        data: Option<PathBuf>,
    },

    #[command(about = "Predict quality scores with a saved model")]
    Predict {
        #[arg(help = "Path to a model produced by 'train'")]
        model: PathBuf,

        #[arg(long, help = "Data file to score (overrides configuration)")]
        data: Option<PathBuf>,

        #[arg(long, short, help = "Write predictions as CSV to this file")]
        output: Option<PathBuf>,
    },

    #[command(about = "List recorded pipeline runs")]
    History {
        #[arg(long, help = "Show full metrics for each run")]
        detailed: bool,
    },

    #[command(about = "Delete recorded runs older than a cutoff")]
    Clean {
        #[arg(long, help = "Delete runs older than N days (default: 30)")]
        older_than: Option<u32>,

        #[arg(long, help = "Dry run - show what would be deleted")]
        dry_run: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn trainer_overrides(
    iterations: Option<usize>,
    max_depth: Option<u32>,
    shrinkage: Option<f32>,
) -> Option<TrainerSettings> {
    if iterations.is_none() && max_depth.is_none() && shrinkage.is_none() {
        return None;
    }

    Some(TrainerSettings {
        iterations,
        max_depth,
        shrinkage,
        ..TrainerSettings::default()
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let engine = QualityEngine::load("vino")?;

    match cli.command {
        Commands::Run {
            train,
            test,
            iterations,
            max_depth,
            shrinkage,
        } => {
            let overrides = trainer_overrides(iterations, max_depth, shrinkage);
            commands::handle_run(&engine, train.as_deref(), test.as_deref(), overrides.as_ref())?;
        }
        Commands::Train {
            data,
            output,
            iterations,
            max_depth,
            shrinkage,
        } => {
            let overrides = trainer_overrides(iterations, max_depth, shrinkage);
            commands::handle_train(&engine, data.as_deref(), &output, overrides.as_ref())?;
        }
        Commands::Evaluate { model, data } => {
            commands::handle_evaluate(&engine, &model, data.as_deref())?;
        }
        Commands::Predict {
            model,
            data,
            output,
        } => {
            commands::handle_predict(&engine, &model, data.as_deref(), output.as_deref())?;
        }
        Commands::History { detailed } => {
            commands::handle_history(&engine, detailed)?;
        }
        Commands::Clean {
            older_than,
            dry_run,
        } => {
            commands::handle_clean(&engine, older_than.unwrap_or(30), dry_run)?;
        }
        Commands::Info => {
            commands::handle_info(&engine)?;
        }
    }

    Ok(())
}
