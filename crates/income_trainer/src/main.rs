//! Salary predictor CLI
//!
//! Trains the salary bracket model, serves one-off predictions and prints
//! what a persisted model contains.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use income_core::schema::IncomeRecord;
use income_trainer::{describe_metrics, PipelineConfig, PredictionPipeline, TrainOutcome};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "salary-predictor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic salary bracket predictor", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// TOML configuration file (defaults to config/pipeline.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the model and encoder files
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train and persist the model unless one already exists
    Train {
        /// Input CSV dataset path
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Random seed for the forest and the split
        #[arg(long)]
        seed: Option<i64>,

        /// Number of trees
        #[arg(long)]
        trees: Option<usize>,

        /// Retrain and replace an existing model
        #[arg(long)]
        force: bool,
    },

    /// Predict the salary bracket of one JSON record
    Predict {
        /// Record with the ten feature keys, e.g. '{"age": 39, ...}'
        #[arg(short, long)]
        record: String,
    },

    /// Show the persisted model
    Inspect,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.common.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    describe_metrics();

    let mut config = PipelineConfig::load(cli.common.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = cli.common.model_dir {
        config.model_dir = dir;
    }

    match cli.command {
        Command::Train {
            dataset,
            seed,
            trees,
            force,
        } => {
            if let Some(path) = dataset {
                config.dataset_path = path;
            }
            if let Some(seed) = seed {
                config.forest.seed = seed;
                config.split.seed = seed;
            }
            if let Some(trees) = trees {
                config.forest.n_estimators = trees;
            }
            train(config, force)
        }
        Command::Predict { record } => predict(config, &record),
        Command::Inspect => inspect(config),
    }
}

fn train(config: PipelineConfig, force: bool) -> Result<()> {
    info!("Salary predictor trainer v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading dataset from: {}", config.dataset_path.display());

    let mut pipeline = PredictionPipeline::new(config);
    let outcome = if force {
        let dataset = pipeline.load_dataset().context("Failed to load dataset")?;
        TrainOutcome::Trained(pipeline.retrain_on(&dataset).context("Training failed")?)
    } else {
        pipeline.train().context("Training failed")?
    };

    match outcome {
        TrainOutcome::AlreadyTrained => {
            info!(
                "Model already trained at {}; use --force to retrain",
                pipeline.store().model_path().display()
            );
        }
        TrainOutcome::Trained(report) => {
            info!("✓ Training completed successfully");
            info!("  Train/test samples: {}/{}", report.train_samples, report.test_samples);
            info!("  Accuracy: {:.4}", report.accuracy);
            info!("  Model: {}", pipeline.store().model_path().display());
            info!("  Encoders: {}", pipeline.store().encoders_path().display());
            info!("  Hash: {}", report.model_hash);
        }
    }

    Ok(())
}

fn predict(config: PipelineConfig, raw: &str) -> Result<()> {
    let record: IncomeRecord = serde_json::from_str(raw).context("Invalid record JSON")?;

    let pipeline = PredictionPipeline::open(config).context("Failed to load model")?;
    if !pipeline.is_ready() {
        bail!("No trained model found; run `salary-predictor train` first");
    }

    let prediction = pipeline.predict_record(record).context("Prediction failed")?;
    if pipeline.unseen_category_count() > 0 {
        info!(
            "{} value(s) were not seen during training",
            pipeline.unseen_category_count()
        );
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&prediction).context("Failed to serialize prediction")?
    );
    Ok(())
}

fn inspect(config: PipelineConfig) -> Result<()> {
    let pipeline = PredictionPipeline::open(config).context("Failed to load model")?;
    let Some(bundle) = pipeline.bundle() else {
        bail!(
            "No trained model at {}",
            pipeline.store().model_path().display()
        );
    };

    let forest = bundle.forest();
    let meta = &forest.metadata;
    println!("Model:        {}", pipeline.store().model_path().display());
    println!("Hash:         {}", pipeline.model_hash().unwrap_or_default());
    println!("Encoder hash: {}", forest.encoder_hash);
    println!("Classes:      {}", forest.classes.join(", "));
    println!("Trees:        {}", forest.num_trees());
    println!(
        "Trained at:   {}",
        chrono::DateTime::<chrono::Utc>::from_timestamp(meta.trained_at, 0)
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| meta.trained_at.to_string())
    );
    println!("Samples:      {} train / {} test", meta.train_samples, meta.test_samples);
    println!("Accuracy:     {:.4}", meta.accuracy as f64 / forest.scale as f64);
    println!(
        "Config:       max_depth={} min_samples_split={} min_samples_leaf={} seed={}",
        meta.max_depth, meta.min_samples_split, meta.min_samples_leaf, meta.seed
    );

    println!("Feature importances:");
    for (name, importance) in forest.ranked_importances() {
        println!("  {name:<16} {importance:.4}");
    }

    println!("Encoders:");
    for column in bundle.encoders().columns() {
        if let Some(encoder) = bundle.encoders().get(column) {
            println!("  {column:<16} {} classes", encoder.len());
        }
    }

    Ok(())
}
