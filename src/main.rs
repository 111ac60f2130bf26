// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Galleryze: incremental photo-folder categorizer

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::watch;
use tokio::task;
use tracing::{error, info, warn};

use galleryze::batch::BatchReport;
use galleryze::categories::{starter_map, CategoryMap};
use galleryze::checkpoint::format_timestamp;
use galleryze::config::AppConfig;
use galleryze::index::CategorizedIndex;
use galleryze::watcher::{should_process, wait_for_stable, FolderWatcher, SettleTracker, WatchEvent};
use galleryze::{BatchProcessor, GalleryzeError, HybridPipeline, Result};

/// Galleryze CLI - incremental photo-folder categorizer
#[derive(Parser, Debug)]
#[command(name = "galleryze")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Sort a growing photo folder into categories with a detector + classifier cascade", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Categorize every image newer than the checkpoint, once
    Run {
        /// Folder holding the images
        folder: PathBuf,

        /// Detection confidence needed to short-circuit (0.0-1.0)
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Keep categorizing a folder as images arrive
    Watch {
        /// Folder holding the images
        folder: PathBuf,

        /// Detection confidence needed to short-circuit (0.0-1.0)
        #[arg(long)]
        threshold: Option<f32>,

        /// Run a batch over existing files before waiting for events
        #[arg(long)]
        process_existing: bool,
    },

    /// Categorize a single image without touching the index or checkpoint
    Classify {
        /// Image file
        image: PathBuf,

        /// Detection confidence needed to short-circuit (0.0-1.0)
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Show per-category counts of the categorized index
    Index,

    /// Checkpoint operations
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Create a starter configuration and category map
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CheckpointCommands {
    /// Show the current checkpoint
    Show,

    /// Delete the checkpoint so the next run rescans everything
    Reset,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file and category map
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run { folder, threshold } => run_batch(&config, &folder, threshold, &cli.format),
        Commands::Watch { folder, threshold, process_existing } => {
            run_watch(&config, &folder, threshold, process_existing, &cli.format).await
        }
        Commands::Classify { image, threshold } => {
            run_classify(&config, &image, threshold, &cli.format)
        }
        Commands::Index => run_index(&config, &cli.format),
        Commands::Checkpoint { action } => run_checkpoint_command(&config, action, &cli.format),
        Commands::Config { action } => run_config_command(&config, action, &cli.config),
        Commands::Init { dir, force } => run_init(dir, force),
    }
}

fn resolve_threshold(config: &AppConfig, threshold: Option<f32>) -> Result<f32> {
    let threshold = threshold.unwrap_or(config.pipeline.confidence_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(GalleryzeError::Config(format!(
            "threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(threshold)
}

/// Run one checkpointed pass over the folder
fn run_batch(config: &AppConfig, folder: &Path, threshold: Option<f32>, format: &str) -> Result<()> {
    let threshold = resolve_threshold(config, threshold)?;
    let mut pipeline = HybridPipeline::from_config(config)?;
    let processor = BatchProcessor::from_config(config);

    let report = processor.process_folder(&mut pipeline, folder, threshold)?;
    print_report(&report, format)
}

/// Watch the folder and run a batch whenever new images settle
async fn run_watch(
    config: &AppConfig,
    folder: &Path,
    threshold: Option<f32>,
    process_existing: bool,
    format: &str,
) -> Result<()> {
    let threshold = resolve_threshold(config, threshold)?;
    let mut pipeline = HybridPipeline::from_config(config)?;
    let processor = BatchProcessor::from_config(config);
    let watcher = FolderWatcher::new(folder)?;

    if process_existing {
        info!("Processing existing files...");
        let report = task::block_in_place(|| processor.process_folder(&mut pipeline, folder, threshold))?;
        print_report(&report, format)?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = terminate => info!("Received SIGTERM, shutting down..."),
        }

        let _ = shutdown_tx.send(true);
    });

    info!("Watcher active. Press Ctrl+C to stop.");

    let poll = Duration::from_millis(config.watch.poll_interval_ms.max(1));
    let mut tracker = SettleTracker::new(Duration::from_millis(config.watch.settle_ms));

    // Batches run between events only, never concurrently. Both the event
    // wait and inference block, so they leave the runtime worker first.
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match task::block_in_place(|| watcher.next_event(poll)) {
            Some(WatchEvent::FileCreated(path)) | Some(WatchEvent::FileModified(path)) => {
                if should_process(&path, &config.batch.formats) {
                    tracker.note(path, Instant::now());
                }
            }
            Some(WatchEvent::Error(e)) => warn!("Watch error: {}", e),
            None => {}
        }

        if let Some(paths) = tracker.take_settled(Instant::now()) {
            for path in &paths {
                wait_for_stable(path, Duration::from_secs(10)).await;
            }
            info!("{} new or changed image(s), running batch", paths.len());
            let outcome = task::block_in_place(|| {
                processor.process_folder(&mut pipeline, watcher.folder(), threshold)
            });
            match outcome {
                Ok(report) => print_report(&report, format)?,
                Err(e) => error!("Batch failed: {}", e),
            }
        }
    }

    info!("Galleryze stopped.");
    Ok(())
}

fn print_report(report: &BatchReport, format: &str) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for failure in &report.failures {
        eprintln!("Error categorizing {}: {}", failure.path, failure.error);
    }
    println!(
        "Processed {} image(s), skipped {}, failed {}",
        report.processed.len(),
        report.skipped,
        report.failures.len()
    );
    println!("Categorized data saved to: {}", report.index_path.display());
    if report.checkpoint_advanced() {
        println!(
            "Checkpoint updated to timestamp: {} ({})",
            report.checkpoint,
            format_timestamp(report.checkpoint)
        );
    }
    Ok(())
}

/// Categorize one image and print the decision
fn run_classify(config: &AppConfig, image: &Path, threshold: Option<f32>, format: &str) -> Result<()> {
    let threshold = resolve_threshold(config, threshold)?;
    let mut pipeline = HybridPipeline::from_config(config)?;
    pipeline.set_threshold(threshold);

    let result = pipeline.categorize_path(image)?;
    if format == "json" {
        let output = serde_json::json!({
            "path": image.to_string_lossy(),
            "category": result.category,
            "stage": result.stage,
            "label": result.label,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "{}: {} (via {:?}, label '{}')",
            image.display(),
            result.category,
            result.stage,
            result.label
        );
    }
    Ok(())
}

/// Print the categorized index summary
fn run_index(config: &AppConfig, format: &str) -> Result<()> {
    let path = Path::new(&config.output.index_path);
    if !path.exists() {
        println!("No categorized index at {:?} yet", path);
        return Ok(());
    }

    let index = CategorizedIndex::load_or_seed(path, None)?;
    if format == "json" {
        let counts: serde_json::Map<String, serde_json::Value> = index
            .counts()
            .into_iter()
            .map(|(name, count)| (name.to_string(), serde_json::Value::from(count)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    println!("Categorized index ({}):", path.display());
    for (name, count) in index.counts() {
        println!("  {}: {}", name, count);
    }
    println!("  Total: {}", index.total());
    Ok(())
}

/// Run checkpoint commands
fn run_checkpoint_command(config: &AppConfig, action: CheckpointCommands, format: &str) -> Result<()> {
    let processor = BatchProcessor::from_config(config);
    let store = processor.checkpoint();

    match action {
        CheckpointCommands::Show => {
            let value = store.load();
            if format == "json" {
                let output = serde_json::json!({
                    "path": store.path().to_string_lossy(),
                    "checkpoint": value,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if value > 0.0 {
                println!("Checkpoint: {} ({})", value, format_timestamp(value));
            } else {
                println!("No checkpoint; the next run processes every image");
            }
        }
        CheckpointCommands::Reset => {
            if store.reset()? {
                println!("Checkpoint {:?} removed", store.path());
            } else {
                println!("No checkpoint to remove");
            }
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: &AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            let map = CategoryMap::load(Path::new(&config.category_map))?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Category map: {} ({} categories)", config.category_map, map.len());
            println!("  Detector: {}", config.detector.model_path);
            println!("  Classifier: {}", config.classifier.model_path);
            println!("  Threshold: {}", config.pipeline.confidence_threshold);
            for missing in [&config.detector.model_path, &config.classifier.model_path]
                .into_iter()
                .filter(|p| !Path::new(p).exists())
            {
                warn!("Model file not found: {}", missing);
            }
        }
    }

    Ok(())
}

/// Scaffold config.json and a starter category map
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(GalleryzeError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    std::fs::create_dir_all(target.join("models"))?;

    let config = AppConfig::default();
    config.save(&config_path)?;

    let map_path = target.join(&config.category_map);
    if !map_path.exists() || force {
        std::fs::write(&map_path, serde_json::to_string_pretty(&starter_map())?)?;
    }

    println!("Galleryze initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - {}", config.category_map);
    println!("  - models/");
    println!("\nNext steps:");
    println!("  1. Put the detector/classifier ONNX models and label files in models/");
    println!("  2. Run: galleryze run <folder>");

    Ok(())
}
