use anyhow::Context;
use clap::{Parser, Subcommand};
use district_heatmaps::batch::{plan_tasks, BatchScheduler};
use district_heatmaps::config::AppConfig;
use district_heatmaps::processing::{process_task, RenderSettings};
use district_heatmaps::{bounds, data};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one heatmap per (sample file, district) pair
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Override batch.workers
        #[arg(long)]
        workers: Option<usize>,
        /// Override render.resolution
        #[arg(long)]
        resolution: Option<u32>,
    },
    /// Export district bounding boxes for Leaflet image overlays
    Bounds {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE", default_value = "district_bounds.json")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            workers,
            resolution,
        } => {
            let mut app_config = AppConfig::load_from_file(&config)?;
            if let Some(workers) = workers {
                app_config.batch.workers = workers;
            }
            if let Some(resolution) = resolution {
                app_config.render.resolution = resolution;
            }
            app_config.validate()?;
            generate(&app_config)?;
        }
        Commands::Bounds { config, output } => {
            let app_config = AppConfig::load_from_file(&config)?;
            let districts =
                data::load_districts(&app_config.input.districts, &app_config.input.id_field)?;
            bounds::write_bounds(&districts, &output)?;
        }
    }

    Ok(())
}

fn generate(config: &AppConfig) -> anyhow::Result<()> {
    info!("Starting to process files from {:?}", config.input.csv_dir);
    info!("Output will be saved to {:?}", config.output.dir);
    info!(
        resolution = config.render.resolution,
        value_min = config.render.value_min,
        value_max = config.render.value_max,
        workers = config.batch.workers,
        "Colormap: {:?}",
        config.render.colormap
    );

    fs::create_dir_all(&config.output.dir)
        .with_context(|| format!("Failed to create output folder: {:?}", config.output.dir))?;

    let files = data::list_sample_files(&config.input.csv_dir)?;
    info!("Found {} CSV files", files.len());
    if files.is_empty() {
        warn!("No CSV files found in the input folder!");
        return Ok(());
    }

    let districts: Vec<_> = data::load_districts(&config.input.districts, &config.input.id_field)?
        .into_iter()
        .map(Arc::new)
        .collect();

    let settings = Arc::new(RenderSettings::from_config(config)?);
    let scheduler = BatchScheduler::new(config.batch.workers)?;
    info!("Initialized worker pool with {} threads", scheduler.workers());

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    progress.set_message("Processing file-district combinations");

    let tasks = plan_tasks(&files, &districts);
    let report = scheduler.run(tasks, &progress, move |task| {
        process_task(&task.file, &task.district, &settings)
    });

    let summary = report.summary;
    info!(
        "Batch summary: {} tasks, {} written, {} skipped, {} failed",
        summary.total,
        summary.successful - summary.skipped,
        summary.skipped,
        summary.failed
    );
    Ok(())
}
