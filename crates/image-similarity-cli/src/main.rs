use anyhow::anyhow;
use clap::{Parser, Subcommand, ValueEnum};
use image_similarity_core::discovery::discover_images;
use image_similarity_core::logging::{init_logger, LOG_LEVEL_ENV};
use image_similarity_core::{Config, ImageComparer, ImageRef, PreferencePolicy};
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "image-similarity")]
#[command(about = "Find near-duplicate images and keep one of each")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write rotating log files to this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Show a progress bar while comparing
    #[arg(long, global = true)]
    progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every image that has at least one near-duplicate
    Duplicates {
        /// Image files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Similarity threshold in [0, 1] (defaults to the configured one)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Maximum directory depth for scanning
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// List the images left after keeping one survivor per duplicate cluster
    Uniques {
        /// Image files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Similarity threshold in [0, 1] (defaults to the configured one)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Which image of a cluster to keep (defaults to the configured one)
        #[arg(long, value_enum)]
        prefer: Option<Preference>,

        /// Maximum directory depth for scanning
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Tell whether two images are similar
    Compare {
        left: PathBuf,
        right: PathBuf,

        /// Similarity threshold in [0, 1] (defaults to the configured one)
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Remove cached normalization artifacts and comparison results
    ClearCache {
        /// Only remove artifacts older than this many seconds
        #[arg(long)]
        older_than_secs: Option<u64>,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "image-similarity.json")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Preference {
    Any,
    Larger,
    Smaller,
    LowerDifference,
    LargerDifference,
}

impl From<Preference> for PreferencePolicy {
    fn from(preference: Preference) -> Self {
        match preference {
            Preference::Any => PreferencePolicy::Any,
            Preference::Larger => PreferencePolicy::PreferLargerImage,
            Preference::Smaller => PreferencePolicy::PreferSmallerImage,
            Preference::LowerDifference => PreferencePolicy::PreferLowerDifference,
            Preference::LargerDifference => PreferencePolicy::PreferLargerDifference,
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    if let Commands::GenerateConfig { path } = &cli.command {
        let config = Config::default();
        config.save_to_file(path)?;
        println!("Configuration file generated at: {}", path.display());
        return Ok(());
    }

    // Set up configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => Config::default(),
    };
    if cli.progress {
        config.show_progress = true;
    }

    // Set log level based on verbosity
    let level = match cli.verbose {
        0 => LevelFilter::from(config.log_level),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    match &cli.log_dir {
        Some(log_dir) => init_logger(log_dir, level).map_err(|e| anyhow!("{}", e))?,
        None => env_logger::Builder::new()
            .filter_level(level)
            .parse_env(LOG_LEVEL_ENV)
            .init(),
    }

    let default_threshold = config.threshold;
    let default_preference = config.preference;
    let comparer = ImageComparer::new(config)?;

    match cli.command {
        Commands::Duplicates {
            paths,
            threshold,
            max_depth,
        } => {
            let images = discover_images(&paths, max_depth)?;
            info!("Comparing {} images...", images.len());
            for image in comparer.find_duplicates(&images, threshold.unwrap_or(default_threshold))? {
                println!("{}", image);
            }
        }

        Commands::Uniques {
            paths,
            threshold,
            prefer,
            max_depth,
        } => {
            let images = discover_images(&paths, max_depth)?;
            info!("Comparing {} images...", images.len());
            let policy = prefer.map(PreferencePolicy::from).unwrap_or(default_preference);
            for image in comparer.find_uniques(&images, threshold.unwrap_or(default_threshold), policy)? {
                println!("{}", image);
            }
        }

        Commands::Compare {
            left,
            right,
            threshold,
        } => {
            let similar = comparer.are_similar(
                &ImageRef::resolve(&left),
                &ImageRef::resolve(&right),
                threshold.unwrap_or(default_threshold),
            )?;
            println!("{}", if similar { "similar" } else { "different" });
        }

        Commands::ClearCache { older_than_secs } => {
            let removed = comparer.clear_cache(older_than_secs.map(Duration::from_secs))?;
            println!("Removed {} cached artifacts", removed);
        }

        Commands::GenerateConfig { .. } => {}
    }

    let stats = comparer.stats();
    info!(
        "{} pairs evaluated, {} live comparisons, {} cache hits, {} failures",
        stats.pairs_evaluated, stats.strategy_evaluations, stats.cache_hits, stats.comparison_failures
    );

    Ok(())
}
