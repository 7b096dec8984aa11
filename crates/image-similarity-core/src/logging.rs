use log::{info, warn, LevelFilter};
use std::path::Path;

// For file-based logging with rotation
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Environment variable overriding the configured log level
pub const LOG_LEVEL_ENV: &str = "IMAGE_SIMILARITY_LOG";

/// Initialize the logger with timestamp, log level, and module path
/// Logs are written to a rotating file under `log_dir`
pub fn init_logger(log_dir: &Path, level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let log_file_path = log_dir.join("image-similarity.log");
    let archived_logs_pattern = format!("{}/image-similarity.{{}}.log", log_dir.display());

    // Rotate at 10MB and keep 5 archived log files
    let file_trigger = SizeTrigger::new(10 * 1024 * 1024);
    let file_roller = FixedWindowRoller::builder()
        .build(&archived_logs_pattern, 5)
        .map_err(|e| format!("Failed to create log roller: {}", e))?;
    let compound_policy = CompoundPolicy::new(Box::new(file_trigger), Box::new(file_roller));

    let rolling_file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] [{M}:{L}] - {m}{n}",
        )))
        .build(&log_file_path, Box::new(compound_policy))
        .map_err(|e| format!("Failed to create log appender: {}", e))?;

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(rolling_file)))
        .build(Root::builder().appender("file").build(level))
        .map_err(|e| format!("Failed to build log config: {}", e))?;

    log4rs::init_config(config).map_err(|e| format!("Failed to initialize log4rs: {}", e))?;

    // Apply environment variable-based filter if provided
    if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        if let Ok(level) = level.parse::<LevelFilter>() {
            log::set_max_level(level);
        }
    }

    info!("Logging to file: {}", log_file_path.display());
    Ok(())
}

/// Log a contained per-pair comparison failure
pub fn log_comparison_error(strategy: &str, left: &Path, right: &Path, error: &dyn std::error::Error) {
    warn!(
        "Comparison failed - Strategy: {}, Left: {}, Right: {}, Error: {}",
        strategy,
        left.display(),
        right.display(),
        error
    );
}

/// Log a normalizer stage failure
pub fn log_normalization_error(stage: &str, path: &Path, error: &dyn std::error::Error) {
    warn!(
        "Normalization failed - Stage: {}, Path: {}, Error: {}",
        stage,
        path.display(),
        error
    );
}

/// Log a result store failure
pub fn log_cache_error(key: &str, error: &dyn std::error::Error) {
    warn!("Cache operation failed - Key: {}, Error: {}", key, error);
}
