use chrono::Local;
use fern::Dispatch;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use std::fs;

// Define where to store logs
const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "cleanup_refiner.log";

/// Initializes the global logger.
///
/// Called once by the `cleanup-refiner` binary before the workflow is loaded.
/// The library itself only uses the `log` macros and never installs a logger.
///
/// Log level is controlled by the `RUST_LOG` environment variable
/// (`RUST_LOG=debug` prints every cluster and the per-site cleanup list).
/// If `RUST_LOG` is not set, it defaults to `info`.
/// Logs are written to `logs/cleanup_refiner.log` and to stderr.
pub fn init() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_level_filter = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);

    let base_config = Dispatch::new().level(log_level_filter).level_for("serde", LevelFilter::Warn);

    let console_config = Dispatch::new()
        .format(|out, message, record| {
            let colors = ColoredLevelConfig::new()
                .error(Color::Red)
                .warn(Color::Yellow)
                .info(Color::Green)
                .debug(Color::Blue)
                .trace(Color::BrightBlack);

            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    let log_file_path = format!("{}/{}", LOG_DIR, LOG_FILE);
    let file_config = match fs::create_dir_all(LOG_DIR).and_then(|_| fern::log_file(&log_file_path)) {
        Ok(file) => Some(
            Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!("[{} {} {}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), record.level(), record.target(), message))
                })
                .chain(file),
        ),
        Err(e) => {
            eprintln!("Failed to open log file '{}': {}. Logging to console only.", log_file_path, e);
            None
        }
    };

    let mut dispatch = base_config.chain(console_config);
    if let Some(file_config) = file_config {
        dispatch = dispatch.chain(file_config);
    }

    if let Err(e) = dispatch.apply() {
        eprintln!("Failed to apply logger configuration: {}", e);
        return;
    }

    log::info!("Logger initialized. Logging to console and '{}'.", log_file_path);
}
