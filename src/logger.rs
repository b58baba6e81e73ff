//! log4rs setup: rolling `app.log`, `metrics.log` for query timing, optional `dev6.log`.

use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::errors::DbError;
use crate::query::telemetry::METRICS_TARGET;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
pub const DEV6_TARGET: &str = "estatequery::dev6";

fn config_err(e: impl std::fmt::Display) -> DbError {
    DbError::Config(format!("logging: {e}"))
}

#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, name: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{name}.{{}}.log")).display()), keep)
        .map_err(config_err)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{name}.log")), Box::new(policy))
        .map_err(config_err)
}

/// Builds the logging config without installing it. Log files are created in `dir`
/// (current directory when `None`); `retention` rolled files are kept (default 7).
///
/// # Errors
/// The directory or a log file cannot be created.
pub fn build_config(dir: Option<&Path>, level: Option<&str>, retention: Option<u32>, enable_dev6: bool) -> Result<Config, DbError> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(7);
    let lvl = parse_level(level);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl));

    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(Logger::builder().appender("dev6").additive(false).build(DEV6_TARGET, LevelFilter::Trace))
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV6_TARGET, LevelFilter::Off))
    };

    builder.build(Root::builder().appender("app").build(lvl)).map_err(config_err)
}

/// Installs the process-wide logger.
///
/// # Errors
/// Config errors, or a logger already installed.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<u32>) -> Result<(), DbError> {
    configure_logging_with_dev(dir, level, retention, false)
}

/// # Errors
/// Config errors, or a logger already installed.
pub fn configure_logging_with_dev(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    enable_dev6: bool,
) -> Result<(), DbError> {
    let config = build_config(dir, level, retention, enable_dev6)?;
    log4rs::init_config(config).map_err(config_err)?;
    Ok(())
}

/// Reads `ESTATEQUERY_LOG_DIR`, `ESTATEQUERY_LOG_LEVEL`, `ESTATEQUERY_LOG_RETENTION` and
/// `ESTATEQUERY_DEV6`.
///
/// # Errors
/// As [`configure_logging_with_dev`].
pub fn configure_from_env() -> Result<(), DbError> {
    let dir = std::env::var("ESTATEQUERY_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("ESTATEQUERY_LOG_LEVEL").ok();
    let retention = std::env::var("ESTATEQUERY_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    let dev6 = std::env::var("ESTATEQUERY_DEV6")
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    configure_logging_with_dev(dir.as_deref(), level.as_deref(), retention, dev6)
}
