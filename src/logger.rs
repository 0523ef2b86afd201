use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::telemetry::{AUDIT_TARGET, METRICS_TARGET};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;

type LogResult = Result<(), Box<dyn std::error::Error>>;

static HANDLE: OnceLock<log4rs::Handle> = OnceLock::new();

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Returns an error if the file cannot be read or a logger is already installed.
pub fn init_path(path: &Path) -> LogResult {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder().build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Builds the process logging config: console plus rolling `app.log`, with audit and
/// metrics lines routed to their own files under `dir`.
///
/// # Errors
/// Returns an error if the directory or an appender cannot be created.
pub fn build_config(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> Result<Config, Box<dyn std::error::Error>> {
    let base = dir.map_or_else(|| PathBuf::from("."), PathBuf::from);
    std::fs::create_dir_all(&base)?;
    let keep = retention.and_then(|r| u32::try_from(r).ok()).unwrap_or(DEFAULT_RETENTION);
    let lvl = parse_level(level);

    let console = ConsoleAppender::builder().encoder(Box::new(PatternEncoder::new(PATTERN))).build();
    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, lvl))
        .build(Root::builder().appender("console").appender("app").build(lvl))?;
    Ok(config)
}

/// Configures logging for the process. A second call replaces the active config.
///
/// # Errors
/// Returns an error if the config cannot be built or another logger is already installed.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<usize>) -> LogResult {
    let config = build_config(dir, level, retention)?;
    if let Some(handle) = HANDLE.get() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config)?;
    let _ = HANDLE.set(handle);
    Ok(())
}
