//! Logging for the hub process.
//!
//! Dual output: colored stdout and a plain log file. Initialization runs once.

use crate::error::HubError;

use std::fmt::{Arguments, Display};
use std::io::stdout;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use fern::{Dispatch, FormatCallback};
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

static INIT_LOGGER_ONCE: Once = Once::new();

/// Set by the first call to [`initialize`], successful or not.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

/// Log file name, created inside the log directory.
pub const LOG_FILE_NAME: &str = "hub.log";

const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Per-frame WebSocket chatter stays out of debug logs.
const QUIET_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite"];

/// Installs the global logger, writing to stdout and `{log_dir}/hub.log`.
///
/// Later calls log a warning and return Ok.
///
/// # Errors
///
/// Returns [`HubError::Hub`] if the log file cannot be created or a global
/// logger is already installed.
pub fn initialize(log_dir: &Path) -> Result<(), HubError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir);
        if result.is_ok() {
            info!(
                "Logger initialized with level {LOG_LEVEL:?}, writing to {}",
                log_dir.join(LOG_FILE_NAME).display()
            );
        }
    });

    result
}

fn write_line(
    out: FormatCallback<'_>,
    level: impl Display,
    message: &Arguments<'_>,
    record: &Record<'_>,
) {
    out.finish(format_args!(
        "[{date} - {level}] {message} [{file}:{line}]",
        date = format_rfc3339(SystemTime::now()),
        file = record.file().unwrap_or("unknown"),
        line = record.line().unwrap_or(0),
    ))
}

#[track_caller]
fn initialize_internal(log_dir: &Path) -> Result<(), HubError> {
    let log_file = fern::log_file(log_dir.join(LOG_FILE_NAME))
        .map_err(|e| HubError::hub(format!("Failed to create log file: {e}")))?;

    let colors = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let base_dispatch = QUIET_TARGETS
        .iter()
        .fold(Dispatch::new().level(LOG_LEVEL), |dispatch, target| {
            dispatch.level_for(*target, LevelFilter::Info)
        });

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            write_line(out, colors.color(record.level()), message, record)
        })
        .chain(stdout());

    let file_dispatch = Dispatch::new()
        .format(|out, message, record| write_line(out, record.level(), message, record))
        .chain(log_file);

    base_dispatch
        .chain(stdout_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| HubError::hub(format!("Failed to initialize logger: {e}")))
}
