//! Logging setup.
//!
//! Mirrors the teacher server's `log4rs` configuration: a stderr appender at
//! a caller-chosen level, plus an optional rotating-free file appender for
//! the full trace. Callers (test harnesses, the reference binaries under
//! `engine/tests`) call this once at startup.

use log::{LevelFilter, SetLoggerError};
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;

/// Initialize the global logger.
///
/// `log_level` gates the stderr appender; if `file_path` is set, a second
/// appender writes full output (tagged with the literal level, no
/// threshold) to that file.
pub fn init_logger(log_level: LevelFilter, file_path: Option<&str>) -> Result<(), SetLoggerError> {
    let stderr = ConsoleAppender::builder().target(Target::Stderr).build();

    let mut builder = Config::builder();

    if let Some(path) = file_path {
        match FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} {l} - {m}\n")))
            .build(path)
        {
            Ok(logfile) => {
                builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
            }
            Err(e) => {
                eprintln!("failed to open log file {path}: {e}");
            }
        }
    }

    let mut root = Root::builder().appender("stderr");
    if file_path.is_some() {
        root = root.appender("logfile");
    }

    let config = builder
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(log_level)))
                .build("stderr", Box::new(stderr)),
        )
        .build(root.build(log_level))
        .expect("logger configuration is always valid");

    log4rs::init_config(config)?;
    Ok(())
}
