//! Asynchronous, batched, durable log file writer.
//!
//! Records from any number of threads pass through a bounded queue to a
//! single writer thread, which appends them in order to a per-day (and
//! optionally size-bounded) file and syncs every flush to stable storage.
//! See [`writer`] for the pipeline and [`spawn`] to start one.
//!
//! Files are plain UTF-8, one record per line:
//!
//! ```text
//! [2024-05-01 08:30:15.042] [WARNING] disk at 91%
//! ```

use std::str::FromStr;

/// Reports a diagnostic about the writer itself on standard error.
macro_rules! diag {
    ($($arg:tt)*) => {
        ::std::eprintln!("durlog: {}", ::std::format_args!($($arg)*))
    };
}
pub(crate) use diag;

mod config;
mod error;
mod flush;
mod gate;
pub mod queue;
mod record;
pub mod rotation;
mod sink;
mod stats;
pub mod timestamp;
pub mod writer;

pub use config::{WriterConfig, CONFIG_ENV_VAR, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL};
pub use error::{Error, Result};
pub use record::Record;
pub use rotation::RotationPolicy;
pub use sink::{Channel, Sink, SINK_BACKLOG};
pub use stats::Stats;
pub use writer::{
    spawn, LogWriter, Shutdown, WriterGuard, WriterState, DEFAULT_SHUTDOWN_TIMEOUT,
    EMERGENCY_SHUTDOWN_TIMEOUT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl Level {
    /// The fixed uppercase token written to log files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// `ERROR` and `FATAL` records are flushed as soon as they arrive.
    pub const fn is_severe(self) -> bool {
        matches!(self, Level::Error | Level::Fatal)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(input: &str) -> Result<Level> {
        match input.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            _ => Err(Error::Configuration(format!("unknown level `{input}`"))),
        }
    }
}

/// Logs a `DEBUG` record, formatting the message before it is queued.
///
/// Evaluates to the [`Result`] of the enqueue.
///
/// ```no_run
/// # let guard = durlog::spawn(durlog::WriterConfig::default())?;
/// durlog::debug!(guard, "cache warmed with {} keys", 512)?;
/// # Ok::<(), durlog::Error>(())
/// ```
#[macro_export]
macro_rules! debug {
    ($writer:expr, $($arg:tt)+) => {
        $writer.debug(::std::format!($($arg)+))
    };
}

/// Logs an `INFO` record; see [`debug!`].
#[macro_export]
macro_rules! info {
    ($writer:expr, $($arg:tt)+) => {
        $writer.info(::std::format!($($arg)+))
    };
}

/// Logs a `WARNING` record; see [`debug!`].
#[macro_export]
macro_rules! warning {
    ($writer:expr, $($arg:tt)+) => {
        $writer.warning(::std::format!($($arg)+))
    };
}

/// Logs an `ERROR` record; see [`debug!`]. Flushed immediately.
#[macro_export]
macro_rules! error {
    ($writer:expr, $($arg:tt)+) => {
        $writer.error(::std::format!($($arg)+))
    };
}

/// Logs a `FATAL` record; see [`debug!`]. Flushed immediately.
#[macro_export]
macro_rules! fatal {
    ($writer:expr, $($arg:tt)+) => {
        $writer.fatal(::std::format!($($arg)+))
    };
}

/// Spawn a writer with configuration from the env var:
///     `DURLOG_CONFIG`
/// Using [WriterConfig::default()] if the env var is unset or can't be
/// parsed. If quiet is not set to true, the selected configuration will be
/// printed to stdout.
///
/// See [WriterConfig]'s `FromStr` implementation for the format.
///
/// Note: When the `WriterGuard` returned from this function is dropped
/// the writer will be flushed and shut down.
///
/// # Example:
/// ```no_run
/// let guard = durlog::spawn_writer_from_env(false)?;
/// guard.info("Hello World")?;
/// # Ok::<(), durlog::Error>(())
/// ```
pub fn spawn_writer_from_env(quiet: bool) -> Result<WriterGuard> {
    let (config, printstmt) = match std::env::var(CONFIG_ENV_VAR) {
        Ok(value) => match value.parse::<WriterConfig>() {
            Ok(config) => (
                config,
                "configuration from the DURLOG_CONFIG environment variable",
            ),
            Err(err) => {
                if !quiet {
                    println!(
                        "DURLOG: Error parsing DURLOG_CONFIG environment variable\n value: `{}`\n error: {}",
                        value, err
                    );
                }
                (
                    WriterConfig::default(),
                    "default configuration after an error parsing",
                )
            }
        },
        Err(_) => (
            WriterConfig::default(),
            "default configuration (DURLOG_CONFIG not set)",
        ),
    };
    if !quiet {
        println!("DURLOG: Using the {printstmt}: {:#?}", config)
    }
    spawn(config)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_tokens() {
        let all = [
            Level::Debug,
            Level::Info,
            Level::Warning,
            Level::Error,
            Level::Fatal,
        ];
        for level in all {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
            assert_eq!(level.to_string(), level.as_str());
        }
        assert_eq!("debug".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn severity() {
        assert!(!Level::Debug.is_severe());
        assert!(!Level::Info.is_severe());
        assert!(!Level::Warning.is_severe());
        assert!(Level::Error.is_severe());
        assert!(Level::Fatal.is_severe());
        assert!(Level::Debug < Level::Fatal);
    }
}
