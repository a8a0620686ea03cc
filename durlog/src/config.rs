use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use jiff::tz::TimeZone;

use crate::error::{Error, Result};
use crate::rotation::{RotationPolicy, BYTES_PER_MB};
use crate::sink::Sink;

/// Default interval of the periodic flush timer.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Default number of pending records that triggers a flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Environment variable read by [`crate::spawn_writer_from_env`].
pub const CONFIG_ENV_VAR: &str = "DURLOG_CONFIG";

/// Configuration of one writer pipeline.
///
/// Built with the `with_*` methods starting from [`WriterConfig::new`] or
/// [`Default`], or parsed from a string (see [`FromStr`] below).
#[derive(Clone)]
pub struct WriterConfig {
    /// Directory receiving the log files; created at spawn if absent.
    pub directory: PathBuf,
    /// File name prefix, `{base_name}_{yyyy-MM-dd}[_{N}].log`.
    pub base_name: String,
    /// Size limit per file in bytes; `None` disables size rotation.
    pub max_file_size: Option<u64>,
    /// Period of the background flush timer.
    pub flush_interval: Duration,
    /// Records the queue holds before producers block.
    pub capacity: usize,
    /// Pending records that trigger a flush without waiting for the timer.
    pub batch_size: usize,
    /// Zone used for rendered timestamps and for the date in file names.
    pub time_zone: TimeZone,
    /// Observer receiving each record after it is on disk.
    pub sink: Option<Arc<dyn Sink>>,
}

impl WriterConfig {
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> WriterConfig {
        WriterConfig {
            directory: directory.into(),
            base_name: base_name.into(),
            ..WriterConfig::default()
        }
    }

    pub fn with_max_size_mb(mut self, megabytes: u64) -> Self {
        self.max_file_size = Some(megabytes.saturating_mul(BYTES_PER_MB));
        self
    }

    pub fn with_max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_time_zone(mut self, time_zone: TimeZone) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn with_sink(mut self, sink: impl Sink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn rotation(&self) -> RotationPolicy {
        RotationPolicy::new(
            self.directory.clone(),
            self.base_name.clone(),
            self.max_file_size,
        )
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.base_name.is_empty() {
            return Err(Error::Configuration("base name must not be empty".into()));
        }
        if self.capacity == 0 {
            return Err(Error::Configuration("queue capacity must be non-zero".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration("batch size must be non-zero".into()));
        }
        if self.flush_interval.is_zero() {
            return Err(Error::Configuration("flush interval must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            directory: PathBuf::from("logs"),
            base_name: "app".into(),
            max_file_size: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            capacity: crate::queue::DEFAULT_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            time_zone: TimeZone::system(),
            sink: None,
        }
    }
}

impl fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterConfig")
            .field("directory", &self.directory)
            .field("base_name", &self.base_name)
            .field("max_file_size", &self.max_file_size)
            .field("flush_interval", &self.flush_interval)
            .field("capacity", &self.capacity)
            .field("batch_size", &self.batch_size)
            .field("time_zone", &self.time_zone.iana_name().unwrap_or("<fixed>"))
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Parses `[BASE_NAME@]DIRECTORY[,KEY=VALUE]*`.
///
/// - `BASE_NAME`: (Optional, separated by `@`) file name prefix, default `app`.
/// - `DIRECTORY`: (Required) directory receiving the files.
/// - Options, comma separated:
///   - `max_mb=N`: rotate at `N` megabytes per file.
///   - `flush_ms=N`: periodic flush interval in milliseconds.
///   - `capacity=N`: queue capacity in records.
///   - `batch=N`: pending records that trigger a flush.
///
/// # Examples of String Parsing
///
/// - `"/var/log/shop"` logs to `/var/log/shop/app_{date}.log`
/// - `"orders@/var/log/shop,max_mb=50"` logs to `/var/log/shop/orders_{date}_{N}.log`
/// - `"logs,flush_ms=250,capacity=4096"` tunes the timer and queue
impl FromStr for WriterConfig {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let mut parts = input.split(',');
        let target = parts.next().unwrap_or_default().trim();
        let (base_name, directory) = match target.split_once('@') {
            Some((base_name, directory)) => (base_name, directory),
            None => ("app", target),
        };
        if directory.is_empty() {
            return Err(Error::Configuration(
                "directory is required and must not be empty".into(),
            ));
        }
        let mut config = WriterConfig::new(directory, base_name);
        for option in parts {
            let option = option.trim();
            if option.is_empty() {
                continue;
            }
            let Some((key, value)) = option.split_once('=') else {
                return Err(Error::Configuration(format!(
                    "expected KEY=VALUE, found `{option}`"
                )));
            };
            let number: u64 = value.trim().parse().map_err(|_| {
                Error::Configuration(format!("`{key}` expects an integer, found `{value}`"))
            })?;
            match key.trim() {
                "max_mb" => config = config.with_max_size_mb(number),
                "flush_ms" => config = config.with_flush_interval(Duration::from_millis(number)),
                "capacity" => config = config.with_capacity(number as usize),
                "batch" => config = config.with_batch_size(number as usize),
                other => {
                    return Err(Error::Configuration(format!("unknown option `{other}`")));
                }
            }
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_writer_config() {
        let config: WriterConfig = "/tmp/logs".parse().unwrap();
        assert_eq!(config.directory, PathBuf::from("/tmp/logs"));
        assert_eq!(config.base_name, "app");
        assert_eq!(config.max_file_size, None);
        assert_eq!(config.flush_interval, DEFAULT_FLUSH_INTERVAL);
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.batch_size, 10);

        let config: WriterConfig = "orders@/var/log/shop, max_mb=50,flush_ms=250,capacity=64,batch=5"
            .parse()
            .unwrap();
        assert_eq!(config.base_name, "orders");
        assert_eq!(config.directory, PathBuf::from("/var/log/shop"));
        assert_eq!(config.max_file_size, Some(50 * 1024 * 1024));
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.capacity, 64);
        assert_eq!(config.batch_size, 5);

        assert!("".parse::<WriterConfig>().is_err());
        assert!("orders@".parse::<WriterConfig>().is_err());
        assert!("@/tmp/logs".parse::<WriterConfig>().is_err());
        assert!("/tmp/logs,max_mb".parse::<WriterConfig>().is_err());
        assert!("/tmp/logs,max_mb=ten".parse::<WriterConfig>().is_err());
        assert!("/tmp/logs,color=1".parse::<WriterConfig>().is_err());
        assert!("/tmp/logs,capacity=0".parse::<WriterConfig>().is_err());
        assert!("/tmp/logs,flush_ms=0".parse::<WriterConfig>().is_err());
    }

    #[test]
    fn rotation_from_config() {
        let config = WriterConfig::new("/srv/log", "api").with_max_size_mb(2);
        let policy = config.rotation();
        assert_eq!(policy.base_name(), "api");
        assert_eq!(policy.max_file_size(), Some(2 * BYTES_PER_MB));
    }
}
