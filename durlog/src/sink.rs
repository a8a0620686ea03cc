//! Optional observer that receives every record after it is on disk.
//!
//! Records reach the sink on a dedicated `durlog-sink` thread, so a slow sink
//! never holds up file appends or shutdown.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::{Level, Record};

/// Written records waiting for the sink thread. Beyond this the newest
/// records are not forwarded and count as sink failures.
pub const SINK_BACKLOG: usize = 10_000;

/// Which host logging channel a record is forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `DEBUG`, `INFO` and `WARNING` records.
    Information,
    /// `ERROR` and `FATAL` records.
    Error,
}

impl From<Level> for Channel {
    fn from(level: Level) -> Channel {
        if level.is_severe() {
            Channel::Error
        } else {
            Channel::Information
        }
    }
}

/// External log consumer, typically a bridge into a host framework's logger.
///
/// A sink cannot fail the writer: a panic raised while handling a record is
/// caught and discarded, and the remaining records are still forwarded.
/// Records arrive in file order, one at a time, on the sink thread.
pub trait Sink: Send + Sync + 'static {
    fn log(&self, channel: Channel, message: &str, error: Option<&str>);
}

impl<F> Sink for F
where
    F: Fn(Channel, &str, Option<&str>) + Send + Sync + 'static,
{
    fn log(&self, channel: Channel, message: &str, error: Option<&str>) {
        self(channel, message, error)
    }
}

/// Forwards one record, returning `false` if the sink panicked.
pub(crate) fn forward(sink: &dyn Sink, record: &Record) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        sink.log(record.level().into(), record.message(), record.error())
    }))
    .is_ok()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn channel_mapping() {
        assert_eq!(Channel::from(Level::Debug), Channel::Information);
        assert_eq!(Channel::from(Level::Info), Channel::Information);
        assert_eq!(Channel::from(Level::Warning), Channel::Information);
        assert_eq!(Channel::from(Level::Error), Channel::Error);
        assert_eq!(Channel::from(Level::Fatal), Channel::Error);
    }

    #[test]
    fn closure_sink_receives_error_text() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |channel: Channel, message: &str, error: Option<&str>| {
                seen.lock()
                    .unwrap()
                    .push((channel, message.to_string(), error.map(str::to_string)));
            }
        };
        let record = Record::new(Level::Fatal, "out of memory").with_error("alloc failed");
        assert!(forward(&sink, &record));
        assert_eq!(
            seen.lock().unwrap()[0],
            (
                Channel::Error,
                "out of memory".to_string(),
                Some("alloc failed".to_string())
            )
        );
    }

    #[test]
    fn panicking_sink_is_contained() {
        let sink = |_: Channel, _: &str, _: Option<&str>| panic!("sink exploded");
        assert!(!forward(&sink, &Record::new(Level::Info, "hello")));
    }
}
