use jiff::tz::TimeZone;
use jiff::Timestamp;

use crate::Level;

/// One immutable log entry.
///
/// The timestamp is taken when the record is created on the producer's
/// thread, so rendered order reflects the order in which producers logged,
/// not when the writer thread got around to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    timestamp: Timestamp,
    level: Level,
    message: Box<str>,
    error: Option<Box<str>>,
}

impl Record {
    /// Creates a record stamped with the current time.
    pub fn new(level: Level, message: impl Into<Box<str>>) -> Record {
        Record::at(Timestamp::now(), level, message)
    }

    /// Creates a record with an explicit timestamp.
    pub fn at(timestamp: Timestamp, level: Level, message: impl Into<Box<str>>) -> Record {
        Record {
            timestamp,
            level,
            message: message.into(),
            error: None,
        }
    }

    /// Attaches a rendered error description, forwarded to the sink.
    pub fn with_error(mut self, error: impl Into<Box<str>>) -> Record {
        self.error = Some(error.into());
        self
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Appends `[yyyy-MM-dd HH:mm:ss.fff] [LEVEL] message\n` to the output,
    /// with the timestamp shown in `time_zone`.
    pub fn render_into(&self, time_zone: &TimeZone, output: &mut Vec<u8>) {
        output.reserve(self.message.len() + crate::timestamp::STAMP_LEN + 14);
        output.push(b'[');
        crate::timestamp::write_stamp(time_zone.to_datetime(self.timestamp), output);
        output.extend_from_slice(b"] [");
        output.extend_from_slice(self.level.as_str().as_bytes());
        output.extend_from_slice(b"] ");
        output.extend_from_slice(self.message.as_bytes());
        output.push(b'\n');
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn render(record: &Record) -> String {
        let mut out = Vec::new();
        record.render_into(&TimeZone::UTC, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn render_line() {
        let ts: Timestamp = "2024-05-01T08:30:15.042Z".parse().unwrap();
        assert_eq!(
            render(&Record::at(ts, Level::Warning, "disk at 91%")),
            "[2024-05-01 08:30:15.042] [WARNING] disk at 91%\n"
        );
        assert_eq!(
            render(&Record::at(ts, Level::Fatal, "")),
            "[2024-05-01 08:30:15.042] [FATAL] \n"
        );
    }

    #[test]
    fn render_in_time_zone() {
        let ts: Timestamp = "2024-05-01T23:30:00Z".parse().unwrap();
        let mut out = Vec::new();
        Record::at(ts, Level::Info, "late")
            .render_into(&TimeZone::fixed(jiff::tz::offset(2)), &mut out);
        assert_eq!(out, b"[2024-05-02 01:30:00.000] [INFO] late\n");
    }

    #[test]
    fn error_is_kept_out_of_the_line() {
        let ts: Timestamp = "2024-05-01T00:00:00Z".parse().unwrap();
        let record = Record::at(ts, Level::Error, "request failed").with_error("connection reset");
        assert_eq!(record.error(), Some("connection reset"));
        assert_eq!(
            render(&record),
            "[2024-05-01 00:00:00.000] [ERROR] request failed\n"
        );
    }
}
