//! Selection of the file each flush appends to.
//!
//! Nothing about the "current" file is cached between flushes: every call to
//! [`RotationPolicy::resolve_path`] looks at the directory afresh, so files
//! that are deleted, truncated or moved aside by other tools are tolerated.

use std::io;
use std::path::{Path, PathBuf};

use jiff::civil::Date;

/// Bytes per configured megabyte.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Upper bound on the size rotation counter scan. Reaching it selects the
/// capped file even if it is over the limit.
pub const MAX_ROTATION_COUNTER: u32 = 100_000;

/// Where records for a given day land.
///
/// Without a size limit there is one file per calendar day,
/// `{base}_{yyyy-MM-dd}.log`. With a limit the day is split into numbered
/// files `{base}_{yyyy-MM-dd}_{N}.log` starting at `N = 1`; the first file
/// that is missing or strictly smaller than the limit receives the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    directory: PathBuf,
    base_name: String,
    max_file_size: Option<u64>,
}

impl RotationPolicy {
    pub fn new(
        directory: impl Into<PathBuf>,
        base_name: impl Into<String>,
        max_file_size: Option<u64>,
    ) -> RotationPolicy {
        RotationPolicy {
            directory: directory.into(),
            base_name: base_name.into(),
            max_file_size,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Size limit in bytes, `None` when rotation by size is disabled.
    pub fn max_file_size(&self) -> Option<u64> {
        self.max_file_size
    }

    /// Path of the `counter`-th size bucket for `date`, or of the day file
    /// when `counter` is `None`.
    pub fn path_for(&self, date: Date, counter: Option<u32>) -> PathBuf {
        let mut name = String::with_capacity(self.base_name.len() + 24);
        name.push_str(&self.base_name);
        name.push('_');
        name.push_str(&crate::timestamp::date_string(date));
        if let Some(counter) = counter {
            name.push('_');
            name.push_str(itoa::Buffer::new().format(counter));
        }
        name.push_str(".log");
        self.directory.join(name)
    }

    /// Resolves the file the next flush for `date` should append to.
    ///
    /// Errors only when the size of an existing candidate cannot be read for
    /// a reason other than the file being absent.
    pub fn resolve_path(&self, date: Date) -> io::Result<PathBuf> {
        let Some(limit) = self.max_file_size else {
            return Ok(self.path_for(date, None));
        };
        let mut counter = 1;
        loop {
            let path = self.path_for(date, Some(counter));
            if counter >= MAX_ROTATION_COUNTER {
                return Ok(path);
            }
            match std::fs::metadata(&path) {
                Ok(meta) if meta.len() < limit => return Ok(path),
                Ok(_) => counter += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(path),
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn day_file_without_limit() {
        let policy = RotationPolicy::new("/var/log/app", "orders", None);
        assert_eq!(
            policy.resolve_path(date(2024, 2, 9)).unwrap(),
            PathBuf::from("/var/log/app/orders_2024-02-09.log")
        );
    }

    #[test]
    fn first_counter_when_directory_empty() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy::new(dir.path(), "app", Some(BYTES_PER_MB));
        assert_eq!(
            policy.resolve_path(date(2024, 2, 9)).unwrap(),
            dir.path().join("app_2024-02-09_1.log")
        );
    }

    #[test]
    fn skips_full_files_and_stops_at_first_with_room() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy::new(dir.path(), "app", Some(10));
        let day = date(2024, 2, 9);
        std::fs::write(policy.path_for(day, Some(1)), [b'x'; 10]).unwrap();
        std::fs::write(policy.path_for(day, Some(2)), [b'x'; 25]).unwrap();
        std::fs::write(policy.path_for(day, Some(3)), [b'x'; 9]).unwrap();
        assert_eq!(policy.resolve_path(day).unwrap(), policy.path_for(day, Some(3)));

        std::fs::write(policy.path_for(day, Some(3)), [b'x'; 10]).unwrap();
        assert_eq!(policy.resolve_path(day).unwrap(), policy.path_for(day, Some(4)));
    }

    #[test]
    fn rescans_after_external_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy::new(dir.path(), "app", Some(4));
        let day = date(2024, 2, 9);
        std::fs::write(policy.path_for(day, Some(1)), b"full").unwrap();
        assert_eq!(policy.resolve_path(day).unwrap(), policy.path_for(day, Some(2)));
        std::fs::remove_file(policy.path_for(day, Some(1))).unwrap();
        assert_eq!(policy.resolve_path(day).unwrap(), policy.path_for(day, Some(1)));
    }

    #[test]
    fn other_days_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy::new(dir.path(), "app", Some(4));
        std::fs::write(policy.path_for(date(2024, 2, 8), Some(1)), b"full").unwrap();
        assert_eq!(
            policy.resolve_path(date(2024, 2, 9)).unwrap(),
            policy.path_for(date(2024, 2, 9), Some(1))
        );
    }

    #[test]
    fn zero_limit_still_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy::new(dir.path(), "app", Some(0));
        let day = date(2024, 2, 9);
        for counter in 1..=3 {
            std::fs::write(policy.path_for(day, Some(counter)), b"").unwrap();
        }
        assert_eq!(policy.resolve_path(day).unwrap(), policy.path_for(day, Some(4)));
    }
}
