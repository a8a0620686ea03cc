#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use durlog::WriterConfig;
use jiff::tz::TimeZone;

/// A timer interval long enough that it never fires during a test.
pub const NEVER: Duration = Duration::from_secs(3600);

pub fn config(dir: &Path) -> WriterConfig {
    WriterConfig::new(dir, "app")
        .with_time_zone(TimeZone::UTC)
        .with_flush_interval(NEVER)
}

pub fn day_file(dir: &Path) -> PathBuf {
    durlog::RotationPolicy::new(dir, "app", None)
        .path_for(durlog::timestamp::today(&TimeZone::UTC), None)
}

pub fn bucket_file(dir: &Path, counter: u32) -> PathBuf {
    durlog::RotationPolicy::new(dir, "app", Some(0))
        .path_for(durlog::timestamp::today(&TimeZone::UTC), Some(counter))
}

pub fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => text.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

/// The message part of `[stamp] [LEVEL] message`.
pub fn message(line: &str) -> &str {
    line.splitn(3, "] ").nth(2).unwrap_or_default()
}

pub fn level(line: &str) -> &str {
    line.splitn(3, "] ")
        .nth(1)
        .unwrap_or_default()
        .trim_start_matches('[')
}

pub fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
