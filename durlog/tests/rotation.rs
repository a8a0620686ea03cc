mod common;

use std::time::Duration;

use common::*;
use durlog::Shutdown;

fn total_lines(dir: &std::path::Path, buckets: u32) -> Vec<String> {
    (1..=buckets)
        .flat_map(|counter| read_lines(&bucket_file(dir, counter)))
        .collect()
}

#[test]
fn full_bucket_is_never_appended_again() {
    let dir = tempfile::tempdir().unwrap();
    let limit = 4096;
    let guard = durlog::spawn(config(dir.path()).with_max_size_bytes(limit)).unwrap();
    let first = bucket_file(dir.path(), 1);
    let second = bucket_file(dir.path(), 2);
    let payload = "x".repeat(100);

    let mut sent = 0;
    while std::fs::metadata(&first).map(|m| m.len()).unwrap_or(0) < limit {
        guard.info(format!("{sent:04} {payload}")).unwrap();
        sent += 1;
        guard.flush(Duration::from_secs(5)).unwrap();
    }
    assert!(!second.exists());
    let first_len = std::fs::metadata(&first).unwrap().len();

    for _ in 0..25 {
        guard.info(format!("{sent:04} {payload}")).unwrap();
        sent += 1;
    }
    assert_eq!(guard.shutdown(Duration::from_secs(10)), Shutdown::Completed);

    assert_eq!(std::fs::metadata(&first).unwrap().len(), first_len);
    assert!(second.exists());
    let lines = total_lines(dir.path(), 3);
    assert_eq!(lines.len(), sent);
    for (i, line) in lines.iter().enumerate() {
        assert!(message(line).starts_with(&format!("{i:04} ")));
    }
}

#[test]
fn megabyte_limit_rolls_over() {
    let dir = tempfile::tempdir().unwrap();
    let guard = durlog::spawn(config(dir.path()).with_max_size_mb(1)).unwrap();
    let payload = "y".repeat(1000);
    for i in 0..1200 {
        guard.info(format!("{i:05} {payload}")).unwrap();
    }
    assert_eq!(guard.shutdown(Duration::from_secs(30)), Shutdown::Completed);

    let first = std::fs::metadata(bucket_file(dir.path(), 1)).unwrap().len();
    let second = std::fs::metadata(bucket_file(dir.path(), 2)).unwrap().len();
    assert!(first >= 1024 * 1024);
    assert!(second > 0 && second < 1024 * 1024);
    assert!(!bucket_file(dir.path(), 3).exists());
    assert!(!day_file(dir.path()).exists());
    assert_eq!(total_lines(dir.path(), 2).len(), 1200);
}

#[test]
fn existing_buckets_are_respected_on_start() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(bucket_file(dir.path(), 1), vec![b'.'; 64]).unwrap();
    std::fs::write(bucket_file(dir.path(), 2), b"earlier run\n").unwrap();

    let guard = durlog::spawn(config(dir.path()).with_max_size_bytes(64)).unwrap();
    guard.error("resumed").unwrap();
    assert_eq!(guard.shutdown_default(), Shutdown::Completed);

    assert_eq!(std::fs::read(bucket_file(dir.path(), 1)).unwrap(), vec![b'.'; 64]);
    let lines = read_lines(&bucket_file(dir.path(), 2));
    assert_eq!(lines[0], "earlier run");
    assert_eq!(message(&lines[1]), "resumed");
}
