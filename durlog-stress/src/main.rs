//! Hammers a durlog writer from several threads with a synthetic workload,
//! shuts it down, and checks that every accepted record reached the disk.
//!
//! Usage: `durlog-stress [DIRECTORY] [THREADS] [RECORDS_PER_THREAD] [MAX_MB]`

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use durlog::{Level, LogWriter, Shutdown, WriterConfig};

struct SyndromeDefinition {
    level: Level,
    message: MessageGen,
}

enum MessageGen {
    Const(&'static str),
    OneOf(&'static [&'static str]),
    Func(fn(&mut oorandom::Rand32) -> String),
}

impl MessageGen {
    fn generate(&self, rng: &mut oorandom::Rand32) -> String {
        match self {
            MessageGen::Const(text) => (*text).to_string(),
            MessageGen::OneOf(texts) => {
                let idx = rng.rand_u32() as usize % texts.len();
                texts[idx].to_string()
            }
            MessageGen::Func(func) => func(rng),
        }
    }
}

use MessageGen::*;

// (weight, syndrome)
const SYNDROMES: &[(usize, SyndromeDefinition)] = &[
    (
        40,
        SyndromeDefinition {
            level: Level::Info,
            message: Func(|rng| {
                const PATHS: &[&str] = &["/user/login", "/user/login/google", "/orders", "/health"];
                const METHODS: &[&str] = &["GET", "POST", "PATCH", "DELETE"];
                format!(
                    "HTTP {} {} -> {} in {}ms",
                    METHODS[rng.rand_range(0..METHODS.len() as u32) as usize],
                    PATHS[rng.rand_range(0..PATHS.len() as u32) as usize],
                    [200, 201, 204, 304, 400, 404, 500][rng.rand_range(0..7) as usize],
                    rng.rand_range(1..900)
                )
            }),
        },
    ),
    (
        25,
        SyndromeDefinition {
            level: Level::Debug,
            message: OneOf(&["cache hit", "cache miss", "connection reused", "connection opened"]),
        },
    ),
    (
        10,
        SyndromeDefinition {
            level: Level::Warning,
            message: Func(|rng| format!("slow query took {}ms", 500 + rng.rand_range(0..4500))),
        },
    ),
    (
        4,
        SyndromeDefinition {
            level: Level::Error,
            message: Func(|rng| format!("payment {:08x} declined by provider", rng.rand_u32())),
        },
    ),
    (
        1,
        SyndromeDefinition {
            level: Level::Fatal,
            message: Const("worker pool exhausted"),
        },
    ),
];

fn produce(writer: LogWriter, seed: u64, records: usize) -> usize {
    let mut map: Vec<u8> = Vec::new();
    for (i, (w, _)) in SYNDROMES.iter().enumerate() {
        map.extend(std::iter::repeat(i as u8).take(*w))
    }
    let mut rng = oorandom::Rand32::new(seed);
    let mut accepted = 0;
    for _ in 0..records {
        let i = map[rng.rand_u32() as usize % map.len()];
        let (_, syndrome) = &SYNDROMES[i as usize];
        let message = syndrome.message.generate(&mut rng);
        if writer.log(syndrome.level, message).is_err() {
            break;
        }
        accepted += 1;
    }
    accepted
}

fn count_lines(directory: &Path, base_name: &str) -> std::io::Result<(usize, usize)> {
    let prefix = format!("{base_name}_");
    let mut lines = 0;
    let mut files = 0;
    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with(&prefix) && name.ends_with(".log")) {
            continue;
        }
        let contents = std::fs::read(entry.path())?;
        lines += contents.iter().filter(|&&b| b == b'\n').count();
        files += 1;
    }
    Ok((lines, files))
}

fn arg<T: std::str::FromStr>(args: &[String], index: usize, default: T) -> T {
    args.get(index)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let directory: PathBuf = arg(&args, 1, PathBuf::from("durlog-stress-out"));
    let threads: usize = arg(&args, 2, 8);
    let per_thread: usize = arg(&args, 3, 50_000);
    let max_mb: u64 = arg(&args, 4, 0);

    let base_name = format!("stress{}", std::process::id());
    let mut config = WriterConfig::new(&directory, base_name.as_str());
    if max_mb > 0 {
        config = config.with_max_size_mb(max_mb);
    }
    let guard = match durlog::spawn(config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("durlog-stress: {err}");
            std::process::exit(2);
        }
    };

    let start = Instant::now();
    let producers: Vec<_> = (0..threads)
        .map(|t| {
            let writer = guard.writer();
            std::thread::spawn(move || produce(writer, 0xdeadbeaf + t as u64, per_thread))
        })
        .collect();
    let accepted: usize = producers
        .into_iter()
        .map(|producer| producer.join().unwrap_or(0))
        .sum();
    let produced = start.elapsed();
    let outcome = guard.shutdown(Duration::from_secs(60));
    let elapsed = start.elapsed();
    let stats = guard.stats();

    println!(
        "Produced: {} records in {:?}, {:.1}k records / second",
        accepted,
        produced,
        (accepted as f64 / 1000.0) / produced.as_secs_f64()
    );
    println!(
        "Durable: {:?} after {:?}, {} flushes, {:.1} records / flush",
        outcome,
        elapsed,
        stats.flushes,
        stats.written as f64 / stats.flushes.max(1) as f64
    );

    let (lines, files) = match count_lines(&directory, &base_name) {
        Ok(counts) => counts,
        Err(err) => {
            eprintln!("durlog-stress: failed to read back {}: {err}", directory.display());
            std::process::exit(2);
        }
    };
    println!("Files: {files}, lines: {lines}, {stats:?}");
    if outcome != Shutdown::Completed || lines != accepted {
        eprintln!("durlog-stress: expected {accepted} lines, found {lines}");
        std::process::exit(1);
    }
}
