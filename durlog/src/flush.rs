//! Turning the pending batch into durable bytes on disk.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use jiff::tz::TimeZone;

use crate::queue::BoundedQueue;
use crate::rotation::RotationPolicy;
use crate::stats::Counters;
use crate::Record;

const BUFFER_CAPACITY: usize = 4096;

/// Records awaiting a flush, together with everything needed to write them.
///
/// Lives behind the writer's [`Gate`](crate::gate::Gate), so at most one
/// flush runs at a time no matter which trigger started it.
pub struct PendingBatch {
    records: Vec<Record>,
    rotation: RotationPolicy,
    time_zone: TimeZone,
    buffer: Vec<u8>,
}

impl PendingBatch {
    pub fn new(rotation: RotationPolicy, time_zone: TimeZone) -> PendingBatch {
        PendingBatch {
            records: Vec::new(),
            rotation,
            time_zone,
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes every pending record, in order, to the file chosen by the
    /// rotation policy and syncs it, then moves the records to `forward`
    /// for the sink thread (or drops them when there is no sink).
    ///
    /// Returns the number of records written. On failure nothing is removed
    /// from the batch; the next flush retries the same records first.
    pub(crate) fn flush(
        &mut self,
        counters: &Counters,
        forward: Option<&BoundedQueue<Record>>,
    ) -> io::Result<usize> {
        if self.records.is_empty() {
            return Ok(0);
        }
        self.buffer.clear();
        for record in &self.records {
            record.render_into(&self.time_zone, &mut self.buffer);
        }
        let date = crate::timestamp::today(&self.time_zone);
        let path = match self.rotation.resolve_path(date) {
            Ok(path) => path,
            Err(err) => {
                let path = self.rotation.directory().to_path_buf();
                return Err(self.write_failed(counters, path, err));
            }
        };
        if let Err(err) = append_durably(&path, &self.buffer) {
            return Err(self.write_failed(counters, path, err));
        }

        let written = self.records.len();
        match forward {
            Some(forward) => {
                let mut dropped = 0;
                for record in self.records.drain(..) {
                    if forward.try_push(record).is_err() {
                        dropped += 1;
                    }
                }
                if dropped > 0 {
                    Counters::add(&counters.sink_failures, dropped);
                    crate::diag!("sink backlog full; {} records not forwarded", dropped);
                }
            }
            None => self.records.clear(),
        }
        if self.buffer.capacity() > BUFFER_CAPACITY * 64 {
            self.buffer = Vec::with_capacity(BUFFER_CAPACITY);
        }
        Counters::add(&counters.written, written as u64);
        Counters::add(&counters.flushes, 1);
        Ok(written)
    }

    #[cold]
    fn write_failed(&self, counters: &Counters, path: PathBuf, err: io::Error) -> io::Error {
        Counters::add(&counters.write_failures, 1);
        crate::diag!(
            "failed to write {} records to {}: {}; keeping them for the next flush",
            self.records.len(),
            path.display(),
            err
        );
        err
    }
}

fn append_durably(path: &std::path::Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
