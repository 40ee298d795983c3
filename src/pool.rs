use crate::record::{Fields, LogRecord, MergedRecord};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Default number of idle records kept on the free list.
pub const DEFAULT_MAX_IDLE_RECORDS: usize = 1024;

/// Free-list of [`MergedRecord`]s shared by concurrent formatting calls.
///
/// Each `acquire` hands out a distinct instance, fully overwritten from the
/// source record, so nothing from a previous emission survives reuse.
#[derive(Debug)]
pub struct RecordPool {
    free: Mutex<Vec<MergedRecord>>,
    max_idle: usize,
    allocated: AtomicU64,
}

impl RecordPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
            allocated: AtomicU64::new(0),
        }
    }

    /// Take a record off the free list (allocating when it is empty) and
    /// populate it from `record` and `static_fields`.
    ///
    /// The returned guard gives the record back on drop.
    pub fn acquire<'a>(&'a self, record: &LogRecord, static_fields: &Fields) -> PooledRecord<'a> {
        let reused = self.free.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let mut merged = reused.unwrap_or_else(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            MergedRecord::empty()
        });
        merged.fill(record, static_fields);
        PooledRecord {
            pool: self,
            record: merged,
        }
    }

    /// Return a record to the free list. Records beyond `max_idle` are dropped.
    pub fn release(&self, mut record: MergedRecord) {
        record.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(record);
        }
    }

    /// Number of records currently waiting on the free list.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Total records ever allocated by this pool.
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl Default for RecordPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE_RECORDS)
    }
}

/// Exclusive handle to a pooled [`MergedRecord`].
pub struct PooledRecord<'a> {
    pool: &'a RecordPool,
    record: MergedRecord,
}

impl Deref for PooledRecord<'_> {
    type Target = MergedRecord;

    fn deref(&self) -> &MergedRecord {
        &self.record
    }
}

impl Drop for PooledRecord<'_> {
    fn drop(&mut self) {
        // An empty record owns no heap memory, so the swap is free.
        let record = std::mem::replace(&mut self.record, MergedRecord::empty());
        self.pool.release(record);
    }
}
