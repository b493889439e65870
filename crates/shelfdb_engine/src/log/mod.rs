//! Append-only operation log.
//!
//! Every committed read-write transaction is appended as its `Set`/`Delete`
//! records followed by a `Commit` marker. On open the log is replayed from
//! the start; only batches closed by a marker are applied. Whatever follows
//! the last marker (an interrupted append) is cut off before new records
//! are written. If a failed append cannot be cut off right away, the log
//! refuses further appends until it is recovered or rewritten.

mod reader;
mod record;

pub use reader::LogReader;
pub use record::{
    compute_crc32, LogRecord, LogRecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};

use crate::error::{EngineError, EngineResult};
use shelfdb_storage::StorageBackend;

/// Records per commit batch when the log is rewritten.
const REWRITE_BATCH: usize = 1024;

/// Operations recovered from the log.
#[derive(Debug, Default)]
pub(crate) struct Recovered {
    /// Committed `Set`/`Delete` records in log order.
    pub(crate) records: Vec<LogRecord>,
    /// Bytes dropped from the tail.
    pub(crate) discarded: u64,
}

/// The log of one store, on top of a storage backend.
pub(crate) struct Log {
    backend: Box<dyn StorageBackend>,
    /// Log size right after the last load or rewrite.
    base_size: u64,
    /// Offset of a failed batch that could not be truncated away.
    poisoned_at: Option<u64>,
}

impl Log {
    pub(crate) fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            base_size: 0,
            poisoned_at: None,
        }
    }

    /// Replays the log and truncates anything after the last commit marker.
    pub(crate) fn recover(&mut self) -> EngineResult<Recovered> {
        let data = self.backend.read_all()?;
        let mut recovered = Recovered::default();
        let mut pending = Vec::new();
        let mut committed_end = 0u64;

        let mut reader = LogReader::new(&data);
        while let Some(item) = reader.next() {
            let (offset, record) = item?;
            match record {
                LogRecord::Commit { ops } => {
                    if pending.len() != ops as usize {
                        return Err(EngineError::log_corruption(format!(
                            "commit at offset {offset} closes {ops} operations, found {}",
                            pending.len()
                        )));
                    }
                    recovered.records.append(&mut pending);
                }
                op => pending.push(op),
            }
            if pending.is_empty() {
                committed_end = reader.offset() as u64;
            }
        }

        let size = data.len() as u64;
        if committed_end < size {
            recovered.discarded = size - committed_end;
            self.backend.truncate(committed_end)?;
        }
        self.base_size = committed_end;
        self.poisoned_at = None;

        Ok(recovered)
    }

    /// Appends one transaction: its records followed by a commit marker.
    pub(crate) fn append_batch(&mut self, records: &[LogRecord]) -> EngineResult<()> {
        if let Some(offset) = self.poisoned_at {
            return Err(EngineError::LogPoisoned { offset });
        }

        let ops = u32::try_from(records.len())
            .map_err(|_| EngineError::transaction_aborted("too many operations in one transaction"))?;

        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.encode_frame()?);
        }
        data.extend_from_slice(&LogRecord::Commit { ops }.encode_frame()?);

        let start = self.backend.size()?;
        if let Err(err) = self
            .backend
            .append(&data)
            .and_then(|_| self.backend.flush())
        {
            // Drop a partial batch so later appends stay replayable.
            if let Err(truncate_err) = self.backend.truncate(start) {
                tracing::error!(
                    offset = start,
                    error = %truncate_err,
                    "failed batch left in the log, refusing further appends"
                );
                self.poisoned_at = Some(start);
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Replaces the whole log with the given live records.
    pub(crate) fn rewrite(&mut self, records: &[LogRecord]) -> EngineResult<()> {
        let mut data = Vec::new();
        for chunk in records.chunks(REWRITE_BATCH) {
            for record in chunk {
                data.extend_from_slice(&record.encode_frame()?);
            }
            // Chunks are at most REWRITE_BATCH long.
            let ops = chunk.len() as u32;
            data.extend_from_slice(&LogRecord::Commit { ops }.encode_frame()?);
        }

        self.backend.rewrite(&data)?;
        self.base_size = data.len() as u64;
        self.poisoned_at = None;
        Ok(())
    }

    pub(crate) fn sync(&mut self) -> EngineResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    pub(crate) fn size(&self) -> EngineResult<u64> {
        Ok(self.backend.size()?)
    }

    pub(crate) fn base_size(&self) -> u64 {
        self.base_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfdb_storage::{InMemoryBackend, StorageError, StorageResult};
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Faults {
        append: AtomicBool,
        truncate: AtomicBool,
    }

    /// Writes half of each append and then fails, on demand.
    struct FailingBackend {
        inner: InMemoryBackend,
        faults: Arc<Faults>,
    }

    fn simulated(what: &str) -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated {what} failure"),
        ))
    }

    impl StorageBackend for FailingBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.faults.append.load(Ordering::SeqCst) {
                self.inner.append(&data[..data.len() / 2])?;
                return Err(simulated("append"));
            }
            self.inner.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn sync(&mut self) -> StorageResult<()> {
            self.inner.sync()
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            if self.faults.truncate.load(Ordering::SeqCst) {
                return Err(simulated("truncate"));
            }
            self.inner.truncate(new_size)
        }

        fn rewrite(&mut self, data: &[u8]) -> StorageResult<()> {
            self.inner.rewrite(data)
        }
    }

    fn failing_log() -> (Log, Arc<Faults>) {
        let faults = Arc::new(Faults::default());
        let backend = FailingBackend {
            inner: InMemoryBackend::new(),
            faults: Arc::clone(&faults),
        };
        (Log::new(Box::new(backend)), faults)
    }

    fn set(key: &str, value: &str) -> LogRecord {
        LogRecord::Set {
            key: key.into(),
            value: value.into(),
            expires_at: None,
        }
    }

    fn log_over(data: Vec<u8>) -> Log {
        Log::new(Box::new(InMemoryBackend::with_data(data)))
    }

    #[test]
    fn recover_empty_log() {
        let mut log = log_over(Vec::new());
        let recovered = log.recover().unwrap();
        assert!(recovered.records.is_empty());
        assert_eq!(recovered.discarded, 0);
        assert_eq!(log.base_size(), 0);
    }

    #[test]
    fn committed_batches_are_replayed_in_order() {
        let mut log = log_over(Vec::new());
        log.append_batch(&[set("a", "1"), set("b", "2")]).unwrap();
        log.append_batch(&[LogRecord::Delete { key: "a".into() }])
            .unwrap();

        let size = log.size().unwrap();
        let mut reopened = log_over(log.backend.read_all().unwrap());
        let recovered = reopened.recover().unwrap();

        assert_eq!(
            recovered.records,
            vec![
                set("a", "1"),
                set("b", "2"),
                LogRecord::Delete { key: "a".into() }
            ]
        );
        assert_eq!(reopened.base_size(), size);
    }

    #[test]
    fn uncommitted_tail_is_discarded_and_truncated() {
        let mut log = log_over(Vec::new());
        log.append_batch(&[set("a", "1")]).unwrap();
        let committed = log.size().unwrap();

        let mut data = log.backend.read_all().unwrap();
        data.extend_from_slice(&set("b", "2").encode_frame().unwrap());
        let torn = set("c", "3").encode_frame().unwrap();
        data.extend_from_slice(&torn[..5]);

        let mut reopened = log_over(data);
        let recovered = reopened.recover().unwrap();
        assert_eq!(recovered.records, vec![set("a", "1")]);
        assert!(recovered.discarded > 0);
        assert_eq!(reopened.size().unwrap(), committed);
    }

    #[test]
    fn commit_count_mismatch_is_corruption() {
        let mut data = set("a", "1").encode_frame().unwrap();
        data.extend_from_slice(&LogRecord::Commit { ops: 2 }.encode_frame().unwrap());

        let result = log_over(data).recover();
        assert!(matches!(result, Err(EngineError::LogCorruption { .. })));
    }

    #[test]
    fn failed_append_is_cut_back() {
        let (mut log, faults) = failing_log();
        log.append_batch(&[set("a", "1")]).unwrap();
        let committed = log.size().unwrap();

        faults.append.store(true, Ordering::SeqCst);
        assert!(log.append_batch(&[set("b", "2")]).is_err());
        assert_eq!(log.size().unwrap(), committed);

        faults.append.store(false, Ordering::SeqCst);
        log.append_batch(&[set("c", "3")]).unwrap();
        let mut reopened = log_over(log.backend.read_all().unwrap());
        assert_eq!(
            reopened.recover().unwrap().records,
            vec![set("a", "1"), set("c", "3")]
        );
    }

    #[test]
    fn failed_cut_back_refuses_appends_until_recovered() {
        let (mut log, faults) = failing_log();
        log.append_batch(&[set("a", "1")]).unwrap();
        let committed = log.size().unwrap();

        faults.append.store(true, Ordering::SeqCst);
        faults.truncate.store(true, Ordering::SeqCst);
        assert!(log.append_batch(&[set("b", "2"), set("b2", "2")]).is_err());
        assert!(log.size().unwrap() > committed);

        faults.append.store(false, Ordering::SeqCst);
        faults.truncate.store(false, Ordering::SeqCst);
        let result = log.append_batch(&[set("c", "3")]);
        assert!(matches!(
            result,
            Err(EngineError::LogPoisoned { offset }) if offset == committed
        ));

        // What is on storage still replays.
        let mut reopened = log_over(log.backend.read_all().unwrap());
        assert_eq!(reopened.recover().unwrap().records, vec![set("a", "1")]);

        // Recovery removes the partial batch and lifts the refusal.
        assert_eq!(log.recover().unwrap().records, vec![set("a", "1")]);
        log.append_batch(&[set("c", "3")]).unwrap();
        let mut reopened = log_over(log.backend.read_all().unwrap());
        assert_eq!(
            reopened.recover().unwrap().records,
            vec![set("a", "1"), set("c", "3")]
        );
    }

    #[test]
    fn rewrite_splits_into_batches() {
        let records: Vec<_> = (0..REWRITE_BATCH + 3)
            .map(|i| set(&format!("k{i:05}"), "v"))
            .collect();

        let mut log = log_over(Vec::new());
        log.append_batch(&[set("stale", "x")]).unwrap();
        log.rewrite(&records).unwrap();
        assert_eq!(log.base_size(), log.size().unwrap());

        let commits = LogReader::new(&log.backend.read_all().unwrap())
            .map(Result::unwrap)
            .filter(|(_, r)| matches!(r, LogRecord::Commit { .. }))
            .count();
        assert_eq!(commits, 2);

        let mut reopened = log_over(log.backend.read_all().unwrap());
        assert_eq!(reopened.recover().unwrap().records, records);
    }
}
