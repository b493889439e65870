//! Sequential decoding of log frames.

use super::record::{
    compute_crc32, LogRecord, LogRecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
use crate::error::{EngineError, EngineResult};

/// Iterator over the frames of a loaded log.
///
/// Yields `(offset, record)` pairs.
///
/// # Error Handling
///
/// - A truncated frame (incomplete header or payload) ends iteration cleanly;
///   [`LogReader::offset`] then points at the start of the torn bytes
/// - Bad magic, a future version or an unknown record type is a corruption error
/// - CRC mismatches return [`EngineError::ChecksumMismatch`]
pub struct LogReader<'a> {
    data: &'a [u8],
    offset: usize,
    finished: bool,
}

impl<'a> LogReader<'a> {
    /// Creates a reader over the raw log bytes.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            finished: false,
        }
    }

    /// Offset just past the last frame successfully decoded.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_next(&mut self) -> EngineResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        let rest = &self.data[start..];

        if rest.len() < HEADER_SIZE {
            return Ok(None);
        }

        if rest[0..4] != LOG_MAGIC {
            return Err(EngineError::log_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version > LOG_VERSION {
            return Err(EngineError::log_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = rest[6];
        let record_type = LogRecordType::from_byte(type_byte).ok_or_else(|| {
            EngineError::log_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let payload_len = u32::from_le_bytes([rest[7], rest[8], rest[9], rest[10]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;
        if rest.len() < total_len {
            return Ok(None);
        }

        let payload_end = HEADER_SIZE + payload_len;
        let stored_crc = u32::from_le_bytes([
            rest[payload_end],
            rest[payload_end + 1],
            rest[payload_end + 2],
            rest[payload_end + 3],
        ]);
        let computed_crc = compute_crc32(&rest[..payload_end]);
        if stored_crc != computed_crc {
            return Err(EngineError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let record = LogRecord::decode_payload(record_type, &rest[HEADER_SIZE..payload_end])?;
        self.offset += total_len;

        Ok(Some((start as u64, record)))
    }
}

impl Iterator for LogReader<'_> {
    type Item = EngineResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(records: &[LogRecord]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| r.encode_frame().unwrap())
            .collect()
    }

    #[test]
    fn reads_all_frames_with_offsets() {
        let data = frames(&[
            LogRecord::Delete { key: "a".into() },
            LogRecord::Commit { ops: 1 },
        ]);
        let items: Vec<_> = LogReader::new(&data).map(Result::unwrap).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, 0);
        assert!(items[1].0 > 0);
        assert_eq!(items[1].1, LogRecord::Commit { ops: 1 });
    }

    #[test]
    fn torn_tail_ends_cleanly() {
        let mut data = frames(&[LogRecord::Commit { ops: 0 }]);
        let complete = data.len();
        let torn = LogRecord::Delete { key: "gone".into() }
            .encode_frame()
            .unwrap();
        data.extend_from_slice(&torn[..torn.len() - 2]);

        let mut reader = LogReader::new(&data);
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
        assert_eq!(reader.offset(), complete);
    }

    #[test]
    fn flipped_byte_is_checksum_mismatch() {
        let mut data = frames(&[LogRecord::Delete { key: "abc".into() }]);
        data[HEADER_SIZE + 5] ^= 0xFF;

        let result = LogReader::new(&data).next().unwrap();
        assert!(matches!(result, Err(EngineError::ChecksumMismatch { .. })));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut data = frames(&[LogRecord::Commit { ops: 0 }]);
        data[0] = b'X';

        let result = LogReader::new(&data).next().unwrap();
        assert!(matches!(result, Err(EngineError::LogCorruption { .. })));
    }

    #[test]
    fn future_version_is_corruption() {
        let mut data = frames(&[LogRecord::Commit { ops: 0 }]);
        data[4] = 0xFF;

        let result = LogReader::new(&data).next().unwrap();
        assert!(matches!(result, Err(EngineError::LogCorruption { .. })));
    }

    #[test]
    fn stops_after_error() {
        let mut data = frames(&[LogRecord::Commit { ops: 0 }, LogRecord::Commit { ops: 0 }]);
        data[0] = 0;

        let mut reader = LogReader::new(&data);
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}
