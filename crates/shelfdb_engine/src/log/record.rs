//! Log record types and serialization.

use crate::error::{EngineError, EngineResult};

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"SHLF";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// Header size: magic (4) + version (2) + type (1) + length (4).
pub const HEADER_SIZE: usize = 11;

/// Trailing CRC size.
pub const CRC_SIZE: usize = 4;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Insert or replace a key.
    Set = 1,
    /// Remove a key.
    Delete = 2,
    /// Close a transaction's batch of operations.
    Commit = 3,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Set),
            2 => Some(Self::Delete),
            3 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single entry of the append-only log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Insert or replace a key.
    Set {
        /// Physical key.
        key: String,
        /// Stored value.
        value: String,
        /// Absolute expiration instant in Unix milliseconds.
        expires_at: Option<u64>,
    },

    /// Remove a key.
    Delete {
        /// Physical key.
        key: String,
    },

    /// Marks the preceding `ops` records as one committed transaction.
    Commit {
        /// Number of operations in the transaction.
        ops: u32,
    },
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Set { .. } => LogRecordType::Set,
            Self::Delete { .. } => LogRecordType::Delete,
            Self::Commit { .. } => LogRecordType::Commit,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns an error if a key or value is longer than `u32::MAX` bytes.
    pub fn encode_payload(&self) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::Set {
                key,
                value,
                expires_at,
            } => {
                put_str(&mut buf, key)?;
                put_str(&mut buf, value)?;
                match expires_at {
                    Some(at) => {
                        buf.push(1);
                        buf.extend_from_slice(&at.to_le_bytes());
                    }
                    None => buf.push(0),
                }
            }
            Self::Delete { key } => put_str(&mut buf, key)?,
            Self::Commit { ops } => buf.extend_from_slice(&ops.to_le_bytes()),
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    pub fn decode_payload(record_type: LogRecordType, payload: &[u8]) -> EngineResult<Self> {
        let mut reader = PayloadReader::new(payload);

        let record = match record_type {
            LogRecordType::Set => {
                let key = reader.string()?;
                let value = reader.string()?;
                let expires_at = match reader.u8()? {
                    0 => None,
                    1 => Some(reader.u64()?),
                    flag => {
                        return Err(EngineError::log_corruption(format!(
                            "invalid expiration flag {flag}"
                        )))
                    }
                };
                Self::Set {
                    key,
                    value,
                    expires_at,
                }
            }
            LogRecordType::Delete => Self::Delete {
                key: reader.string()?,
            },
            LogRecordType::Commit => Self::Commit { ops: reader.u32()? },
        };

        reader.finish(record_type)?;
        Ok(record)
    }

    /// Encodes the record with its envelope, ready to be appended.
    ///
    /// ```text
    /// | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn encode_frame(&self) -> EngineResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| EngineError::log_corruption("log record payload too large"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&LOG_MAGIC);
        data.extend_from_slice(&LOG_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> EngineResult<()> {
    let len = u32::try_from(s.len())
        .map_err(|_| EngineError::log_corruption("string longer than 4 GiB"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, cursor: 0 }
    }

    fn take(&mut self, n: usize) -> EngineResult<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(n)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| EngineError::log_corruption("unexpected end of payload"))?;
        let bytes = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> EngineResult<u32> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| EngineError::log_corruption("invalid u32"))?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn u64(&mut self) -> EngineResult<u64> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| EngineError::log_corruption("invalid u64"))?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn string(&mut self) -> EngineResult<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| EngineError::log_corruption("string is not valid UTF-8"))
    }

    fn finish(&self, record_type: LogRecordType) -> EngineResult<()> {
        if self.cursor != self.payload.len() {
            return Err(EngineError::log_corruption(format!(
                "trailing bytes in {record_type:?} record: expected {} bytes, got {}",
                self.cursor,
                self.payload.len()
            )));
        }
        Ok(())
    }
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
