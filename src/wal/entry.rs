//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Frame header: LSN (8) + CRC (4) + length (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// A flushed write batch, applied atomically under one LSN
    Batch { ops: Vec<Operation> },
}

impl Operation {
    /// Number of single-key writes carried by this operation
    pub fn write_count(&self) -> usize {
        match self {
            Operation::Put { .. } | Operation::Delete { .. } => 1,
            Operation::Batch { ops } => ops.iter().map(Operation::write_count).sum(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl WalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self {
            lsn,
            operation,
            timestamp: now_millis(),
        }
    }

    /// Serialize into a complete frame (header + data)
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        let len = u32::try_from(data.len()).map_err(|_| {
            AtlasError::Serialization(format!("WAL entry too large: {} bytes", data.len()))
        })?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Parse one complete frame
    ///
    /// Any truncation, CRC mismatch or header/payload LSN disagreement is
    /// reported as [`AtlasError::WalCorruption`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (lsn, crc, len) = parse_header(bytes)?;
        let data = bytes
            .get(HEADER_SIZE..HEADER_SIZE + len as usize)
            .ok_or_else(|| {
                AtlasError::WalCorruption(format!(
                    "truncated entry: need {} data bytes, have {}",
                    len,
                    bytes.len().saturating_sub(HEADER_SIZE)
                ))
            })?;
        Self::from_payload(lsn, crc, data)
    }

    /// Decode the payload of a frame whose header was already parsed
    pub(crate) fn from_payload(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(data);
        if actual != crc {
            return Err(AtlasError::WalCorruption(format!(
                "CRC mismatch at LSN {}: expected {:#010x}, got {:#010x}",
                lsn, crc, actual
            )));
        }
        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| AtlasError::WalCorruption(format!("undecodable entry: {}", e)))?;
        if entry.lsn != lsn {
            return Err(AtlasError::WalCorruption(format!(
                "LSN mismatch: header {}, payload {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }

    /// Size of the serialized frame in bytes
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + bincode::serialized_size(self)? as usize)
    }

    /// CRC32 of the serialized payload
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(crc32fast::hash(&bincode::serialize(self)?))
    }
}

/// Split a frame header into `(lsn, crc, len)`
pub(crate) fn parse_header(bytes: &[u8]) -> Result<(u64, u32, u32)> {
    let header = bytes.get(..HEADER_SIZE).ok_or_else(|| {
        AtlasError::WalCorruption(format!("header too small: {} bytes", bytes.len()))
    })?;
    let mut lsn = [0u8; 8];
    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    lsn.copy_from_slice(&header[0..8]);
    crc.copy_from_slice(&header[8..12]);
    len.copy_from_slice(&header[12..16]);
    Ok((
        u64::from_le_bytes(lsn),
        u32::from_le_bytes(crc),
        u32::from_le_bytes(len),
    ))
}
