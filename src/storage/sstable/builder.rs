//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};

use super::{Checkpoint, HEADER_SIZE, MAGIC, VERSION};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Number of entries written
    entry_count: u64,
    /// Bytes written to the data block
    data_len: u64,
    /// Sequence number recorded in the header
    last_seq: u64,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create a new SSTable builder
    ///
    /// Writes header immediately; call `add()` in comparator order, then
    /// `finish()` to write the footer.
    pub fn new(path: &Path, last_seq: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Write header (entry_count placeholder, will be updated in finish)
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;
        writer.write_all(&last_seq.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            entry_count: 0,
            data_len: 0,
            last_seq,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a key-value pair (must be called in comparator order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key_len = u32::try_from(key.len())
            .map_err(|_| AtlasError::Storage(format!("key too large: {} bytes", key.len())))?;
        let val_len = u32::try_from(value.len())
            .map_err(|_| AtlasError::Storage(format!("value too large: {} bytes", value.len())))?;

        let key_len_bytes = key_len.to_le_bytes();
        let val_len_bytes = val_len.to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;
        self.writer.write_all(value)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);
        self.data_hasher.update(value);

        self.data_len += 8 + key.len() as u64 + value.len() as u64;
        self.entry_count += 1;
        Ok(())
    }

    /// Finish building: write footer, patch the entry count and fsync
    ///
    /// The returned metadata carries id 0; the caller assigns the real id.
    pub fn finish(mut self) -> Result<Checkpoint> {
        let data_crc = self.data_hasher.finalize();

        // Write footer: data_len (8) + data_crc (4) + padding (4)
        self.writer.write_all(&self.data_len.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| AtlasError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();
        debug_assert_eq!(file_size, HEADER_SIZE + self.data_len + super::FOOTER_SIZE);

        Ok(Checkpoint {
            id: 0,
            path: self.path,
            entry_count: self.entry_count,
            last_seq: self.last_seq,
            file_size,
        })
    }
}
