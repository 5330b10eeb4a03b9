//! SSTable Reader
//!
//! Opens checkpoint files, validates header and footer, and hands out
//! sequential iterators over the data block.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};

use super::iterator::SSTableIterator;
use super::{le_u16, le_u32, le_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading entries
    pub(super) file: BufReader<File>,
    entry_count: u64,
    last_seq: u64,
    /// Length of the data block
    pub(super) data_len: u64,
    /// Expected CRC32 of the data block
    pub(super) data_crc: u32,
}

impl SSTableReader {
    /// Open an SSTable for reading
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(AtlasError::Storage(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(AtlasError::Storage(format!(
                "Invalid SSTable magic: expected ARDB, got {:?}",
                &header[0..4]
            )));
        }

        let version = le_u16(&header[4..6]);
        if version != VERSION {
            return Err(AtlasError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = le_u64(&header[6..14]);
        let last_seq = le_u64(&header[14..22]);

        // Read footer
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let data_len = le_u64(&footer[0..8]);
        let data_crc = le_u32(&footer[8..12]);
        if data_len != file_size - HEADER_SIZE - FOOTER_SIZE {
            return Err(AtlasError::Storage(format!(
                "SSTable {} data length {} does not match file size {}",
                path.display(),
                data_len,
                file_size
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            entry_count,
            last_seq,
            data_len,
            data_crc,
        })
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Sequence number the image is consistent with
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an iterator over all entries
    ///
    /// The data CRC is checked once the last entry has been read.
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.data_len, self.data_crc)
    }

    /// Read every entry, verifying the data CRC
    pub fn read_all(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let expected = self.entry_count;
        let entries = self.iter()?.collect::<Result<Vec<_>>>()?;
        if entries.len() as u64 != expected {
            return Err(AtlasError::Storage(format!(
                "SSTable {} holds {} entries, header says {}",
                self.path.display(),
                entries.len(),
                expected
            )));
        }
        Ok(entries)
    }
}
