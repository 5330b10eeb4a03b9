//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::{AtlasError, Result};

use super::{le_u32, HEADER_SIZE};

/// Iterator over SSTable entries in comparator order
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    /// Stop reading when we reach this offset (end of data block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
    expected_crc: u32,
    hasher: crc32fast::Hasher,
    finished: bool,
}

impl<'a> SSTableIterator<'a> {
    /// Create a new iterator starting from the data block
    pub(super) fn new(file: &'a mut BufReader<File>, data_len: u64, crc: u32) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end_offset: HEADER_SIZE + data_len,
            current_offset: HEADER_SIZE,
            expected_crc: crc,
            hasher: crc32fast::Hasher::new(),
            finished: false,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;
        let key_len = le_u32(&header[0..4]) as u64;
        let val_len = le_u32(&header[4..8]) as u64;

        let entry_size = 8 + key_len + val_len;
        if self.current_offset + entry_size > self.end_offset {
            return Err(AtlasError::Storage(format!(
                "SSTable entry at offset {} overruns the data block",
                self.current_offset
            )));
        }

        let mut key = vec![0u8; key_len as usize];
        self.file.read_exact(&mut key)?;
        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;

        self.hasher.update(&header);
        self.hasher.update(&key);
        self.hasher.update(&value);
        self.current_offset += entry_size;
        Ok((key, value))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.current_offset >= self.end_offset {
            self.finished = true;
            let actual = self.hasher.clone().finalize();
            if actual != self.expected_crc {
                return Some(Err(AtlasError::Storage(format!(
                    "SSTable data CRC mismatch: expected {:#010x}, got {:#010x}",
                    self.expected_crc, actual
                ))));
            }
            return None;
        }

        match self.read_entry() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
