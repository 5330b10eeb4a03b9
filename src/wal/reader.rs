//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::entry::parse_header;
use super::{WalEntry, HEADER_SIZE};
use crate::error::{AtlasError, Result};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset just past the last complete, valid frame
    position: u64,
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Offset of the end of the last valid frame read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file. A partial frame or a frame
    /// that fails validation is a [`AtlasError::WalCorruption`].
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let got = read_full(&mut self.reader, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_SIZE {
            return Err(AtlasError::WalCorruption(format!(
                "partial header at offset {}: {} of {} bytes",
                self.position, got, HEADER_SIZE
            )));
        }

        let (lsn, crc, len) = parse_header(&header)?;
        let available = self.file_len.saturating_sub(self.position + HEADER_SIZE as u64);
        if len as u64 > available {
            return Err(AtlasError::WalCorruption(format!(
                "partial entry at offset {}: need {} data bytes, have {}",
                self.position, len, available
            )));
        }

        let mut data = vec![0u8; len as usize];
        let got = read_full(&mut self.reader, &mut data)?;
        if got < data.len() {
            return Err(AtlasError::WalCorruption(format!(
                "partial entry at offset {}: {} of {} data bytes",
                self.position, got, len
            )));
        }

        let entry = WalEntry::from_payload(lsn, crc, &data)?;
        self.position += (HEADER_SIZE + data.len()) as u64;
        Ok(Some(entry))
    }

    /// Iterate over all valid entries, stopping after the first error
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Fill `buf` as far as the stream allows, returning the bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
