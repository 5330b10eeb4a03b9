//! Buffer primitives
//!
//! Fixed-width, varint and length-prefixed reads over a borrowed byte slice,
//! and the matching writers over any [`BufMut`].
//!
//! Every read returns `None` on a short or malformed buffer and leaves the
//! cursor wherever the failure happened; callers abandon the buffer at that
//! point, so the position after a failure is never observed.

use bytes::BufMut;

/// Longest LEB128 encoding of a u64
const MAX_VARINT_LEN: usize = 10;

/// Forward-only cursor over an encoded byte slice
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unconsumed tail
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(out)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn read_fixed_u32(&mut self) -> Option<u32> {
        let b = self.take(4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_fixed_f64(&mut self) -> Option<f64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Some(f64::from_be_bytes(raw))
    }

    pub fn read_var_u64(&mut self) -> Option<u64> {
        let mut result: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            let bits = (byte & 0x7F) as u64;
            // the tenth byte may only carry the top bit of a u64
            if i == MAX_VARINT_LEN - 1 && bits > 1 {
                return None;
            }
            result |= bits << (7 * i);
            if byte & 0x80 == 0 {
                return Some(result);
            }
        }
        None
    }

    pub fn read_var_i64(&mut self) -> Option<i64> {
        self.read_var_u64().map(zigzag_decode)
    }

    /// Read a varint length followed by that many bytes
    pub fn read_var_slice(&mut self) -> Option<&'a [u8]> {
        let len = self.read_var_u64()?;
        if len > u32::MAX as u64 {
            return None;
        }
        self.take(len as usize)
    }
}

// =============================================================================
// Writers
// =============================================================================

pub fn write_fixed_u32<B: BufMut>(buf: &mut B, value: u32) {
    buf.put_u32(value);
}

pub fn write_fixed_f64<B: BufMut>(buf: &mut B, value: f64) {
    buf.put_f64(value);
}

pub fn write_var_u64<B: BufMut>(buf: &mut B, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn write_var_i64<B: BufMut>(buf: &mut B, value: i64) {
    write_var_u64(buf, zigzag_encode(value));
}

pub fn write_var_slice<B: BufMut>(buf: &mut B, data: &[u8]) {
    write_var_u64(buf, data.len() as u64);
    buf.put_slice(data);
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
