use std::io::Cursor;

use binrw::{BinRead, NullString, NullWideString};

use crate::Guid;

/// Address size of the process that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub const fn bytes(self) -> usize {
        match self {
            PointerWidth::Bits32 => 4,
            PointerWidth::Bits64 => 8,
        }
    }

    /// Bytes an address field occupies beyond the 4 a 32-bit capture uses.
    pub const fn extra(self) -> usize {
        self.bytes() - 4
    }
}

impl Default for PointerWidth {
    fn default() -> Self {
        PointerWidth::Bits64
    }
}

/// An immutable view over one event payload.
///
/// Reads are little-endian at caller-supplied byte offsets. Nothing is
/// decoded up front. Reading past the end of the payload is a bug in the
/// caller: debug builds assert, release builds zero-fill the missing bytes
/// so a malformed capture cannot bring the reader down.
#[derive(Clone, Copy)]
pub struct RawRecord<'a> {
    data: &'a [u8],
    version: u8,
    pointer_width: PointerWidth,
}

impl<'a> RawRecord<'a> {
    pub fn new(data: &'a [u8], version: u8, pointer_width: PointerWidth) -> Self {
        Self {
            data,
            version,
            pointer_width,
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn pointer_width(&self) -> PointerWidth {
        self.pointer_width
    }

    /// True if `size` bytes starting at `offset` lie inside the payload.
    pub fn contains(&self, offset: usize, size: usize) -> bool {
        offset
            .checked_add(size)
            .map_or(false, |end| end <= self.data.len())
    }

    /// Slides a 32-bit layout offset right by 4 bytes for every preceding
    /// pointer-sized field when the capture is 64-bit.
    pub fn host_offset(&self, base: usize, pointer_fields: usize) -> usize {
        base + pointer_fields * self.pointer_width.extra()
    }

    fn fixed<const N: usize>(&self, offset: usize) -> [u8; N] {
        debug_assert!(
            self.contains(offset, N),
            "read of {} bytes at offset {} past payload end {}",
            N,
            offset,
            self.data.len()
        );
        let mut out = [0; N];
        if let Some(rest) = self.data.get(offset..) {
            let n = rest.len().min(N);
            out[..n].copy_from_slice(&rest[..n]);
        }
        out
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.fixed::<1>(offset)[0]
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes(self.fixed(offset))
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.fixed(offset))
    }

    pub fn read_i32(&self, offset: usize) -> i32 {
        i32::from_le_bytes(self.fixed(offset))
    }

    pub fn read_u64(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.fixed(offset))
    }

    pub fn read_i64(&self, offset: usize) -> i64 {
        i64::from_le_bytes(self.fixed(offset))
    }

    pub fn read_f64(&self, offset: usize) -> f64 {
        f64::from_le_bytes(self.fixed(offset))
    }

    /// Reads a pointer-sized field, zero-extended to 64 bits.
    pub fn read_address(&self, offset: usize) -> u64 {
        match self.pointer_width {
            PointerWidth::Bits32 => self.read_u32(offset) as u64,
            PointerWidth::Bits64 => self.read_u64(offset),
        }
    }

    pub fn read_guid(&self, offset: usize) -> Guid {
        Guid::from_bytes_le(self.fixed(offset))
    }

    /// Returns up to `len` bytes at `offset`, clamped to the payload.
    pub fn bytes(&self, offset: usize, len: usize) -> &'a [u8] {
        let start = offset.min(self.data.len());
        let end = offset.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }

    /// Offset just past the null-terminated UTF-16 string at `offset`.
    /// An unterminated string runs to the end of the payload.
    pub fn skip_utf16_string(&self, offset: usize) -> usize {
        let mut pos = offset;
        while pos + 2 <= self.data.len() {
            if self.data[pos] == 0 && self.data[pos + 1] == 0 {
                return pos + 2;
            }
            pos += 2;
        }
        self.data.len().max(offset)
    }

    /// Offset just past the null-terminated UTF-8 string at `offset`.
    pub fn skip_utf8_string(&self, offset: usize) -> usize {
        match self.data.get(offset..).and_then(|rest| rest.iter().position(|&b| b == 0)) {
            Some(nul) => offset + nul + 1,
            None => self.data.len().max(offset),
        }
    }

    pub fn read_utf16_string(&self, offset: usize) -> String {
        let Some(rest) = self.data.get(offset..) else {
            return String::new();
        };
        match NullWideString::read_le(&mut Cursor::new(rest)) {
            Ok(s) => String::from_utf16_lossy(&s.0),
            Err(_) => {
                log::debug!("unterminated UTF-16 string at offset {}", offset);
                let units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }

    pub fn read_utf8_string(&self, offset: usize) -> String {
        let Some(rest) = self.data.get(offset..) else {
            return String::new();
        };
        match NullString::read_le(&mut Cursor::new(rest)) {
            Ok(s) => String::from_utf8_lossy(&s.0).into_owned(),
            Err(_) => {
                log::debug!("unterminated UTF-8 string at offset {}", offset);
                String::from_utf8_lossy(rest).into_owned()
            }
        }
    }
}

impl std::fmt::Debug for RawRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawRecord")
            .field("len", &self.data.len())
            .field("version", &self.version)
            .field("pointer_width", &self.pointer_width)
            .finish()
    }
}
