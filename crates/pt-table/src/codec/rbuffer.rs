//! Cursor-based reader for the big-endian table layout.

use pt_core::{Error, Result};

/// A cursor over a byte slice. Every read is bounds-checked and reports
/// truncation as [`Error::CorruptTable`].
pub struct RBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RBuffer<'a> {
    /// Create a new reader over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Remaining bytes from current position.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Read a sub-slice of `n` bytes, advancing the cursor.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read a big-endian u64.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Read a big-endian f64, bit-exact.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Read a length-prefixed (u32) UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::CorruptTable(format!("invalid UTF-8 string at offset {}", self.pos - len)))
    }

    /// Read `n` big-endian f64 values into a Vec.
    ///
    /// Checks the length against the remaining input before allocating.
    pub fn read_array_f64(&mut self, n: usize) -> Result<Vec<f64>> {
        self.ensure(n.checked_mul(8).ok_or_else(|| self.underflow(usize::MAX))?)?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_f64()?);
        }
        Ok(out)
    }

    // ── internal ────────────────────────────────────────────────

    fn ensure(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(self.underflow(n));
        }
        Ok(())
    }

    fn underflow(&self, need: usize) -> Error {
        Error::CorruptTable(format!(
            "truncated at offset {}: need {} bytes, have {}",
            self.pos,
            need,
            self.remaining()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_primitives() {
        // u32 big-endian: 0x01020304 = 16909060
        let data = [0x01, 0x02, 0x03, 0x04, 0x40, 0x09, 0x21, 0xfb, 0x54, 0x44, 0x2d, 0x18];
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(r.read_f64().unwrap(), std::f64::consts::PI);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn read_string() {
        let data = [0, 0, 0, 3, b'a', b'b', b'c'];
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_string().unwrap(), "abc");
        assert_eq!(r.pos(), 7);
    }

    #[test]
    fn truncation_is_corrupt() {
        let mut r = RBuffer::new(&[0, 0, 0, 9, b'a']);
        assert!(matches!(r.read_string(), Err(Error::CorruptTable(_))));
        let mut r = RBuffer::new(&[1, 2, 3]);
        assert!(matches!(r.read_u32(), Err(Error::CorruptTable(_))));
        let mut r = RBuffer::new(&[0; 16]);
        assert!(r.read_array_f64(3).is_err());
        assert!(r.read_array_f64(usize::MAX).is_err());
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let mut r = RBuffer::new(&[0, 0, 0, 2, 0xff, 0xfe]);
        assert!(matches!(r.read_string(), Err(Error::CorruptTable(_))));
    }
}
