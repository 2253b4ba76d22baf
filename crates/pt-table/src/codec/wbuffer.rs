//! Writer for the big-endian table layout; the exact mirror of [`super::rbuffer::RBuffer`].

/// Growable big-endian output buffer.
#[derive(Debug, Default)]
pub struct WBuffer {
    data: Vec<u8>,
}

impl WBuffer {
    /// Empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity) }
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the writer.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    /// Write a big-endian u16.
    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian u32.
    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian u64.
    pub fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_be_bytes());
    }

    /// Write a big-endian f64, bit-exact.
    pub fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    /// Write a u32 length prefix followed by the UTF-8 bytes.
    pub fn write_string(&mut self, s: &str) {
        self.write_len(s.len());
        self.write_bytes(s.as_bytes());
    }

    /// Write a u32 count followed by the values.
    pub fn write_array_f64(&mut self, values: &[f64]) {
        self.write_len(values.len());
        for &v in values {
            self.write_f64(v);
        }
    }

    /// Write a u32 length. Lengths above `u32::MAX` cannot come from a valid table.
    pub fn write_len(&mut self, len: usize) {
        debug_assert!(u32::try_from(len).is_ok(), "length {len} exceeds u32");
        self.write_u32(len as u32);
    }
}
