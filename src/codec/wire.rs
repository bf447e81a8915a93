//! Little-endian primitive reader/writer used by the record codec
//!
//! All numeric fields are fixed width. Strings come in two flavours: the
//! record name uses a one-byte length prefix, everything else (bookmark
//! names, item identifiers) is NUL-terminated.

use std::io::{self, Read, Write};

use crate::types::{Angles, Vec3};

/// Upper bound for NUL-terminated strings, so a corrupt file cannot make us
/// read the whole remaining stream into one string.
const MAX_CSTR_LEN: usize = 4096;

/// Truncate `s` to at most `max` bytes without splitting a UTF-8 sequence
pub(crate) fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub(crate) struct WireWriter<W: Write> {
    inner: W,
}

impl<W: Write> WireWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn u8(&mut self, v: u8) -> io::Result<()> {
        self.inner.write_all(&[v])
    }

    pub fn u32(&mut self, v: u32) -> io::Result<()> {
        self.inner.write_all(&v.to_le_bytes())
    }

    pub fn i32(&mut self, v: i32) -> io::Result<()> {
        self.inner.write_all(&v.to_le_bytes())
    }

    pub fn u64(&mut self, v: u64) -> io::Result<()> {
        self.inner.write_all(&v.to_le_bytes())
    }

    pub fn f32(&mut self, v: f32) -> io::Result<()> {
        self.inner.write_all(&v.to_le_bytes())
    }

    pub fn vec3(&mut self, v: Vec3) -> io::Result<()> {
        self.f32(v.x)?;
        self.f32(v.y)?;
        self.f32(v.z)
    }

    /// Pitch and yaw only
    pub fn angles2(&mut self, a: Angles) -> io::Result<()> {
        self.f32(a.pitch)?;
        self.f32(a.yaw)
    }

    pub fn angles3(&mut self, a: Angles) -> io::Result<()> {
        self.f32(a.pitch)?;
        self.f32(a.yaw)?;
        self.f32(a.roll)
    }

    /// One-byte length prefix, no terminator
    pub fn prefixed_str(&mut self, s: &str) -> io::Result<()> {
        let s = truncate_utf8(s, u8::MAX as usize);
        self.u8(s.len() as u8)?;
        self.inner.write_all(s.as_bytes())
    }

    /// UTF-8 bytes followed by a single 0x00. Anything after an embedded NUL
    /// would be unreadable, so it is cut off here.
    pub fn cstr(&mut self, s: &str) -> io::Result<()> {
        let bytes = s.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.inner.write_all(&bytes[..end])?;
        self.u8(0)
    }
}

pub(crate) struct WireReader<R: Read> {
    inner: R,
}

impl<R: Read> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn u8(&mut self) -> io::Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> io::Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> io::Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> io::Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn vec3(&mut self) -> io::Result<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn angles2(&mut self) -> io::Result<Angles> {
        Ok(Angles::new(self.f32()?, self.f32()?, 0.0))
    }

    pub fn angles3(&mut self) -> io::Result<Angles> {
        Ok(Angles::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn prefixed_str(&mut self) -> io::Result<String> {
        let len = self.u8()? as usize;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        into_utf8(buf)
    }

    pub fn cstr(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        loop {
            match self.u8()? {
                0 => break,
                b => buf.push(b),
            }
            if buf.len() > MAX_CSTR_LEN {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "unterminated string",
                ));
            }
        }
        into_utf8(buf)
    }
}

fn into_utf8(buf: Vec<u8>) -> io::Result<String> {
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8_respects_char_boundary() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // 'é' is two bytes; cutting after its first byte must back off
        assert_eq!(truncate_utf8("aé", 2), "a");
    }

    #[test]
    fn test_string_encodings_are_asymmetric() {
        let mut w = WireWriter::new(Vec::new());
        w.prefixed_str("ab").unwrap();
        w.cstr("cd").unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes, vec![2, b'a', b'b', b'c', b'd', 0]);

        let mut r = WireReader::new(bytes.as_slice());
        assert_eq!(r.prefixed_str().unwrap(), "ab");
        assert_eq!(r.cstr().unwrap(), "cd");
    }

    #[test]
    fn test_cstr_cuts_embedded_nul() {
        let mut w = WireWriter::new(Vec::new());
        w.cstr("ab\0cd").unwrap();
        assert_eq!(w.into_inner(), vec![b'a', b'b', 0]);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut w = WireWriter::new(Vec::new());
        w.u32(0xDEAD_BEEF).unwrap();
        w.i32(-1).unwrap();
        assert_eq!(
            w.into_inner(),
            vec![0xEF, 0xBE, 0xAD, 0xDE, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_unterminated_cstr_is_an_error() {
        let bytes = vec![b'x'; MAX_CSTR_LEN + 10];
        let mut r = WireReader::new(bytes.as_slice());
        assert_eq!(r.cstr().unwrap_err().kind(), io::ErrorKind::InvalidData);

        let mut r = WireReader::new(&b"abc"[..]);
        assert_eq!(r.cstr().unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}
