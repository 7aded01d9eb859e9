// ABOUTME: Buffered byte source for the decoder with absolute offset tracking.
// ABOUTME: Strings are decoded fill by fill through the UTF-8 carry-over.

use crate::error::{Error, Result};
use crate::utf8::Utf8Carry;
use std::io::{ErrorKind, Read};

/// Upper bound on up-front allocation for length-prefixed payloads, so a
/// corrupt length cannot trigger a huge allocation before EOF is noticed.
const MAX_PREALLOC: usize = 64 * 1024;

/// Pulls bytes from a reader through a fixed-size fill buffer.
pub(crate) struct Source<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
    /// Absolute stream offset of `buf[pos]`.
    offset: u64,
    carry: Utf8Carry,
}

impl<R: Read> Source<R> {
    pub(crate) fn new(inner: R, buffer_size: usize) -> Self {
        Self {
            inner,
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            offset: 0,
            carry: Utf8Carry::default(),
        }
    }

    /// Absolute offset of the next unread byte.
    #[inline]
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn get_ref(&self) -> &R {
        &self.inner
    }

    pub(crate) fn into_inner(self) -> R {
        self.inner
    }

    /// Make at least one byte available. Returns false at end of stream.
    fn ensure(&mut self) -> Result<bool> {
        if self.pos < self.filled {
            return Ok(true);
        }
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.pos = 0;
                    self.filled = n;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    #[inline]
    fn advance(&mut self, n: usize) {
        self.pos += n;
        self.offset += n as u64;
    }

    #[inline]
    fn eof(&self) -> Error {
        Error::UnexpectedEof {
            offset: self.offset,
        }
    }

    /// True when no further bytes can be read.
    pub(crate) fn at_eof(&mut self) -> Result<bool> {
        Ok(!self.ensure()?)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        if !self.ensure()? {
            return Err(self.eof());
        }
        let byte = self.buf[self.pos];
        self.advance(1);
        Ok(byte)
    }

    fn read_into(&mut self, out: &mut [u8]) -> Result<()> {
        let mut done = 0;
        while done < out.len() {
            if !self.ensure()? {
                return Err(self.eof());
            }
            let n = (out.len() - done).min(self.filled - self.pos);
            out[done..done + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.advance(n);
            done += n;
        }
        Ok(())
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.read_into(&mut out)?;
        Ok(out)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len.min(MAX_PREALLOC));
        let mut remaining = len;
        while remaining > 0 {
            if !self.ensure()? {
                return Err(self.eof());
            }
            let n = remaining.min(self.filled - self.pos);
            out.extend_from_slice(&self.buf[self.pos..self.pos + n]);
            self.advance(n);
            remaining -= n;
        }
        Ok(out)
    }

    /// Discard `len` bytes.
    pub(crate) fn skip(&mut self, len: u64) -> Result<()> {
        let mut remaining = len;
        while remaining > 0 {
            if !self.ensure()? {
                return Err(self.eof());
            }
            let available = (self.filled - self.pos) as u64;
            let n = remaining.min(available) as usize;
            self.advance(n);
            remaining -= n as u64;
        }
        Ok(())
    }

    /// Discard a NUL-terminated name without decoding it.
    pub(crate) fn skip_cstring(&mut self) -> Result<()> {
        loop {
            if !self.ensure()? {
                return Err(self.eof());
            }
            match memchr::memchr(0, &self.buf[self.pos..self.filled]) {
                Some(i) => {
                    self.advance(i + 1);
                    return Ok(());
                }
                None => self.advance(self.filled - self.pos),
            }
        }
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator.
    pub(crate) fn read_cstring(&mut self) -> Result<String> {
        self.carry = Utf8Carry::default();
        let mut out = String::new();
        loop {
            if !self.ensure()? {
                return Err(self.eof());
            }
            let found = memchr::memchr(0, &self.buf[self.pos..self.filled]);
            let end = found.map_or(self.filled, |i| self.pos + i);
            self.carry
                .decode(&self.buf[self.pos..end], self.offset, &mut out)?;
            self.advance(end - self.pos);
            if found.is_some() {
                self.carry.finish(self.offset)?;
                self.advance(1);
                return Ok(out);
            }
        }
    }

    /// Read exactly `len` bytes of UTF-8.
    pub(crate) fn read_string(&mut self, len: usize) -> Result<String> {
        self.carry = Utf8Carry::default();
        let mut out = String::with_capacity(len.min(MAX_PREALLOC));
        let mut remaining = len;
        while remaining > 0 {
            if !self.ensure()? {
                return Err(self.eof());
            }
            let n = remaining.min(self.filled - self.pos);
            self.carry
                .decode(&self.buf[self.pos..self.pos + n], self.offset, &mut out)?;
            self.advance(n);
            remaining -= n;
        }
        debug_assert!(remaining == 0);
        self.carry.finish(self.offset)?;
        Ok(out)
    }
}

/// A reader that hands out at most `step` bytes per call, for exercising
/// buffer boundaries.
#[cfg(test)]
pub(crate) struct Trickle<'a> {
    data: &'a [u8],
    step: usize,
}

#[cfg(test)]
impl<'a> Trickle<'a> {
    pub(crate) fn new(data: &'a [u8], step: usize) -> Self {
        Self {
            data,
            step: step.max(1),
        }
    }
}

#[cfg(test)]
impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_across_fills() {
        let mut data = Vec::new();
        data.extend_from_slice(&(-5i32).to_le_bytes());
        data.extend_from_slice(&(1i64 << 40).to_le_bytes());
        data.extend_from_slice(&2.5f64.to_le_bytes());
        let mut src = Source::new(&data[..], 3);
        assert_eq!(src.read_i32().unwrap(), -5);
        assert_eq!(src.read_i64().unwrap(), 1 << 40);
        assert_eq!(src.read_f64().unwrap(), 2.5);
        assert_eq!(src.offset(), 20);
        assert!(src.at_eof().unwrap());
        assert_eq!(src.read_u8(), Err(Error::UnexpectedEof { offset: 20 }));
    }

    #[test]
    fn test_cstring_split_at_every_offset() {
        let text = "k\u{e9}y\u{20ac}\u{1f600}";
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        data.push(0x7f);
        for size in 1..=data.len() {
            let mut src = Source::new(&data[..], size);
            assert_eq!(src.read_cstring().unwrap(), text, "buffer size {size}");
            assert_eq!(src.read_u8().unwrap(), 0x7f);
        }
    }

    #[test]
    fn test_sized_string_through_trickle() {
        let text = "\u{1f600}ab\u{20ac}";
        for step in 1..=4 {
            let mut src = Source::new(Trickle::new(text.as_bytes(), step), 128);
            assert_eq!(src.read_string(text.len()).unwrap(), text, "step {step}");
        }
    }

    #[test]
    fn test_unterminated_cstring() {
        let mut src = Source::new(&b"abc"[..], 2);
        assert_eq!(src.read_cstring(), Err(Error::UnexpectedEof { offset: 3 }));
    }

    #[test]
    fn test_skip_and_bytes() {
        let data = b"name\0\x01\x02\x03\x04";
        let mut src = Source::new(&data[..], 2);
        src.skip_cstring().unwrap();
        assert_eq!(src.offset(), 5);
        src.skip(1).unwrap();
        assert_eq!(src.read_bytes(3).unwrap(), vec![2, 3, 4]);
        assert_eq!(src.skip(1), Err(Error::UnexpectedEof { offset: 9 }));
    }
}
