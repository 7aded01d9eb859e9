// ABOUTME: Incremental UTF-8 decoding for strings that arrive in buffer-sized chunks.
// ABOUTME: Holds back at most three bytes of a character split across a chunk boundary.

use crate::error::{Error, Result};

/// Validate and convert bytes to a UTF-8 string.
/// Uses simdutf8 for SIMD-accelerated validation when the feature is enabled,
/// falling back to the std validator to locate the error.
#[cfg(feature = "simd-utf8")]
#[inline]
fn validate(bytes: &[u8]) -> std::result::Result<&str, std::str::Utf8Error> {
    match simdutf8::basic::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(_) => std::str::from_utf8(bytes),
    }
}

#[cfg(not(feature = "simd-utf8"))]
#[inline]
fn validate(bytes: &[u8]) -> std::result::Result<&str, std::str::Utf8Error> {
    std::str::from_utf8(bytes)
}

/// Expected sequence length for a UTF-8 lead byte.
#[inline]
fn sequence_len(lead: u8) -> Option<usize> {
    match lead {
        0xc2..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf4 => Some(4),
        _ => None,
    }
}

/// The undecoded tail of the previous chunk: the leading bytes of a
/// character whose remaining bytes are in the next chunk.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Utf8Carry {
    bytes: [u8; 3],
    len: usize,
}

impl Utf8Carry {
    /// Decode `chunk` onto `out`. `offset` is the absolute stream offset of
    /// the chunk's first byte, used for error reporting.
    pub(crate) fn decode(&mut self, mut chunk: &[u8], mut offset: u64, out: &mut String) -> Result<()> {
        if self.len > 0 {
            let start = offset - self.len as u64;
            let total = sequence_len(self.bytes[0]).ok_or(Error::InvalidUtf8 { offset: start })?;
            let take = (total - self.len).min(chunk.len());

            let mut char_bytes = [0u8; 4];
            char_bytes[..self.len].copy_from_slice(&self.bytes[..self.len]);
            char_bytes[self.len..self.len + take].copy_from_slice(&chunk[..take]);

            if self.len + take < total {
                // Still incomplete: the chunk was shorter than the missing bytes.
                self.bytes[self.len..self.len + take].copy_from_slice(&chunk[..take]);
                self.len += take;
                return Ok(());
            }

            let s = validate(&char_bytes[..total]).map_err(|_| Error::InvalidUtf8 { offset: start })?;
            out.push_str(s);
            self.len = 0;
            chunk = &chunk[take..];
            offset += take as u64;
        }

        match validate(chunk) {
            Ok(s) => out.push_str(s),
            Err(e) => {
                let valid = e.valid_up_to();
                // Only the checked prefix is pushed; from_utf8 guarantees it is valid.
                out.push_str(validate(&chunk[..valid]).map_err(|_| Error::InvalidUtf8 { offset })?);
                let tail = &chunk[valid..];
                match e.error_len() {
                    // A truncated character at the very end of the chunk
                    None if tail.len() <= self.bytes.len() => {
                        self.bytes[..tail.len()].copy_from_slice(tail);
                        self.len = tail.len();
                    }
                    _ => {
                        return Err(Error::InvalidUtf8 {
                            offset: offset + valid as u64,
                        })
                    }
                }
            }
        }
        Ok(())
    }

    /// End of string: a pending partial character is an error.
    pub(crate) fn finish(&mut self, offset: u64) -> Result<()> {
        if self.len > 0 {
            let start = offset - self.len as u64;
            self.len = 0;
            return Err(Error::InvalidUtf8 { offset: start });
        }
        Ok(())
    }
}
