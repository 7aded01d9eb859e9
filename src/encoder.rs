// ABOUTME: Streaming BSON encoder driven by structural and scalar write calls.
// ABOUTME: Reserves each frame's int32 length on entry and backpatches it on exit.

use crate::error::{Error, Result};
use crate::token::{Token, TokenType};
use crate::types::{
    element_type, sort_regex_options, BigNumber, Binary, BinarySubtype, DateTimeKind, DateTimeValue, ObjectId,
};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::io::Write;
use uuid::Uuid;

/// Encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// How instants are normalized before being stored as UTC milliseconds.
    pub date_time_kind_handling: DateTimeKind,
    /// Emit legacy binary subtypes: 0x03 for UUIDs and 0x02 (with its inner
    /// length) for generic binary.
    pub binary_compatibility_mode: bool,
    /// Release the sink when the encoder is closed.
    pub close_output: bool,
    /// End every open container when the encoder is closed.
    pub auto_complete_on_close: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            date_time_kind_handling: DateTimeKind::Utc,
            binary_compatibility_mode: false,
            close_output: true,
            auto_complete_on_close: true,
        }
    }
}

/// An open document or array.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Buffer position of the frame's int32 length placeholder.
    length_pos: usize,
    is_array: bool,
    next_index: usize,
    /// Buffer position of the tag byte reserved by a property name that has
    /// not received its value yet.
    pending_tag: Option<usize>,
}

/// A BSON encoder writing whole root documents to a byte sink.
///
/// Each root document is assembled in an internal buffer so that frame
/// lengths can be backpatched, and is written to the sink as soon as its
/// root frame is ended. Several root documents may be written one after
/// another.
///
/// ```rust
/// use serde_bsonwire::Encoder;
///
/// let mut enc = Encoder::new(Vec::new());
/// enc.write_start_object().unwrap();
/// enc.write_property_name("Blah").unwrap();
/// enc.write_i32(1).unwrap();
/// enc.write_end_object().unwrap();
/// let bytes = enc.finish().unwrap();
/// assert_eq!(bytes[0], 15);
/// ```
pub struct Encoder<W: Write> {
    writer: Option<W>,
    config: EncoderConfig,
    buf: Vec<u8>,
    frames: Vec<Frame>,
    closed: bool,
}

impl<W: Write> Encoder<W> {
    /// Create a new encoder with default options.
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, EncoderConfig::default())
    }

    /// Create a new encoder with the given options.
    pub fn with_config(writer: W, config: EncoderConfig) -> Self {
        Self {
            writer: Some(writer),
            config,
            buf: Vec::new(),
            frames: Vec::new(),
            closed: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// The sink, unless it was released by [`close`](Self::close).
    #[must_use]
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    /// Number of open containers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Consume the encoder and return the sink without completing or
    /// flushing anything. A partially written root document is discarded.
    pub fn into_inner(self) -> Option<W> {
        self.writer
    }

    /// End all open containers, flush, and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.check_open()?;
        while !self.frames.is_empty() {
            self.write_end()?;
        }
        self.flush()?;
        self.writer.take().ok_or(Error::Closed)
    }

    #[inline]
    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Write the tag and name that introduce an element in the current frame.
    /// In an object the name was written by `write_property_name` and only
    /// its reserved tag byte is filled in; in an array the index is
    /// synthesized.
    fn begin_element(&mut self, tag: u8, what: &'static str) -> Result<()> {
        self.check_open()?;
        let Some(frame) = self.frames.last_mut() else {
            return Err(Error::NoRootContainer(what));
        };
        if frame.is_array {
            let index = frame.next_index;
            frame.next_index += 1;
            self.buf.push(tag);
            self.buf.extend_from_slice(index.to_string().as_bytes());
            self.buf.push(0);
        } else {
            let Some(pos) = frame.pending_tag.take() else {
                return Err(Error::InvalidWrite(format!(
                    "{what} was written where a property name was expected"
                )));
            };
            self.buf[pos] = tag;
        }
        Ok(())
    }

    #[inline]
    fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_cstring(&mut self, value: &str) -> Result<()> {
        if memchr::memchr(0, value.as_bytes()).is_some() {
            return Err(Error::NulInCString(value.to_owned()));
        }
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn length_i32(len: usize, what: &str) -> Result<i32> {
        i32::try_from(len).map_err(|_| Error::ValueOutOfRange(format!("{what} of {len} bytes is too long")))
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Begin an object. At the top level this begins a new root document.
    pub fn write_start_object(&mut self) -> Result<()> {
        self.start_frame(false)
    }

    /// Begin an array. At the top level this begins a root array.
    pub fn write_start_array(&mut self) -> Result<()> {
        self.start_frame(true)
    }

    fn start_frame(&mut self, is_array: bool) -> Result<()> {
        self.check_open()?;
        if !self.frames.is_empty() {
            let tag = if is_array { element_type::ARRAY } else { element_type::DOCUMENT };
            self.begin_element(tag, if is_array { "an array" } else { "an object" })?;
        }
        let length_pos = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        tracing::trace!(depth = self.frames.len(), offset = length_pos, is_array, "opened frame");
        self.frames.push(Frame {
            length_pos,
            is_array,
            next_index: 0,
            pending_tag: None,
        });
        Ok(())
    }

    pub fn write_end_object(&mut self) -> Result<()> {
        self.end_frame(Some(false))
    }

    pub fn write_end_array(&mut self) -> Result<()> {
        self.end_frame(Some(true))
    }

    /// End whichever container is innermost.
    pub fn write_end(&mut self) -> Result<()> {
        self.end_frame(None)
    }

    fn end_frame(&mut self, expect_array: Option<bool>) -> Result<()> {
        self.check_open()?;
        let Some(frame) = self.frames.last() else {
            return Err(Error::InvalidWrite("there is no open container to end".into()));
        };
        if let Some(is_array) = expect_array {
            if frame.is_array != is_array {
                let (open, asked) = if frame.is_array { ("an array", "object") } else { ("an object", "array") };
                return Err(Error::InvalidWrite(format!("cannot end an {asked} while {open} is open")));
            }
        }
        if frame.pending_tag.is_some() {
            self.write_null()?;
        }
        let Some(frame) = self.frames.pop() else {
            return Err(Error::InvalidWrite("there is no open container to end".into()));
        };

        self.buf.push(element_type::END);
        let length = Self::length_i32(self.buf.len() - frame.length_pos, "document")?;
        self.buf[frame.length_pos..frame.length_pos + 4].copy_from_slice(&length.to_le_bytes());
        tracing::trace!(depth = self.frames.len(), offset = frame.length_pos, length, "closed frame");

        if self.frames.is_empty() {
            self.flush_root()?;
        }
        Ok(())
    }

    /// Hand a completed root document to the sink.
    fn flush_root(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(&self.buf)?;
        }
        tracing::trace!(length = self.buf.len(), "flushed root document");
        self.buf.clear();
        Ok(())
    }

    /// Write the name of the next property of the current object.
    pub fn write_property_name(&mut self, name: &str) -> Result<()> {
        self.check_open()?;
        let Some(frame) = self.frames.last() else {
            return Err(Error::NoRootContainer("a property name"));
        };
        if frame.is_array {
            return Err(Error::InvalidWrite(format!(
                "property name {name:?} written inside an array"
            )));
        }
        if frame.pending_tag.is_some() {
            return Err(Error::InvalidWrite(format!(
                "property name {name:?} written while the previous property has no value"
            )));
        }
        let pos = self.buf.len();
        self.buf.push(element_type::NULL);
        if let Err(e) = self.put_cstring(name) {
            self.buf.truncate(pos);
            return Err(e);
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.pending_tag = Some(pos);
        }
        Ok(())
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    /// Write any scalar value. The element type follows from the variant.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_null(),
            Value::Undefined => self.write_undefined(),
            Value::Boolean(b) => self.write_bool(*b),
            Value::Int32(n) => self.write_i32(*n),
            Value::Int64(n) => self.write_i64(*n),
            Value::UInt64(n) => self.write_u64(*n),
            Value::BigInteger(n) => self.write_i128(*n),
            Value::Double(f) => self.write_f64(*f),
            Value::Decimal(bn) => self.write_decimal(bn),
            Value::String(s) => self.write_str(s),
            Value::Binary(b) => self.write_binary(b),
            Value::Uuid(u) => self.write_uuid(u),
            Value::ObjectId(oid) => self.write_object_id(oid),
            Value::DateTime(dt) => self.write_date_time(dt),
            Value::Regex(re) => self.write_regex(&re.pattern, &re.options),
        }
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.begin_element(element_type::NULL, "null")
    }

    /// Write the deprecated Undefined element.
    pub fn write_undefined(&mut self) -> Result<()> {
        self.begin_element(element_type::UNDEFINED, "undefined")
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.begin_element(element_type::BOOLEAN, "a boolean")?;
        self.buf.push(u8::from(value));
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.begin_element(element_type::INT32, "an integer")?;
        self.put_i32(value);
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.begin_element(element_type::INT64, "an integer")?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_i64(i64::from(value))
    }

    /// Values above `i64::MAX` are written as Double.
    #[allow(clippy::cast_precision_loss)]
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        match i64::try_from(value) {
            Ok(n) => self.write_i64(n),
            Err(_) => self.write_f64(value as f64),
        }
    }

    /// Values that fit in 64 bits are written as Int64, larger ones as
    /// generic binary holding their minimal two's-complement bytes.
    pub fn write_i128(&mut self, value: i128) -> Result<()> {
        match i64::try_from(value) {
            Ok(n) => self.write_i64(n),
            Err(_) => self.write_binary_parts(BinarySubtype::Generic, &twos_complement_le(value)),
        }
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_f64(f64::from(value))
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.begin_element(element_type::DOUBLE, "a float")?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Decimals are narrowed to Double.
    pub fn write_decimal(&mut self, value: &BigNumber) -> Result<()> {
        self.write_f64(value.to_f64())
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let length = Self::length_i32(value.len() + 1, "string")?;
        self.begin_element(element_type::STRING, "a string")?;
        self.put_i32(length);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    pub fn write_char(&mut self, value: char) -> Result<()> {
        let mut tmp = [0u8; 4];
        self.write_str(value.encode_utf8(&mut tmp))
    }

    /// Write generic binary.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_binary_parts(BinarySubtype::Generic, bytes)
    }

    pub fn write_binary(&mut self, binary: &Binary) -> Result<()> {
        self.write_binary_parts(binary.subtype, &binary.bytes)
    }

    fn write_binary_parts(&mut self, subtype: BinarySubtype, bytes: &[u8]) -> Result<()> {
        let legacy = match subtype {
            BinarySubtype::BinaryOld => true,
            BinarySubtype::Generic => self.config.binary_compatibility_mode,
            _ => false,
        };
        if legacy {
            let inner = Self::length_i32(bytes.len(), "binary")?;
            let outer = Self::length_i32(bytes.len() + 4, "binary")?;
            self.begin_element(element_type::BINARY, "binary")?;
            tracing::debug!(length = bytes.len(), "writing legacy binary subtype 0x02");
            self.put_i32(outer);
            self.buf.push(u8::from(BinarySubtype::BinaryOld));
            self.put_i32(inner);
        } else {
            let length = Self::length_i32(bytes.len(), "binary")?;
            self.begin_element(element_type::BINARY, "binary")?;
            self.put_i32(length);
            self.buf.push(u8::from(subtype));
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a UUID as binary subtype 0x04, or 0x03 with the legacy byte
    /// order in compatibility mode.
    pub fn write_uuid(&mut self, uuid: &Uuid) -> Result<()> {
        self.begin_element(element_type::BINARY, "a UUID")?;
        self.put_i32(16);
        if self.config.binary_compatibility_mode {
            tracing::debug!(%uuid, "writing legacy UUID subtype 0x03");
            self.buf.push(u8::from(BinarySubtype::UuidOld));
            self.buf.extend_from_slice(&uuid.to_bytes_le());
        } else {
            self.buf.push(u8::from(BinarySubtype::Uuid));
            self.buf.extend_from_slice(uuid.as_bytes());
        }
        Ok(())
    }

    pub fn write_object_id(&mut self, oid: &ObjectId) -> Result<()> {
        self.begin_element(element_type::OBJECT_ID, "an object id")?;
        self.buf.extend_from_slice(&oid.bytes());
        Ok(())
    }

    /// Write a regular expression as two CStrings. The option characters are
    /// sorted alphabetically.
    pub fn write_regex(&mut self, pattern: &str, options: &str) -> Result<()> {
        for part in [pattern, options] {
            if memchr::memchr(0, part.as_bytes()).is_some() {
                return Err(Error::NulInCString(part.to_owned()));
            }
        }
        let sorted = sort_regex_options(options);

        self.begin_element(element_type::REGEX, "a regex")?;
        self.put_cstring(pattern)?;
        self.put_cstring(&sorted)
    }

    /// Write an instant as UTC milliseconds, normalized according to the
    /// configured date-time kind handling.
    pub fn write_date_time(&mut self, value: &DateTimeValue) -> Result<()> {
        let millis = value
            .to_millis(self.config.date_time_kind_handling)
            .ok_or_else(|| Error::ValueOutOfRange(format!("{value} has no UTC instant")))?;
        self.begin_element(element_type::UTC_DATE_TIME, "a date")?;
        self.buf.extend_from_slice(&millis.to_le_bytes());
        Ok(())
    }

    // =========================================================================
    // Tokens BSON cannot carry
    // =========================================================================

    pub fn write_comment(&mut self, _text: &str) -> Result<()> {
        Err(Error::UnsupportedToken(TokenType::Comment))
    }

    pub fn write_raw(&mut self, _raw: &str) -> Result<()> {
        Err(Error::UnsupportedToken(TokenType::Raw))
    }

    pub fn write_start_constructor(&mut self, _name: &str) -> Result<()> {
        Err(Error::UnsupportedToken(TokenType::StartConstructor))
    }

    pub fn write_end_constructor(&mut self) -> Result<()> {
        Err(Error::UnsupportedToken(TokenType::EndConstructor))
    }

    /// Write any token.
    pub fn write_token(&mut self, token: &Token) -> Result<()> {
        match token {
            Token::None => Ok(()),
            Token::StartObject => self.write_start_object(),
            Token::EndObject => self.write_end_object(),
            Token::StartArray => self.write_start_array(),
            Token::EndArray => self.write_end_array(),
            Token::PropertyName(name) => self.write_property_name(name),
            Token::Value(value) => self.write_value(value),
            Token::Comment(text) => self.write_comment(text),
            Token::Raw(raw) => self.write_raw(raw),
            Token::StartConstructor(name) => self.write_start_constructor(name),
            Token::EndConstructor => self.write_end_constructor(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush the sink. A root document that is still open stays buffered
    /// until it is ended.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Close the encoder. Open containers are ended when
    /// `auto_complete_on_close` is set and discarded otherwise; the sink is
    /// flushed and, with `close_output`, released. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.config.auto_complete_on_close {
            while !self.frames.is_empty() {
                self.write_end()?;
            }
        } else {
            self.frames.clear();
            self.buf.clear();
        }
        self.flush()?;
        if self.config.close_output {
            self.writer = None;
        }
        self.closed = true;
        Ok(())
    }
}

/// Minimal little-endian two's-complement bytes of `value`.
fn twos_complement_le(value: i128) -> Vec<u8> {
    let mut bytes = value.to_le_bytes().to_vec();
    while bytes.len() > 1 {
        let last = bytes[bytes.len() - 1];
        let next_sign = bytes[bytes.len() - 2] & 0x80;
        let redundant = (last == 0x00 && next_sign == 0) || (last == 0xff && next_sign != 0);
        if !redundant {
            break;
        }
        bytes.pop();
    }
    bytes
}
