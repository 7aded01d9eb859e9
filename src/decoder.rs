// ABOUTME: Pull-style BSON decoder yielding one token per read() call.
// ABOUTME: Keeps an explicit frame stack and fabricates objects for code-with-scope and DB pointers.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::error::{Error, Result};
use crate::source::Source;
use crate::token::{Token, TokenType};
use crate::types::{
    element_type, BigNumber, Binary, BinarySubtype, DateTimeKind, DateTimeValue, ElementType,
    FloatParseHandling, ObjectId, Regex,
};
use crate::value::{Value, ValueType};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Read;
use uuid::Uuid;

/// Default size of the decoder's fill buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Decoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Treat the root frame as an array: its element names are skipped.
    pub read_root_value_as_array: bool,
    /// After a root document ends, start reading the next one instead of
    /// reporting end of stream.
    pub support_multiple_content: bool,
    /// How decoded instants are tagged.
    pub date_time_kind_handling: DateTimeKind,
    /// Surface Double elements as `Value::Double` or `Value::Decimal`.
    pub float_parse_handling: FloatParseHandling,
    /// Yield regexes as `Value::Regex` instead of a `/pattern/options` string.
    pub raw_regex: bool,
    /// Size of the fill buffer. Values below 1 are treated as 1.
    pub buffer_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            read_root_value_as_array: false,
            support_multiple_content: false,
            date_time_kind_handling: DateTimeKind::Utc,
            float_parse_handling: FloatParseHandling::Double,
            raw_regex: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Object,
    Array,
    /// JavaScript code with scope, surfaced as `{ "$code": .., "$scope": .. }`.
    CodeWithScope,
    /// DB pointer, surfaced as `{ "$ref": .., "$id": .. }`.
    Reference,
}

/// The most recent position within a frame, for path reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Start,
    Name(String),
    Index(usize),
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    /// Absolute offset one past the frame's last byte.
    end: u64,
    position: Position,
}

impl Frame {
    /// Offset that nested content must not extend past: the terminator for
    /// documents and arrays, the block end for code with scope.
    fn limit(&self) -> u64 {
        match self.kind {
            FrameKind::Object | FrameKind::Array => self.end - 1,
            FrameKind::CodeWithScope | FrameKind::Reference => self.end,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CodeStep {
    CodeName,
    Code,
    ScopeName,
    Scope,
    End,
}

#[derive(Debug, Clone)]
enum RefStep {
    RefName(String, ObjectId),
    Ref(String, ObjectId),
    IdName(ObjectId),
    Id(ObjectId),
    End,
}

#[derive(Debug, Clone)]
enum State {
    /// Before a root document.
    Start,
    /// At an element tag or a frame terminator.
    Element,
    /// A property name was returned; its value comes next.
    Value(ElementType),
    CodeWithScope(CodeStep),
    Reference(RefStep),
    Finished,
    /// A format or I/O error occurred.
    Failed,
}

/// A BSON decoder reading tokens from a byte source.
///
/// ```rust
/// use serde_bsonwire::{Decoder, TokenType};
///
/// let bytes = [0x0f, 0, 0, 0, 0x10, b'B', b'l', b'a', b'h', 0, 1, 0, 0, 0, 0];
/// let mut dec = Decoder::new(&bytes[..]);
/// assert_eq!(dec.read().unwrap(), TokenType::StartObject);
/// assert_eq!(dec.read().unwrap(), TokenType::PropertyName);
/// assert_eq!(dec.read_as_int32().unwrap(), Some(1));
/// assert_eq!(dec.read().unwrap(), TokenType::EndObject);
/// assert_eq!(dec.read().unwrap(), TokenType::None);
/// ```
pub struct Decoder<R: Read> {
    source: Source<R>,
    config: DecoderConfig,
    frames: Vec<Frame>,
    state: State,
    token: Token,
}

impl<R: Read> Decoder<R> {
    /// Create a new decoder with default options.
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, DecoderConfig::default())
    }

    /// Create a new decoder with the given options.
    pub fn with_config(reader: R, config: DecoderConfig) -> Self {
        Self {
            source: Source::new(reader, config.buffer_size),
            config,
            frames: Vec::new(),
            state: State::Start,
            token: Token::None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &R {
        self.source.get_ref()
    }

    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    /// Stop decoding. Further reads return `TokenType::None`.
    pub fn close(&mut self) {
        self.frames.clear();
        self.state = State::Finished;
        self.token = Token::None;
    }

    /// The current token.
    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }

    #[must_use]
    pub fn token_type(&self) -> TokenType {
        self.token.token_type()
    }

    /// The scalar value of the current token, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.token.value()
    }

    #[must_use]
    pub fn value_type(&self) -> Option<ValueType> {
        self.value().map(Value::value_type)
    }

    /// Absolute offset of the next unread byte.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.source.offset()
    }

    /// Number of containers enclosing the current token.
    #[must_use]
    pub fn depth(&self) -> usize {
        let open = self.frames.len();
        if self.token_type().is_start() {
            open.saturating_sub(1)
        } else {
            open
        }
    }

    /// The logical path of the current token, such as `a.b[2]`.
    #[must_use]
    pub fn path(&self) -> String {
        let mut path = String::new();
        for frame in &self.frames {
            match &frame.position {
                Position::Start => {}
                Position::Index(i) => {
                    let _ = write!(path, "[{i}]");
                }
                Position::Name(name) => {
                    if name.contains(['.', ' ', '[', ']', '(', ')', '\'', '"']) {
                        let _ = write!(path, "['{}']", name.replace('\'', "\\'"));
                    } else {
                        if !path.is_empty() {
                            path.push('.');
                        }
                        path.push_str(name);
                    }
                }
            }
        }
        path
    }

    /// True when the byte source has nothing left after the current token.
    pub(crate) fn at_end_of_input(&mut self) -> Result<bool> {
        self.source.at_eof()
    }

    /// Advance to the next token and return its type. `TokenType::None`
    /// marks the end of the stream.
    pub fn read(&mut self) -> Result<TokenType> {
        let state = std::mem::replace(&mut self.state, State::Failed);
        let token = match state {
            State::Failed => return Err(Error::Poisoned),
            State::Finished => {
                self.state = State::Finished;
                Token::None
            }
            State::Start => self.read_root()?,
            State::Element => self.read_element()?,
            State::Value(element) => self.read_value(element)?,
            State::CodeWithScope(step) => self.read_code_with_scope(step)?,
            State::Reference(step) => self.read_reference(step)?,
        };
        self.token = token;
        Ok(self.token.token_type())
    }

    /// Skip the current value. On a property name the property's value is
    /// skipped; on a start token everything up to the matching end token.
    pub fn skip(&mut self) -> Result<()> {
        if self.token_type() == TokenType::PropertyName {
            self.read()?;
        }
        if !self.token_type().is_start() {
            return Ok(());
        }
        let depth = self.depth();

        // A document or array that was just opened can be jumped over using
        // its length.
        if let (State::Element, Some(frame)) = (&self.state, self.frames.last()) {
            if matches!(frame.kind, FrameKind::Object | FrameKind::Array) {
                let terminator = frame.end - 1;
                let offset = self.source.offset();
                if let Err(e) = self.source.skip(terminator.saturating_sub(offset)) {
                    self.state = State::Failed;
                    return Err(e);
                }
            }
        }
        loop {
            let token_type = self.read()?;
            if token_type == TokenType::None || (token_type.is_end() && self.depth() == depth) {
                return Ok(());
            }
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn read_root(&mut self) -> Result<Token> {
        if self.source.at_eof()? {
            self.state = State::Finished;
            return Ok(Token::None);
        }
        let kind = if self.config.read_root_value_as_array {
            FrameKind::Array
        } else {
            FrameKind::Object
        };
        let token = self.open_frame(kind, u64::MAX)?;
        self.state = State::Element;
        Ok(token)
    }

    /// Read a frame length and push the frame. `limit` is the offset the
    /// frame must not extend past.
    fn open_frame(&mut self, kind: FrameKind, limit: u64) -> Result<Token> {
        let offset = self.source.offset();
        let length = self.source.read_i32()?;
        let what = if kind == FrameKind::Array { "array" } else { "document" };
        if length < 5 || offset + length as u64 > limit {
            return Err(Error::InvalidLength {
                what,
                length: i64::from(length),
                offset,
            });
        }
        tracing::trace!(depth = self.frames.len(), offset, length, "opened frame");
        self.frames.push(Frame {
            kind,
            end: offset + length as u64,
            position: Position::Start,
        });
        Ok(if kind == FrameKind::Array {
            Token::StartArray
        } else {
            Token::StartObject
        })
    }

    fn close_frame(&mut self) -> Token {
        let kind = self.frames.pop().map(|frame| frame.kind);
        tracing::trace!(depth = self.frames.len(), offset = self.source.offset(), "closed frame");
        self.state = self.state_after_value();
        if kind == Some(FrameKind::Array) {
            Token::EndArray
        } else {
            Token::EndObject
        }
    }

    /// The state that follows a completed value in the innermost frame.
    fn state_after_value(&self) -> State {
        match self.frames.last().map(|frame| frame.kind) {
            Some(FrameKind::Object | FrameKind::Array) => State::Element,
            Some(FrameKind::CodeWithScope) => State::CodeWithScope(CodeStep::End),
            Some(FrameKind::Reference) => State::Reference(RefStep::End),
            None if self.config.support_multiple_content => {
                tracing::debug!(offset = self.source.offset(), "root document finished, expecting another");
                State::Start
            }
            None => {
                tracing::trace!(offset = self.source.offset(), "root document finished");
                State::Finished
            }
        }
    }

    fn set_position(&mut self, position: Position) {
        if let Some(frame) = self.frames.last_mut() {
            frame.position = position;
        }
    }

    fn read_element(&mut self) -> Result<Token> {
        let Some((kind, end)) = self.frames.last().map(|frame| (frame.kind, frame.end)) else {
            return Err(Error::Malformed {
                what: "frame stack",
                offset: self.source.offset(),
            });
        };
        let terminator = end - 1;
        let offset = self.source.offset();
        if offset > terminator {
            return Err(Error::FrameLengthMismatch {
                declared: end,
                actual: offset,
            });
        }

        let tag = self.source.read_u8()?;
        if tag == element_type::END {
            if offset != terminator {
                return Err(Error::FrameLengthMismatch {
                    declared: end,
                    actual: offset + 1,
                });
            }
            return Ok(self.close_frame());
        }
        let element = ElementType::from_u8(tag).ok_or(Error::UnknownElementType { tag, offset })?;

        if kind == FrameKind::Array {
            self.source.skip_cstring()?;
        } else {
            let name = self.source.read_cstring()?;
            if self.source.offset() > terminator {
                return Err(Error::FrameLengthMismatch {
                    declared: end,
                    actual: self.source.offset(),
                });
            }
            self.set_position(Position::Name(name.clone()));
            self.state = State::Value(element);
            return Ok(Token::PropertyName(name));
        }

        if self.source.offset() > terminator {
            return Err(Error::FrameLengthMismatch {
                declared: end,
                actual: self.source.offset(),
            });
        }
        let index = match self.frames.last().map(|frame| &frame.position) {
            Some(Position::Index(i)) => i + 1,
            _ => 0,
        };
        self.set_position(Position::Index(index));
        self.read_value(element)
    }

    // =========================================================================
    // Values
    // =========================================================================

    fn read_value(&mut self, element: ElementType) -> Result<Token> {
        let limit = self.frames.last().map_or(u64::MAX, Frame::limit);
        let value = match element {
            ElementType::Document | ElementType::Array => {
                let kind = if element == ElementType::Array {
                    FrameKind::Array
                } else {
                    FrameKind::Object
                };
                let token = self.open_frame(kind, limit)?;
                self.state = State::Element;
                return Ok(token);
            }
            ElementType::JavaScriptWithScope => return self.open_code_with_scope(limit),
            ElementType::DbPointer => {
                let namespace = self.read_sized_string(limit)?;
                let id = ObjectId::from_bytes(self.source.read_array()?);
                self.frames.push(Frame {
                    kind: FrameKind::Reference,
                    end: self.source.offset(),
                    position: Position::Start,
                });
                self.state = State::Reference(RefStep::RefName(namespace, id));
                return Ok(Token::StartObject);
            }
            ElementType::Double => {
                let f = self.source.read_f64()?;
                match self.config.float_parse_handling {
                    FloatParseHandling::Double => Value::Double(f),
                    FloatParseHandling::Decimal => BigNumber::from_f64(f).map_or(Value::Double(f), Value::Decimal),
                }
            }
            ElementType::String | ElementType::JavaScript | ElementType::Symbol => {
                Value::String(self.read_sized_string(limit)?)
            }
            ElementType::Binary => self.read_binary(limit)?,
            ElementType::Undefined => Value::Undefined,
            ElementType::ObjectId => Value::ObjectId(ObjectId::from_bytes(self.source.read_array()?)),
            ElementType::Boolean => {
                let offset = self.source.offset();
                match self.source.read_u8()? {
                    0 => Value::Boolean(false),
                    1 => Value::Boolean(true),
                    _ => return Err(Error::Malformed { what: "boolean", offset }),
                }
            }
            ElementType::UtcDateTime => {
                let offset = self.source.offset();
                let millis = self.source.read_i64()?;
                let dt = DateTimeValue::from_millis(millis, self.config.date_time_kind_handling)
                    .ok_or(Error::Malformed { what: "date", offset })?;
                Value::DateTime(dt)
            }
            ElementType::Null => Value::Null,
            ElementType::Regex => {
                let pattern = self.source.read_cstring()?;
                let options = self.source.read_cstring()?;
                if self.config.raw_regex {
                    Value::Regex(Regex::new(pattern, options))
                } else {
                    Value::String(format!("/{pattern}/{options}"))
                }
            }
            ElementType::Int32 => Value::Int32(self.source.read_i32()?),
            ElementType::Timestamp | ElementType::Int64 => Value::Int64(self.source.read_i64()?),
        };
        self.state = self.state_after_value();
        Ok(Token::Value(value))
    }

    /// An int32 length (including the trailing NUL), UTF-8 bytes and a NUL.
    fn read_sized_string(&mut self, limit: u64) -> Result<String> {
        let offset = self.source.offset();
        let length = self.source.read_i32()?;
        if length < 1 || offset + 4 + length as u64 > limit {
            return Err(Error::InvalidLength {
                what: "string",
                length: i64::from(length),
                offset,
            });
        }
        let text = self.source.read_string((length - 1) as usize)?;
        let nul_offset = self.source.offset();
        if self.source.read_u8()? != 0 {
            return Err(Error::Malformed {
                what: "string terminator",
                offset: nul_offset,
            });
        }
        Ok(text)
    }

    fn read_binary(&mut self, limit: u64) -> Result<Value> {
        let offset = self.source.offset();
        let length = self.source.read_i32()?;
        if length < 0 || offset + 5 + length as u64 > limit {
            return Err(Error::InvalidLength {
                what: "binary",
                length: i64::from(length),
                offset,
            });
        }
        let subtype = BinarySubtype::from(self.source.read_u8()?);
        Ok(match subtype {
            BinarySubtype::BinaryOld => {
                let inner_offset = self.source.offset();
                let inner = if length >= 4 { self.source.read_i32()? } else { -1 };
                if inner != length - 4 {
                    return Err(Error::InvalidLength {
                        what: "legacy binary",
                        length: i64::from(inner),
                        offset: inner_offset,
                    });
                }
                tracing::debug!(offset, length = inner, "read legacy binary subtype 0x02");
                Value::Binary(Binary::generic(self.source.read_bytes(inner as usize)?))
            }
            BinarySubtype::UuidOld if length == 16 => {
                tracing::debug!(offset, "read legacy UUID subtype 0x03");
                Value::Uuid(Uuid::from_bytes_le(self.source.read_array()?))
            }
            BinarySubtype::Uuid if length == 16 => Value::Uuid(Uuid::from_bytes(self.source.read_array()?)),
            _ => Value::Binary(Binary {
                subtype,
                bytes: self.source.read_bytes(length as usize)?,
            }),
        })
    }

    fn open_code_with_scope(&mut self, limit: u64) -> Result<Token> {
        let offset = self.source.offset();
        let length = self.source.read_i32()?;
        // Smallest block: its length, a one-byte string and an empty document.
        if length < 14 || offset + length as u64 > limit {
            return Err(Error::InvalidLength {
                what: "code with scope",
                length: i64::from(length),
                offset,
            });
        }
        tracing::trace!(depth = self.frames.len(), offset, length, "opened code with scope");
        self.frames.push(Frame {
            kind: FrameKind::CodeWithScope,
            end: offset + length as u64,
            position: Position::Start,
        });
        self.state = State::CodeWithScope(CodeStep::CodeName);
        Ok(Token::StartObject)
    }

    fn read_code_with_scope(&mut self, step: CodeStep) -> Result<Token> {
        let (limit, end) = self
            .frames
            .last()
            .map_or((u64::MAX, u64::MAX), |frame| (frame.limit(), frame.end));
        match step {
            CodeStep::CodeName => {
                self.set_position(Position::Name("$code".into()));
                self.state = State::CodeWithScope(CodeStep::Code);
                Ok(Token::PropertyName("$code".into()))
            }
            CodeStep::Code => {
                let code = self.read_sized_string(limit)?;
                self.state = State::CodeWithScope(CodeStep::ScopeName);
                Ok(Token::Value(Value::String(code)))
            }
            CodeStep::ScopeName => {
                self.set_position(Position::Name("$scope".into()));
                self.state = State::CodeWithScope(CodeStep::Scope);
                Ok(Token::PropertyName("$scope".into()))
            }
            CodeStep::Scope => {
                let token = self.open_frame(FrameKind::Object, limit)?;
                self.state = State::Element;
                Ok(token)
            }
            CodeStep::End => {
                let offset = self.source.offset();
                if offset != end {
                    return Err(Error::FrameLengthMismatch {
                        declared: end,
                        actual: offset,
                    });
                }
                Ok(self.close_frame())
            }
        }
    }

    fn read_reference(&mut self, step: RefStep) -> Result<Token> {
        Ok(match step {
            RefStep::RefName(namespace, id) => {
                self.set_position(Position::Name("$ref".into()));
                self.state = State::Reference(RefStep::Ref(namespace, id));
                Token::PropertyName("$ref".into())
            }
            RefStep::Ref(namespace, id) => {
                self.state = State::Reference(RefStep::IdName(id));
                Token::Value(Value::String(namespace))
            }
            RefStep::IdName(id) => {
                self.set_position(Position::Name("$id".into()));
                self.state = State::Reference(RefStep::Id(id));
                Token::PropertyName("$id".into())
            }
            RefStep::Id(id) => {
                self.state = State::Reference(RefStep::End);
                Token::Value(Value::ObjectId(id))
            }
            RefStep::End => self.close_frame(),
        })
    }

    // =========================================================================
    // Typed reads
    // =========================================================================

    fn conversion(&self, message: String) -> Error {
        Error::conversion(message, self.path())
    }

    /// Read the next token as the input of a typed read. Null, undefined,
    /// end of array and end of stream produce None.
    fn read_content(&mut self, what: &str) -> Result<Option<Value>> {
        let token_type = self.read()?;
        match &self.token {
            Token::None | Token::EndArray | Token::Value(Value::Null | Value::Undefined) => Ok(None),
            Token::Value(value) => Ok(Some(value.clone())),
            _ => Err(self.conversion(format!("Error reading {what}. Unexpected token: {token_type}"))),
        }
    }

    fn read_integer(&mut self, what: &str) -> Result<Option<i128>> {
        let Some(value) = self.read_content(what)? else {
            return Ok(None);
        };
        match &value {
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<i128>()
                .map(Some)
                .map_err(|_| self.conversion(format!("Could not convert string to {what}: {s}"))),
            other => match other.token_type() {
                TokenType::Integer | TokenType::Float => integer_of(other).map(Some).ok_or_else(|| {
                    self.conversion(format!("Could not convert {} to {what}", scalar_text(other)))
                }),
                token_type => Err(self.conversion(format!("Error reading {what}. Unexpected token: {token_type}"))),
            },
        }
    }

    /// Read the next value as an Int32. Strings are parsed and floats
    /// rounded half to even.
    pub fn read_as_int32(&mut self) -> Result<Option<i32>> {
        let Some(n) = self.read_integer("integer")? else {
            return Ok(None);
        };
        let n = i32::try_from(n)
            .map_err(|_| self.conversion(format!("Value {n} is too large or too small for an Int32")))?;
        self.token = Token::Value(Value::Int32(n));
        Ok(Some(n))
    }

    pub fn read_as_int64(&mut self) -> Result<Option<i64>> {
        let Some(n) = self.read_integer("integer")? else {
            return Ok(None);
        };
        let n = i64::try_from(n)
            .map_err(|_| self.conversion(format!("Value {n} is too large or too small for an Int64")))?;
        self.token = Token::Value(Value::Int64(n));
        Ok(Some(n))
    }

    pub fn read_as_double(&mut self) -> Result<Option<f64>> {
        let Some(value) = self.read_content("double")? else {
            return Ok(None);
        };
        let f = match &value {
            Value::String(s) if s.is_empty() => return Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.conversion(format!("Could not convert string to double: {s}")))?,
            other => match other.as_f64() {
                Some(f) => f,
                None => {
                    return Err(self.conversion(format!(
                        "Error reading double. Unexpected token: {}",
                        other.token_type()
                    )))
                }
            },
        };
        self.token = Token::Value(Value::Double(f));
        Ok(Some(f))
    }

    pub fn read_as_decimal(&mut self) -> Result<Option<BigNumber>> {
        let Some(value) = self.read_content("decimal")? else {
            return Ok(None);
        };
        let decimal = match &value {
            Value::String(s) if s.is_empty() => return Ok(None),
            Value::String(s) => BigNumber::parse(s),
            Value::Decimal(bn) => Some(*bn),
            Value::Double(f) => BigNumber::from_f64(*f),
            Value::Int32(n) => Some(BigNumber::from_i64(i64::from(*n))),
            Value::Int64(n) => Some(BigNumber::from_i64(*n)),
            Value::UInt64(n) => Some(BigNumber::from_u64(*n)),
            Value::BigInteger(n) => i64::try_from(*n)
                .map(BigNumber::from_i64)
                .ok()
                .or_else(|| u64::try_from(*n).ok().map(BigNumber::from_u64)),
            other => {
                return Err(self.conversion(format!(
                    "Error reading decimal. Unexpected token: {}",
                    other.token_type()
                )))
            }
        };
        let decimal = decimal
            .ok_or_else(|| self.conversion(format!("Could not convert {} to decimal", scalar_text(&value))))?;
        self.token = Token::Value(Value::Decimal(decimal));
        Ok(Some(decimal))
    }

    pub fn read_as_boolean(&mut self) -> Result<Option<bool>> {
        let Some(value) = self.read_content("boolean")? else {
            return Ok(None);
        };
        let b = match &value {
            Value::Boolean(b) => *b,
            Value::String(s) if s.is_empty() => return Ok(None),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => true,
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => false,
            Value::String(s) => return Err(self.conversion(format!("Could not convert string to boolean: {s}"))),
            other => match other.as_f64() {
                Some(f) => f != 0.0,
                None => {
                    return Err(self.conversion(format!(
                        "Error reading boolean. Unexpected token: {}",
                        other.token_type()
                    )))
                }
            },
        };
        self.token = Token::Value(Value::Boolean(b));
        Ok(Some(b))
    }

    /// Read the next value as text. Every scalar has a textual form; binary
    /// is base64 and object ids are hex.
    pub fn read_as_string(&mut self) -> Result<Option<String>> {
        let Some(value) = self.read_content("string")? else {
            return Ok(None);
        };
        let text = scalar_text(&value);
        self.token = Token::Value(Value::String(text.clone()));
        Ok(Some(text))
    }

    /// Read the next value as bytes: binary, UUIDs, object ids, base64
    /// strings and arrays of integers are accepted.
    pub fn read_as_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        let token_type = self.read()?;
        let bytes = if token_type == TokenType::StartArray {
            self.read_byte_array()?
        } else {
            match &self.token {
                Token::None | Token::EndArray | Token::Value(Value::Null | Value::Undefined) => return Ok(None),
                Token::Value(Value::Binary(b)) => b.bytes.clone(),
                Token::Value(Value::Uuid(u)) => u.as_bytes().to_vec(),
                Token::Value(Value::ObjectId(oid)) => oid.bytes().to_vec(),
                Token::Value(Value::String(s)) => BASE64
                    .decode(s)
                    .map_err(|_| self.conversion(format!("Could not convert string to bytes: {s}")))?,
                _ => return Err(self.conversion(format!("Error reading bytes. Unexpected token: {token_type}"))),
            }
        };
        self.token = Token::Value(Value::Binary(Binary::generic(bytes.clone())));
        Ok(Some(bytes))
    }

    fn read_byte_array(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            match self.read()? {
                TokenType::EndArray => return Ok(bytes),
                TokenType::Integer => {
                    let n = self.value().and_then(Value::as_i64).unwrap_or(-1);
                    let byte = u8::try_from(n)
                        .map_err(|_| self.conversion(format!("Value {n} is out of range for a byte")))?;
                    bytes.push(byte);
                }
                token_type => {
                    return Err(self.conversion(format!("Unexpected token when reading bytes: {token_type}")))
                }
            }
        }
    }

    /// Read the next value as an instant. Strings must be RFC 3339.
    pub fn read_as_date_time(&mut self) -> Result<Option<DateTimeValue>> {
        let Some(value) = self.read_content("date")? else {
            return Ok(None);
        };
        let dt = match &value {
            Value::DateTime(dt) => *dt,
            Value::String(s) if s.is_empty() => return Ok(None),
            Value::String(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
                .map(DateTimeValue::Offset)
                .map_err(|_| self.conversion(format!("Could not convert string to DateTime: {s}")))?,
            other => {
                return Err(self.conversion(format!(
                    "Error reading date. Unexpected token: {}",
                    other.token_type()
                )))
            }
        };
        self.token = Token::Value(Value::DateTime(dt));
        Ok(Some(dt))
    }
}

/// The integer a numeric value denotes. Floats are rounded half to even;
/// NaN and the infinities have none.
#[allow(clippy::cast_precision_loss)]
fn integer_of(value: &Value) -> Option<i128> {
    let float = |f: f64| {
        let rounded = f.round_ties_even();
        (rounded.is_finite() && rounded.abs() < i128::MAX as f64).then_some(rounded as i128)
    };
    match value {
        Value::Int32(n) => Some(i128::from(*n)),
        Value::Int64(n) => Some(i128::from(*n)),
        Value::UInt64(n) => Some(i128::from(*n)),
        Value::BigInteger(n) => Some(*n),
        Value::Double(f) => float(*f),
        Value::Decimal(bn) => float(bn.to_f64()),
        _ => None,
    }
}

/// The textual form of a scalar.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Undefined => String::new(),
        Value::Boolean(b) => b.to_string(),
        Value::Int32(n) => n.to_string(),
        Value::Int64(n) => n.to_string(),
        Value::UInt64(n) => n.to_string(),
        Value::BigInteger(n) => n.to_string(),
        Value::Double(f) if f.is_infinite() => {
            let text = if *f > 0.0 { "Infinity" } else { "-Infinity" };
            text.to_owned()
        }
        Value::Double(f) => f.to_string(),
        Value::Decimal(bn) => bn.to_string(),
        Value::String(s) => s.clone(),
        Value::Binary(b) => BASE64.encode(&b.bytes),
        Value::Uuid(u) => u.to_string(),
        Value::ObjectId(oid) => oid.to_string(),
        Value::DateTime(dt) => dt.to_string(),
        Value::Regex(re) => re.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use crate::source::Trickle;
    use chrono::DateTime;

    /// Wrap `body` in a frame length and terminator.
    fn frame(body: &[u8]) -> Vec<u8> {
        let mut bytes = ((body.len() + 5) as i32).to_le_bytes().to_vec();
        bytes.extend_from_slice(body);
        bytes.push(0);
        bytes
    }

    fn sized(text: &str) -> Vec<u8> {
        let mut bytes = ((text.len() + 1) as i32).to_le_bytes().to_vec();
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        bytes
    }

    fn tokens_with(bytes: &[u8], config: DecoderConfig) -> Result<Vec<Token>> {
        let mut dec = Decoder::with_config(bytes, config);
        let mut tokens = Vec::new();
        while dec.read()? != TokenType::None {
            tokens.push(dec.token().clone());
        }
        Ok(tokens)
    }

    fn tokens(bytes: &[u8]) -> Vec<Token> {
        tokens_with(bytes, DecoderConfig::default()).unwrap()
    }

    fn name(s: &str) -> Token {
        Token::PropertyName(s.into())
    }

    fn val(v: impl Into<Value>) -> Token {
        Token::Value(v.into())
    }

    #[test]
    fn test_empty_source_is_end_of_stream() {
        let mut dec = Decoder::new(&[][..]);
        assert_eq!(dec.read().unwrap(), TokenType::None);
        assert_eq!(dec.read().unwrap(), TokenType::None);
        assert_eq!(dec.depth(), 0);
    }

    #[test]
    fn test_minimal_object() {
        let bytes = [0x0f, 0, 0, 0, 0x10, b'B', b'l', b'a', b'h', 0, 1, 0, 0, 0, 0];
        let mut dec = Decoder::new(&bytes[..]);
        assert_eq!(dec.read().unwrap(), TokenType::StartObject);
        assert_eq!(dec.depth(), 0);
        assert_eq!(dec.read().unwrap(), TokenType::PropertyName);
        assert_eq!(dec.path(), "Blah");
        assert_eq!(dec.depth(), 1);
        assert_eq!(dec.read().unwrap(), TokenType::Integer);
        assert_eq!(dec.value(), Some(&Value::Int32(1)));
        assert_eq!(dec.value_type(), Some(ValueType::Int32));
        assert_eq!(dec.read().unwrap(), TokenType::EndObject);
        assert_eq!(dec.depth(), 0);
        assert_eq!(dec.read().unwrap(), TokenType::None);
        assert_eq!(dec.offset(), 15);
    }

    #[test]
    fn test_root_array() {
        let mut body = vec![0x02, b'0', 0];
        body.extend(sized("a"));
        body.extend([0x02, b'1', 0]);
        body.extend(sized("b"));
        let bytes = frame(&body);

        let config = DecoderConfig {
            read_root_value_as_array: true,
            ..DecoderConfig::default()
        };
        assert_eq!(
            tokens_with(&bytes, config).unwrap(),
            vec![Token::StartArray, val("a"), val("b"), Token::EndArray]
        );
        // Without the option the indices surface as property names.
        assert_eq!(
            tokens(&bytes),
            vec![Token::StartObject, name("0"), val("a"), name("1"), val("b"), Token::EndObject]
        );
    }

    #[test]
    fn test_empty_name_and_string() {
        let bytes = [0x0c, 0, 0, 0, 0x02, 0, 1, 0, 0, 0, 0, 0];
        assert_eq!(
            tokens(&bytes),
            vec![Token::StartObject, name(""), val(""), Token::EndObject]
        );
    }

    #[test]
    fn test_paths_and_depths() {
        let mut enc = Encoder::new(Vec::new());
        enc.write_start_object().unwrap();
        enc.write_property_name("a").unwrap();
        enc.write_start_object().unwrap();
        enc.write_property_name("b c").unwrap();
        enc.write_start_array().unwrap();
        enc.write_i32(1).unwrap();
        enc.write_i32(2).unwrap();
        enc.write_end_array().unwrap();
        enc.write_end_object().unwrap();
        enc.write_end_object().unwrap();
        let bytes = enc.finish().unwrap();

        let mut dec = Decoder::new(&bytes[..]);
        let mut seen = Vec::new();
        while dec.read().unwrap() != TokenType::None {
            seen.push((dec.token_type(), dec.path(), dec.depth()));
        }
        assert_eq!(
            seen,
            vec![
                (TokenType::StartObject, String::new(), 0),
                (TokenType::PropertyName, "a".into(), 1),
                (TokenType::StartObject, "a".into(), 1),
                (TokenType::PropertyName, "a['b c']".into(), 2),
                (TokenType::StartArray, "a['b c']".into(), 2),
                (TokenType::Integer, "a['b c'][0]".into(), 3),
                (TokenType::Integer, "a['b c'][1]".into(), 3),
                (TokenType::EndArray, "a['b c']".into(), 2),
                (TokenType::EndObject, "a".into(), 1),
                (TokenType::EndObject, String::new(), 0),
            ]
        );
    }

    #[test]
    fn test_multiple_content() {
        let mut bytes = frame(&[0x0a, b'a', 0]);
        bytes.extend(frame(&[0x08, b'b', 0, 1]));

        let config = DecoderConfig {
            support_multiple_content: true,
            ..DecoderConfig::default()
        };
        assert_eq!(
            tokens_with(&bytes, config).unwrap(),
            vec![
                Token::StartObject,
                name("a"),
                val(Value::Null),
                Token::EndObject,
                Token::StartObject,
                name("b"),
                val(true),
                Token::EndObject,
            ]
        );
        // Without the option decoding stops after the first root.
        assert_eq!(tokens(&bytes).len(), 4);
    }

    #[test]
    fn test_strings_split_across_fills() {
        let mut enc = Encoder::new(Vec::new());
        enc.write_start_object().unwrap();
        enc.write_property_name("k\u{e9}\u{20ac}\u{1f600}").unwrap();
        enc.write_str("\u{1f600}x\u{20ac}").unwrap();
        enc.write_end_object().unwrap();
        let bytes = enc.finish().unwrap();

        let expected = vec![
            Token::StartObject,
            name("k\u{e9}\u{20ac}\u{1f600}"),
            val("\u{1f600}x\u{20ac}"),
            Token::EndObject,
        ];
        for buffer_size in 1..=bytes.len() {
            let config = DecoderConfig {
                buffer_size,
                ..DecoderConfig::default()
            };
            assert_eq!(tokens_with(&bytes, config).unwrap(), expected, "buffer size {buffer_size}");
        }
        for step in 1..=4 {
            let mut dec = Decoder::new(Trickle::new(&bytes, step));
            let mut seen = Vec::new();
            while dec.read().unwrap() != TokenType::None {
                seen.push(dec.token().clone());
            }
            assert_eq!(seen, expected, "step {step}");
        }
    }

    #[test]
    fn test_code_with_scope_is_synthetic_object() {
        let scope = frame(&[0x10, b'x', 0, 1, 0, 0, 0]);
        let code = sized("a()");
        let total = 4 + code.len() + scope.len();
        let mut body = vec![0x0f, b'f', 0];
        body.extend((total as i32).to_le_bytes());
        body.extend(&code);
        body.extend(&scope);
        let bytes = frame(&body);

        let mut dec = Decoder::new(&bytes[..]);
        let mut seen = Vec::new();
        let mut paths = Vec::new();
        while dec.read().unwrap() != TokenType::None {
            seen.push(dec.token().clone());
            paths.push(dec.path());
        }
        assert_eq!(
            seen,
            vec![
                Token::StartObject,
                name("f"),
                Token::StartObject,
                name("$code"),
                val("a()"),
                name("$scope"),
                Token::StartObject,
                name("x"),
                val(1),
                Token::EndObject,
                Token::EndObject,
                Token::EndObject,
            ]
        );
        assert_eq!(paths[8], "f.$scope.x");
    }

    #[test]
    fn test_db_pointer_is_synthetic_object() {
        let oid = ObjectId::from_bytes([7; 12]);
        let mut body = vec![0x0c, b'p', 0];
        body.extend(sized("db.c"));
        body.extend(oid.bytes());
        assert_eq!(
            tokens(&frame(&body)),
            vec![
                Token::StartObject,
                name("p"),
                Token::StartObject,
                name("$ref"),
                val("db.c"),
                name("$id"),
                val(oid),
                Token::EndObject,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn test_regex_symbol_javascript_timestamp() {
        let mut body = vec![0x0b, b'r', 0];
        body.extend(b"a+\0ix\0");
        body.extend([0x0e, b's', 0]);
        body.extend(sized("sym"));
        body.extend([0x0d, b'j', 0]);
        body.extend(sized("f()"));
        body.extend([0x11, b't', 0]);
        body.extend(5i64.to_le_bytes());
        let bytes = frame(&body);

        let values: Vec<Token> = tokens(&bytes)
            .into_iter()
            .filter(|t| matches!(t, Token::Value(_)))
            .collect();
        assert_eq!(values, vec![val("/a+/ix"), val("sym"), val("f()"), val(5i64)]);

        let config = DecoderConfig {
            raw_regex: true,
            ..DecoderConfig::default()
        };
        let all = tokens_with(&bytes, config).unwrap();
        assert_eq!(all[2], val(Regex::new("a+", "ix")));
    }

    #[test]
    fn test_binary_subtypes() {
        let uuid = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let mut body = vec![0x05, b'a', 0, 6, 0, 0, 0, 0x02, 2, 0, 0, 0, 0xaa, 0xbb];
        body.extend([0x05, b'b', 0, 16, 0, 0, 0, 0x03]);
        body.extend(uuid.to_bytes_le());
        body.extend([0x05, b'c', 0, 16, 0, 0, 0, 0x04]);
        body.extend(uuid.as_bytes());
        body.extend([0x05, b'd', 0, 1, 0, 0, 0, 0x80, 9]);
        assert_eq!(
            tokens(&frame(&body)),
            vec![
                Token::StartObject,
                name("a"),
                val(vec![0xaa_u8, 0xbb]),
                name("b"),
                val(uuid),
                name("c"),
                val(uuid),
                name("d"),
                val(Binary {
                    subtype: BinarySubtype::UserDefined(0x80),
                    bytes: vec![9],
                }),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn test_legacy_binary_inner_length_must_agree() {
        let body = [0x05, b'a', 0, 6, 0, 0, 0, 0x02, 3, 0, 0, 0, 0xaa, 0xbb];
        let err = tokens_with(&frame(&body), DecoderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidLength { what: "legacy binary", length: 3, .. }));
    }

    #[test]
    fn test_dates_follow_kind_handling() {
        let millis = 1_500_000_000_123i64;
        let mut body = vec![0x09, b'd', 0];
        body.extend(millis.to_le_bytes());
        let bytes = frame(&body);

        let utc = DateTime::from_timestamp_millis(millis).unwrap();
        assert_eq!(tokens(&bytes)[2], val(utc));

        let config = DecoderConfig {
            date_time_kind_handling: DateTimeKind::Unspecified,
            ..DecoderConfig::default()
        };
        assert_eq!(tokens_with(&bytes, config).unwrap()[2], val(utc.naive_utc()));
    }

    #[test]
    fn test_decimal_float_handling() {
        let mut body = vec![0x01, b'f', 0];
        body.extend(0.1f64.to_le_bytes());
        let config = DecoderConfig {
            float_parse_handling: FloatParseHandling::Decimal,
            ..DecoderConfig::default()
        };
        assert_eq!(
            tokens_with(&frame(&body), config).unwrap()[2],
            val(BigNumber::new(1, 1, -1))
        );
    }

    #[test]
    fn test_unknown_tag_poisons() {
        let bytes = frame(&[0x13, b'a', 0]);
        let mut dec = Decoder::new(&bytes[..]);
        assert_eq!(dec.read().unwrap(), TokenType::StartObject);
        assert_eq!(dec.read(), Err(Error::UnknownElementType { tag: 0x13, offset: 4 }));
        assert_eq!(dec.read(), Err(Error::Poisoned));
    }

    #[test]
    fn test_truncated_document() {
        let bytes = [0x0f, 0, 0, 0, 0x10, b'B', b'l', b'a', b'h', 0];
        let mut dec = Decoder::new(&bytes[..]);
        assert_eq!(dec.read().unwrap(), TokenType::StartObject);
        assert_eq!(dec.read().unwrap(), TokenType::PropertyName);
        assert_eq!(dec.read(), Err(Error::UnexpectedEof { offset: 10 }));
    }

    #[test]
    fn test_bad_lengths() {
        // Root shorter than an empty document
        assert!(matches!(
            tokens_with(&[4, 0, 0, 0, 0], DecoderConfig::default()),
            Err(Error::InvalidLength { what: "document", length: 4, offset: 0 })
        ));

        // Nested document reaching past its parent
        let bytes = frame(&[0x03, b'd', 0, 100, 0, 0, 0, 0]);
        assert!(matches!(
            tokens_with(&bytes, DecoderConfig::default()),
            Err(Error::InvalidLength { what: "document", length: 100, offset: 7 })
        ));

        // Terminator before the declared end
        let bytes = [9, 0, 0, 0, 0x0a, b'a', 0, 0, 0];
        assert_eq!(
            tokens_with(&bytes, DecoderConfig::default()),
            Err(Error::FrameLengthMismatch { declared: 9, actual: 8 })
        );

        // Element running over the declared end
        let bytes = [7, 0, 0, 0, 0x0a, b'a', 0, 0];
        assert!(matches!(
            tokens_with(&bytes, DecoderConfig::default()),
            Err(Error::FrameLengthMismatch { declared: 7, .. })
        ));

        // Sized string with a zero length
        let bytes = frame(&[0x02, b's', 0, 0, 0, 0, 0]);
        assert!(matches!(
            tokens_with(&bytes, DecoderConfig::default()),
            Err(Error::InvalidLength { what: "string", length: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_offset_ignores_buffer_size() {
        // The bad character starts at byte 11: frame header, tag, "s\0", length.
        let bytes = frame(&[0x02, b's', 0, 4, 0, 0, 0, 0xe2, 0x82, b'a', 0]);
        for buffer_size in 1..=16 {
            let config = DecoderConfig {
                buffer_size,
                ..DecoderConfig::default()
            };
            assert_eq!(
                tokens_with(&bytes, config),
                Err(Error::InvalidUtf8 { offset: 11 }),
                "buffer size {buffer_size}"
            );
        }
    }

    #[test]
    fn test_strict_boolean() {
        let bytes = frame(&[0x08, b'b', 0, 2]);
        assert_eq!(
            tokens_with(&bytes, DecoderConfig::default()),
            Err(Error::Malformed { what: "boolean", offset: 7 })
        );
    }

    #[test]
    fn test_skip() {
        let mut enc = Encoder::new(Vec::new());
        enc.write_start_object().unwrap();
        enc.write_property_name("a").unwrap();
        enc.write_start_object().unwrap();
        enc.write_property_name("x").unwrap();
        enc.write_start_array().unwrap();
        enc.write_i32(1).unwrap();
        enc.write_start_object().unwrap();
        enc.write_property_name("y").unwrap();
        enc.write_i32(2).unwrap();
        enc.write_end_object().unwrap();
        enc.write_end_array().unwrap();
        enc.write_end_object().unwrap();
        enc.write_property_name("b").unwrap();
        enc.write_i32(5).unwrap();
        enc.write_end_object().unwrap();
        let bytes = enc.finish().unwrap();

        for buffer_size in [1, 7, 4096] {
            let config = DecoderConfig {
                buffer_size,
                ..DecoderConfig::default()
            };
            let mut dec = Decoder::with_config(&bytes[..], config);
            dec.read().unwrap();
            assert_eq!(dec.read().unwrap(), TokenType::PropertyName);
            dec.skip().unwrap();
            assert_eq!(dec.token_type(), TokenType::EndObject);
            assert_eq!(dec.depth(), 1);
            assert_eq!(dec.path(), "a");
            assert_eq!(dec.read().unwrap(), TokenType::PropertyName);
            assert_eq!(dec.read_as_int32().unwrap(), Some(5));
            assert_eq!(dec.read().unwrap(), TokenType::EndObject);
        }
    }

    #[test]
    fn test_typed_reads_convert_and_recover() {
        let mut enc = Encoder::new(Vec::new());
        enc.write_start_object().unwrap();
        enc.write_property_name("a").unwrap();
        enc.write_str("12").unwrap();
        enc.write_property_name("b").unwrap();
        enc.write_str("x1").unwrap();
        enc.write_property_name("c").unwrap();
        enc.write_f64(2.5).unwrap();
        enc.write_property_name("d").unwrap();
        enc.write_null().unwrap();
        enc.write_end_object().unwrap();
        let bytes = enc.finish().unwrap();

        let mut dec = Decoder::new(&bytes[..]);
        dec.read().unwrap();
        dec.read().unwrap();
        assert_eq!(dec.read_as_int32().unwrap(), Some(12));
        assert_eq!(dec.value(), Some(&Value::Int32(12)));

        dec.read().unwrap();
        let err = dec.read_as_int32().unwrap_err();
        assert_eq!(
            err,
            Error::conversion("Could not convert string to integer: x1", "b")
        );
        assert_eq!(err.kind(), crate::ErrorKind::Conversion);

        // The decoder is still usable after a conversion error.
        assert_eq!(dec.read().unwrap(), TokenType::PropertyName);
        assert_eq!(dec.read_as_int64().unwrap(), Some(2));
        dec.read().unwrap();
        assert_eq!(dec.read_as_string().unwrap(), None);
        assert_eq!(dec.read().unwrap(), TokenType::EndObject);
    }

    #[test]
    fn test_typed_read_of_container_is_error() {
        let bytes = frame(&[0x03, b'o', 0, 5, 0, 0, 0, 0]);
        let mut dec = Decoder::new(&bytes[..]);
        dec.read().unwrap();
        dec.read().unwrap();
        assert_eq!(
            dec.read_as_double(),
            Err(Error::conversion("Error reading double. Unexpected token: StartObject", "o"))
        );
    }

    #[test]
    fn test_read_as_bytes() {
        let uuid = Uuid::from_u128(42);
        let mut enc = Encoder::new(Vec::new());
        enc.write_start_object().unwrap();
        enc.write_property_name("a").unwrap();
        enc.write_start_array().unwrap();
        for n in [1, 2, 255] {
            enc.write_i32(n).unwrap();
        }
        enc.write_end_array().unwrap();
        enc.write_property_name("b").unwrap();
        enc.write_str("AQI=").unwrap();
        enc.write_property_name("c").unwrap();
        enc.write_uuid(&uuid).unwrap();
        enc.write_end_object().unwrap();
        let bytes = enc.finish().unwrap();

        let mut dec = Decoder::new(&bytes[..]);
        dec.read().unwrap();
        dec.read().unwrap();
        assert_eq!(dec.read_as_bytes().unwrap(), Some(vec![1, 2, 255]));
        dec.read().unwrap();
        assert_eq!(dec.read_as_bytes().unwrap(), Some(vec![1, 2]));
        dec.read().unwrap();
        assert_eq!(dec.read_as_bytes().unwrap(), Some(uuid.as_bytes().to_vec()));
        assert_eq!(dec.read().unwrap(), TokenType::EndObject);
    }

    #[test]
    fn test_read_as_string_and_others() {
        let oid = ObjectId::from_bytes([0xab; 12]);
        let mut enc = Encoder::new(Vec::new());
        enc.write_start_array().unwrap();
        enc.write_object_id(&oid).unwrap();
        enc.write_f64(1.5).unwrap();
        enc.write_str("TRUE").unwrap();
        enc.write_str("2017-07-14T02:40:00.123Z").unwrap();
        enc.write_end_array().unwrap();
        let bytes = enc.finish().unwrap();

        let config = DecoderConfig {
            read_root_value_as_array: true,
            ..DecoderConfig::default()
        };
        let mut dec = Decoder::with_config(&bytes[..], config);
        dec.read().unwrap();
        assert_eq!(dec.read_as_string().unwrap(), Some("ab".repeat(12)));
        assert_eq!(dec.read_as_decimal().unwrap(), Some(BigNumber::new(1, 15, -1)));
        assert_eq!(dec.read_as_boolean().unwrap(), Some(true));
        let dt = dec.read_as_date_time().unwrap().unwrap();
        assert_eq!(dt.to_millis(DateTimeKind::Utc), Some(1_500_000_000_123));
        assert_eq!(dec.read_as_int32().unwrap(), None);
    }

    #[test]
    fn test_config_from_json() {
        let config: DecoderConfig =
            serde_json::from_str(r#"{"support_multiple_content": true, "float_parse_handling": "decimal"}"#)
                .unwrap();
        assert!(config.support_multiple_content);
        assert_eq!(config.float_parse_handling, FloatParseHandling::Decimal);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }
}
