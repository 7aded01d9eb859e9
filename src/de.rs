// ABOUTME: Serde Deserializer implementation for BSON decoding.
// ABOUTME: Walks the decoder's token stream so documents decode into any deserializable type.

use crate::decoder::{scalar_text, Decoder, DecoderConfig};
use crate::error::{Error, Result};
use crate::token::{Token, TokenType};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;
use std::io::Read;

/// A serde Deserializer that reads BSON.
pub struct Deserializer<R: Read> {
    decoder: Decoder<R>,
    /// The decoder's current token was looked at but not consumed.
    peeked: bool,
}

impl<R: Read> Deserializer<R> {
    /// Create a new Deserializer reading from `reader`.
    pub fn from_reader(reader: R) -> Self {
        Self::from_decoder(Decoder::new(reader))
    }

    /// Create a new Deserializer with custom configuration.
    pub fn from_reader_with_config(reader: R, config: DecoderConfig) -> Self {
        Self::from_decoder(Decoder::with_config(reader, config))
    }

    /// Deserialize from an already positioned decoder.
    pub fn from_decoder(decoder: Decoder<R>) -> Self {
        Self {
            decoder,
            peeked: false,
        }
    }

    /// Get the underlying decoder (consumes self).
    pub fn into_decoder(self) -> Decoder<R> {
        self.decoder
    }

    /// Check that nothing follows the document just deserialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrailingBytes`] if the source holds more bytes.
    pub fn end(&mut self) -> Result<()> {
        if self.decoder.config().support_multiple_content || self.decoder.at_end_of_input()? {
            Ok(())
        } else {
            Err(Error::TrailingBytes)
        }
    }

    fn next_token(&mut self) -> Result<TokenType> {
        if self.peeked {
            self.peeked = false;
            return Ok(self.decoder.token_type());
        }
        self.decoder.read()
    }

    fn peek_token(&mut self) -> Result<TokenType> {
        if !self.peeked {
            self.decoder.read()?;
            self.peeked = true;
        }
        Ok(self.decoder.token_type())
    }

    fn current_value(&self) -> Result<Value> {
        match self.decoder.token() {
            Token::Value(value) => Ok(value.clone()),
            other => Err(self.unexpected(other.token_type(), "a value")),
        }
    }

    fn current_name(&self) -> Result<String> {
        match self.decoder.token() {
            Token::PropertyName(name) => Ok(name.clone()),
            other => Err(self.unexpected(other.token_type(), "a property name")),
        }
    }

    fn unexpected(&self, found: TokenType, expected: &str) -> Error {
        if found == TokenType::None {
            return Error::UnexpectedEof {
                offset: self.decoder.offset(),
            };
        }
        Error::conversion(
            format!("Unexpected token {found}, expected {expected}"),
            self.decoder.path(),
        )
    }
}

/// Deserialize a value from a BSON byte slice.
///
/// # Errors
///
/// Returns an error if:
/// - The data is malformed or truncated
/// - The data doesn't match the expected type `T`
/// - There are trailing bytes after the document
pub fn from_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    from_reader(data)
}

/// Deserialize a value from a BSON byte slice with custom configuration.
///
/// # Errors
///
/// As [`from_slice`]; trailing bytes are allowed when
/// `support_multiple_content` is set.
pub fn from_slice_with_config<T: DeserializeOwned>(data: &[u8], config: DecoderConfig) -> Result<T> {
    let mut de = Deserializer::from_reader_with_config(data, config);
    let value = T::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

/// Deserialize one document from a reader.
///
/// # Errors
///
/// As [`from_slice`].
pub fn from_reader<R: Read, T: DeserializeOwned>(reader: R) -> Result<T> {
    let mut de = Deserializer::from_reader(reader);
    let value = T::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

fn visit_value<'de, V: Visitor<'de>>(value: Value, visitor: V) -> Result<V::Value> {
    match value {
        Value::Null | Value::Undefined => visitor.visit_unit(),
        Value::Boolean(b) => visitor.visit_bool(b),
        Value::Int32(n) => visitor.visit_i32(n),
        Value::Int64(n) => visitor.visit_i64(n),
        Value::UInt64(n) => visitor.visit_u64(n),
        Value::BigInteger(n) => visitor.visit_i128(n),
        Value::Double(f) => visitor.visit_f64(f),
        Value::Decimal(bn) => visitor.visit_f64(bn.to_f64()),
        Value::String(s) => visitor.visit_string(s),
        Value::Binary(b) => visitor.visit_byte_buf(b.bytes),
        other => visitor.visit_string(scalar_text(&other)),
    }
}

impl<'de, R: Read> de::Deserializer<'de> for &mut Deserializer<R> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.next_token()? {
            TokenType::StartObject => visitor.visit_map(MapAccess { de: self }),
            TokenType::StartArray => visitor.visit_seq(SeqAccess {
                de: self,
                end: TokenType::EndArray,
            }),
            t if t.is_primitive() => visit_value(self.current_value()?, visitor),
            other => Err(self.unexpected(other, "a value")),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.peek_token()? {
            TokenType::Null | TokenType::Undefined => {
                self.peeked = false;
                visitor.visit_none()
            }
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.next_token()? {
            TokenType::Bytes => {
                let value = self.current_value()?;
                visitor.visit_byte_buf(value.as_bytes().unwrap_or_default().to_vec())
            }
            TokenType::String => {
                let value = self.current_value()?;
                let text = value.as_str().unwrap_or_default();
                let bytes = BASE64.decode(text).map_err(|_| {
                    Error::conversion(
                        format!("Could not convert string to bytes: {text}"),
                        self.decoder.path(),
                    )
                })?;
                visitor.visit_byte_buf(bytes)
            }
            TokenType::StartArray => {
                let mut bytes = Vec::new();
                loop {
                    match self.next_token()? {
                        TokenType::EndArray => break,
                        TokenType::Integer => {
                            let byte = self
                                .current_value()?
                                .as_i64()
                                .and_then(|n| u8::try_from(n).ok())
                                .ok_or_else(|| self.unexpected(TokenType::Integer, "a byte"))?;
                            bytes.push(byte);
                        }
                        other => return Err(self.unexpected(other, "a byte")),
                    }
                }
                visitor.visit_byte_buf(bytes)
            }
            other => Err(self.unexpected(other, "bytes")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    /// Sequences also accept a document, whose element names are ignored:
    /// a root array reads back as a document unless the decoder is told
    /// otherwise.
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let end = match self.next_token()? {
            TokenType::StartArray => TokenType::EndArray,
            TokenType::StartObject => TokenType::EndObject,
            other => return Err(self.unexpected(other, "an array")),
        };
        visitor.visit_seq(SeqAccess { de: self, end })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.next_token()? {
            TokenType::String => {
                let value = self.current_value()?;
                let variant = value.as_str().unwrap_or_default().to_owned();
                visitor.visit_enum(IntoDeserializer::<Error>::into_deserializer(variant))
            }
            TokenType::StartObject => {
                let found = self.next_token()?;
                if found != TokenType::PropertyName {
                    return Err(self.unexpected(found, "an enum variant name"));
                }
                let variant = self.current_name()?;
                let value = visitor.visit_enum(EnumAccess {
                    de: &mut *self,
                    variant,
                })?;
                match self.next_token()? {
                    TokenType::EndObject => Ok(value),
                    other => Err(self.unexpected(other, "the end of an enum object")),
                }
            }
            other => Err(self.unexpected(other, "an enum")),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.next_token()?.is_start() {
            self.decoder.skip()?;
        }
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        unit unit_struct map struct identifier
    }
}

struct SeqAccess<'a, R: Read> {
    de: &'a mut Deserializer<R>,
    end: TokenType,
}

impl<'de, R: Read> de::SeqAccess<'de> for SeqAccess<'_, R> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        let found = self.de.peek_token()?;
        if found == self.end {
            self.de.peeked = false;
            return Ok(None);
        }
        if found == TokenType::PropertyName {
            self.de.peeked = false;
        }
        seed.deserialize(&mut *self.de).map(Some)
    }
}

struct MapAccess<'a, R: Read> {
    de: &'a mut Deserializer<R>,
}

impl<'de, R: Read> de::MapAccess<'de> for MapAccess<'_, R> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.de.next_token()? {
            TokenType::EndObject => Ok(None),
            TokenType::PropertyName => {
                let name = self.de.current_name()?;
                seed.deserialize(KeyDeserializer(name)).map(Some)
            }
            other => Err(self.de.unexpected(other, "a property name")),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        seed.deserialize(&mut *self.de)
    }
}

struct EnumAccess<'a, R: Read> {
    de: &'a mut Deserializer<R>,
    variant: String,
}

impl<'de, 'a, R: Read> de::EnumAccess<'de> for EnumAccess<'a, R> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(mut self, seed: V) -> Result<(V::Value, Self)> {
        let name = std::mem::take(&mut self.variant);
        let value = seed.deserialize(KeyDeserializer(name))?;
        Ok((value, self))
    }
}

impl<'de, R: Read> de::VariantAccess<'de> for EnumAccess<'_, R> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        de::Deserialize::deserialize(&mut *self.de).map(|de::IgnoredAny| ())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(&mut *self.de)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_seq(&mut *self.de, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_any(&mut *self.de, visitor)
    }
}

/// Deserializes an element name. Integer map keys are parsed from it.
struct KeyDeserializer(String);

macro_rules! deserialize_parsed_key {
    ($($method:ident => $visit:ident),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                match self.0.parse() {
                    Ok(n) => visitor.$visit(n),
                    Err(_) => Err(Error::Custom(format!("invalid integer key {:?}", self.0))),
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for KeyDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_string(self.0)
    }

    deserialize_parsed_key! {
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(IntoDeserializer::<Error>::into_deserializer(self.0))
    }

    forward_to_deserialize_any! {
        bool i128 u128 f32 f64 char str string bytes byte_buf option unit unit_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}
