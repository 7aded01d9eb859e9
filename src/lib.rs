// ABOUTME: Streaming BSON encoder/decoder over a JSON-like token stream.
// ABOUTME: Provides serde integration and a serde_json-like API for encoding/decoding.

//! # serde_bsonwire
//!
//! A streaming BSON encoder and decoder for Rust.
//!
//! The [`Encoder`] accepts JSON-style write calls (start object, property
//! name, value, end object) and produces BSON documents, backpatching each
//! frame's length when the frame ends. The [`Decoder`] reads BSON from any
//! [`std::io::Read`] and yields one token per [`Decoder::read`] call.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_bsonwire::{to_vec, from_slice};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let person = Person {
//!     name: "Alice".to_string(),
//!     age: 30,
//! };
//!
//! // Serialize to BSON
//! let bytes = to_vec(&person).unwrap();
//!
//! // Deserialize from BSON
//! let decoded: Person = from_slice(&bytes).unwrap();
//! assert_eq!(person, decoded);
//! ```
//!
//! ## Working with Dynamic Documents
//!
//! ```rust
//! use serde_bsonwire::{bson, decode_bson, encode_bson};
//!
//! let doc = bson!({
//!     "name": "test",
//!     "values": [1, 2, 3],
//!     "active": true
//! });
//!
//! let bytes = encode_bson(&doc).unwrap();
//! let decoded = decode_bson(&bytes).unwrap();
//! assert_eq!(decoded.get_key("name").and_then(|v| v.as_str()), Some("test"));
//! ```
//!
//! ## Format notes
//!
//! - BSON has no top-level scalars: the root must be an object or an array.
//! - A root array is indistinguishable from a root object on the wire; set
//!   [`DecoderConfig::read_root_value_as_array`] to read it back as an array.
//! - Unsigned and arbitrary-precision integers have no BSON type; they are
//!   written as Int64 when they fit and widened otherwise.

pub mod de;
pub mod decoder;
pub mod encoder;
pub mod error;
#[cfg(feature = "async")]
pub mod nonblocking;
pub mod ser;
mod source;
pub mod token;
pub mod types;
mod utf8;
pub mod value;

// Re-export commonly used items at the crate root
pub use de::{from_reader, from_slice, from_slice_with_config, Deserializer};
pub use decoder::{Decoder, DecoderConfig, DEFAULT_BUFFER_SIZE};
pub use encoder::{Encoder, EncoderConfig};
pub use error::{Error, ErrorKind, Result};
pub use ser::Serializer;
pub use token::{Token, TokenType};
pub use types::{
    element_type, BigNumber, Binary, BinarySubtype, DateTimeKind, DateTimeValue, ElementType,
    FloatParseHandling, ObjectId, Regex,
};
pub use uuid::Uuid;
pub use value::{Bson, Value, ValueType};

// The bson! macro is automatically exported at crate root via #[macro_export]

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Serialize a value to a BSON byte vector.
///
/// # Example
///
/// ```rust
/// use serde_bsonwire::to_vec;
/// use std::collections::BTreeMap;
///
/// let bytes = to_vec(&BTreeMap::from([("a", 1)])).unwrap();
/// assert_eq!(bytes, vec![12, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]);
/// ```
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    to_writer(&mut buf, value)?;
    Ok(buf)
}

/// Serialize a value to a writer.
///
/// # Example
///
/// ```rust
/// use serde_bsonwire::to_writer;
///
/// let mut buf = Vec::new();
/// to_writer(&mut buf, &vec!["hello"]).unwrap();
/// assert_eq!(buf[0] as usize, buf.len());
/// ```
pub fn to_writer<W: Write, T: Serialize>(writer: W, value: &T) -> Result<()> {
    let mut encoder = Encoder::new(writer);
    {
        let mut serializer = Serializer::new(&mut encoder);
        value.serialize(&mut serializer)?;
    }
    encoder.finish()?;
    Ok(())
}

/// Decode one BSON document into a [`Bson`] tree.
///
/// # Example
///
/// ```rust
/// use serde_bsonwire::decode_bson;
///
/// let bytes = [12, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0];
/// let doc = decode_bson(&bytes).unwrap();
/// assert_eq!(doc.get_key("a").and_then(|v| v.as_i64()), Some(1));
/// ```
pub fn decode_bson(data: &[u8]) -> Result<Bson> {
    decode_bson_with_config(data, DecoderConfig::default())
}

/// Decode one BSON document into a [`Bson`] tree with custom configuration.
pub fn decode_bson_with_config(data: &[u8], config: DecoderConfig) -> Result<Bson> {
    let mut decoder = Decoder::with_config(data, config);
    let value = read_bson(&mut decoder)?;
    if !decoder.config().support_multiple_content && !decoder.at_end_of_input()? {
        return Err(Error::TrailingBytes);
    }
    Ok(value)
}

/// Read the next complete value from `decoder` as a [`Bson`] tree.
///
/// Returns `Error::UnexpectedEof` if the stream has no further documents.
pub fn read_bson<R: Read>(decoder: &mut Decoder<R>) -> Result<Bson> {
    decoder.read()?;
    if decoder.token_type() == TokenType::PropertyName {
        decoder.read()?;
    }
    bson_from_current(decoder)
}

fn bson_from_current<R: Read>(decoder: &mut Decoder<R>) -> Result<Bson> {
    match decoder.token() {
        Token::StartObject => {
            let mut doc = Vec::new();
            loop {
                decoder.read()?;
                let name = match decoder.token() {
                    Token::EndObject => break,
                    Token::PropertyName(name) => name.clone(),
                    other => return Err(unbalanced(other.token_type(), decoder)),
                };
                decoder.read()?;
                doc.push((name, bson_from_current(decoder)?));
            }
            Ok(Bson::Document(doc))
        }
        Token::StartArray => {
            let mut arr = Vec::new();
            loop {
                if decoder.read()? == TokenType::EndArray {
                    break;
                }
                arr.push(bson_from_current(decoder)?);
            }
            Ok(Bson::Array(arr))
        }
        Token::Value(value) => Ok(Bson::Value(value.clone())),
        other => Err(unbalanced(other.token_type(), decoder)),
    }
}

fn unbalanced<R: Read>(found: TokenType, decoder: &Decoder<R>) -> Error {
    if found == TokenType::None {
        return Error::UnexpectedEof {
            offset: decoder.offset(),
        };
    }
    Error::conversion(format!("Unexpected token {found}"), decoder.path())
}

/// Encode a [`Bson`] tree to BSON bytes. The root must be a document or
/// an array.
///
/// # Example
///
/// ```rust
/// use serde_bsonwire::{bson, encode_bson};
///
/// let bytes = encode_bson(&bson!({ "a": 1 })).unwrap();
/// assert_eq!(bytes, vec![12, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]);
/// ```
pub fn encode_bson(value: &Bson) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_bson_to_writer(&mut buf, value)?;
    Ok(buf)
}

/// Encode a [`Bson`] tree to a writer.
pub fn encode_bson_to_writer<W: Write>(writer: W, value: &Bson) -> Result<()> {
    let mut encoder = Encoder::new(writer);
    write_bson(&mut encoder, value)?;
    encoder.finish()?;
    Ok(())
}

/// Write a [`Bson`] tree through an existing encoder.
pub fn write_bson<W: Write>(encoder: &mut Encoder<W>, value: &Bson) -> Result<()> {
    match value {
        Bson::Value(v) => encoder.write_value(v),
        Bson::Array(arr) => {
            encoder.write_start_array()?;
            for item in arr {
                write_bson(encoder, item)?;
            }
            encoder.write_end_array()
        }
        Bson::Document(doc) => {
            encoder.write_start_object()?;
            for (key, val) in doc {
                encoder.write_property_name(key)?;
                write_bson(encoder, val)?;
            }
            encoder.write_end_object()
        }
    }
}

/// Copy every remaining token from `decoder` to `encoder`.
///
/// ```rust
/// use serde_bsonwire::{transcode, Decoder, Encoder};
///
/// let bytes = [12, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0];
/// let mut decoder = Decoder::new(&bytes[..]);
/// let mut encoder = Encoder::new(Vec::new());
/// transcode(&mut decoder, &mut encoder).unwrap();
/// assert_eq!(encoder.finish().unwrap(), bytes);
/// ```
pub fn transcode<R: Read, W: Write>(decoder: &mut Decoder<R>, encoder: &mut Encoder<W>) -> Result<()> {
    while decoder.read()? != TokenType::None {
        encoder.write_token(decoder.token())?;
    }
    Ok(())
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Undefined => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Int32(n) => serializer.serialize_i32(*n),
            Value::Int64(n) => serializer.serialize_i64(*n),
            Value::UInt64(n) => serializer.serialize_u64(*n),
            Value::BigInteger(n) => serializer.serialize_i128(*n),
            Value::Double(f) => serializer.serialize_f64(*f),
            // Serialize BigNumber as f64 for compatibility
            Value::Decimal(bn) => serializer.serialize_f64(bn.to_f64()),
            Value::String(s) => serializer.serialize_str(s),
            Value::Binary(b) => serializer.serialize_bytes(&b.bytes),
            other => serializer.serialize_str(&decoder::scalar_text(other)),
        }
    }
}

impl Serialize for Bson {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Bson::Value(v) => v.serialize(serializer),
            Bson::Array(arr) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for item in arr {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Bson::Document(doc) => {
                use serde::ser::SerializeMap;
                let mut m = serializer.serialize_map(Some(doc.len()))?;
                for (key, val) in doc {
                    m.serialize_entry(key, val)?;
                }
                m.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Bson {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BsonVisitor;

        impl<'de> serde::de::Visitor<'de> for BsonVisitor {
            type Value = Bson;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "any valid BSON value")
            }

            fn visit_bool<E>(self, v: bool) -> std::result::Result<Bson, E> {
                Ok(Value::Boolean(v).into())
            }

            fn visit_i32<E>(self, v: i32) -> std::result::Result<Bson, E> {
                Ok(Value::Int32(v).into())
            }

            fn visit_i64<E>(self, v: i64) -> std::result::Result<Bson, E> {
                Ok(Value::Int64(v).into())
            }

            fn visit_i128<E>(self, v: i128) -> std::result::Result<Bson, E> {
                Ok(Value::BigInteger(v).into())
            }

            fn visit_u64<E>(self, v: u64) -> std::result::Result<Bson, E> {
                Ok(Value::from(v).into())
            }

            fn visit_f64<E>(self, v: f64) -> std::result::Result<Bson, E> {
                Ok(Value::Double(v).into())
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Bson, E> {
                Ok(Value::String(v.to_owned()).into())
            }

            fn visit_string<E>(self, v: String) -> std::result::Result<Bson, E> {
                Ok(Value::String(v).into())
            }

            fn visit_bytes<E>(self, v: &[u8]) -> std::result::Result<Bson, E> {
                Ok(Value::Binary(Binary::generic(v)).into())
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> std::result::Result<Bson, E> {
                Ok(Value::Binary(Binary::generic(v)).into())
            }

            fn visit_unit<E>(self) -> std::result::Result<Bson, E> {
                Ok(Value::Null.into())
            }

            fn visit_none<E>(self) -> std::result::Result<Bson, E> {
                Ok(Value::Null.into())
            }

            fn visit_some<D: serde::Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> std::result::Result<Bson, D::Error> {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Bson, A::Error> {
                let mut arr = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    arr.push(elem);
                }
                Ok(Bson::Array(arr))
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Bson, A::Error> {
                let mut doc = Vec::new();
                while let Some((key, val)) = map.next_entry::<String, Bson>()? {
                    doc.push((key, val));
                }
                Ok(Bson::Document(doc))
            }
        }

        deserializer.deserialize_any(BsonVisitor)
    }
}
