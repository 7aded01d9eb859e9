// ABOUTME: The closed set of scalar values a token can carry, and a dynamic document tree.
// ABOUTME: Includes `From` conversions, typed accessors and the `bson!` construction macro.

use crate::token::TokenType;
use crate::types::{BigNumber, Binary, DateTimeValue, ObjectId, Regex};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Utc};
use uuid::Uuid;

/// A scalar value carried by a value token.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Deprecated in BSON; kept for round-trip fidelity.
    Undefined,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    /// Written as Int64 when it fits, as Double otherwise.
    UInt64(u64),
    /// Arbitrary precision integer. Written as Int64 when it fits, as
    /// two's-complement bytes otherwise.
    BigInteger(i128),
    Double(f64),
    /// High-precision decimal. Narrowed to Double when written.
    Decimal(BigNumber),
    String(String),
    Binary(Binary),
    Uuid(Uuid),
    ObjectId(ObjectId),
    DateTime(DateTimeValue),
    Regex(Regex),
}

/// The runtime type of a [`Value`], used to tell apart values that share a
/// token kind (32- vs 64-bit integers, binary vs UUID, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Undefined,
    Boolean,
    Int32,
    Int64,
    UInt64,
    BigInteger,
    Double,
    Decimal,
    String,
    Binary,
    Uuid,
    ObjectId,
    DateTime,
    Regex,
}

impl Value {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Undefined => ValueType::Undefined,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Int32(_) => ValueType::Int32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt64(_) => ValueType::UInt64,
            Value::BigInteger(_) => ValueType::BigInteger,
            Value::Double(_) => ValueType::Double,
            Value::Decimal(_) => ValueType::Decimal,
            Value::String(_) => ValueType::String,
            Value::Binary(_) => ValueType::Binary,
            Value::Uuid(_) => ValueType::Uuid,
            Value::ObjectId(_) => ValueType::ObjectId,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Regex(_) => ValueType::Regex,
        }
    }

    /// The token kind a token carrying this value has.
    #[must_use]
    pub fn token_type(&self) -> TokenType {
        match self {
            Value::Null => TokenType::Null,
            Value::Undefined => TokenType::Undefined,
            Value::Boolean(_) => TokenType::Boolean,
            Value::Int32(_) | Value::Int64(_) | Value::UInt64(_) | Value::BigInteger(_) => {
                TokenType::Integer
            }
            Value::Double(_) | Value::Decimal(_) => TokenType::Float,
            Value::String(_) | Value::Regex(_) => TokenType::String,
            Value::Binary(_) | Value::Uuid(_) | Value::ObjectId(_) => TokenType::Bytes,
            Value::DateTime(_) => TokenType::Date,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer value that fits in an i64.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            Value::UInt64(n) => i64::try_from(*n).ok(),
            Value::BigInteger(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Intentional: int-to-float conversion may lose precision
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Decimal(bn) => Some(bn.to_f64()),
            Value::Int32(n) => Some(f64::from(*n)),
            Value::Int64(n) => Some(*n as f64),
            Value::UInt64(n) => Some(*n as f64),
            Value::BigInteger(n) => Some(*n as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The raw bytes of a Bytes-kind value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(&b.bytes),
            Value::Uuid(u) => Some(u.as_bytes()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i8> for Value {
    fn from(n: i8) -> Self {
        Value::Int32(i32::from(n))
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Int32(i32::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::BigInteger(n)
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::Int32(i32::from(n))
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Int32(i32::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int64(i64::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt64(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Double(f64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<BigNumber> for Value {
    fn from(bn: BigNumber) -> Self {
        Value::Decimal(bn)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::String(c.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(Binary::generic(bytes))
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Binary(Binary::generic(bytes))
    }
}

impl From<Binary> for Value {
    fn from(b: Binary) -> Self {
        Value::Binary(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<ObjectId> for Value {
    fn from(oid: ObjectId) -> Self {
        Value::ObjectId(oid)
    }
}

impl From<DateTimeValue> for Value {
    fn from(dt: DateTimeValue) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt.into())
    }
}

impl From<DateTime<Local>> for Value {
    fn from(dt: DateTime<Local>) -> Self {
        Value::DateTime(dt.into())
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt.into())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt.into())
    }
}

impl From<Regex> for Value {
    fn from(re: Regex) -> Self {
        Value::Regex(re)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

/// A dynamic BSON document tree. Documents keep their element order.
#[derive(Debug, Clone, PartialEq)]
pub enum Bson {
    Value(Value),
    Document(Vec<(String, Bson)>),
    Array(Vec<Bson>),
}

impl Bson {
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self, Bson::Document(_))
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Bson::Array(_))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Bson::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_document(&self) -> Option<&[(String, Bson)]> {
        match self {
            Bson::Document(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Bson]> {
        match self {
            Bson::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Index into an array. Returns None if not an array or index out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Bson> {
        self.as_array().and_then(|a| a.get(index))
    }

    /// The first element named `key`. Returns None if not a document or key not found.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&Bson> {
        self.as_document()
            .and_then(|d| d.iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }
}

impl From<Value> for Bson {
    fn from(v: Value) -> Self {
        Bson::Value(v)
    }
}

impl<T: Into<Bson>> From<Vec<T>> for Bson {
    fn from(v: Vec<T>) -> Self {
        Bson::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Bson>> FromIterator<T> for Bson {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Bson::Array(iter.into_iter().map(Into::into).collect())
    }
}

macro_rules! bson_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Bson {
                fn from(v: $ty) -> Self {
                    Bson::Value(Value::from(v))
                }
            }
        )*
    };
}

bson_from_scalar!(
    bool,
    i8,
    i16,
    i32,
    i64,
    i128,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    char,
    String,
    &str,
    BigNumber,
    Binary,
    Uuid,
    ObjectId,
    DateTimeValue,
    DateTime<Utc>,
    Regex,
);

/// Macro for building [`Bson`] trees.
///
/// # Examples
///
/// ```rust
/// use serde_bsonwire::bson;
///
/// let doc = bson!({
///     "name": "test",
///     "values": [1, 2, 3],
///     "active": true
/// });
/// assert_eq!(doc.get_key("name").and_then(|v| v.as_str()), Some("test"));
/// ```
#[macro_export]
macro_rules! bson {
    // null
    (null) => {
        $crate::Bson::Value($crate::Value::Null)
    };

    // bool
    (true) => {
        $crate::Bson::Value($crate::Value::Boolean(true))
    };
    (false) => {
        $crate::Bson::Value($crate::Value::Boolean(false))
    };

    // array
    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Bson::Array(vec![ $( $crate::bson!($elem) ),* ])
    };

    // document
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::Bson::Document(vec![
            $( (::std::string::String::from($key), $crate::bson!($value)) ),*
        ])
    };

    // other expressions (numbers, strings, etc.)
    ($other:expr) => {
        $crate::Bson::from($other)
    };
}
