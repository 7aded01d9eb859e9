// ABOUTME: BSON element type tags, binary subtypes and the small value types the codec carries.
// ABOUTME: Tag and subtype bytes map directly to the BSON wire format.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type tags for BSON values.
/// These match the BSON wire format exactly.
pub mod element_type {
    /// Terminates a document or array frame (only valid in tag position).
    pub const END: u8 = 0x00;

    pub const DOUBLE: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const DOCUMENT: u8 = 0x03;
    pub const ARRAY: u8 = 0x04;
    pub const BINARY: u8 = 0x05;
    /// Deprecated.
    pub const UNDEFINED: u8 = 0x06;
    pub const OBJECT_ID: u8 = 0x07;
    pub const BOOLEAN: u8 = 0x08;
    pub const UTC_DATE_TIME: u8 = 0x09;
    pub const NULL: u8 = 0x0a;
    pub const REGEX: u8 = 0x0b;
    /// Deprecated.
    pub const DB_POINTER: u8 = 0x0c;
    pub const JAVASCRIPT: u8 = 0x0d;
    /// Deprecated.
    pub const SYMBOL: u8 = 0x0e;
    pub const JAVASCRIPT_WITH_SCOPE: u8 = 0x0f;
    pub const INT32: u8 = 0x10;
    pub const TIMESTAMP: u8 = 0x11;
    pub const INT64: u8 = 0x12;
}

/// The one-byte discriminator preceding every element in a document frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Double = element_type::DOUBLE,
    String = element_type::STRING,
    Document = element_type::DOCUMENT,
    Array = element_type::ARRAY,
    Binary = element_type::BINARY,
    Undefined = element_type::UNDEFINED,
    ObjectId = element_type::OBJECT_ID,
    Boolean = element_type::BOOLEAN,
    UtcDateTime = element_type::UTC_DATE_TIME,
    Null = element_type::NULL,
    Regex = element_type::REGEX,
    DbPointer = element_type::DB_POINTER,
    JavaScript = element_type::JAVASCRIPT,
    Symbol = element_type::SYMBOL,
    JavaScriptWithScope = element_type::JAVASCRIPT_WITH_SCOPE,
    Int32 = element_type::INT32,
    Timestamp = element_type::TIMESTAMP,
    Int64 = element_type::INT64,
}

impl ElementType {
    /// Map a tag byte to its element type. Returns `None` for the frame
    /// terminator and for every tag outside the supported set.
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            element_type::DOUBLE => Self::Double,
            element_type::STRING => Self::String,
            element_type::DOCUMENT => Self::Document,
            element_type::ARRAY => Self::Array,
            element_type::BINARY => Self::Binary,
            element_type::UNDEFINED => Self::Undefined,
            element_type::OBJECT_ID => Self::ObjectId,
            element_type::BOOLEAN => Self::Boolean,
            element_type::UTC_DATE_TIME => Self::UtcDateTime,
            element_type::NULL => Self::Null,
            element_type::REGEX => Self::Regex,
            element_type::DB_POINTER => Self::DbPointer,
            element_type::JAVASCRIPT => Self::JavaScript,
            element_type::SYMBOL => Self::Symbol,
            element_type::JAVASCRIPT_WITH_SCOPE => Self::JavaScriptWithScope,
            element_type::INT32 => Self::Int32,
            element_type::TIMESTAMP => Self::Timestamp,
            element_type::INT64 => Self::Int64,
            _ => return None,
        })
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for the element types the BSON format has deprecated.
    #[must_use]
    pub const fn is_deprecated(self) -> bool {
        matches!(self, Self::Undefined | Self::DbPointer | Self::Symbol)
    }
}

/// The subtype byte following the length of a Binary element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinarySubtype {
    /// 0x00
    Generic,
    /// 0x01
    Function,
    /// 0x02: legacy generic binary carrying a redundant inner length.
    BinaryOld,
    /// 0x03: legacy UUID with little-endian leading fields.
    UuidOld,
    /// 0x04
    Uuid,
    /// 0x05
    Md5,
    /// 0x80-0xff
    UserDefined(u8),
    /// Any other subtype byte, carried through unchanged.
    Reserved(u8),
}

impl From<u8> for BinarySubtype {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Self::Generic,
            0x01 => Self::Function,
            0x02 => Self::BinaryOld,
            0x03 => Self::UuidOld,
            0x04 => Self::Uuid,
            0x05 => Self::Md5,
            0x80..=0xff => Self::UserDefined(byte),
            _ => Self::Reserved(byte),
        }
    }
}

impl From<BinarySubtype> for u8 {
    fn from(subtype: BinarySubtype) -> Self {
        match subtype {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::BinaryOld => 0x02,
            BinarySubtype::UuidOld => 0x03,
            BinarySubtype::Uuid => 0x04,
            BinarySubtype::Md5 => 0x05,
            BinarySubtype::UserDefined(b) | BinarySubtype::Reserved(b) => b,
        }
    }
}

/// A binary payload together with its declared subtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl Binary {
    /// A generic (subtype 0x00) payload.
    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype: BinarySubtype::Generic,
            bytes: bytes.into(),
        }
    }
}

/// A 12-byte BSON object identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Build an id from a slice, which must be exactly 12 bytes long.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 12]>::try_from(bytes).ok().map(Self)
    }

    /// Parse the 24-character hexadecimal form.
    #[must_use]
    pub fn parse_str(s: &str) -> Option<Self> {
        if s.len() != 24 || !s.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }

    #[must_use]
    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

/// A regular expression as stored in BSON: a pattern and its option characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Regex {
    pub pattern: String,
    pub options: String,
}

impl Regex {
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

/// Regex option characters in the alphabetical order BSON requires.
pub(crate) fn sort_regex_options(options: &str) -> String {
    let mut chars: Vec<char> = options.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.options)
    }
}

/// A decimal number with a base-10 representation.
///
/// The value is: sign × significand × 10^exponent
///
/// Used as the high-precision decimal type: encoding narrows it to a
/// Double, and Double elements can be decoded into it exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BigNumber {
    /// The absolute value of the significand (0 to 2^64-1)
    pub significand: u64,
    /// The base-10 exponent
    pub exponent: i32,
    /// The sign: 1 for positive, -1 for negative
    pub sign: i8,
}

impl BigNumber {
    /// Create a new BigNumber.
    ///
    /// # Arguments
    /// * `sign` - The sign: 1 for positive, -1 for negative
    /// * `significand` - The absolute value of the significand
    /// * `exponent` - The base-10 exponent
    #[inline]
    #[must_use]
    pub const fn new(sign: i8, significand: u64, exponent: i32) -> Self {
        Self {
            significand,
            exponent,
            sign,
        }
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(1, 0, 0)
    }

    /// Try to convert this BigNumber to an i64.
    /// Returns None if the value cannot be represented exactly.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        let mut significand = self.significand;
        let mut exponent = self.exponent;
        // 1500e-2 is still an integer
        while exponent < 0 && significand % 10 == 0 && significand != 0 {
            significand /= 10;
            exponent += 1;
        }
        if significand == 0 {
            return Some(0);
        }
        if !(0..=18).contains(&exponent) {
            return None;
        }

        let multiplier = 10i128.checked_pow(exponent as u32)?;
        let mut value = i128::from(significand).checked_mul(multiplier)?;
        if self.sign < 0 {
            value = -value;
        }
        i64::try_from(value).ok()
    }

    /// Convert to the nearest f64. Narrowing: precision beyond 17 significant
    /// digits is lost.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        let magnitude = format!("{}e{}", self.significand, self.exponent)
            .parse::<f64>()
            .unwrap_or(f64::INFINITY);
        if self.sign < 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    /// The shortest decimal that round-trips to `value`.
    /// Returns None for NaN and the infinities.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let sign = if value.is_sign_negative() { -1 } else { 1 };
        if value == 0.0 {
            return Some(Self::new(sign, 0, 0));
        }

        // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e-7"
        let text = format!("{:e}", value.abs());
        let (mantissa, exp) = text.split_once('e')?;
        let exp: i32 = exp.parse().ok()?;
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let significand: u64 = format!("{int_part}{frac_part}").parse().ok()?;
        let exponent = exp - i32::try_from(frac_part.len()).ok()?;
        Some(Self::new(sign, significand, exponent))
    }

    /// Parse a plain or exponent-form decimal string such as `-12.5` or `3e-4`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (sign, rest) = match text.as_bytes().first()? {
            b'-' => (-1, &text[1..]),
            b'+' => (1, &text[1..]),
            _ => (1, text),
        };
        let (mantissa, exp) = match rest.find(['e', 'E']) {
            Some(i) => (&rest[..i], rest[i + 1..].parse::<i32>().ok()?),
            None => (rest, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let mut significand: u64 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            let digit = c.to_digit(10)?;
            significand = significand.checked_mul(10)?.checked_add(u64::from(digit))?;
        }
        let exponent = exp.checked_sub(i32::try_from(frac_part.len()).ok()?)?;
        Some(Self::new(sign, significand, exponent))
    }

    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        if value == 0 {
            return Self::zero();
        }

        let sign = if value < 0 { -1 } else { 1 };
        Self::new(sign, value.unsigned_abs(), 0)
    }

    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self::new(1, value, 0)
    }
}

impl Default for BigNumber {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign < 0 && self.significand != 0 {
            write!(f, "-")?;
        }
        let digits = self.significand.to_string();
        if self.exponent >= 0 {
            write!(f, "{digits}")?;
            for _ in 0..self.exponent {
                write!(f, "0")?;
            }
            return Ok(());
        }

        let shift = self.exponent.unsigned_abs() as usize;
        if shift >= digits.len() {
            write!(f, "0.")?;
            for _ in 0..shift - digits.len() {
                write!(f, "0")?;
            }
            write!(f, "{digits}")
        } else {
            let (int_part, frac_part) = digits.split_at(digits.len() - shift);
            write!(f, "{int_part}.{frac_part}")
        }
    }
}

/// How instants are tagged on the way out of the decoder and normalized on
/// the way into the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeKind {
    #[default]
    Utc,
    Local,
    Unspecified,
}

/// How Double elements are surfaced by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatParseHandling {
    #[default]
    Double,
    Decimal,
}

/// An instant as carried by Date tokens.
///
/// `Unspecified` holds a wall-clock time with no zone attached. When
/// encoding under [`DateTimeKind::Unspecified`] it is read as UTC wall time;
/// under `Utc` or `Local` it is read as local wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeValue {
    Utc(DateTime<Utc>),
    Local(DateTime<Local>),
    Unspecified(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl DateTimeValue {
    /// Resolve to a UTC instant. Returns None when an unspecified wall time
    /// does not exist in the local zone.
    #[must_use]
    pub fn to_utc(&self, handling: DateTimeKind) -> Option<DateTime<Utc>> {
        match self {
            Self::Utc(dt) => Some(*dt),
            Self::Local(dt) => Some(dt.with_timezone(&Utc)),
            Self::Offset(dt) => Some(dt.with_timezone(&Utc)),
            Self::Unspecified(naive) => match handling {
                DateTimeKind::Unspecified => Some(naive.and_utc()),
                DateTimeKind::Utc | DateTimeKind::Local => Local
                    .from_local_datetime(naive)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc)),
            },
        }
    }

    /// Milliseconds since the Unix epoch, as stored in a UtcDateTime element.
    #[must_use]
    pub fn to_millis(&self, handling: DateTimeKind) -> Option<i64> {
        self.to_utc(handling).map(|dt| dt.timestamp_millis())
    }

    /// Tag a decoded UtcDateTime according to `handling`.
    #[must_use]
    pub fn from_millis(millis: i64, handling: DateTimeKind) -> Option<Self> {
        let utc = DateTime::from_timestamp_millis(millis)?;
        Some(match handling {
            DateTimeKind::Utc => Self::Utc(utc),
            DateTimeKind::Local => Self::Local(utc.with_timezone(&Local)),
            DateTimeKind::Unspecified => Self::Unspecified(utc.naive_utc()),
        })
    }
}

impl fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Local(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, false)),
            Self::Offset(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Millis, false)),
            Self::Unspecified(naive) => write!(f, "{}", naive.format("%Y-%m-%dT%H:%M:%S%.3f")),
        }
    }
}

impl From<DateTime<Utc>> for DateTimeValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Utc(dt)
    }
}

impl From<DateTime<Local>> for DateTimeValue {
    fn from(dt: DateTime<Local>) -> Self {
        Self::Local(dt)
    }
}

impl From<DateTime<FixedOffset>> for DateTimeValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::Offset(dt)
    }
}

impl From<NaiveDateTime> for DateTimeValue {
    fn from(naive: NaiveDateTime) -> Self {
        Self::Unspecified(naive)
    }
}
