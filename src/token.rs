// ABOUTME: The generic JSON-like token vocabulary shared by the encoder and decoder.
// ABOUTME: Includes the comment/raw/constructor kinds that BSON cannot represent.

use crate::value::Value;
use std::fmt;

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// No token: before the first read, or at end of stream.
    None,
    StartObject,
    StartArray,
    StartConstructor,
    PropertyName,
    Comment,
    Raw,
    Integer,
    Float,
    String,
    Boolean,
    Null,
    Undefined,
    EndObject,
    EndArray,
    EndConstructor,
    Date,
    Bytes,
}

impl TokenType {
    #[must_use]
    pub const fn is_start(self) -> bool {
        matches!(
            self,
            TokenType::StartObject | TokenType::StartArray | TokenType::StartConstructor
        )
    }

    #[must_use]
    pub const fn is_end(self) -> bool {
        matches!(
            self,
            TokenType::EndObject | TokenType::EndArray | TokenType::EndConstructor
        )
    }

    /// True for tokens that carry a scalar value.
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        matches!(
            self,
            TokenType::Integer
                | TokenType::Float
                | TokenType::String
                | TokenType::Boolean
                | TokenType::Null
                | TokenType::Undefined
                | TokenType::Date
                | TokenType::Bytes
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An owned token, as produced by the decoder and accepted by
/// [`Encoder::write_token`](crate::Encoder::write_token).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Token {
    #[default]
    None,
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    PropertyName(String),
    Value(Value),
    Comment(String),
    Raw(String),
    StartConstructor(String),
    EndConstructor,
}

impl Token {
    #[must_use]
    pub fn token_type(&self) -> TokenType {
        match self {
            Token::None => TokenType::None,
            Token::StartObject => TokenType::StartObject,
            Token::EndObject => TokenType::EndObject,
            Token::StartArray => TokenType::StartArray,
            Token::EndArray => TokenType::EndArray,
            Token::PropertyName(_) => TokenType::PropertyName,
            Token::Value(value) => value.token_type(),
            Token::Comment(_) => TokenType::Comment,
            Token::Raw(_) => TokenType::Raw,
            Token::StartConstructor(_) => TokenType::StartConstructor,
            Token::EndConstructor => TokenType::EndConstructor,
        }
    }

    /// The scalar value carried by this token, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Token::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for Token {
    fn from(value: Value) -> Self {
        Token::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_types() {
        assert_eq!(Token::from(Value::from(1i32)).token_type(), TokenType::Integer);
        assert_eq!(Token::from(Value::from(1.5f64)).token_type(), TokenType::Float);
        assert_eq!(Token::from(Value::from("x")).token_type(), TokenType::String);
        assert_eq!(Token::Value(Value::Null).token_type(), TokenType::Null);
        assert_eq!(Token::Value(Value::Undefined).token_type(), TokenType::Undefined);
        assert_eq!(Token::from(Value::from(vec![1u8, 2])).token_type(), TokenType::Bytes);
        assert_eq!(Token::PropertyName("a".into()).token_type(), TokenType::PropertyName);
        assert!(Token::None.value().is_none());
    }

    #[test]
    fn test_token_type_groups() {
        assert!(TokenType::StartArray.is_start());
        assert!(TokenType::EndConstructor.is_end());
        assert!(TokenType::Date.is_primitive());
        assert!(!TokenType::PropertyName.is_primitive());
    }
}
