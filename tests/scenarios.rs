// ABOUTME: End-to-end scenarios for the BSON encoder and decoder.
// ABOUTME: Checks literal byte layouts, token round-trips and frame length correctness.

use chrono::DateTime;
use regex::Regex;
use serde_bsonwire::{
    bson, encode_bson, BigNumber, Binary, DateTimeValue, Decoder, DecoderConfig, Encoder,
    EncoderConfig, Error, ErrorKind, ObjectId, Token, TokenType, Uuid, Value, ValueType,
};

/// Convert a dash- or space-separated hex string to bytes.
fn hex_to_bytes(s: &str) -> Vec<u8> {
    let hex: String = s.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

fn encode_tokens(config: EncoderConfig, tokens: &[Token]) -> Vec<u8> {
    let mut enc = Encoder::with_config(Vec::new(), config);
    for token in tokens {
        enc.write_token(token).unwrap();
    }
    enc.finish().unwrap()
}

fn decode_tokens(config: DecoderConfig, bytes: &[u8]) -> Vec<Token> {
    let mut dec = Decoder::with_config(bytes, config);
    let mut tokens = Vec::new();
    while dec.read().unwrap() != TokenType::None {
        tokens.push(dec.token().clone());
    }
    tokens
}

fn name(s: &str) -> Token {
    Token::PropertyName(s.to_owned())
}

fn val(v: impl Into<Value>) -> Token {
    Token::Value(v.into())
}

fn root_array() -> DecoderConfig {
    DecoderConfig {
        read_root_value_as_array: true,
        ..DecoderConfig::default()
    }
}

/// Independently walk a frame, checking that every declared length matches
/// the bytes it spans. Returns the offset one past the frame.
fn walk_frame(bytes: &[u8], start: usize) -> usize {
    let i32_at = |pos: usize| i32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
    let cstring_end = |pos: usize| pos + bytes[pos..].iter().position(|&b| b == 0).unwrap() + 1;

    let declared = i32_at(start);
    let mut pos = start + 4;
    loop {
        let tag = bytes[pos];
        pos += 1;
        if tag == 0 {
            assert_eq!(pos - start, declared, "frame at {start}");
            return pos;
        }
        pos = cstring_end(pos);
        pos = match tag {
            0x01 | 0x09 | 0x11 | 0x12 => pos + 8,
            0x02 | 0x0d | 0x0e => pos + 4 + i32_at(pos),
            0x03 | 0x04 => walk_frame(bytes, pos),
            0x05 => pos + 5 + i32_at(pos),
            0x06 | 0x0a => pos,
            0x07 => pos + 12,
            0x08 => pos + 1,
            0x0b => cstring_end(cstring_end(pos)),
            0x10 => pos + 4,
            other => panic!("unexpected tag 0x{other:02x}"),
        };
    }
}

#[test]
fn minimal_object() {
    let bytes = encode_tokens(
        EncoderConfig::default(),
        &[Token::StartObject, name("Blah"), val(1), Token::EndObject],
    );
    assert_eq!(bytes, hex_to_bytes("0F-00-00-00-10-42-6C-61-68-00-01-00-00-00-00"));
}

#[test]
fn root_array_of_strings() {
    let tokens = [
        Token::StartArray,
        val("a"),
        val("b"),
        val("c"),
        Token::EndArray,
    ];
    let bytes = encode_tokens(EncoderConfig::default(), &tokens);
    assert_eq!(
        bytes,
        hex_to_bytes(
            "20-00-00-00-02-30-00-02-00-00-00-61-00-02-31-00-02-00-00-00-62-00-02-32-00-02-00-00-00-63-00-00"
        )
    );
    assert_eq!(decode_tokens(root_array(), &bytes), tokens);
}

#[test]
fn empty_string_values() {
    let bytes = encode_tokens(
        EncoderConfig::default(),
        &[Token::StartObject, name(""), val(""), Token::EndObject],
    );
    assert_eq!(bytes, hex_to_bytes("0C-00-00-00-02-00-01-00-00-00-00-00"));
    assert_eq!(
        decode_tokens(DecoderConfig::default(), &bytes),
        vec![Token::StartObject, name(""), val(""), Token::EndObject]
    );
}

#[test]
fn zero_length_source() {
    let mut dec = Decoder::new(&[][..]);
    assert_eq!(dec.read().unwrap(), TokenType::None);
    assert_eq!(dec.read().unwrap(), TokenType::None);
}

#[test]
fn token_round_trip_preserves_value_types() {
    let instant = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
    let tokens = vec![
        Token::StartObject,
        name("i32"),
        val(-7),
        name("i64"),
        val(1i64 << 40),
        name("f"),
        val(0.25),
        name("s"),
        val("h\u{e9}llo \u{1f600}"),
        name("t"),
        val(true),
        name("n"),
        val(Value::Null),
        name("u"),
        val(Value::Undefined),
        name("bin"),
        val(Binary::generic(vec![0u8, 1, 255])),
        name("uuid"),
        val(Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff)),
        name("oid"),
        val(ObjectId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])),
        name("when"),
        val(instant),
        name("list"),
        Token::StartArray,
        val(1),
        Token::StartObject,
        name("deep"),
        Token::StartArray,
        Token::EndArray,
        Token::EndObject,
        Token::EndArray,
        Token::EndObject,
    ];
    let bytes = encode_tokens(EncoderConfig::default(), &tokens);
    assert_eq!(decode_tokens(DecoderConfig::default(), &bytes), tokens);

    let mut dec = Decoder::new(&bytes[..]);
    let mut types = Vec::new();
    while dec.read().unwrap() != TokenType::None {
        if let Some(t) = dec.value_type() {
            types.push(t);
        }
    }
    assert_eq!(
        &types[..6],
        &[
            ValueType::Int32,
            ValueType::Int64,
            ValueType::Double,
            ValueType::String,
            ValueType::Boolean,
            ValueType::Null
        ]
    );
    assert!(types.contains(&ValueType::Uuid));
    assert!(types.contains(&ValueType::ObjectId));
    assert!(types.contains(&ValueType::DateTime));
}

#[test]
fn lossy_conversions_are_idempotent() {
    let tokens = [
        Token::StartObject,
        name("dec"),
        val(BigNumber::new(1, 15, -1)),
        name("big"),
        val(u64::MAX),
        Token::EndObject,
    ];
    let once = encode_tokens(EncoderConfig::default(), &tokens);
    let decoded = decode_tokens(DecoderConfig::default(), &once);
    assert_eq!(decoded[2], val(1.5));
    assert_eq!(decoded[4], val(u64::MAX as f64));

    let twice = encode_tokens(EncoderConfig::default(), &decoded);
    assert_eq!(twice, once);
}

#[test]
fn frame_lengths_match_spans() {
    let doc = bson!({
        "a": { "b": { "c": [1, [2, [3, []]], {}] } },
        "s": "text",
        "bin": (Binary::generic(vec![1u8; 40])),
        "re": (serde_bsonwire::Regex::new("^a.*", "mi")),
        "f": 1.5,
        "l": (1i64 << 50),
        "o": (ObjectId::from_bytes([0xab; 12])),
        "z": [null, true, "x", { "q": [] }]
    });
    let bytes = encode_bson(&doc).unwrap();
    assert_eq!(walk_frame(&bytes, 0), bytes.len());

    let mut stream = bytes.clone();
    stream.extend(encode_bson(&bson!([[[]], {}])).unwrap());
    let end = walk_frame(&stream, 0);
    assert_eq!(walk_frame(&stream, end), stream.len());
}

#[test]
fn multiple_documents_reset_between_roots() {
    let mut stream = encode_bson(&bson!({ "n": 1 })).unwrap();
    stream.extend(encode_bson(&bson!({ "n": 2 })).unwrap());

    let config = DecoderConfig {
        support_multiple_content: true,
        ..DecoderConfig::default()
    };
    let one = [Token::StartObject, name("n"), val(1), Token::EndObject];
    let two = [Token::StartObject, name("n"), val(2), Token::EndObject];
    assert_eq!(decode_tokens(config, &stream), [one.clone(), two].concat());

    // Without the option the decoder stops after the first root.
    assert_eq!(decode_tokens(DecoderConfig::default(), &stream), one);
}

#[test]
fn date_kind_handling_on_read() {
    let instant = DateTime::from_timestamp_millis(86_400_000).unwrap();
    let bytes = encode_bson(&bson!({ "d": instant })).unwrap();

    let config = DecoderConfig {
        date_time_kind_handling: serde_bsonwire::DateTimeKind::Unspecified,
        ..DecoderConfig::default()
    };
    let tokens = decode_tokens(config, &bytes);
    assert_eq!(
        tokens[2],
        val(DateTimeValue::Unspecified(instant.naive_utc()))
    );
}

#[test]
fn legacy_subtypes_read_like_current_ones() {
    let uuid = Uuid::from_u128(0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10);
    let compat = EncoderConfig {
        binary_compatibility_mode: true,
        ..EncoderConfig::default()
    };
    let tokens = [
        Token::StartObject,
        name("u"),
        val(uuid),
        name("b"),
        val(Binary::generic(vec![7u8, 8])),
        Token::EndObject,
    ];
    let legacy = encode_tokens(compat, &tokens);
    let current = encode_tokens(EncoderConfig::default(), &tokens);
    assert_ne!(legacy, current);
    assert_eq!(walk_frame(&legacy, 0), legacy.len());

    let decoded = decode_tokens(DecoderConfig::default(), &legacy);
    assert_eq!(decoded[2], val(uuid));
    assert_eq!(decoded[4].value().and_then(Value::as_bytes), Some(&[7u8, 8][..]));
}

#[test]
fn unsupported_and_misplaced_writes() {
    let mut enc = Encoder::new(Vec::new());
    let err = enc.write_i32(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(matches!(err, Error::NoRootContainer(_)));

    enc.write_start_object().unwrap();
    for token in [
        Token::Comment("c".into()),
        Token::Raw("{}".into()),
        Token::StartConstructor("Date".into()),
        Token::EndConstructor,
    ] {
        assert_eq!(
            enc.write_token(&token),
            Err(Error::UnsupportedToken(token.token_type()))
        );
    }
}

#[test]
fn conversion_errors_name_path_and_value() {
    let bytes = encode_bson(&bson!({ "a": { "b c": ["1", "x1"] } })).unwrap();
    let mut dec = Decoder::new(&bytes[..]);
    // StartObject, "a", StartObject, "b c", StartArray
    for _ in 0..5 {
        dec.read().unwrap();
    }
    assert_eq!(dec.read_as_int32().unwrap(), Some(1));
    let err = dec.read_as_int32().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conversion);

    let shape = Regex::new(r"^Could not convert string to integer: x1\. Path '(.+)'$").unwrap();
    let message = err.to_string();
    let captures = shape.captures(&message).unwrap();
    assert_eq!(&captures[1], "a['b c'][1]");

    // The decoder is still usable.
    assert_eq!(dec.read().unwrap(), TokenType::EndArray);
}

#[test]
fn truncated_input_is_a_format_error() {
    let bytes = encode_bson(&bson!({ "a": "hello", "b": [1, 2] })).unwrap();
    for cut in 1..bytes.len() {
        let mut dec = Decoder::new(&bytes[..cut]);
        let err = loop {
            match dec.read() {
                Ok(TokenType::None) => panic!("cut {cut} decoded to the end"),
                Ok(_) => {}
                Err(e) => break e,
            }
        };
        assert_eq!(err.kind(), ErrorKind::Format, "cut {cut}: {err}");
        assert_eq!(dec.read(), Err(Error::Poisoned));
    }
}
