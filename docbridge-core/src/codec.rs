//! Extended-type codec: lossless text transform between script literals and
//! a prefix-tagged JSON encoding.
//!
//! Types with no native JSON representation (object ids, dates, timestamps,
//! regexes, binary, min/max keys, code) travel through JSON as single string
//! values carrying a `$__` prefix tag. [`encode`] rewrites script literals
//! into tagged strings so a document survives standard JSON parsing;
//! [`decode`] is its inverse and emits the literal syntax the target script
//! understands. [`revive`] turns tagged strings that came out of a JSON
//! parser back into native BSON values for the apply engine.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use mongodb::bson::{Binary, Bson, Document, Regex as BsonRegex, Timestamp, oid::ObjectId};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::{DocBridgeError, Result};

macro_rules! pattern {
    ($name:ident, $re:literal) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("codec pattern compiles"));
    };
}

// Literal forms, matched during encoding
pattern!(OID_LITERAL, r#"(?i)ObjectId\("(.*?)"\)"#);
pattern!(DATE_LITERAL, r#"(?i)ISODate\("(.*?)"\)"#);
pattern!(TIMESTAMP_LITERAL, r"(?i)Timestamp\((.*?)\)");
pattern!(REGEX_VALUE, r#"(?i)"\s*:\s*/(.*?)/([^,\s\]}\n]*)"#);
pattern!(BINDATA_LITERAL, r#"(?i)BinData\((\d*),"(.*?)"\)"#);
pattern!(CODE_LITERAL, r#"(?i)Code\("(.*?)"\)"#);
pattern!(MINKEY_LITERAL, r"(?i)(?:new )?MinKey\((\d*)\)");
pattern!(MAXKEY_LITERAL, r"(?i)(?:new )?MaxKey\((\d*)\)");

// Structural forms produced by serializing raw BSON samples to JSON
pattern!(
    CODE_WITH_SCOPE_CONTEXT,
    r#"(?i)"type": "JavaScript\(w/scope\)",\s*.*?"sample": \{\s*"_bsontype": "Code",\s*"code": "(.*?})",\s*"scope": .*?\s*\}"#
);
pattern!(
    CODE_WITH_SCOPE_INNER,
    r#"(?i)\{\s*"_bsontype": "Code",\s*"code": "(.*?})",\s*"scope": .*?\s*\}"#
);
pattern!(
    CODE_STRUCTURAL,
    r#"(?i)\{\s*"_bsontype": "Code",\s*"code": "(.*?})".*?\s*\}"#
);
pattern!(
    MINKEY_CONTEXT,
    r#"(?i)"type": "minKey",\s*.*?"sample": \{\s*"\$minKey": (\d*)\s*\}"#
);
pattern!(MINKEY_INNER, r#"(?i)\{\s*"\$minKey": (\d*)\s*\}"#);
pattern!(
    MAXKEY_CONTEXT,
    r#"(?i)"type": "maxKey",\s*.*?"sample": \{\s*"\$maxKey": (\d*)\s*\}"#
);
pattern!(MAXKEY_INNER, r#"(?i)\{\s*"\$maxKey": (\d*)\s*\}"#);

// Tagged strings, matched during decoding
pattern!(OID_TAG, r#"(?i)"\$__oid_(.*?)""#);
pattern!(DATE_TAG, r#"(?i)"\$__date_(.*?)""#);
pattern!(TIMESTAMP_TAG, r#"(?i)"(?:CURRENT_)?\$__tmstmp_(.*?)""#);
pattern!(REGEX_TAG, r#"(?i)"\$__rgxp_(.*?)""#);
pattern!(BINDATA_TAG, r#"(?i)"\$__bindata_(\d*)_(.*?)""#);
pattern!(MAXKEY_TAG, r#"(?i)"\$__maxKey_(\d*)""#);
pattern!(MINKEY_TAG, r#"(?i)"\$__minKey_(\d*)""#);
pattern!(CODE_SCOPE_TAG, r#"(?i)"\$__jswscope_(.*?})""#);
pattern!(CODE_TAG, r#"(?i)"\$__js_(.*?})""#);

/// Rewrites script literals inside JSON-serialized text into prefix-tagged
/// string values. A no-op on text containing none of the literal forms.
pub fn encode(data: &str) -> String {
    let data = OID_LITERAL.replace_all(data, |c: &Captures| format!("\"$__oid_{}\"", &c[1]));
    let data = DATE_LITERAL.replace_all(&data, |c: &Captures| format!("\"$__date_{}\"", &c[1]));
    let data =
        TIMESTAMP_LITERAL.replace_all(&data, |c: &Captures| format!("\"$__tmstmp_{}\"", &c[1]));
    // Regexes are only recognized in value position, right after a key
    // colon; flags stop at the first delimiter after the closing slash
    let data = REGEX_VALUE.replace_all(&data, |c: &Captures| {
        format!("\": \"$__rgxp_/{}/{}\"", &c[1], &c[2])
    });
    let data = BINDATA_LITERAL.replace_all(&data, |c: &Captures| {
        format!("\"$__bindata_{}_{}\"", &c[1], &c[2])
    });
    // Code with scope is distinguished from plain code by the sibling
    // "scope" field; the surrounding type annotation anchors the match
    let data = CODE_WITH_SCOPE_CONTEXT.replace_all(&data, |outer: &Captures| {
        CODE_WITH_SCOPE_INNER
            .replace(&outer[0], |inner: &Captures| {
                format!("\"$__jswscope_{}\"", &inner[1])
            })
            .into_owned()
    });
    let data = CODE_STRUCTURAL.replace_all(&data, |c: &Captures| format!("\"$__js_{}\"", &c[1]));
    let data = CODE_LITERAL.replace_all(&data, |c: &Captures| format!("\"$__js_{}\"", &c[1]));
    let data = MINKEY_CONTEXT.replace_all(&data, |outer: &Captures| {
        MINKEY_INNER
            .replace(&outer[0], |inner: &Captures| {
                format!("\"$__minKey_{}\"", &inner[1])
            })
            .into_owned()
    });
    let data = MAXKEY_CONTEXT.replace_all(&data, |outer: &Captures| {
        MAXKEY_INNER
            .replace(&outer[0], |inner: &Captures| {
                format!("\"$__maxKey_{}\"", &inner[1])
            })
            .into_owned()
    });
    let data = MINKEY_LITERAL.replace_all(&data, |c: &Captures| format!("\"$__minKey_{}\"", &c[1]));
    let data = MAXKEY_LITERAL.replace_all(&data, |c: &Captures| format!("\"$__maxKey_{}\"", &c[1]));
    data.into_owned()
}

/// Rewrites prefix-tagged string values back into script literal syntax.
pub fn decode(data: &str) -> String {
    let data = OID_TAG.replace_all(data, |c: &Captures| format!("ObjectId(\"{}\")", &c[1]));
    let data = DATE_TAG.replace_all(&data, |c: &Captures| format!("ISODate(\"{}\")", &c[1]));
    let data = TIMESTAMP_TAG.replace_all(&data, |c: &Captures| format!("Timestamp({})", &c[1]));
    let data = REGEX_TAG.replace_all(&data, |c: &Captures| c[1].to_string());
    let data = BINDATA_TAG.replace_all(&data, |c: &Captures| {
        format!("BinData({},\"{}\")", &c[1], &c[2])
    });
    let data = MAXKEY_TAG.replace_all(&data, |c: &Captures| format!("MaxKey({})", &c[1]));
    let data = MINKEY_TAG.replace_all(&data, |c: &Captures| format!("MinKey({})", &c[1]));
    let data = CODE_SCOPE_TAG.replace_all(&data, |c: &Captures| format!("Code(\"{}\")", &c[1]));
    let data = CODE_TAG.replace_all(&data, |c: &Captures| format!("Code(\"{}\")", &c[1]));
    data.into_owned()
}

/// Rewrites `{"$minKey": n}` / `{"$maxKey": n}` JSON sentinel objects into
/// `MinKey(n)` / `MaxKey(n)` literals ahead of encoding.
pub fn convert_sentinels(data: &str) -> String {
    let data = MINKEY_INNER.replace_all(data, |c: &Captures| format!("MinKey({})", &c[1]));
    let data = MAXKEY_INNER.replace_all(&data, |c: &Captures| format!("MaxKey({})", &c[1]));
    data.into_owned()
}

/// Converts a parsed JSON value into BSON, turning tagged strings back into
/// their native types. Unrecognized or malformed tags stay plain strings.
pub fn revive(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if let Ok(small) = i32::try_from(i) {
                    Bson::Int32(small)
                } else {
                    Bson::Int64(i)
                }
            } else {
                Bson::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => revive_string(s),
        Value::Array(items) => Bson::Array(items.iter().map(revive).collect()),
        Value::Object(fields) => {
            let mut document = Document::new();
            for (name, value) in fields {
                document.insert(name.clone(), revive(value));
            }
            Bson::Document(document)
        }
    }
}

/// Parses annotated JSON text into a BSON document, reviving tagged strings.
pub fn revive_document(data: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| DocBridgeError::serialization("script argument", e))?;
    match revive(&value) {
        Bson::Document(document) => Ok(document),
        _ => Err(DocBridgeError::script_parse(
            "statement argument is not a document",
        )),
    }
}

fn revive_string(s: &str) -> Bson {
    if let Some(hex) = s.strip_prefix("$__oid_") {
        return ObjectId::parse_str(hex)
            .map(Bson::ObjectId)
            .unwrap_or_else(|_| Bson::String(s.to_string()));
    }
    if let Some(iso) = s.strip_prefix("$__date_") {
        return mongodb::bson::DateTime::parse_rfc3339_str(iso)
            .map(Bson::DateTime)
            .unwrap_or_else(|_| Bson::String(s.to_string()));
    }
    if let Some(pair) = s.strip_prefix("$__tmstmp_") {
        if let Some(ts) = parse_timestamp_pair(pair) {
            return Bson::Timestamp(ts);
        }
        return Bson::String(s.to_string());
    }
    if let Some(body) = s.strip_prefix("$__rgxp_") {
        if let Some(regex) = parse_regex_body(body) {
            return Bson::RegularExpression(regex);
        }
        return Bson::String(s.to_string());
    }
    if let Some(rest) = s.strip_prefix("$__bindata_") {
        if let Some((subtype, payload)) = rest.split_once('_') {
            if let (Ok(subtype), Ok(bytes)) = (subtype.parse::<u8>(), BASE64.decode(payload)) {
                return Bson::Binary(Binary {
                    subtype: subtype.into(),
                    bytes,
                });
            }
        }
        return Bson::String(s.to_string());
    }
    if s.strip_prefix("$__minKey_").is_some() {
        return Bson::MinKey;
    }
    if s.strip_prefix("$__maxKey_").is_some() {
        return Bson::MaxKey;
    }
    if let Some(code) = s.strip_prefix("$__jswscope_") {
        return Bson::JavaScriptCode(code.to_string());
    }
    if let Some(code) = s.strip_prefix("$__js_") {
        return Bson::JavaScriptCode(code.to_string());
    }
    Bson::String(s.to_string())
}

fn parse_timestamp_pair(pair: &str) -> Option<Timestamp> {
    let (time, increment) = pair.split_once(',')?;
    Some(Timestamp {
        time: time.trim().parse().ok()?,
        increment: increment.trim().parse().ok()?,
    })
}

fn parse_regex_body(body: &str) -> Option<BsonRegex> {
    let body = body.strip_prefix('/')?;
    let (pattern, options) = body.rsplit_once('/')?;
    Some(BsonRegex {
        pattern: pattern.to_string(),
        options: options.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_round_trip() {
        let literal = r#"{ "_id": ObjectId("5a9427648b0beebeb69579e7") }"#;
        let encoded = encode(literal);
        assert_eq!(
            encoded,
            r#"{ "_id": "$__oid_5a9427648b0beebeb69579e7" }"#
        );
        assert_eq!(decode(&encoded), literal);
    }

    #[test]
    fn test_date_round_trip() {
        let literal = r#"{ "at": ISODate("2023-01-01T00:00:00.000Z") }"#;
        assert_eq!(decode(&encode(literal)), literal);
    }

    #[test]
    fn test_timestamp_round_trip() {
        let literal = r#"{ "ts": Timestamp(1673000000,1) }"#;
        let encoded = encode(literal);
        assert!(encoded.contains("$__tmstmp_1673000000,1"));
        assert_eq!(decode(&encoded), literal);
    }

    #[test]
    fn test_timestamp_current_prefix_decodes() {
        let tagged = r#"{ "ts": "CURRENT_$__tmstmp_1,2" }"#;
        assert_eq!(decode(tagged), r#"{ "ts": Timestamp(1,2) }"#);
    }

    #[test]
    fn test_regex_round_trip_keeps_flags_in_bounds() {
        let literal = "{ \"rx\": /^user_[0-9]+$/i,\n \"n\": 1 }";
        let encoded = encode(literal);
        assert!(encoded.contains("\"$__rgxp_/^user_[0-9]+$/i\""));
        // The trailing comma and following field are untouched
        assert!(encoded.contains("\"n\": 1"));
        assert_eq!(decode(&encoded), literal);
    }

    #[test]
    fn test_regex_not_matched_outside_value_position() {
        let text = r#"{ "path": "/usr/bin" }"#;
        assert_eq!(encode(text), text);
    }

    #[test]
    fn test_bindata_round_trip() {
        let literal = r#"{ "blob": BinData(0,"YWJj") }"#;
        let encoded = encode(literal);
        assert!(encoded.contains("$__bindata_0_YWJj"));
        assert_eq!(decode(&encoded), literal);
    }

    #[test]
    fn test_min_max_key_round_trip() {
        let literal = r#"{ "lo": MinKey(1), "hi": MaxKey(127) }"#;
        assert_eq!(decode(&encode(literal)), literal);
    }

    #[test]
    fn test_legacy_new_prefix_is_normalized() {
        let literal = r#"{ "lo": new MinKey(1) }"#;
        assert_eq!(decode(&encode(literal)), r#"{ "lo": MinKey(1) }"#);
    }

    #[test]
    fn test_code_round_trip() {
        let literal = r#"{ "fn": Code("function () { return 1; }") }"#;
        assert_eq!(decode(&encode(literal)), literal);
    }

    #[test]
    fn test_code_with_scope_structural_form() {
        let sample = r#""type": "JavaScript(w/scope)", "x": 1, "sample": { "_bsontype": "Code", "code": "function () { return a; }", "scope": { "a": 1 } }"#;
        let encoded = encode(sample);
        assert!(encoded.contains("$__jswscope_function () { return a; }"));
        assert!(decode(&encoded).contains(r#"Code("function () { return a; }")"#));
    }

    #[test]
    fn test_plain_code_structural_form() {
        let sample = r#"{ "_bsontype": "Code", "code": "function () { return 1; }" }"#;
        let encoded = encode(sample);
        assert!(encoded.contains("$__js_function () { return 1; }"));
    }

    #[test]
    fn test_encode_is_noop_without_literals() {
        let text = r#"{ "name": "plain", "n": 3, "nested": { "ok": true } }"#;
        assert_eq!(encode(text), text);
        assert_eq!(decode(text), text);
    }

    #[test]
    fn test_convert_sentinels() {
        let text = r#"{ "lo": { "$minKey": 1 }, "hi": { "$maxKey": 127 } }"#;
        assert_eq!(
            convert_sentinels(text),
            r#"{ "lo": MinKey(1), "hi": MaxKey(127) }"#
        );
    }

    #[test]
    fn test_revive_document() {
        let encoded = encode(
            r#"{ "_id": ObjectId("5a9427648b0beebeb69579e7"), "at": ISODate("2023-01-01T00:00:00Z"), "n": 2, "big": 9000000000 }"#,
        );
        let document = revive_document(&encoded).unwrap();

        assert!(matches!(document.get("_id"), Some(Bson::ObjectId(_))));
        assert!(matches!(document.get("at"), Some(Bson::DateTime(_))));
        assert_eq!(document.get("n"), Some(&Bson::Int32(2)));
        assert_eq!(document.get("big"), Some(&Bson::Int64(9_000_000_000)));
    }

    #[test]
    fn test_revive_binary_and_regex() {
        let encoded = encode(r#"{ "blob": BinData(0,"YWJj"), "rx": /ab+/i }"#);
        let document = revive_document(&encoded).unwrap();

        match document.get("blob") {
            Some(Bson::Binary(binary)) => assert_eq!(binary.bytes, b"abc"),
            other => panic!("expected binary, got {:?}", other),
        }
        match document.get("rx") {
            Some(Bson::RegularExpression(regex)) => {
                assert_eq!(regex.pattern, "ab+");
                assert_eq!(regex.options, "i");
            }
            other => panic!("expected regex, got {:?}", other),
        }
    }

    #[test]
    fn test_revive_malformed_tag_stays_string() {
        let value = Value::String("$__oid_not-hex".to_string());
        assert_eq!(revive(&value), Bson::String("$__oid_not-hex".to_string()));
    }
}
