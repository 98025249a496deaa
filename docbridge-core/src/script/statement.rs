//! Typed script statements and the line-oriented parser that produces them.
//!
//! The generated script format is strict enough that no dynamic evaluation
//! is needed: statements are blank-line separated, comment blocks occupy
//! whole lines, and every argument list is valid JSON once the extended-type
//! codec has encoded the literal forms. The parser accumulates lines until
//! the buffered argument text parses, which also copes with `");"` sequences
//! inside string values.

use std::sync::LazyLock;

use mongodb::bson::{Bson, Document};
use regex::Regex;
use serde_json::Value;

use crate::codec;
use crate::error::{DocBridgeError, Result};

/// One executable statement of a generated script.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    UseDb(String),
    CreateCollection(String),
    CreateIndex {
        collection: String,
        keys: Document,
        options: Document,
    },
    Insert {
        collection: String,
        document: Document,
    },
    RunCommand(Document),
}

static USE_DB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)^use (.+);$|^useDb\("(.+)"\);$"#).expect("pattern compiles"));
static CREATE_COLLECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^db\.createCollection\("(.+)"\);$"#).expect("pattern compiles")
});
static COLLECTION_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^db\.getCollection\("(.+?)"\)\.(createIndex|insert)\("#).expect("pattern compiles")
});
static RUN_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^db\.runCommand\(").expect("pattern compiles"));

/// Parses script text into an ordered statement list.
///
/// Comment blocks (`/* ... */` on their own lines) and blank lines are
/// skipped. Multi-line argument lists are accumulated until they parse.
pub fn parse_script(script: &str) -> Result<Vec<Statement>> {
    let script = codec::convert_sentinels(script);
    let mut statements = Vec::new();
    let mut lines = script.lines().peekable();
    let mut in_comment = false;

    while let Some(line) = lines.next() {
        let trimmed = line.trim();

        if in_comment {
            if trimmed.ends_with("*/") {
                in_comment = false;
            }
            continue;
        }
        if trimmed.starts_with("/*") {
            in_comment = !trimmed.ends_with("*/");
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        if let Some(captures) = USE_DB.captures(trimmed) {
            let name = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            statements.push(Statement::UseDb(name));
            continue;
        }

        if let Some(captures) = CREATE_COLLECTION.captures(trimmed) {
            statements.push(Statement::CreateCollection(captures[1].to_string()));
            continue;
        }

        if let Some(captures) = COLLECTION_CALL.captures(trimmed) {
            let collection = captures[1].to_string();
            let method = captures[2].to_string();
            let opening = captures.get(0).map(|m| m.end()).unwrap_or(0);
            let arguments = accumulate_arguments(&trimmed[opening..], &mut lines)?;

            match method.as_str() {
                "createIndex" => {
                    let mut parsed = parse_argument_list(&arguments)?;
                    if parsed.is_empty() {
                        return Err(DocBridgeError::script_parse(format!(
                            "createIndex on {collection} has no key argument"
                        )));
                    }
                    let keys = into_document(parsed.remove(0))?;
                    let options = match parsed.pop() {
                        Some(value) => into_document(value)?,
                        None => Document::new(),
                    };
                    statements.push(Statement::CreateIndex {
                        collection,
                        keys,
                        options,
                    });
                }
                _ => {
                    let mut parsed = parse_argument_list(&arguments)?;
                    if parsed.len() != 1 {
                        return Err(DocBridgeError::script_parse(format!(
                            "insert on {collection} expects one document argument"
                        )));
                    }
                    let document = into_document(parsed.remove(0))?;
                    statements.push(Statement::Insert {
                        collection,
                        document,
                    });
                }
            }
            continue;
        }

        if RUN_COMMAND.is_match(trimmed) {
            let opening = "db.runCommand(".len();
            let arguments = accumulate_arguments(&trimmed[opening..], &mut lines)?;
            let mut parsed = parse_argument_list(&arguments)?;
            if parsed.len() != 1 {
                return Err(DocBridgeError::script_parse(
                    "runCommand expects one document argument",
                ));
            }
            statements.push(Statement::RunCommand(into_document(parsed.remove(0))?));
            continue;
        }

        return Err(DocBridgeError::script_parse(format!(
            "unrecognized statement: {trimmed}"
        )));
    }

    if in_comment {
        return Err(DocBridgeError::script_parse("unterminated comment block"));
    }

    Ok(statements)
}

/// Collects lines until the buffered text ends with `);` and its argument
/// list parses as JSON.
fn accumulate_arguments<'a, I>(first: &str, lines: &mut std::iter::Peekable<I>) -> Result<String>
where
    I: Iterator<Item = &'a str>,
{
    let mut buffer = first.to_string();

    loop {
        let trimmed = buffer.trim_end();
        if let Some(inner) = trimmed.strip_suffix(");") {
            if arguments_parse(inner) {
                return Ok(inner.to_string());
            }
        }

        match lines.next() {
            Some(line) => {
                buffer.push('\n');
                buffer.push_str(line);
            }
            None => {
                return Err(DocBridgeError::script_parse(
                    "statement ended before its argument list was closed",
                ));
            }
        }
    }
}

fn arguments_parse(arguments: &str) -> bool {
    let encoded = codec::encode(arguments);
    serde_json::from_str::<Vec<Value>>(&format!("[{encoded}]")).is_ok()
}

/// Parses an argument list into revived JSON values. The extended-type
/// codec runs first so literal forms survive JSON parsing.
fn parse_argument_list(arguments: &str) -> Result<Vec<Value>> {
    let encoded = codec::encode(arguments);
    serde_json::from_str(&format!("[{encoded}]"))
        .map_err(|e| DocBridgeError::serialization("script argument list", e))
}

fn into_document(value: Value) -> Result<Document> {
    match codec::revive(&value) {
        Bson::Document(document) => Ok(document),
        other => Err(DocBridgeError::script_parse(format!(
            "expected a document argument, found {other}"
        ))),
    }
}
