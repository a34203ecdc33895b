//! Front matter parsing for markdown sources.
//!
//! A document optionally starts with a YAML header delimited by `---` lines.
//! The header is parsed with `serde_yaml` and converted into [`FrontValue`]s,
//! a small tagged value type that keeps the shapes authors actually write
//! (strings, booleans, dates, lists, nested mappings) without committing to a
//! schema. The ingest phases normalise the keys they know about into typed
//! fields and leave everything else as free metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_yaml::Value;

use crate::error::{Error, Result};

/// Front matter keys to values.
pub type Metadata = BTreeMap<String, FrontValue>;

/// Display format for datetimes coming from front matter.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value from a YAML header.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontValue {
    Null,
    Bool(bool),
    String(String),
    /// A date or date with time. Plain dates are midnight.
    DateTime(NaiveDateTime),
    List(Vec<String>),
    Mapping(BTreeMap<String, FrontValue>),
}

impl FrontValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FrontValue::Null)
    }

    /// Name of the variant, for log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FrontValue::Null => "null",
            FrontValue::Bool(_) => "bool",
            FrontValue::String(_) => "string",
            FrontValue::DateTime(_) => "datetime",
            FrontValue::List(_) => "list",
            FrontValue::Mapping(_) => "mapping",
        }
    }

    fn from_yaml(value: Value) -> Self {
        match value {
            Value::Null => FrontValue::Null,
            Value::Bool(b) => FrontValue::Bool(b),
            Value::Number(n) => FrontValue::String(n.to_string()),
            Value::String(s) => match parse_datetime(&s) {
                Some(dt) => FrontValue::DateTime(dt),
                None => FrontValue::String(s),
            },
            Value::Sequence(items) => {
                FrontValue::List(items.into_iter().filter_map(scalar_to_string).collect())
            }
            Value::Mapping(map) => FrontValue::Mapping(
                map.into_iter()
                    .filter_map(|(k, v)| scalar_to_string(k).map(|k| (k, FrontValue::from_yaml(v))))
                    .collect(),
            ),
            Value::Tagged(tagged) => FrontValue::from_yaml(tagged.value),
        }
    }
}

impl fmt::Display for FrontValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrontValue::Null => Ok(()),
            FrontValue::Bool(b) => write!(f, "{}", b),
            FrontValue::String(s) => f.write_str(s),
            FrontValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            FrontValue::List(items) => f.write_str(&items.join(", ")),
            FrontValue::Mapping(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                f.write_str(&keys.join(", "))
            }
        }
    }
}

impl Serialize for FrontValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FrontValue::Null => serializer.serialize_none(),
            FrontValue::Bool(b) => serializer.serialize_bool(*b),
            FrontValue::String(s) => serializer.serialize_str(s),
            FrontValue::DateTime(dt) => serializer.collect_str(&dt.format(DATETIME_FORMAT)),
            FrontValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            FrontValue::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        _ => None,
    }
}

/// Parse the timestamp shapes YAML would recognise as dates.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.len() < 10 || !text.as_bytes()[0].is_ascii_digit() {
        return None;
    }

    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// A markdown source split into header and body.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub metadata: Metadata,
    pub body: String,
}

/// Split `text` into the YAML header and the body.
///
/// Returns `None` when the text does not start with a `---` line or the
/// header is never closed.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text
        .strip_prefix("---\r\n")
        .or_else(|| text.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let header = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((header, body));
        }
        offset += line.len();
    }
    None
}

/// Parse a document. `path` is only used in error messages.
pub fn parse_document(text: &str, path: &Path) -> Result<Document> {
    let Some((header, body)) = split_front_matter(text) else {
        return Ok(Document {
            metadata: Metadata::new(),
            body: text.to_string(),
        });
    };

    let value: Value = serde_yaml::from_str(header).map_err(|e| Error::FrontMatter {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let metadata = match FrontValue::from_yaml(value) {
        FrontValue::Mapping(map) => map,
        FrontValue::Null => Metadata::new(),
        other => {
            return Err(Error::FrontMatter {
                path: path.display().to_string(),
                message: format!("header must be a mapping, found {}", other.kind()),
            })
        }
    };

    Ok(Document {
        metadata,
        body: body.to_string(),
    })
}

/// Read and parse the document at `path`.
pub fn read_document(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)?;
    parse_document(&text, path)
}
