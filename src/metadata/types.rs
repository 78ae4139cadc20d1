//! Metadata Record Types
//!
//! One `DocumentRecord` exists per indexed chunk. Its position in the mapping
//! file (counting only successfully parsed lines) is its vector-id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author list as written by the indexing pipeline: either a single string or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Authors {
    One(String),
    Many(Vec<String>),
}

/// A numeric field that some records store as text (e.g. `"2019"` or `"s/f"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrText {
    Int(i64),
    Text(String),
}

/// Metadata of one indexed document chunk.
///
/// Every field is optional. A field that is missing, `null`, or of an
/// unexpected JSON type is stored as `None`; it never invalidates the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(rename = "titulo")]
    pub title: Option<String>,
    #[serde(rename = "autores")]
    pub authors: Option<Authors>,
    #[serde(rename = "anio_publicacion")]
    pub year: Option<IntOrText>,
    #[serde(rename = "pagina_inicio")]
    pub start_page: Option<IntOrText>,
    #[serde(rename = "pagina_fin")]
    pub end_page: Option<IntOrText>,
    pub pdf_url: Option<String>,
    #[serde(rename = "nombre_archivo")]
    pub file_name: Option<String>,
    /// Full chunk text; only used to build snippets.
    #[serde(rename = "texto")]
    pub text: Option<String>,
}

/// Why a single mapping line was rejected.
#[derive(Debug, thiserror::Error)]
pub enum MalformedRecord {
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

impl DocumentRecord {
    /// Parses one mapping line. Callers strip surrounding whitespace and skip blank lines.
    pub fn parse_line(line: &str) -> Result<Self, MalformedRecord> {
        match serde_json::from_str::<Value>(line)? {
            Value::Object(fields) => Ok(Self::from_fields(&fields)),
            other => Err(MalformedRecord::NotAnObject(json_kind(&other))),
        }
    }

    /// Builds a record from a JSON object, ignoring unknown keys.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            title: string_field(fields, "titulo"),
            authors: authors_field(fields, "autores"),
            year: int_or_text_field(fields, "anio_publicacion"),
            start_page: int_or_text_field(fields, "pagina_inicio"),
            end_page: int_or_text_field(fields, "pagina_fin"),
            pdf_url: string_field(fields, "pdf_url"),
            file_name: string_field(fields, "nombre_archivo"),
            text: string_field(fields, "texto"),
        }
    }

    /// First `max_chars` characters of the text, or an empty string when there is none.
    pub fn snippet(&self, max_chars: usize) -> String {
        self.text
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(max_chars)
            .collect()
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key)?.as_str().map(str::to_string)
}

fn authors_field(fields: &Map<String, Value>, key: &str) -> Option<Authors> {
    match fields.get(key)? {
        Value::String(name) => Some(Authors::One(name.clone())),
        Value::Array(items) => Some(Authors::Many(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        )),
        _ => None,
    }
}

fn int_or_text_field(fields: &Map<String, Value>, key: &str) -> Option<IntOrText> {
    match fields.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(IntOrText::Int),
        Value::String(s) => Some(IntOrText::Text(s.clone())),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
