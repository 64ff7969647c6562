//! Document helpers
//!
//! Documents, conditions and modifiers are all `serde_json::Value` objects,
//! with Mongo-style dotted keys for nested paths (`"author._id"`).

use serde_json::{Map, Value};

/// A document, condition or modifier value.
pub type Document = Value;

/// A proposed mutation, tagged explicitly so downstream analysis never has to
/// guess whether it is looking at operator keys or document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationSpec {
    /// Full document replacement: every top-level field is a candidate.
    Replacement(Document),
    /// Operator modifier (`$set`/`$unset`/`$pull`-style): field names live one
    /// level down, under each operator.
    Modifier(Document),
}

impl MutationSpec {
    pub fn body(&self) -> &Document {
        match self {
            Self::Replacement(doc) | Self::Modifier(doc) => doc,
        }
    }
}

/// Builds a single-field object `{path: value}`, keeping dotted paths as flat
/// keys the way storage conditions and modifiers expect them.
pub fn field_doc(path: &str, value: Value) -> Document {
    let mut fields = Map::new();
    fields.insert(path.to_string(), value);
    Value::Object(fields)
}

/// Reduces a possibly dotted field path to its first segment. Relevance is
/// evaluated at top-level-field granularity.
pub fn top_level_field(path: &str) -> &str {
    match path.split_once('.') {
        Some((first, _)) => first,
        None => path,
    }
}
