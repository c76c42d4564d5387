//! Host record model.
//!
//! A [`Document`] is the string-keyed record handed to the pipeline by the ingestion
//! host. The pipeline only reads string-valued fields and writes one list of strings
//! back under the configured target field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExtractError, Result};
use crate::extraction::{value_kind, FieldPath};

/// A record flowing through the ingestion host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Wrap an existing field map.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a document from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ExtractError::config(format!(
                "document must be a JSON object, got {}",
                value_kind(&other)
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// Names of the top-level fields, in record order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Look up a field by name or dotted path.
    ///
    /// A literal top-level key takes precedence over path interpretation, so a
    /// field literally named `a.b` is found before `a` → `b`.
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields
            .get(name)
            .or_else(|| FieldPath::from_dotted(name).resolve(&self.fields))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Look up a string-valued field; non-string values yield `None`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_field(name).and_then(Value::as_str)
    }

    /// Set a field by name or dotted path, overwriting any prior value.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        if self.fields.contains_key(name) || !name.contains('.') {
            self.fields.insert(name.to_string(), value);
            return Ok(());
        }

        FieldPath::from_dotted(name)
            .assign(&mut self.fields, value)
            .map_err(|reason| ExtractError::FieldWrite {
                field: name.to_string(),
                reason,
            })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Value::Object(document.fields)
    }
}
