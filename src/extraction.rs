//! Dotted field paths for addressing values inside a record.
//!
//! Paths follow the ingest-document convention: `user.bio` walks nested objects,
//! numeric segments (`tags.0`) or bracketed segments (`tags.[0]`) index arrays.

use serde_json::{Map, Value};
use std::fmt;

/// Represents a path to a field in a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// The raw path string
    pub raw: String,
    /// Parsed path segments
    pub segments: Vec<PathSegment>,
}

/// A segment in a field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named field (e.g., "user", "name")
    Field(String),
    /// An explicit array index (e.g., [0], [5])
    Index(usize),
}

impl PathSegment {
    fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Field(name) => name.parse().ok(),
        }
    }

    fn key(&self) -> String {
        match self {
            PathSegment::Field(name) => name.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }
}

impl FieldPath {
    /// Parse a field path with a given delimiter
    ///
    /// # Example
    ///
    /// ```
    /// use ingest_extract::FieldPath;
    ///
    /// let path = FieldPath::parse("user.address.city", ".");
    /// assert_eq!(path.segments.len(), 3);
    /// ```
    pub fn parse(path: &str, delimiter: &str) -> Self {
        let segments = path
            .split(delimiter)
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s.starts_with('[') && s.ends_with(']') {
                    if let Ok(index) = s[1..s.len() - 1].parse::<usize>() {
                        return PathSegment::Index(index);
                    }
                }
                PathSegment::Field(s.to_string())
            })
            .collect();

        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// Create a field path from a dotted string (common format)
    pub fn from_dotted(path: &str) -> Self {
        Self::parse(path, ".")
    }

    /// Resolve the path against a record's top-level map.
    pub fn resolve<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = root.get(&first.key())?;

        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(&segment.key())?,
                Value::Array(items) => items.get(segment.as_index()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Write `value` at this path, creating intermediate objects as needed.
    ///
    /// Arrays are walked like in [`FieldPath::resolve`]: an index segment replaces
    /// an existing element but never grows the array. Fails with a reason when an
    /// intermediate value is a scalar or an array without the addressed index.
    pub fn assign(&self, root: &mut Map<String, Value>, value: Value) -> Result<(), String> {
        let (first, rest) = self
            .segments
            .split_first()
            .ok_or_else(|| "empty field path".to_string())?;

        let (last, middle) = match rest.split_last() {
            Some(split) => split,
            None => {
                root.insert(first.key(), value);
                return Ok(());
            }
        };

        let mut holder = first.key();
        let mut current = root
            .entry(holder.clone())
            .or_insert_with(|| Value::Object(Map::new()));

        for segment in middle {
            current = child_mut(current, &holder, segment)?;
            holder = segment.key();
        }

        match current {
            Value::Object(map) => {
                map.insert(last.key(), value);
            }
            Value::Array(items) => {
                *element_mut(items, &holder, last)? = value;
            }
            other => return Err(not_a_container(&holder, other)),
        }
        Ok(())
    }
}

/// Step into `segment` of `value`, creating a missing object member.
fn child_mut<'a>(value: &'a mut Value, holder: &str, segment: &PathSegment) -> Result<&'a mut Value, String> {
    match value {
        Value::Object(map) => Ok(map
            .entry(segment.key())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => element_mut(items, holder, segment),
        other => Err(not_a_container(holder, other)),
    }
}

fn element_mut<'a>(items: &'a mut [Value], holder: &str, segment: &PathSegment) -> Result<&'a mut Value, String> {
    let len = items.len();
    segment
        .as_index()
        .and_then(|index| items.get_mut(index))
        .ok_or_else(|| format!("'{}' has no element {} (length {})", holder, segment.key(), len))
}

fn not_a_container(holder: &str, value: &Value) -> String {
    format!("'{}' holds a {} value, not an object or array", holder, value_kind(value))
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
